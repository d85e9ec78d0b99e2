// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Primitive geometry helpers and the traits indexed objects implement.

use std::cell::Cell;
use std::rc::Rc;
use std::sync::Arc;

use kurbo::{Point, Rect};

/// Geometry helpers on [`Rect`] shared by both engines.
///
/// Containment is half-open (`x0 <= x < x1`), matching [`Rect::contains`].
pub trait RegionExt {
    /// Squared distance from `p` to the closest point of the rectangle.
    ///
    /// Zero when `p` lies inside.
    fn distance_sq_to(&self, p: Point) -> f64;

    /// Whether the interiors of the two rectangles overlap.
    fn intersects(&self, other: &Rect) -> bool;

    /// Top-left corner.
    fn min_corner(&self) -> Point;

    /// Bottom-right corner.
    fn max_corner(&self) -> Point;

    /// Whether width equals height.
    fn is_square(&self) -> bool;
}

impl RegionExt for Rect {
    #[inline]
    fn distance_sq_to(&self, p: Point) -> f64 {
        let dx = (self.x0 - p.x).max(0.0).max(p.x - self.x1);
        let dy = (self.y0 - p.y).max(0.0).max(p.y - self.y1);
        dx * dx + dy * dy
    }

    #[inline]
    fn intersects(&self, other: &Rect) -> bool {
        self.x0 < other.x1 && other.x0 < self.x1 && self.y0 < other.y1 && other.y0 < self.y1
    }

    #[inline]
    fn min_corner(&self) -> Point {
        Point::new(self.x0, self.y0)
    }

    #[inline]
    fn max_corner(&self) -> Point {
        Point::new(self.x1, self.y1)
    }

    #[inline]
    fn is_square(&self) -> bool {
        self.width() == self.height()
    }
}

/// Split a rectangle into its four quadrants in NW, NE, SE, SW order (y down).
///
/// The quadrants tile `r` exactly: outer edges are reused and the split lines
/// are shared, so every point contained in `r` is contained in exactly one quadrant.
pub fn quadrants(r: Rect) -> [Rect; 4] {
    let mx = r.x0 + r.width() * 0.5;
    let my = r.y0 + r.height() * 0.5;
    [
        Rect::new(r.x0, r.y0, mx, my),
        Rect::new(mx, r.y0, r.x1, my),
        Rect::new(mx, my, r.x1, r.y1),
        Rect::new(r.x0, my, mx, r.y1),
    ]
}

/// Anything with a 2D position that may change between updates.
pub trait Positioned {
    /// Current position.
    fn position(&self) -> Point;
}

impl Positioned for Point {
    fn position(&self) -> Point {
        *self
    }
}

impl Positioned for Cell<Point> {
    fn position(&self) -> Point {
        self.get()
    }
}

/// A cheap, identity-comparable reference to a positioned object.
///
/// The engines store clones of handles; the caller keeps ownership of the
/// object and is free to move it between calls to `update`.
pub trait Handle: Clone {
    /// Current position of the referenced object.
    fn position(&self) -> Point;

    /// Whether both handles refer to the same object.
    fn same_object(&self, other: &Self) -> bool;
}

impl<P: Positioned + ?Sized> Handle for Arc<P> {
    #[inline]
    fn position(&self) -> Point {
        (**self).position()
    }

    #[inline]
    fn same_object(&self, other: &Self) -> bool {
        Self::ptr_eq(self, other)
    }
}

impl<P: Positioned + ?Sized> Handle for Rc<P> {
    #[inline]
    fn position(&self) -> Point {
        (**self).position()
    }

    #[inline]
    fn same_object(&self, other: &Self) -> bool {
        Self::ptr_eq(self, other)
    }
}

impl<P: Positioned + ?Sized> Handle for &P {
    #[inline]
    fn position(&self) -> Point {
        (**self).position()
    }

    #[inline]
    fn same_object(&self, other: &Self) -> bool {
        core::ptr::eq(*self, *other)
    }
}

#[inline]
pub(crate) fn dist_sq(a: Point, b: Point) -> f64 {
    (a - b).hypot2()
}

#[inline]
pub(crate) fn is_finite_point(p: Point) -> bool {
    p.x.is_finite() && p.y.is_finite()
}
