// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Understory Proximity: nearest-neighbor and range queries over moving 2D points.
//!
//! Two interchangeable engines implement one query contract, [`SpatialIndex`]:
//!
//! - [`QuadTree`]: an adaptive point-region quadtree over a square region.
//! - [`BucketGrid`]: a uniform grid of buckets over a rectangle.
//!
//! Objects are referenced through a [`Handle`] such as `Rc<Cell<Point>>` or `Arc<P>`.
//! The index never owns the object itself, and callers are free to move objects between
//! updates.
//!
//! Mutation is deferred. [`SpatialIndex::add`] and [`SpatialIndex::remove`] only queue
//! intent; [`SpatialIndex::update`] applies the queues and re-homes objects that moved
//! since the previous update. Queries see the state as of the last `update`.
//!
//! # Example
//!
//! ```rust
//! use std::cell::Cell;
//! use std::rc::Rc;
//!
//! use kurbo::{Point, Rect};
//! use understory_proximity::{QuadTree, SpatialIndex};
//!
//! let mut tree = QuadTree::new(Rect::new(0.0, 0.0, 1000.0, 1000.0)).unwrap();
//! let a = Rc::new(Cell::new(Point::new(10.0, 10.0)));
//! let b = Rc::new(Cell::new(Point::new(600.0, 600.0)));
//! tree.add(a.clone()).unwrap();
//! tree.add(b.clone()).unwrap();
//! assert_eq!(tree.len(), 0);
//! tree.update().unwrap();
//! assert_eq!(tree.len(), 2);
//!
//! // Move `b` next to the query point; the next update re-homes it.
//! b.set(Point::new(20.0, 20.0));
//! tree.update().unwrap();
//! let near = tree.in_range(Point::new(15.0, 15.0), 10.0).unwrap();
//! assert_eq!(near.len(), 2);
//!
//! let closest = tree.closest(Point::new(0.0, 0.0), f64::INFINITY).unwrap();
//! assert!(Rc::ptr_eq(&closest.unwrap(), &a));
//! ```
//!
//! Code that should work with either engine can be written against the trait:
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use kurbo::{Point, Rect};
//! use understory_proximity::{BucketGrid, SpatialIndex};
//!
//! fn crowd<I: SpatialIndex<Arc<Point>>>(index: &I, at: Point) -> usize {
//!     index.k_closest(at, 3, 50.0).unwrap().len()
//! }
//!
//! let mut grid = BucketGrid::new(Rect::new(0.0, 0.0, 400.0, 200.0), 8, 4).unwrap();
//! for x in [10.0, 20.0, 30.0, 300.0] {
//!     grid.add(Arc::new(Point::new(x, 10.0))).unwrap();
//! }
//! grid.update().unwrap();
//! assert_eq!(crowd(&grid, Point::new(15.0, 10.0)), 3);
//! ```
//!
//! ## Choosing an engine
//!
//! - [`QuadTree`] only touches the branches that changed during `update`, and subdivides
//!   where objects cluster. Objects that leave its region are evicted and reported as
//!   [`IndexError::OutsideRegion`].
//! - [`BucketGrid`] re-checks every object on each `update` but has no structure to
//!   rebalance. Tune `columns` and `rows` so a bucket holds a handful of objects.
//!   Objects outside its region are clamped into edge buckets.
//!
//! ## Threads
//!
//! Queries take `&self`. [`SpatialIndex::mutator`] returns a cloneable [`Mutator`]
//! that can queue additions and removals from other threads, even while the owner is
//! inside `update`.
//!
//! ### Float semantics
//!
//! Distances are Euclidean and "within range" is inclusive. With validation on (the
//! default), negative or NaN distances and non-finite object positions are rejected with
//! [`IndexError::InvalidArgument`].

pub mod backends;
pub mod config;
pub mod error;
pub mod index;
pub mod pending;
pub mod queue;
pub mod types;

#[cfg(test)]
mod conformance;

pub use backends::{BucketGrid, QuadTree};
pub use config::{GridConfig, QuadTreeConfig};
pub use error::{ErrorKind, IndexError};
pub use index::SpatialIndex;
pub use pending::Mutator;
pub use queue::MaxPriorityQueue;
pub use types::{Handle, Positioned, RegionExt, quadrants};
