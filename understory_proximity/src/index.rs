// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The query contract shared by both engines.

use kurbo::{Point, Rect};

use crate::error::IndexError;
use crate::pending::Mutator;
use crate::queue::MaxPriorityQueue;
use crate::types::Handle;

/// A dynamic point index answering proximity queries.
///
/// Mutations are deferred: [`add`](Self::add) and [`remove`](Self::remove) only queue
/// intent, and nothing changes (including [`len`](Self::len)) until the next
/// [`update`](Self::update). `update` also re-homes objects whose positions changed.
///
/// Queries take `&self` and may run concurrently with each other and with `add`/`remove`.
/// `update` takes `&mut self`, so it can never overlap a query.
///
/// Distances are Euclidean; "within range" is inclusive. Pass `f64::INFINITY` for an
/// unbounded range.
pub trait SpatialIndex<H: Handle> {
    /// Apply pending insertions and removals and re-home moved objects.
    fn update(&mut self) -> Result<(), IndexError>;

    /// Producer handle for the pending queues, usable from other threads.
    fn mutator(&self) -> Mutator<H>;

    /// Queue `obj` for insertion at the next `update`.
    fn add(&self, obj: H) -> Result<(), IndexError> {
        self.mutator().add(obj)
    }

    /// Queue `obj` for removal at the next `update`.
    fn remove(&self, obj: H) -> Result<(), IndexError> {
        self.mutator().remove(obj)
    }

    /// Number of committed objects.
    fn len(&self) -> usize;

    /// True if no objects are committed.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every committed object and everything still pending.
    fn clear(&mut self);

    /// The object closest to `pos` no farther than `max_distance`, if any.
    fn closest(&self, pos: Point, max_distance: f64) -> Result<Option<H>, IndexError>;

    /// Fill `results` with up to `k` objects closest to `pos` within `range`.
    ///
    /// `results` is a reusable working set: it is cleared first, so afterwards it holds
    /// at most `k` entries from this query alone.
    fn k_closest_into(
        &self,
        pos: Point,
        k: usize,
        range: f64,
        results: &mut MaxPriorityQueue<H>,
    ) -> Result<(), IndexError>;

    /// Up to `k` objects closest to `pos` within `range`, nearest first.
    fn k_closest(&self, pos: Point, k: usize, range: f64) -> Result<Vec<H>, IndexError> {
        let mut results = MaxPriorityQueue::new();
        self.k_closest_into(pos, k, range, &mut results)?;
        Ok(results.into_sorted_vec())
    }

    /// Append every object within `range` of `pos` to `results`.
    fn in_range_into(&self, pos: Point, range: f64, results: &mut Vec<H>)
    -> Result<(), IndexError>;

    /// Every object within `range` of `pos`.
    fn in_range(&self, pos: Point, range: f64) -> Result<Vec<H>, IndexError> {
        let mut results = Vec::new();
        self.in_range_into(pos, range, &mut results)?;
        Ok(results)
    }

    /// Append every object whose position lies in `rect` to `results`.
    fn in_rect_into(&self, rect: Rect, results: &mut Vec<H>);

    /// Every object whose position lies in `rect`.
    fn in_rect(&self, rect: Rect) -> Vec<H> {
        let mut results = Vec::new();
        self.in_rect_into(rect, &mut results);
        results
    }

    /// Append the rectangle of every node or bucket in use, for diagnostics and drawing.
    fn regions(&self, out: &mut Vec<Rect>);
}

/// Offer one candidate to a k-nearest working set and tighten the search bound.
///
/// Once `results` holds `k` entries, the bound shrinks to the farthest retained distance.
#[inline]
pub(crate) fn offer_candidate<H: Clone>(
    results: &mut MaxPriorityQueue<H>,
    k: usize,
    obj: &H,
    d2: f64,
    bound_sq: &mut f64,
) {
    if d2 > *bound_sq {
        return;
    }
    results.push_bounded(obj.clone(), d2, k);
    if results.len() >= k
        && let Some(max) = results.peek_priority()
        && max < *bound_sq
    {
        *bound_sq = max;
    }
}

/// Square a validated search distance. Negative or NaN distances (possible with
/// validation off) yield a bound nothing can satisfy.
#[inline]
pub(crate) fn squared_bound(d: f64) -> f64 {
    if d >= 0.0 { d * d } else { -1.0 }
}
