// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Uniform bucket grid.
//!
//! The region is split into `columns` x `rows` equal cells, each backed by a lazily
//! allocated list. Nearest-neighbor searches expand square rings of cells around the
//! query point; range and rectangle queries scan the box of cells covering the query.

use core::fmt::Debug;

use kurbo::{Point, Rect, Vec2};

use crate::config::GridConfig;
use crate::error::{IndexError, check_distance};
use crate::index::{SpatialIndex, offer_candidate, squared_bound};
use crate::pending::{Batch, Mutator, Pending};
use crate::queue::MaxPriorityQueue;
use crate::types::{Handle, RegionExt, dist_sq};

/// Flat grid of buckets over a rectangular region.
///
/// Every [`update`](SpatialIndex::update) re-checks the bucket of every committed object,
/// so its cost is linear in the number of objects whether or not they moved.
///
/// Positions outside the region are clamped into the nearest edge bucket. Such objects
/// are kept and counted, but which queries find them is unspecified.
pub struct BucketGrid<H: Handle> {
    region: Rect,
    layout: Layout,
    buckets: Vec<Option<Vec<H>>>,
    config: GridConfig,
    pending: Pending<H>,
}

/// Cell arithmetic for a grid.
#[derive(Copy, Clone, Debug)]
struct Layout {
    origin: Point,
    cell_w: f64,
    cell_h: f64,
    columns: usize,
    rows: usize,
}

impl Layout {
    fn new(region: Rect, columns: usize, rows: usize) -> Self {
        // Pad the low edges so points on them never round into the cell before.
        let pad = Vec2::new(
            region.x0.abs().max(1.0) * f64::EPSILON,
            region.y0.abs().max(1.0) * f64::EPSILON,
        );
        Self {
            origin: region.min_corner() - pad,
            cell_w: region.width() / columns as f64,
            cell_h: region.height() / rows as f64,
            columns,
            rows,
        }
    }

    /// Unclamped cell coordinates of `p`.
    #[allow(
        clippy::cast_possible_truncation,
        reason = "Float-to-int casts saturate; callers clamp to the grid."
    )]
    fn cell_of(&self, p: Point) -> (i64, i64) {
        (
            ((p.x - self.origin.x) / self.cell_w).floor() as i64,
            ((p.y - self.origin.y) / self.cell_h).floor() as i64,
        )
    }

    /// Grid size as signed cell coordinates.
    fn extent(&self) -> (i64, i64) {
        (
            i64::try_from(self.columns).unwrap_or(i64::MAX),
            i64::try_from(self.rows).unwrap_or(i64::MAX),
        )
    }

    fn clamp(&self, (cx, cy): (i64, i64)) -> (usize, usize) {
        (clamp_axis(cx, self.columns), clamp_axis(cy, self.rows))
    }

    /// Bucket holding `p`, clamping out-of-region positions to the edge.
    fn index_of(&self, p: Point) -> usize {
        let (cx, cy) = self.clamp(self.cell_of(p));
        cy * self.columns + cx
    }

    /// Bucket at signed cell coordinates, if they fall inside the grid.
    fn bucket_at(&self, cx: i64, cy: i64) -> Option<usize> {
        let cx = usize::try_from(cx).ok().filter(|&x| x < self.columns)?;
        let cy = usize::try_from(cy).ok().filter(|&y| y < self.rows)?;
        Some(cy * self.columns + cx)
    }

    fn cell_rect(&self, index: usize) -> Rect {
        let cx = (index % self.columns) as f64;
        let cy = (index / self.columns) as f64;
        let x0 = self.origin.x + cx * self.cell_w;
        let y0 = self.origin.y + cy * self.cell_h;
        Rect::new(x0, y0, x0 + self.cell_w, y0 + self.cell_h)
    }

    /// Buckets covering the box from `min` to `max`, clamped to the grid.
    fn covering(&self, min: Point, max: Point) -> impl Iterator<Item = usize> + '_ {
        let (x0, y0) = self.clamp(self.cell_of(min));
        let (x1, y1) = self.clamp(self.cell_of(max));
        (y0..=y1).flat_map(move |y| (x0..=x1).map(move |x| y * self.columns + x))
    }
}

fn clamp_axis(v: i64, n: usize) -> usize {
    match usize::try_from(v) {
        Ok(v) => v.min(n - 1),
        Err(_) if v < 0 => 0,
        Err(_) => n - 1,
    }
}

/// Cells at Chebyshev distance `r` from `(cx, cy)`: the top and bottom rows, then the sides.
fn ring(cx: i64, cy: i64, r: i64) -> impl Iterator<Item = (i64, i64)> {
    let top = (cx - r..=cx + r).map(move |x| (x, cy - r));
    let bottom = (cx - r..=cx + r)
        .map(move |x| (x, cy + r))
        .filter(move |_| r > 0);
    let sides = (cy - r + 1..cy + r).flat_map(move |y| [(cx - r, y), (cx + r, y)]);
    top.chain(bottom).chain(sides)
}

impl<H: Handle> BucketGrid<H> {
    /// Create an empty `columns` x `rows` grid over `region`.
    pub fn new(region: Rect, columns: usize, rows: usize) -> Result<Self, IndexError> {
        Self::with_config(region, GridConfig::new(columns, rows))
    }

    /// Create an empty grid over `region`.
    pub fn with_config(region: Rect, config: GridConfig) -> Result<Self, IndexError> {
        Self::with_objects(region, Vec::new(), config)
    }

    /// Create a grid over `region` with `objects` already committed.
    pub fn with_objects(
        region: Rect,
        objects: Vec<H>,
        config: GridConfig,
    ) -> Result<Self, IndexError> {
        let region = region.abs();
        if !(region.is_finite() && region.width() > 0.0 && region.height() > 0.0) {
            return Err(IndexError::invalid("region must be finite with a positive size"));
        }
        config.check()?;
        let mut grid = Self {
            region,
            layout: Layout::new(region, config.columns, config.rows),
            buckets: (0..config.columns * config.rows).map(|_| None).collect(),
            config,
            pending: Pending::new(config.validate),
        };
        let initial = objects.len();
        for obj in objects {
            grid.place(obj);
        }
        tracing::debug!(
            ?region,
            columns = config.columns,
            rows = config.rows,
            initial,
            "built bucket grid"
        );
        Ok(grid)
    }

    /// The region the grid covers.
    pub fn region(&self) -> Rect {
        self.region
    }

    /// The configuration this grid was built with.
    pub fn config(&self) -> &GridConfig {
        &self.config
    }

    /// Iterate every committed object, bucket by bucket.
    pub fn iter(&self) -> impl Iterator<Item = &H> + '_ {
        self.buckets.iter().flatten().flatten()
    }

    fn place(&mut self, obj: H) {
        let i = self.layout.index_of(obj.position());
        self.buckets[i].get_or_insert_with(Vec::new).push(obj);
    }

    /// Visit occupied buckets ring by ring around `pos` until no closer candidate is possible.
    ///
    /// `visit` may shrink `bound_sq`, which tightens both the ring cutoff and the
    /// per-bucket distance check.
    fn search_rings<'a>(
        &'a self,
        pos: Point,
        bound_sq: &mut f64,
        mut visit: impl FnMut(&'a [H], &mut f64),
    ) {
        let layout = &self.layout;
        let (columns, rows) = layout.extent();
        let (hx, hy) = layout.cell_of(pos);
        // Query points off the grid start one ring outside it.
        let (hx, hy) = (hx.clamp(-1, columns), hy.clamp(-1, rows));
        let first = i64::from(hx < 0 || hx >= columns || hy < 0 || hy >= rows);
        let last = hx.max(columns - 1 - hx).max(hy).max(rows - 1 - hy);
        let step = layout.cell_w.min(layout.cell_h);

        for r in first..=last {
            // Every cell of ring `r` is at least `r - 1` whole cells away.
            let gap = (r - 1).max(0) as f64 * step;
            if gap * gap > *bound_sq {
                break;
            }
            for (cx, cy) in ring(hx, hy, r) {
                let Some(i) = layout.bucket_at(cx, cy) else {
                    continue;
                };
                let Some(list) = &self.buckets[i] else {
                    continue;
                };
                if list.is_empty() || layout.cell_rect(i).distance_sq_to(pos) > *bound_sq {
                    continue;
                }
                visit(list.as_slice(), bound_sq);
            }
        }
    }

    fn scan(&self, min: Point, max: Point, mut keep: impl FnMut(Point) -> bool, out: &mut Vec<H>) {
        for i in self.layout.covering(min, max) {
            if let Some(list) = &self.buckets[i] {
                out.extend(list.iter().filter(|o| keep(o.position())).cloned());
            }
        }
    }
}

impl<H: Handle> SpatialIndex<H> for BucketGrid<H> {
    fn update(&mut self) -> Result<(), IndexError> {
        let layout = self.layout;
        let mut moved = Vec::new();
        for (i, bucket) in self.buckets.iter_mut().enumerate() {
            if let Some(list) = bucket {
                moved.extend(list.extract_if(.., |o| layout.index_of(o.position()) != i));
            }
        }
        let rebucketed = moved.len();
        for obj in moved {
            self.place(obj);
        }

        let Batch { added, removed } = self.pending.drain();
        let (added_count, removed_count) = (added.len(), removed.len());
        for obj in &removed {
            let i = layout.index_of(obj.position());
            if let Some(list) = &mut self.buckets[i]
                && let Some(j) = list.iter().position(|o| o.same_object(obj))
            {
                list.remove(j);
            }
        }
        for obj in added {
            self.place(obj);
        }

        tracing::trace!(
            rebucketed,
            added = added_count,
            removed = removed_count,
            "bucket grid update"
        );
        Ok(())
    }

    fn mutator(&self) -> Mutator<H> {
        self.pending.mutator().clone()
    }

    fn add(&self, obj: H) -> Result<(), IndexError> {
        self.pending.mutator().add(obj)
    }

    fn remove(&self, obj: H) -> Result<(), IndexError> {
        self.pending.mutator().remove(obj)
    }

    fn len(&self) -> usize {
        self.buckets.iter().flatten().map(Vec::len).sum()
    }

    fn clear(&mut self) {
        self.pending.discard();
        self.buckets.iter_mut().for_each(|b| *b = None);
    }

    fn closest(&self, pos: Point, max_distance: f64) -> Result<Option<H>, IndexError> {
        check_distance(
            self.config.validate,
            max_distance,
            "max_distance must be non-negative",
        )?;
        let mut bound_sq = squared_bound(max_distance);
        let mut best = None;
        self.search_rings(pos, &mut bound_sq, |list, bound_sq| {
            for obj in list {
                let d2 = dist_sq(pos, obj.position());
                if d2 <= *bound_sq {
                    *bound_sq = d2;
                    best = Some(obj);
                }
            }
        });
        Ok(best.cloned())
    }

    fn k_closest_into(
        &self,
        pos: Point,
        k: usize,
        range: f64,
        results: &mut MaxPriorityQueue<H>,
    ) -> Result<(), IndexError> {
        check_distance(self.config.validate, range, "range must be non-negative")?;
        results.clear();
        if k == 0 {
            return Ok(());
        }
        let mut bound_sq = squared_bound(range);
        self.search_rings(pos, &mut bound_sq, |list, bound_sq| {
            for obj in list {
                offer_candidate(results, k, obj, dist_sq(pos, obj.position()), bound_sq);
            }
        });
        Ok(())
    }

    fn in_range_into(
        &self,
        pos: Point,
        range: f64,
        results: &mut Vec<H>,
    ) -> Result<(), IndexError> {
        check_distance(self.config.validate, range, "range must be non-negative")?;
        let r = Vec2::new(range, range);
        let range_sq = squared_bound(range);
        self.scan(pos - r, pos + r, |p| dist_sq(pos, p) <= range_sq, results);
        Ok(())
    }

    fn in_rect_into(&self, rect: Rect, results: &mut Vec<H>) {
        let rect = rect.abs();
        self.scan(
            rect.min_corner(),
            rect.max_corner(),
            |p| rect.contains(p),
            results,
        );
    }

    fn regions(&self, out: &mut Vec<Rect>) {
        out.push(self.region);
        for (i, bucket) in self.buckets.iter().enumerate() {
            if bucket.as_ref().is_some_and(|list| !list.is_empty()) {
                out.push(self.layout.cell_rect(i));
            }
        }
    }
}

impl<H: Handle> Debug for BucketGrid<H> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let occupied = self
            .buckets
            .iter()
            .flatten()
            .filter(|b| !b.is_empty())
            .count();
        f.debug_struct("BucketGrid")
            .field("region", &self.region)
            .field("config", &self.config)
            .field("occupied_buckets", &occupied)
            .field("objects", &self.len())
            .finish_non_exhaustive()
    }
}
