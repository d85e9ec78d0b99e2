// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Adaptive point-region quadtree.
//!
//! Nodes live in an arena and refer to their children by index. A node holds its
//! objects locally until it has more than [`QuadTreeConfig::max_objects`] of them and is
//! wider than [`QuadTreeConfig::min_size`]; then it pushes them down into quadrants,
//! creating a child only for quadrants that receive something.

use core::fmt::Debug;

use kurbo::{Point, Rect};

use crate::config::QuadTreeConfig;
use crate::error::{IndexError, check_distance};
use crate::index::{SpatialIndex, offer_candidate, squared_bound};
use crate::pending::{Batch, Mutator, Pending};
use crate::queue::MaxPriorityQueue;
use crate::types::{Handle, RegionExt, dist_sq, quadrants};

/// Quadtree over a square region.
///
/// Objects found outside the region during [`update`](SpatialIndex::update) are
/// evicted and reported as [`IndexError::OutsideRegion`]; everything else in the
/// update is still applied.
pub struct QuadTree<H: Handle> {
    config: QuadTreeConfig,
    nodes: Vec<Node<H>>,
    free_list: Vec<usize>,
    pending: Pending<H>,
}

struct Node<H> {
    region: Rect,
    objects: Vec<H>,
    children: [NodeIdx; 4],
}

impl<H> Node<H> {
    fn new(region: Rect) -> Self {
        Self {
            region,
            objects: Vec::new(),
            children: [NodeIdx::NONE; 4],
        }
    }

    fn is_leaf(&self) -> bool {
        self.children.iter().all(|c| c.is_none())
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
struct NodeIdx(u32);

impl NodeIdx {
    const NONE: Self = Self(u32::MAX);
    const ROOT: Self = Self(0);

    #[allow(
        clippy::cast_possible_truncation,
        reason = "Node indices are 32-bit; an arena that large is not a practical tree."
    )]
    const fn new(i: usize) -> Self {
        Self(i as u32)
    }

    const fn get(self) -> usize {
        self.0 as usize
    }

    const fn is_none(self) -> bool {
        self.0 == u32::MAX
    }
}

impl<H: Handle> QuadTree<H> {
    /// Create an empty tree over `region` with the default configuration.
    ///
    /// Fails if `region` is not square or has no finite positive size.
    pub fn new(region: Rect) -> Result<Self, IndexError> {
        Self::with_config(region, QuadTreeConfig::default())
    }

    /// Create an empty tree over `region`.
    pub fn with_config(region: Rect, config: QuadTreeConfig) -> Result<Self, IndexError> {
        Self::with_objects(region, Vec::new(), config)
    }

    /// Create a tree over `region` and build it eagerly from `objects`.
    ///
    /// The objects are committed immediately; no `update` is needed before querying.
    pub fn with_objects(
        region: Rect,
        objects: Vec<H>,
        config: QuadTreeConfig,
    ) -> Result<Self, IndexError> {
        if !region.is_square() {
            return Err(IndexError::NonSquareRegion {
                width: region.width(),
                height: region.height(),
            });
        }
        if !(region.is_finite() && region.width() > 0.0) {
            return Err(IndexError::invalid("region must be finite with a positive size"));
        }
        config.check()?;
        let mut outside = objects.iter().filter(|o| !region.contains(o.position()));
        if let Some(first) = outside.next() {
            return Err(IndexError::OutsideRegion {
                count: 1 + outside.count(),
                first: first.position(),
                region,
            });
        }

        let mut tree = Self {
            config,
            nodes: vec![Node::new(region)],
            free_list: Vec::new(),
            pending: Pending::new(config.validate),
        };
        let initial = objects.len();
        tree.insert(NodeIdx::ROOT, objects);
        tracing::debug!(?region, initial, nodes = tree.node_count(), "built quadtree");
        Ok(tree)
    }

    /// The root region.
    pub fn region(&self) -> Rect {
        self.nodes[NodeIdx::ROOT.get()].region
    }

    /// The configuration this tree was built with.
    pub fn config(&self) -> &QuadTreeConfig {
        &self.config
    }

    /// Number of live nodes, root included.
    pub fn node_count(&self) -> usize {
        self.nodes.len() - self.free_list.len()
    }

    /// Iterate every committed object in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = &H> + '_ {
        self.nodes.iter().flat_map(|n| n.objects.iter())
    }

    fn alloc(&mut self, region: Rect) -> NodeIdx {
        if let Some(i) = self.free_list.pop() {
            self.nodes[i].region = region;
            NodeIdx::new(i)
        } else {
            self.nodes.push(Node::new(region));
            NodeIdx::new(self.nodes.len() - 1)
        }
    }

    /// Return an empty leaf to the free list.
    fn release(&mut self, idx: NodeIdx) {
        let node = &self.nodes[idx.get()];
        debug_assert!(
            node.objects.is_empty() && node.is_leaf(),
            "only empty leaves are released"
        );
        self.free_list.push(idx.get());
    }

    fn is_dead(&self, idx: NodeIdx) -> bool {
        let node = &self.nodes[idx.get()];
        node.objects.is_empty() && node.is_leaf()
    }

    fn count(&self, idx: NodeIdx) -> usize {
        let node = &self.nodes[idx.get()];
        node.objects.len()
            + node
                .children
                .iter()
                .filter(|c| !c.is_none())
                .map(|&c| self.count(c))
                .sum::<usize>()
    }

    fn insert(&mut self, idx: NodeIdx, objects: Vec<H>) {
        let node = &mut self.nodes[idx.get()];
        node.objects.extend(objects);
        let overflow = node.objects.len() > self.config.max_objects || !node.is_leaf();
        // Nodes are square, so one axis is enough.
        if overflow && node.region.width() > self.config.min_size {
            self.push_down(idx);
        }
    }

    /// Move every local object of `idx` into the quadrant containing it.
    fn push_down(&mut self, idx: NodeIdx) {
        let node = &mut self.nodes[idx.get()];
        let quads = quadrants(node.region);
        let mut buckets: [Vec<H>; 4] = core::array::from_fn(|_| Vec::new());
        let mut stray = Vec::new();
        for obj in node.objects.drain(..) {
            let p = obj.position();
            match quads.iter().position(|q| q.contains(p)) {
                Some(q) => buckets[q].push(obj),
                None => stray.push(obj),
            }
        }
        // Every object reaching here was checked against this node's region earlier in
        // the same pass; only a position changed mid-update can fit no quadrant.
        debug_assert!(
            stray.is_empty(),
            "{} object(s) fit no quadrant of {:?}",
            stray.len(),
            node.region
        );
        if !stray.is_empty() {
            tracing::error!(
                count = stray.len(),
                region = ?node.region,
                "objects fit no quadrant of their node; keeping them in place"
            );
            node.objects = stray;
        }

        for (q, bucket) in buckets.into_iter().enumerate() {
            if bucket.is_empty() {
                continue;
            }
            let mut child = self.nodes[idx.get()].children[q];
            if child.is_none() {
                child = self.alloc(quads[q]);
                self.nodes[idx.get()].children[q] = child;
            }
            self.insert(child, bucket);
        }
    }

    /// Remove `obj` from the subtree at `idx`, pruning leaves it empties.
    fn delete(&mut self, idx: NodeIdx, obj: &H) -> bool {
        let node = &mut self.nodes[idx.get()];
        if let Some(i) = node.objects.iter().position(|o| o.same_object(obj)) {
            node.objects.remove(i);
            return true;
        }
        let p = obj.position();
        for q in 0..4 {
            let child = self.nodes[idx.get()].children[q];
            if child.is_none() || !self.nodes[child.get()].region.contains(p) {
                continue;
            }
            if self.delete(child, obj) {
                if self.is_dead(child) {
                    self.release(child);
                    self.nodes[idx.get()].children[q] = NodeIdx::NONE;
                }
                return true;
            }
        }
        false
    }

    /// Re-home the subtree at `idx`; returns objects that left its region.
    ///
    /// Children are processed first. Objects coming up from them that fit this node
    /// are reinserted here, the rest keep moving up along with local objects that left.
    fn rehome(&mut self, idx: NodeIdx) -> Vec<H> {
        let region = self.nodes[idx.get()].region;
        let mut inserting = Vec::new();
        let mut moving_up = Vec::new();
        for q in 0..4 {
            let child = self.nodes[idx.get()].children[q];
            if child.is_none() {
                continue;
            }
            for obj in self.update_node(child) {
                if region.contains(obj.position()) {
                    inserting.push(obj);
                } else {
                    moving_up.push(obj);
                }
            }
        }

        moving_up.extend(
            self.nodes[idx.get()]
                .objects
                .extract_if(.., |o| !region.contains(o.position())),
        );

        if !inserting.is_empty() {
            self.insert(idx, inserting);
        }
        moving_up
    }

    fn update_node(&mut self, idx: NodeIdx) -> Vec<H> {
        let moving_up = self.rehome(idx);
        self.prune(idx);
        moving_up
    }

    /// Release children that hold nothing and have no children of their own.
    fn prune(&mut self, idx: NodeIdx) {
        for q in 0..4 {
            let child = self.nodes[idx.get()].children[q];
            if !child.is_none() && self.is_dead(child) {
                self.release(child);
                self.nodes[idx.get()].children[q] = NodeIdx::NONE;
            }
        }
    }

    fn nearest(&self, idx: NodeIdx, pos: Point, bound_sq: &mut f64) -> Option<&H> {
        let node = &self.nodes[idx.get()];
        let mut closest = None;
        for obj in &node.objects {
            let d2 = dist_sq(pos, obj.position());
            if d2 > *bound_sq {
                continue;
            }
            *bound_sq = d2;
            closest = Some(obj);
        }
        // Fixed quadrant order; the shrinking bound does the pruning.
        for &child in &node.children {
            if child.is_none() || self.nodes[child.get()].region.distance_sq_to(pos) > *bound_sq {
                continue;
            }
            if let Some(found) = self.nearest(child, pos, bound_sq) {
                closest = Some(found);
            }
        }
        closest
    }

    fn k_nearest(
        &self,
        idx: NodeIdx,
        pos: Point,
        k: usize,
        bound_sq: &mut f64,
        results: &mut MaxPriorityQueue<H>,
    ) {
        let node = &self.nodes[idx.get()];
        for obj in &node.objects {
            offer_candidate(results, k, obj, dist_sq(pos, obj.position()), bound_sq);
        }
        for &child in &node.children {
            if child.is_none() || self.nodes[child.get()].region.distance_sq_to(pos) > *bound_sq {
                continue;
            }
            self.k_nearest(child, pos, k, bound_sq, results);
        }
    }

    fn within_range(&self, idx: NodeIdx, pos: Point, range_sq: f64, results: &mut Vec<H>) {
        let node = &self.nodes[idx.get()];
        results.extend(
            node.objects
                .iter()
                .filter(|o| dist_sq(pos, o.position()) <= range_sq)
                .cloned(),
        );
        for &child in &node.children {
            if child.is_none() || self.nodes[child.get()].region.distance_sq_to(pos) > range_sq {
                continue;
            }
            self.within_range(child, pos, range_sq, results);
        }
    }

    fn within_rect(&self, idx: NodeIdx, rect: &Rect, results: &mut Vec<H>) {
        let node = &self.nodes[idx.get()];
        results.extend(
            node.objects
                .iter()
                .filter(|o| rect.contains(o.position()))
                .cloned(),
        );
        for &child in &node.children {
            if child.is_none() || !self.nodes[child.get()].region.intersects(rect) {
                continue;
            }
            self.within_rect(child, rect, results);
        }
    }

    fn collect_regions(&self, idx: NodeIdx, out: &mut Vec<Rect>) {
        let node = &self.nodes[idx.get()];
        out.push(node.region);
        for &child in &node.children {
            if !child.is_none() {
                self.collect_regions(child, out);
            }
        }
    }
}

impl<H: Handle> SpatialIndex<H> for QuadTree<H> {
    fn update(&mut self) -> Result<(), IndexError> {
        let region = self.region();
        let mut evicted = self.rehome(NodeIdx::ROOT);
        let moved_out = evicted.len();

        let Batch { added, removed } = self.pending.drain();
        let (added_count, removed_count) = (added.len(), removed.len());
        let (inside, mut outside): (Vec<H>, Vec<H>) = added
            .into_iter()
            .partition(|o| region.contains(o.position()));
        if !inside.is_empty() {
            self.insert(NodeIdx::ROOT, inside);
        }
        for obj in &removed {
            if self.delete(NodeIdx::ROOT, obj) {
                continue;
            }
            // Removing an object that left the region withdraws it from the report.
            if let Some(i) = evicted.iter().position(|e| e.same_object(obj)) {
                evicted.swap_remove(i);
            } else if let Some(i) = outside.iter().position(|e| e.same_object(obj)) {
                outside.swap_remove(i);
            }
        }
        self.prune(NodeIdx::ROOT);

        tracing::trace!(
            added = added_count,
            removed = removed_count,
            moved_out,
            nodes = self.node_count(),
            "quadtree update"
        );

        evicted.append(&mut outside);
        match evicted.first() {
            None => Ok(()),
            Some(first) => {
                let err = IndexError::OutsideRegion {
                    count: evicted.len(),
                    first: first.position(),
                    region,
                };
                tracing::warn!(%err, "evicted objects outside the quadtree region");
                Err(err)
            }
        }
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
        self.count(NodeIdx::ROOT)
    }

    fn clear(&mut self) {
        self.pending.discard();
        let region = self.region();
        self.nodes.clear();
        self.nodes.push(Node::new(region));
        self.free_list.clear();
    }

    fn closest(&self, pos: Point, max_distance: f64) -> Result<Option<H>, IndexError> {
        check_distance(
            self.config.validate,
            max_distance,
            "max_distance must be non-negative",
        )?;
        let mut bound_sq = squared_bound(max_distance);
        Ok(self.nearest(NodeIdx::ROOT, pos, &mut bound_sq).cloned())
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
        self.k_nearest(NodeIdx::ROOT, pos, k, &mut bound_sq, results);
        Ok(())
    }

    fn in_range_into(
        &self,
        pos: Point,
        range: f64,
        results: &mut Vec<H>,
    ) -> Result<(), IndexError> {
        check_distance(self.config.validate, range, "range must be non-negative")?;
        self.within_range(NodeIdx::ROOT, pos, squared_bound(range), results);
        Ok(())
    }

    fn in_rect_into(&self, rect: Rect, results: &mut Vec<H>) {
        self.within_rect(NodeIdx::ROOT, &rect.abs(), results);
    }

    fn regions(&self, out: &mut Vec<Rect>) {
        self.collect_regions(NodeIdx::ROOT, out);
    }
}

impl<H: Handle> Debug for QuadTree<H> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("QuadTree")
            .field("region", &self.region())
            .field("config", &self.config)
            .field("nodes", &self.node_count())
            .field("objects", &self.len())
            .finish_non_exhaustive()
    }
}
