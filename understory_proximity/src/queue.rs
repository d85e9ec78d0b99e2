// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Max-priority queue used as the working set of k-nearest searches.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// A max-priority queue keyed by `f64` priorities (squared distances).
///
/// The top of the queue is the entry with the largest priority, i.e. the farthest
/// candidate, so a k-nearest search can evict it when a closer one turns up.
/// Among equal priorities the most recently pushed entry ranks highest.
#[derive(Clone, Debug)]
pub struct MaxPriorityQueue<T> {
    heap: BinaryHeap<Entry<T>>,
    seq: u64,
}

#[derive(Clone, Debug)]
struct Entry<T> {
    priority: f64,
    seq: u64,
    item: T,
}

impl<T> PartialEq for Entry<T> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl<T> Eq for Entry<T> {}

impl<T> PartialOrd for Entry<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Entry<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority
            .total_cmp(&other.priority)
            .then(self.seq.cmp(&other.seq))
    }
}

impl<T> Default for MaxPriorityQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> MaxPriorityQueue<T> {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self {
            heap: BinaryHeap::new(),
            seq: 0,
        }
    }

    /// Create an empty queue with room for `n` entries.
    pub fn with_capacity(n: usize) -> Self {
        Self {
            heap: BinaryHeap::with_capacity(n),
            seq: 0,
        }
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    /// True if the queue has no entries.
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Remove all entries.
    pub fn clear(&mut self) {
        self.heap.clear();
        self.seq = 0;
    }

    /// Insert `item` with `priority`.
    pub fn push(&mut self, item: T, priority: f64) {
        self.seq += 1;
        self.heap.push(Entry {
            priority,
            seq: self.seq,
            item,
        });
    }

    /// The entry with the largest priority.
    pub fn peek(&self) -> Option<(&T, f64)> {
        self.heap.peek().map(|e| (&e.item, e.priority))
    }

    /// The largest priority currently held.
    pub fn peek_priority(&self) -> Option<f64> {
        self.heap.peek().map(|e| e.priority)
    }

    /// Remove and return the entry with the largest priority.
    pub fn pop(&mut self) -> Option<(T, f64)> {
        self.heap.pop().map(|e| (e.item, e.priority))
    }

    /// Pop the largest entries until at most `k` remain.
    pub fn retain_smallest(&mut self, k: usize) {
        while self.heap.len() > k {
            self.heap.pop();
        }
    }

    /// Offer a candidate while keeping at most `k` entries with the smallest priorities.
    ///
    /// Entries beyond `k` left over from earlier use are trimmed first. Below `k` entries
    /// the candidate is always kept; at `k` it replaces the current maximum only if
    /// strictly smaller. Returns whether it was kept.
    pub fn push_bounded(&mut self, item: T, priority: f64, k: usize) -> bool {
        self.retain_smallest(k);
        if k == 0 {
            return false;
        }
        if self.len() < k {
            self.push(item, priority);
            return true;
        }
        match self.peek_priority() {
            Some(max) if priority < max => {
                self.pop();
                self.push(item, priority);
                true
            }
            _ => false,
        }
    }

    /// Iterate entries in arbitrary order.
    pub fn iter(&self) -> impl Iterator<Item = (&T, f64)> + '_ {
        self.heap.iter().map(|e| (&e.item, e.priority))
    }

    /// Snapshot of the items in arbitrary order.
    pub fn to_vec(&self) -> Vec<T>
    where
        T: Clone,
    {
        self.heap.iter().map(|e| e.item.clone()).collect()
    }

    /// Consume the queue, returning items by ascending priority.
    pub fn into_sorted_vec(self) -> Vec<T> {
        self.heap
            .into_sorted_vec()
            .into_iter()
            .map(|e| e.item)
            .collect()
    }
}
