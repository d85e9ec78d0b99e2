// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Per-instance engine configuration.
//!
//! Both engines copy their configuration at construction; it cannot change afterwards.

use crate::error::IndexError;

/// Subdivision thresholds and validation mode for [`QuadTree`](crate::QuadTree).
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct QuadTreeConfig {
    /// A node subdivides once it holds more than this many objects.
    pub max_objects: usize,
    /// Nodes this wide or narrower never subdivide, regardless of `max_objects`.
    pub min_size: f64,
    /// Check arguments of `add`, `remove`, and queries.
    pub validate: bool,
}

impl Default for QuadTreeConfig {
    fn default() -> Self {
        Self {
            max_objects: 1,
            min_size: 5.0,
            validate: true,
        }
    }
}

impl QuadTreeConfig {
    pub(crate) fn check(&self) -> Result<(), IndexError> {
        if !(self.min_size.is_finite() && self.min_size > 0.0) {
            return Err(IndexError::invalid("min_size must be finite and positive"));
        }
        Ok(())
    }
}

/// Bucket counts and validation mode for [`BucketGrid`](crate::BucketGrid).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct GridConfig {
    /// Buckets along x.
    pub columns: usize,
    /// Buckets along y.
    pub rows: usize,
    /// Check arguments of `add`, `remove`, and queries.
    pub validate: bool,
}

impl GridConfig {
    /// A `columns` x `rows` grid with validation on.
    pub const fn new(columns: usize, rows: usize) -> Self {
        Self {
            columns,
            rows,
            validate: true,
        }
    }

    pub(crate) fn check(&self) -> Result<(), IndexError> {
        if self.columns == 0 || self.rows == 0 {
            return Err(IndexError::invalid("grid needs at least one column and row"));
        }
        if self.columns.checked_mul(self.rows).is_none() {
            return Err(IndexError::invalid("grid bucket count overflows"));
        }
        Ok(())
    }
}
