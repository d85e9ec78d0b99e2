// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The two index engines.
//!
//! - `quadtree`: adaptive point-region quadtree over a square region. Subdivides where
//!   objects cluster, so it suits uneven distributions and sparse updates.
//! - `grid`: flat uniform grid over any rectangle. Every update re-checks every object,
//!   which is cheap when most objects move each frame anyway.
//!
//! Both implement [`SpatialIndex`](crate::SpatialIndex) and answer the same queries
//! with the same results.

pub mod grid;
pub mod quadtree;

pub use grid::BucketGrid;
pub use quadtree::QuadTree;
