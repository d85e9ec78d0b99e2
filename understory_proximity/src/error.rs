// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Error type shared by both engines.

use kurbo::{Point, Rect};

/// Errors reported by the spatial indexes.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum IndexError {
    /// An argument was rejected (negative or NaN distance, non-finite position, bad config).
    #[error("invalid argument: {what}")]
    InvalidArgument {
        /// What was wrong with the argument.
        what: &'static str,
    },
    /// A quadtree region must be square.
    #[error("quadtree region must be square, got {width}x{height}")]
    NonSquareRegion {
        /// Region width.
        width: f64,
        /// Region height.
        height: f64,
    },
    /// Objects were positioned outside the index region when `update` processed them.
    ///
    /// The offending objects have been evicted; the rest of the update was applied.
    #[error("{count} object(s) outside region {region:?}, first at {first:?}")]
    OutsideRegion {
        /// Number of evicted objects.
        count: usize,
        /// Position of the first evicted object.
        first: Point,
        /// The index region.
        region: Rect,
    },
}

/// Coarse classification of [`IndexError`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The caller passed something invalid.
    Argument,
    /// An object violated the index's structural invariants.
    StructuralInvariant,
}

impl IndexError {
    pub(crate) const fn invalid(what: &'static str) -> Self {
        Self::InvalidArgument { what }
    }

    /// Classify the error.
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidArgument { .. } | Self::NonSquareRegion { .. } => ErrorKind::Argument,
            Self::OutsideRegion { .. } => ErrorKind::StructuralInvariant,
        }
    }
}

/// Reject negative or NaN distances when validation is on.
#[inline]
pub(crate) fn check_distance(validate: bool, d: f64, what: &'static str) -> Result<(), IndexError> {
    if validate && (d.is_nan() || d < 0.0) {
        return Err(IndexError::invalid(what));
    }
    Ok(())
}
