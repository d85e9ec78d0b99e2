// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Deferred insertions and removals.
//!
//! `add` and `remove` never touch the live structure: they push onto one of two
//! multi-producer queues that `update` drains in a single step.

use crossbeam::channel::{Receiver, Sender, unbounded};

use crate::error::IndexError;
use crate::types::{Handle, is_finite_point};

/// Producer side of an index's pending queues.
///
/// Obtained from [`SpatialIndex::mutator`](crate::SpatialIndex::mutator). It can be
/// cloned and sent to other threads (when `H: Send`) and stays usable while the
/// owning index runs `update`. Mutations take effect at the next `update`.
#[derive(Debug)]
pub struct Mutator<H> {
    insertions: Sender<H>,
    removals: Sender<H>,
    validate: bool,
}

impl<H> Clone for Mutator<H> {
    fn clone(&self) -> Self {
        Self {
            insertions: self.insertions.clone(),
            removals: self.removals.clone(),
            validate: self.validate,
        }
    }
}

impl<H: Handle> Mutator<H> {
    /// Queue `obj` for insertion.
    pub fn add(&self, obj: H) -> Result<(), IndexError> {
        check_handle(self.validate, &obj, "cannot add an object without a finite position")?;
        // Both ends live in the same `Pending`, so the send cannot fail while we hold a sender.
        let _ = self.insertions.send(obj);
        Ok(())
    }

    /// Queue `obj` for removal. Removing an object that is not indexed is a no-op.
    pub fn remove(&self, obj: H) -> Result<(), IndexError> {
        check_handle(self.validate, &obj, "cannot remove an object without a finite position")?;
        let _ = self.removals.send(obj);
        Ok(())
    }
}

fn check_handle<H: Handle>(validate: bool, obj: &H, what: &'static str) -> Result<(), IndexError> {
    if validate && !is_finite_point(obj.position()) {
        return Err(IndexError::invalid(what));
    }
    Ok(())
}

/// Everything queued since the previous drain.
#[derive(Debug)]
pub(crate) struct Batch<H> {
    pub(crate) added: Vec<H>,
    pub(crate) removed: Vec<H>,
}

/// The two pending queues owned by an index.
#[derive(Debug)]
pub(crate) struct Pending<H> {
    mutator: Mutator<H>,
    insertions: Receiver<H>,
    removals: Receiver<H>,
}

impl<H: Handle> Pending<H> {
    pub(crate) fn new(validate: bool) -> Self {
        let (insert_tx, insert_rx) = unbounded();
        let (remove_tx, remove_rx) = unbounded();
        Self {
            mutator: Mutator {
                insertions: insert_tx,
                removals: remove_tx,
                validate,
            },
            insertions: insert_rx,
            removals: remove_rx,
        }
    }

    pub(crate) fn mutator(&self) -> &Mutator<H> {
        &self.mutator
    }

    /// Take everything queued so far from both queues.
    pub(crate) fn drain(&self) -> Batch<H> {
        Batch {
            added: self.insertions.try_iter().collect(),
            removed: self.removals.try_iter().collect(),
        }
    }

    pub(crate) fn discard(&self) {
        let _ = self.drain();
    }
}
