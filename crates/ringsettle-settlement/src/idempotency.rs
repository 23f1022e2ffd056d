//! Commit idempotency guard: a batch is committed at most once.
//!
//! Committing the same `BatchId` a second time returns
//! [`RingsettleError::BatchAlreadySettled`]. The set of remembered IDs is
//! bounded; the oldest is evicted first.

use std::collections::{HashSet, VecDeque};

use ringsettle_types::{BatchId, Result, RingsettleError};

/// Bounded record of committed batch IDs.
pub struct IdempotencyGuard {
    committed: HashSet<BatchId>,
    /// Insertion order, front = oldest.
    order: VecDeque<BatchId>,
    max_size: usize,
}

impl IdempotencyGuard {
    /// # Panics
    /// Panics if `max_size` is zero.
    pub fn new(max_size: usize) -> Self {
        assert!(max_size > 0, "IdempotencyGuard max_size must be > 0");
        Self {
            committed: HashSet::new(),
            order: VecDeque::new(),
            max_size,
        }
    }

    /// Fails without recording anything if `batch_id` was already committed.
    pub fn check(&self, batch_id: BatchId) -> Result<()> {
        if self.committed.contains(&batch_id) {
            return Err(RingsettleError::BatchAlreadySettled(batch_id));
        }
        Ok(())
    }

    /// Record `batch_id` as committed.
    pub fn mark_settled(&mut self, batch_id: BatchId) -> Result<()> {
        self.check(batch_id)?;

        if self.committed.len() >= self.max_size {
            if let Some(oldest) = self.order.pop_front() {
                self.committed.remove(&oldest);
            }
        }

        self.committed.insert(batch_id);
        self.order.push_back(batch_id);
        Ok(())
    }

    pub fn is_settled(&self, batch_id: BatchId) -> bool {
        self.committed.contains(&batch_id)
    }

    pub fn len(&self) -> usize {
        self.committed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.committed.is_empty()
    }
}
