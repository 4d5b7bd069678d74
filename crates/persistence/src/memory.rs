//! In-process store guarded by a mutex.

use crate::{CommitOutcome, StoreError, TickBatch, WorldStore};
use sim_core::{Trade, WorldState};
use std::sync::Mutex;
use tracing::debug;

#[derive(Debug, Default)]
struct Inner {
    world: Option<WorldState>,
    history: Vec<Trade>,
}

/// Snapshot store living in memory. Clones on read, swaps on commit.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new(world: WorldState) -> Self {
        Self {
            inner: Mutex::new(Inner {
                world: Some(world),
                history: Vec::new(),
            }),
        }
    }

    /// Trades appended by committed batches, in commit order.
    pub fn trade_history(&self) -> Result<Vec<Trade>, StoreError> {
        let inner = self.inner.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(inner.history.clone())
    }
}

impl WorldStore for MemoryStore {
    fn read_world_state(&self) -> Result<WorldState, StoreError> {
        let inner = self.inner.lock().map_err(|_| StoreError::Poisoned)?;
        inner.world.clone().ok_or(StoreError::Uninitialized)
    }

    fn compare_and_swap(
        &self,
        expected_lock_version: u64,
        next: &WorldState,
    ) -> Result<CommitOutcome, StoreError> {
        let mut inner = self.inner.lock().map_err(|_| StoreError::Poisoned)?;
        let current = inner.world.as_ref().ok_or(StoreError::Uninitialized)?;
        let found = current.clock.lock_version;
        if found != expected_lock_version {
            debug!(expected = expected_lock_version, found, "memory store conflict");
            return Ok(CommitOutcome::Conflict { found });
        }
        inner.world = Some(next.clone());
        Ok(CommitOutcome::Committed)
    }

    fn commit_tick_batch(
        &self,
        batch: &TickBatch,
        expected_lock_version: u64,
    ) -> Result<CommitOutcome, StoreError> {
        let mut inner = self.inner.lock().map_err(|_| StoreError::Poisoned)?;
        let current = inner.world.as_ref().ok_or(StoreError::Uninitialized)?;
        let found = current.clock.lock_version;
        if found != expected_lock_version {
            return Ok(CommitOutcome::Conflict { found });
        }
        inner.world = Some(batch.next.clone());
        inner.history.extend(batch.trades.iter().cloned());
        Ok(CommitOutcome::Committed)
    }
}
