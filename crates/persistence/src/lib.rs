#![deny(warnings)]

//! Persistence boundary for the world snapshot.
//!
//! Storage is a compare-and-swap over whole snapshots keyed by the world's
//! `lock_version`. A writer reads the snapshot, computes the next state off
//! line and commits it only if nobody else committed in between; otherwise
//! it observes [`CommitOutcome::Conflict`] and must start over from a fresh
//! read. Two implementations are provided: [`MemoryStore`] for tests and
//! embedding, and the SQLite-backed [`SqliteStore`] with its synchronous
//! [`BlockingSqliteStore`] front.

pub mod blocking;
pub mod memory;
pub mod sqlite;

pub use blocking::BlockingSqliteStore;
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use sim_core::{SimError, Tick, Trade, ValidationError, WorldState};
use std::sync::Arc;
use thiserror::Error;

/// Returns the default SQLite URL used for local worlds.
pub fn default_sqlite_url() -> &'static str {
    "sqlite://./saves/world.db"
}

/// Errors raised by store implementations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
    #[error("snapshot serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("stored snapshot is malformed: {0}")]
    InvalidSnapshot(#[from] ValidationError),
    #[error("runtime error: {0}")]
    Runtime(#[from] std::io::Error),
    #[error("world has not been initialized")]
    Uninitialized,
    #[error("world is already initialized")]
    AlreadyInitialized,
    #[error("store lock poisoned")]
    Poisoned,
    #[error("value out of range for column {0}")]
    OutOfRange(&'static str),
}

impl From<StoreError> for SimError {
    fn from(e: StoreError) -> Self {
        SimError::Storage(e.to_string())
    }
}

/// Result of a conditional commit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommitOutcome {
    Committed,
    /// Another writer got there first; `found` is the version now stored.
    Conflict { found: u64 },
}

impl CommitOutcome {
    /// Map a conflict onto [`SimError::ConcurrentModification`].
    pub fn into_result(self, expected: u64) -> Result<(), SimError> {
        match self {
            CommitOutcome::Committed => Ok(()),
            CommitOutcome::Conflict { found } => {
                Err(SimError::ConcurrentModification { expected, found })
            }
        }
    }
}

/// Everything one advancement request writes: the final snapshot plus the
/// trades emitted along the way, for append-only history.
#[derive(Clone, Debug, PartialEq)]
pub struct TickBatch {
    pub from_tick: Tick,
    pub to_tick: Tick,
    pub next: WorldState,
    pub trades: Vec<Trade>,
}

/// Synchronous snapshot store.
pub trait WorldStore {
    fn read_world_state(&self) -> Result<WorldState, StoreError>;

    /// Replace the snapshot with `next` iff the stored lock version still
    /// equals `expected_lock_version`.
    fn compare_and_swap(
        &self,
        expected_lock_version: u64,
        next: &WorldState,
    ) -> Result<CommitOutcome, StoreError>;

    fn commit_tick_batch(
        &self,
        batch: &TickBatch,
        expected_lock_version: u64,
    ) -> Result<CommitOutcome, StoreError> {
        self.compare_and_swap(expected_lock_version, &batch.next)
    }
}

impl<T: WorldStore + ?Sized> WorldStore for Arc<T> {
    fn read_world_state(&self) -> Result<WorldState, StoreError> {
        (**self).read_world_state()
    }

    fn compare_and_swap(
        &self,
        expected_lock_version: u64,
        next: &WorldState,
    ) -> Result<CommitOutcome, StoreError> {
        (**self).compare_and_swap(expected_lock_version, next)
    }

    fn commit_tick_batch(
        &self,
        batch: &TickBatch,
        expected_lock_version: u64,
    ) -> Result<CommitOutcome, StoreError> {
        (**self).commit_tick_batch(batch, expected_lock_version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_is_sqlite() {
        assert!(default_sqlite_url().starts_with("sqlite://"));
    }

    #[test]
    fn conflict_maps_to_concurrent_modification() {
        assert_eq!(CommitOutcome::Committed.into_result(3), Ok(()));
        let err = CommitOutcome::Conflict { found: 5 }
            .into_result(3)
            .unwrap_err();
        assert_eq!(err, SimError::ConcurrentModification { expected: 3, found: 5 });
        assert!(err.is_retryable());
    }

    #[test]
    fn store_errors_surface_as_storage() {
        let e: SimError = StoreError::Uninitialized.into();
        assert!(matches!(e, SimError::Storage(_)));
    }
}
