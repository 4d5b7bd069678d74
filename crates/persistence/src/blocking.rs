//! Synchronous front for [`SqliteStore`].
//!
//! The engine facade is synchronous, so the SQLite store is driven from a
//! dedicated current-thread runtime owned by the adapter. Call it from plain
//! threads only; blocking on the runtime from inside another async runtime
//! panics.

use crate::sqlite::SqliteStore;
use crate::{CommitOutcome, StoreError, TickBatch, WorldStore};
use sim_core::WorldState;
use sqlx::sqlite::SqlitePoolOptions;
use tokio::runtime::{Builder, Runtime};

pub struct BlockingSqliteStore {
    // Dropped before the runtime it was opened on.
    store: SqliteStore,
    runtime: Runtime,
}

fn runtime() -> Result<Runtime, StoreError> {
    Ok(Builder::new_current_thread().enable_all().build()?)
}

impl BlockingSqliteStore {
    /// Open (creating if missing) the database at `url` and apply migrations.
    pub fn connect(url: &str) -> Result<Self, StoreError> {
        let runtime = runtime()?;
        let store = runtime.block_on(SqliteStore::connect(url))?;
        Ok(Self { store, runtime })
    }

    /// Private in-memory database on a single pinned connection.
    pub fn in_memory() -> Result<Self, StoreError> {
        let runtime = runtime()?;
        let store = runtime.block_on(async {
            let pool = SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect("sqlite::memory:")
                .await?;
            let store = SqliteStore::from_pool(pool);
            store.migrate().await?;
            Ok::<_, StoreError>(store)
        })?;
        Ok(Self { store, runtime })
    }

    pub fn init_world(&self, world: &WorldState) -> Result<(), StoreError> {
        self.runtime.block_on(self.store.init_world(world))
    }

    pub fn trade_count(&self) -> Result<u64, StoreError> {
        self.runtime.block_on(self.store.trade_count())
    }
}

impl WorldStore for BlockingSqliteStore {
    fn read_world_state(&self) -> Result<WorldState, StoreError> {
        self.runtime.block_on(self.store.read_world_state())
    }

    fn compare_and_swap(
        &self,
        expected_lock_version: u64,
        next: &WorldState,
    ) -> Result<CommitOutcome, StoreError> {
        self.runtime
            .block_on(self.store.compare_and_swap(expected_lock_version, next))
    }

    fn commit_tick_batch(
        &self,
        batch: &TickBatch,
        expected_lock_version: u64,
    ) -> Result<CommitOutcome, StoreError> {
        self.runtime
            .block_on(self.store.commit_tick_batch(batch, expected_lock_version))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sim_core::{CompanyId, ItemId, OrderId, RegionId, StockKey, Trade, TradeId};

    #[test]
    fn drives_the_sqlite_store_through_the_trait() {
        let store = BlockingSqliteStore::in_memory().unwrap();
        let mut world = WorldState::default();
        let r = world.add_region("R");
        let i = world.add_item("I");
        let c = world.add_company("Acme", 1_000, false);
        world.inventory.add(StockKey::new(c, r, i), 3).unwrap();
        store.init_world(&world).unwrap();
        assert_eq!(store.read_world_state().unwrap(), world);

        let mut next = world.clone();
        next.clock.current_tick = 1;
        next.clock.lock_version = 1;
        let batch = TickBatch {
            from_tick: 0,
            to_tick: 1,
            next: next.clone(),
            trades: vec![Trade {
                id: TradeId(100),
                tick: 1,
                region_id: RegionId(1),
                item_id: ItemId(2),
                price_cents: 10,
                quantity: 1,
                buyer_company_id: CompanyId(3),
                seller_company_id: CompanyId(3),
                buy_order_id: OrderId(4),
                sell_order_id: OrderId(5),
            }],
        };
        assert_eq!(
            store.commit_tick_batch(&batch, 0).unwrap(),
            CommitOutcome::Committed
        );
        assert_eq!(
            store.compare_and_swap(0, &world).unwrap(),
            CommitOutcome::Conflict { found: 1 }
        );
        assert_eq!(store.read_world_state().unwrap(), next);
        assert_eq!(store.trade_count().unwrap(), 1);
    }

    #[test]
    fn malformed_snapshot_is_rejected_on_read() {
        let store = BlockingSqliteStore::in_memory().unwrap();
        let mut world = WorldState::default();
        world.add_company("Acme", 1_000, false);
        store.init_world(&world).unwrap();

        let mut broken = world.clone();
        broken.companies[0].reserved_cash_cents = -5;
        broken.clock.lock_version = 1;
        assert_eq!(
            store.compare_and_swap(0, &broken).unwrap(),
            CommitOutcome::Committed
        );
        assert!(matches!(
            store.read_world_state(),
            Err(StoreError::InvalidSnapshot(_))
        ));
    }
}
