//! SQLite-backed snapshot store.
//!
//! The snapshot lives in a single `world_state` row as JSON next to its
//! clock columns. A commit is one transaction: a conditional `UPDATE ...
//! WHERE lock_version = ?` followed by appending the batch's trades. When the
//! update touches no row the transaction is rolled back and the conflict is
//! reported with the version that is actually stored.

use crate::{CommitOutcome, StoreError, TickBatch};
use sim_core::{validate_world, Trade, WorldState};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::{Row, Sqlite, Transaction};
use std::str::FromStr;
use tracing::{debug, info};

const DEFAULT_MAX_CONNECTIONS: u32 = 4;

fn to_i64(value: u64, column: &'static str) -> Result<i64, StoreError> {
    i64::try_from(value).map_err(|_| StoreError::OutOfRange(column))
}

#[derive(Clone, Debug)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (creating if missing) the database at `url` and apply migrations.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(DEFAULT_MAX_CONNECTIONS)
            .connect_with(options)
            .await?;
        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    /// Wrap an existing pool. Migrations are not applied.
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Store the first snapshot of a world.
    pub async fn init_world(&self, world: &WorldState) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        let existing = sqlx::query("SELECT 1 FROM world_state WHERE id = 1")
            .fetch_optional(&mut *tx)
            .await?;
        if existing.is_some() {
            return Err(StoreError::AlreadyInitialized);
        }
        sqlx::query(
            "INSERT INTO world_state (id, current_tick, lock_version, last_advanced_at, snapshot) \
             VALUES (1, ?, ?, ?, ?)",
        )
        .bind(to_i64(world.clock.current_tick, "current_tick")?)
        .bind(to_i64(world.clock.lock_version, "lock_version")?)
        .bind(world.clock.last_advanced_at.map(|t| t.to_rfc3339()))
        .bind(serde_json::to_string(world)?)
        .execute(&mut *tx)
        .await?;
        append_trades(&mut tx, &world.trades).await?;
        tx.commit().await?;
        info!(tick = world.clock.current_tick, "world initialized");
        Ok(())
    }

    pub async fn read_world_state(&self) -> Result<WorldState, StoreError> {
        let row = sqlx::query("SELECT snapshot FROM world_state WHERE id = 1")
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::Uninitialized)?;
        let json: String = row.try_get("snapshot")?;
        let world: WorldState = serde_json::from_str(&json)?;
        validate_world(&world)?;
        Ok(world)
    }

    pub async fn compare_and_swap(
        &self,
        expected_lock_version: u64,
        next: &WorldState,
    ) -> Result<CommitOutcome, StoreError> {
        self.commit(expected_lock_version, next, &[]).await
    }

    pub async fn commit_tick_batch(
        &self,
        batch: &TickBatch,
        expected_lock_version: u64,
    ) -> Result<CommitOutcome, StoreError> {
        let outcome = self
            .commit(expected_lock_version, &batch.next, &batch.trades)
            .await?;
        if outcome == CommitOutcome::Committed {
            debug!(
                from = batch.from_tick,
                to = batch.to_tick,
                trades = batch.trades.len(),
                "tick batch committed"
            );
        }
        Ok(outcome)
    }

    /// Number of trades in the append-only history.
    pub async fn trade_count(&self) -> Result<u64, StoreError> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM trades")
            .fetch_one(&self.pool)
            .await?;
        let n: i64 = row.try_get("n")?;
        u64::try_from(n).map_err(|_| StoreError::OutOfRange("trades"))
    }

    async fn commit(
        &self,
        expected_lock_version: u64,
        next: &WorldState,
        trades: &[Trade],
    ) -> Result<CommitOutcome, StoreError> {
        let snapshot = serde_json::to_string(next)?;
        let mut tx = self.pool.begin().await?;
        let updated = sqlx::query(
            "UPDATE world_state \
             SET current_tick = ?, lock_version = ?, last_advanced_at = ?, snapshot = ? \
             WHERE id = 1 AND lock_version = ?",
        )
        .bind(to_i64(next.clock.current_tick, "current_tick")?)
        .bind(to_i64(next.clock.lock_version, "lock_version")?)
        .bind(next.clock.last_advanced_at.map(|t| t.to_rfc3339()))
        .bind(snapshot)
        .bind(to_i64(expected_lock_version, "lock_version")?)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if updated == 0 {
            let row = sqlx::query("SELECT lock_version FROM world_state WHERE id = 1")
                .fetch_optional(&mut *tx)
                .await?
                .ok_or(StoreError::Uninitialized)?;
            let found: i64 = row.try_get("lock_version")?;
            tx.rollback().await?;
            let found = u64::try_from(found).map_err(|_| StoreError::OutOfRange("lock_version"))?;
            debug!(expected = expected_lock_version, found, "sqlite store conflict");
            return Ok(CommitOutcome::Conflict { found });
        }
        append_trades(&mut tx, trades).await?;
        tx.commit().await?;
        Ok(CommitOutcome::Committed)
    }
}

async fn append_trades(
    tx: &mut Transaction<'_, Sqlite>,
    trades: &[Trade],
) -> Result<(), StoreError> {
    for t in trades {
        sqlx::query(
            "INSERT INTO trades (id, tick, region_id, item_id, price_cents, quantity, \
             buyer_company_id, seller_company_id, buy_order_id, sell_order_id) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(to_i64(t.id.0, "trades.id")?)
        .bind(to_i64(t.tick, "trades.tick")?)
        .bind(to_i64(t.region_id.0, "trades.region_id")?)
        .bind(to_i64(t.item_id.0, "trades.item_id")?)
        .bind(t.price_cents)
        .bind(to_i64(t.quantity, "trades.quantity")?)
        .bind(to_i64(t.buyer_company_id.0, "trades.buyer_company_id")?)
        .bind(to_i64(t.seller_company_id.0, "trades.seller_company_id")?)
        .bind(to_i64(t.buy_order_id.0, "trades.buy_order_id")?)
        .bind(to_i64(t.sell_order_id.0, "trades.sell_order_id")?)
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sim_core::{CompanyId, ItemId, OrderId, RegionId, TradeId};

    async fn store() -> SqliteStore {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        let store = SqliteStore::from_pool(pool);
        store.migrate().await.unwrap();
        store
    }

    fn trade(id: u64, tick: u64) -> Trade {
        Trade {
            id: TradeId(id),
            tick,
            region_id: RegionId(1),
            item_id: ItemId(2),
            price_cents: 95,
            quantity: 5,
            buyer_company_id: CompanyId(3),
            seller_company_id: CompanyId(4),
            buy_order_id: OrderId(5),
            sell_order_id: OrderId(6),
        }
    }

    #[tokio::test]
    async fn round_trips_snapshot() {
        let store = store().await;
        let mut world = WorldState::default();
        world.add_company("Acme", 1_000, false);
        store.init_world(&world).await.unwrap();
        assert_eq!(store.read_world_state().await.unwrap(), world);
        assert!(matches!(
            store.init_world(&world).await,
            Err(StoreError::AlreadyInitialized)
        ));
    }

    #[tokio::test]
    async fn stale_batch_is_rejected_without_side_effects() {
        let store = store().await;
        let world = WorldState::default();
        store.init_world(&world).await.unwrap();

        let mut next = world.clone();
        next.clock.current_tick = 2;
        next.clock.lock_version = 2;
        next.clock.last_advanced_at = Some(chrono::Utc::now());
        let batch = TickBatch {
            from_tick: 0,
            to_tick: 2,
            next: next.clone(),
            trades: vec![trade(10, 1)],
        };
        assert_eq!(
            store.commit_tick_batch(&batch, 0).await.unwrap(),
            CommitOutcome::Committed
        );
        assert_eq!(store.trade_count().await.unwrap(), 1);

        let stale = TickBatch {
            from_tick: 0,
            to_tick: 1,
            next: world.clone(),
            trades: vec![trade(11, 1)],
        };
        assert_eq!(
            store.commit_tick_batch(&stale, 0).await.unwrap(),
            CommitOutcome::Conflict { found: 2 }
        );
        assert_eq!(store.trade_count().await.unwrap(), 1);
        assert_eq!(store.read_world_state().await.unwrap(), next);
    }

    #[tokio::test]
    async fn reading_empty_database_fails() {
        let store = store().await;
        assert!(matches!(
            store.read_world_state().await,
            Err(StoreError::Uninitialized)
        ));
    }
}
