//! Operational views over a committed snapshot.

use crate::audit::{audit, InvariantIssue};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sim_core::{HealthConfig, Tick, WorldState};

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorldTickState {
    pub current_tick: Tick,
    pub lock_version: u64,
    pub last_advanced_at: Option<DateTime<Utc>>,
}

impl From<&WorldState> for WorldTickState {
    fn from(world: &WorldState) -> Self {
        Self {
            current_tick: world.clock.current_tick,
            lock_version: world.clock.lock_version,
            last_advanced_at: world.clock.last_advanced_at,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HealthOptions {
    /// Cap on reported invariant issues; the configured default when `None`.
    pub invariant_issue_limit: Option<usize>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvariantSummary {
    pub has_violations: bool,
    pub truncated: bool,
    pub issues: Vec<InvariantIssue>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationHealth {
    pub current_tick: Tick,
    pub lock_version: u64,
    pub last_advanced_at: Option<DateTime<Utc>>,
    pub orders_open_count: usize,
    pub orders_total_count: usize,
    #[serde(rename = "tradesLast100Count")]
    pub trades_last_100_count: usize,
    pub companies_count: usize,
    pub bots_count: usize,
    pub sum_cash_cents: Option<i64>,
    pub sum_reserved_cash_cents: Option<i64>,
    pub invariants: InvariantSummary,
}

/// Trades whose tick lies within the last `window` ticks, current included.
pub fn recent_trade_count(world: &WorldState, window: u64) -> usize {
    let now = world.clock.current_tick;
    let from = now.saturating_sub(window.saturating_sub(1));
    world
        .trades
        .iter()
        .filter(|t| t.tick >= from && t.tick <= now)
        .count()
}

pub fn simulation_health(
    world: &WorldState,
    opts: &HealthOptions,
    cfg: &HealthConfig,
) -> SimulationHealth {
    let limit = opts
        .invariant_issue_limit
        .unwrap_or(cfg.default_issue_limit);
    let report = audit(world, limit);
    SimulationHealth {
        current_tick: world.clock.current_tick,
        lock_version: world.clock.lock_version,
        last_advanced_at: world.clock.last_advanced_at,
        orders_open_count: world.open_order_count(),
        orders_total_count: world.orders.len(),
        trades_last_100_count: if cfg.trades_window_ticks == 0 {
            0
        } else {
            recent_trade_count(world, cfg.trades_window_ticks)
        },
        companies_count: world.companies.len(),
        bots_count: world.bot_count(),
        sum_cash_cents: report.sum_cash_cents,
        sum_reserved_cash_cents: report.sum_reserved_cash_cents,
        invariants: InvariantSummary {
            has_violations: report.has_violations(),
            truncated: report.truncated,
            issues: report.issues,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sim_core::{CompanyId, ItemId, OrderId, RegionId, Trade, TradeId};

    fn trade_at(tick: Tick) -> Trade {
        Trade {
            id: TradeId(tick + 100),
            tick,
            region_id: RegionId(1),
            item_id: ItemId(2),
            price_cents: 10,
            quantity: 1,
            buyer_company_id: CompanyId(3),
            seller_company_id: CompanyId(4),
            buy_order_id: OrderId(5),
            sell_order_id: OrderId(6),
        }
    }

    #[test]
    fn window_counts_last_hundred_ticks() {
        let mut w = WorldState::default();
        w.clock.current_tick = 150;
        w.trades = vec![trade_at(50), trade_at(51), trade_at(120), trade_at(150)];
        assert_eq!(recent_trade_count(&w, 100), 3);
        assert_eq!(recent_trade_count(&w, 1), 1);
    }

    #[test]
    fn health_reports_counts_and_invariants() {
        let mut w = WorldState::default();
        w.add_company("Bot", 10, true);
        let c = w.add_company("Player", 20, false);
        w.company_mut(c).unwrap().reserved_cash_cents = -1;
        let h = simulation_health(&w, &HealthOptions::default(), &HealthConfig::default());
        assert_eq!(h.companies_count, 2);
        assert_eq!(h.bots_count, 1);
        assert_eq!(h.sum_cash_cents, Some(30));
        assert_eq!(h.sum_reserved_cash_cents, Some(-1));
        assert!(h.invariants.has_violations);

        let json = serde_json::to_value(&h).unwrap();
        assert!(json.get("tradesLast100Count").is_some());
        assert!(json["invariants"].get("hasViolations").is_some());
    }
}
