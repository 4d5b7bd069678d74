//! Tick advancement.
//!
//! [`step`] applies one tick to a working copy in a fixed phase order:
//! bot liquidity, workforce multipliers, market clearing, production,
//! logistics and contract settlement. [`plan_advance`] chains steps for a
//! whole request and packages the result as a single [`TickBatch`] that the
//! caller commits with one compare-and-swap. Planning is pure: nothing is
//! written until the batch is committed.

use crate::logistics::advance_shipments;
use crate::production::run_production;
use chrono::{DateTime, Utc};
use persistence::TickBatch;
use serde::Serialize;
use sim_core::{validate_range, EngineConfig, SimError, Tick, Trade, WorldState};
use sim_econ::{clear_markets, company_multipliers, credit_exogenous, settle_contracts, CashFlows};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, error, info_span};

/// What happened during one tick.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TickReport {
    pub tick: Tick,
    pub trades: usize,
    pub jobs_advanced: usize,
    pub jobs_blocked: usize,
    pub jobs_completed: usize,
    pub shipments_delivered: usize,
    pub contracts_settled: usize,
    pub flows: CashFlows,
    /// Observed minus expected change of the ledger total; zero when conserved.
    pub conservation_drift_cents: i64,
}

/// Apply one tick to `world`, returning its report and the trades it emitted.
///
/// On error `world` is left partially updated; callers work on a copy and
/// discard it.
pub fn step(world: &mut WorldState, cfg: &EngineConfig) -> Result<(TickReport, Vec<Trade>), SimError> {
    let tick = world
        .clock
        .current_tick
        .checked_add(1)
        .ok_or(SimError::Overflow("tick counter"))?;
    let span = info_span!("tick", tick);
    let _guard = span.enter();

    let before = world
        .ledger_total_cents()
        .ok_or(SimError::Overflow("ledger total"))?;
    let mut flows = CashFlows::default();

    if cfg.bots.liquidity_cents_per_tick > 0 {
        let bots: Vec<_> = world
            .companies
            .iter()
            .filter(|c| c.is_bot)
            .map(|c| c.id)
            .collect();
        for bot in bots {
            credit_exogenous(world, bot, cfg.bots.liquidity_cents_per_tick, &mut flows)?;
        }
    }

    let multipliers = company_multipliers(world, &cfg.workforce);
    let trades = clear_markets(world, tick)?;
    let pruned = world.retain_recent_trades(tick, cfg.health.trades_window_ticks);
    if pruned > 0 {
        debug!(pruned, "trades aged out of snapshot");
    }
    let production = run_production(world, tick, &multipliers, &cfg.production)?;
    let delivered = advance_shipments(world, tick, &multipliers, &cfg.logistics, &mut flows)?;
    let settled = settle_contracts(world, tick, &mut flows)?;

    world.clock.current_tick = tick;
    world.clock.lock_version = world
        .clock
        .lock_version
        .checked_add(1)
        .ok_or(SimError::Overflow("lock version"))?;

    let after = world
        .ledger_total_cents()
        .ok_or(SimError::Overflow("ledger total"))?;
    let expected = flows
        .net_cents()
        .and_then(|net| before.checked_add(net))
        .ok_or(SimError::Overflow("expected ledger total"))?;
    let drift = after
        .checked_sub(expected)
        .ok_or(SimError::Overflow("conservation drift"))?;
    if drift != 0 {
        error!(before, after, expected, drift, "ledger total drifted");
    }

    let report = TickReport {
        tick,
        trades: trades.len(),
        jobs_advanced: production.advanced.len(),
        jobs_blocked: production.blocked.len(),
        jobs_completed: production.completed.len(),
        shipments_delivered: delivered.len(),
        contracts_settled: settled.len(),
        flows,
        conservation_drift_cents: drift,
    };
    debug!(?report, "tick applied");
    Ok((report, trades))
}

/// A computed but not yet committed advancement.
#[derive(Clone, Debug, PartialEq)]
pub struct AdvancePlan {
    /// Lock version of the snapshot the plan was computed from.
    pub expected_lock_version: u64,
    pub batch: TickBatch,
    pub reports: Vec<TickReport>,
}

impl AdvancePlan {
    pub fn ticks_applied(&self) -> u64 {
        self.batch.to_tick - self.batch.from_tick
    }
}

/// Validate a requested tick count against the configured maximum.
pub fn validate_ticks(requested: i64, cfg: &EngineConfig) -> Result<u64, SimError> {
    let n = validate_range(
        "ticks",
        requested,
        1,
        i64::from(cfg.max_ticks_per_request),
    )?;
    u64::try_from(n).map_err(|_| SimError::invalid("ticks must be positive"))
}

/// Compute `requested` ticks on top of `snapshot`.
pub fn plan_advance(
    snapshot: &WorldState,
    requested: i64,
    cfg: &EngineConfig,
    now: DateTime<Utc>,
) -> Result<AdvancePlan, SimError> {
    plan_advance_until(snapshot, requested, cfg, now, &AtomicBool::new(false))
}

/// Like [`plan_advance`] but checks `stop` before every tick. Ticks already
/// computed when the flag is raised are kept; later ticks are not attempted.
pub fn plan_advance_until(
    snapshot: &WorldState,
    requested: i64,
    cfg: &EngineConfig,
    now: DateTime<Utc>,
    stop: &AtomicBool,
) -> Result<AdvancePlan, SimError> {
    let ticks = validate_ticks(requested, cfg)?;
    let mut working = snapshot.clone();
    let mut reports = Vec::new();
    let mut trades = Vec::new();
    for _ in 0..ticks {
        if stop.load(Ordering::Relaxed) {
            debug!(applied = reports.len(), "advancement interrupted");
            break;
        }
        let (report, mut emitted) = step(&mut working, cfg)?;
        reports.push(report);
        trades.append(&mut emitted);
    }
    if !reports.is_empty() {
        working.clock.last_advanced_at = Some(now);
    }
    Ok(AdvancePlan {
        expected_lock_version: snapshot.clock.lock_version,
        batch: TickBatch {
            from_tick: snapshot.clock.current_tick,
            to_tick: working.clock.current_tick,
            next: working,
            trades,
        },
        reports,
    })
}
