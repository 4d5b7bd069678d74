//! Store-backed facade: the entry points exposed to API and CLI callers.
//!
//! Every write is read-modify-compare-and-swap against the store. Tick
//! advancement commits its whole batch at once; commands commit one mutation
//! and bump the lock version by one, so a concurrent advancement computed
//! from the older snapshot conflicts instead of silently overwriting it.

use crate::audit::audit;
use crate::health::{simulation_health, HealthOptions, SimulationHealth, WorldTickState};
use crate::logistics::{cancel_shipment, create_shipment, ShipmentRequest};
use crate::production::{cancel_job, preflight_start_job, start_job, JobPlan, JobRequest};
use crate::tick::{plan_advance_until, AdvancePlan};
use chrono::Utc;
use persistence::WorldStore;
use serde::Serialize;
use sim_core::{
    validate_config, ContractId, EngineConfig, JobId, OrderId, ShipmentId, SimError, Tick,
    WorkforceAllocation, WorldState,
};
use sim_econ::{
    cancel_contract, cancel_order, create_contract, preflight_place_order, place_order,
    set_workforce_allocation, ContractRequest, OrderPlan, OrderRequest,
};
use std::sync::atomic::AtomicBool;
use tracing::{info, warn};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdvanceResult {
    pub from_tick: Tick,
    pub to_tick: Tick,
}

pub struct Simulation<S> {
    store: S,
    config: EngineConfig,
}

impl<S: WorldStore> Simulation<S> {
    pub fn new(store: S, config: EngineConfig) -> Result<Self, SimError> {
        validate_config(&config)?;
        Ok(Self { store, config })
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn snapshot(&self) -> Result<WorldState, SimError> {
        Ok(self.store.read_world_state()?)
    }

    /// Advance the world by `ticks` and commit the batch atomically.
    pub fn advance_simulation_ticks(&self, ticks: i64) -> Result<AdvanceResult, SimError> {
        self.advance_until(ticks, &AtomicBool::new(false))
    }

    /// Advance, stopping early between ticks once `stop` is raised.
    pub fn advance_until(&self, ticks: i64, stop: &AtomicBool) -> Result<AdvanceResult, SimError> {
        let snapshot = self.snapshot()?;
        let plan = plan_advance_until(&snapshot, ticks, &self.config, Utc::now(), stop)?;
        self.commit_plan(plan)
    }

    /// Commit a plan computed elsewhere. Empty plans commit nothing.
    ///
    /// The committed snapshot is audited inline once the batch is stored.
    /// Findings are logged and never turn a committed advance into an error.
    pub fn commit_plan(&self, plan: AdvancePlan) -> Result<AdvanceResult, SimError> {
        let result = AdvanceResult {
            from_tick: plan.batch.from_tick,
            to_tick: plan.batch.to_tick,
        };
        if plan.ticks_applied() == 0 {
            return Ok(result);
        }
        self.store
            .commit_tick_batch(&plan.batch, plan.expected_lock_version)?
            .into_result(plan.expected_lock_version)
            .map_err(|e| {
                warn!(error = %e, "tick batch rejected");
                e
            })?;
        info!(
            from = result.from_tick,
            to = result.to_tick,
            trades = plan.batch.trades.len(),
            "ticks committed"
        );
        let report = audit(&plan.batch.next, self.config.health.default_issue_limit);
        if report.has_violations() {
            warn!(
                issues = report.issues.len(),
                truncated = report.truncated,
                "invariant audit found violations"
            );
        }
        Ok(result)
    }

    pub fn get_world_tick_state(&self) -> Result<WorldTickState, SimError> {
        Ok(WorldTickState::from(&self.snapshot()?))
    }

    pub fn get_simulation_health(&self, opts: &HealthOptions) -> Result<SimulationHealth, SimError> {
        Ok(simulation_health(&self.snapshot()?, opts, &self.config.health))
    }

    pub fn preflight_place_order(&self, req: &OrderRequest) -> Result<OrderPlan, SimError> {
        preflight_place_order(&self.snapshot()?, req)
    }

    pub fn preflight_start_job(&self, req: &JobRequest) -> Result<JobPlan, SimError> {
        preflight_start_job(&self.snapshot()?, req)
    }

    /// Apply one mutation to a fresh snapshot and commit it.
    fn command<T>(
        &self,
        op: impl FnOnce(&mut WorldState) -> Result<T, SimError>,
    ) -> Result<T, SimError> {
        let snapshot = self.snapshot()?;
        let expected = snapshot.clock.lock_version;
        let mut next = snapshot;
        let out = op(&mut next)?;
        next.clock.lock_version = expected
            .checked_add(1)
            .ok_or(SimError::Overflow("lock version"))?;
        self.store
            .compare_and_swap(expected, &next)?
            .into_result(expected)?;
        Ok(out)
    }

    pub fn place_order(&self, req: &OrderRequest) -> Result<OrderId, SimError> {
        self.command(|w| place_order(w, req))
    }

    pub fn cancel_order(&self, id: OrderId) -> Result<(), SimError> {
        self.command(|w| cancel_order(w, id))
    }

    pub fn start_job(&self, req: &JobRequest) -> Result<JobId, SimError> {
        self.command(|w| start_job(w, req))
    }

    pub fn cancel_job(&self, id: JobId) -> Result<(), SimError> {
        self.command(|w| cancel_job(w, id))
    }

    pub fn create_shipment(&self, req: &ShipmentRequest) -> Result<ShipmentId, SimError> {
        let cfg = &self.config.logistics;
        self.command(|w| create_shipment(w, req, cfg))
    }

    pub fn cancel_shipment(&self, id: ShipmentId) -> Result<(), SimError> {
        self.command(|w| cancel_shipment(w, id))
    }

    pub fn create_contract(&self, req: &ContractRequest) -> Result<ContractId, SimError> {
        self.command(|w| create_contract(w, req))
    }

    pub fn cancel_contract(&self, id: ContractId) -> Result<(), SimError> {
        self.command(|w| cancel_contract(w, id))
    }

    pub fn set_workforce_allocation(&self, allocation: WorkforceAllocation) -> Result<(), SimError> {
        self.command(|w| set_workforce_allocation(w, allocation))
    }
}
