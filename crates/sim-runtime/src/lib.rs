#![deny(warnings)]

//! Tick runtime for the business world.
//!
//! Phases run in a fixed order per tick (see [`tick`]); whole requests are
//! planned on a working copy and committed through a
//! [`persistence::WorldStore`] by [`Simulation`]. The production scheduler,
//! logistics engine and invariant auditor live here because they need the
//! per-tick context (multipliers, cash flows) the advancer owns.

pub mod audit;
pub mod config;
pub mod health;
pub mod logistics;
pub mod production;
pub mod scenario;
pub mod simulation;
pub mod tick;

pub use audit::{audit, AuditReport, InvariantIssue, IssueKind};
pub use config::{load_config, parse_config, ConfigError};
pub use health::{
    recent_trade_count, simulation_health, HealthOptions, InvariantSummary, SimulationHealth,
    WorldTickState,
};
pub use logistics::{
    advance_shipments, cancel_shipment, create_shipment, delivery_fee, plan_shipment,
    ShipmentRequest,
};
pub use production::{
    cancel_job, plan_job, preflight_start_job, progress_step, run_production, start_job,
    JobPlan, JobRequest, ProductionSummary,
};
pub use scenario::{demo_world, ScenarioParams};
pub use simulation::{AdvanceResult, Simulation};
pub use tick::{plan_advance, plan_advance_until, step, validate_ticks, AdvancePlan, TickReport};
