//! Production scheduler.
//!
//! Every Queued, Running or Blocked job is evaluated once per tick. A job
//! draws its whole per-tick input set or nothing; when the draw is not
//! possible (or its building is inactive) it becomes Blocked and keeps its
//! progress, to be retried on the next tick. Progress per tick is the base
//! rate scaled by the owner's operations multiplier.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Serialize;
use sim_core::{
    BuildingId, BuildingStatus, CompanyId, ItemId, JobId, JobState, ProductionConfig,
    ProductionJob, Recipe, RecipeId, RegionId, SimError, StockKey, Tick, WorldState,
};
use sim_econ::Multipliers;
use std::collections::BTreeMap;
use tracing::debug;

/// Input contract for starting a production job.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct JobRequest {
    pub company_id: CompanyId,
    pub building_id: BuildingId,
    pub recipe_id: RecipeId,
    pub quantity: u64,
}

/// Feasibility verdict for a job start.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct JobPlan {
    pub region_id: RegionId,
    /// Inputs drawn on each tick of work.
    pub inputs_per_tick: Vec<(ItemId, u64)>,
    pub active_jobs: u32,
    pub capacity: u32,
}

/// Recipe inputs scaled by the job's batch quantity.
pub fn scaled_inputs(recipe: &Recipe, quantity: u64) -> Result<Vec<(ItemId, u64)>, SimError> {
    recipe
        .inputs
        .iter()
        .map(|i| {
            i.quantity
                .checked_mul(quantity)
                .map(|q| (i.item_id, q))
                .ok_or(SimError::Overflow("recipe inputs"))
        })
        .collect()
}

fn active_jobs_on(world: &WorldState, building: BuildingId) -> u32 {
    let n = world
        .jobs
        .iter()
        .filter(|j| j.building_id == building && j.state.is_active())
        .count();
    u32::try_from(n).unwrap_or(u32::MAX)
}

/// Check whether `req` could start now: ownership, building status, recipe
/// kind, capacity and first-tick inputs. Never mutates.
pub fn plan_job(world: &WorldState, req: &JobRequest) -> Result<JobPlan, SimError> {
    if req.quantity == 0 {
        return Err(SimError::invalid("job quantity must be positive"));
    }
    world.require_company(req.company_id)?;
    let building = world.require_building(req.building_id)?;
    let recipe = world.require_recipe(req.recipe_id)?;
    if building.company_id != req.company_id {
        return Err(SimError::invalid(format!(
            "{} is not owned by {}",
            req.building_id, req.company_id
        )));
    }
    if building.status != BuildingStatus::Active {
        return Err(SimError::invalid_state(
            "building",
            building.id.0,
            building.status,
            "start job in",
        ));
    }
    if building.kind != recipe.building_kind {
        return Err(SimError::invalid(format!(
            "recipe {} needs a {} building, {} is a {}",
            recipe.name, recipe.building_kind, building.id, building.kind
        )));
    }
    let active = active_jobs_on(world, building.id);
    if active >= building.capacity {
        return Err(SimError::invalid(format!(
            "{} is at capacity ({} jobs)",
            building.id, building.capacity
        )));
    }
    let inputs = scaled_inputs(recipe, req.quantity)?;
    for &(item, qty) in &inputs {
        let key = StockKey::new(req.company_id, building.region_id, item);
        let available = world.inventory.quantity(key);
        if available < qty {
            return Err(SimError::InsufficientInventory {
                company: req.company_id,
                region: building.region_id,
                item,
                required: qty,
                available,
            });
        }
    }
    Ok(JobPlan {
        region_id: building.region_id,
        inputs_per_tick: inputs,
        active_jobs: active,
        capacity: building.capacity,
    })
}

/// Dry-run counterpart of [`start_job`].
pub fn preflight_start_job(world: &WorldState, req: &JobRequest) -> Result<JobPlan, SimError> {
    plan_job(world, req)
}

/// Queue a job. Inputs are drawn tick by tick, not up front.
pub fn start_job(world: &mut WorldState, req: &JobRequest) -> Result<JobId, SimError> {
    let plan = plan_job(world, req)?;
    let id = JobId(world.allocate_id()?);
    world.jobs.push(ProductionJob {
        id,
        company_id: req.company_id,
        building_id: req.building_id,
        region_id: plan.region_id,
        recipe_id: req.recipe_id,
        quantity: req.quantity,
        progress: 0,
        state: JobState::Queued,
        created_tick: world.clock.current_tick,
    });
    debug!(job = %id, building = %req.building_id, "job queued");
    Ok(id)
}

pub fn cancel_job(world: &mut WorldState, id: JobId) -> Result<(), SimError> {
    let job = world.require_job(id)?;
    if !job.state.is_active() {
        return Err(SimError::invalid_state("job", id.0, job.state, "cancel"));
    }
    if let Some(j) = world.job_mut(id) {
        j.state = JobState::Cancelled;
    }
    Ok(())
}

/// Progress gained in one tick: `floor(base × multiplier)`, at least 1.
pub fn progress_step(base: u32, operations: Decimal) -> u32 {
    (Decimal::from(base) * operations)
        .floor()
        .to_u32()
        .unwrap_or(u32::MAX)
        .max(1)
}

/// Per-tick outcome of the scheduler.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ProductionSummary {
    pub advanced: Vec<JobId>,
    pub blocked: Vec<JobId>,
    pub completed: Vec<JobId>,
}

enum Step {
    Blocked,
    Advanced,
    Completed,
}

/// Evaluate every active job in id order.
pub fn run_production(
    world: &mut WorldState,
    tick: Tick,
    multipliers: &BTreeMap<CompanyId, Multipliers>,
    cfg: &ProductionConfig,
) -> Result<ProductionSummary, SimError> {
    let active: Vec<JobId> = world
        .jobs
        .iter()
        .filter(|j| j.state.is_active())
        .map(|j| j.id)
        .collect();
    let mut summary = ProductionSummary::default();
    for id in active {
        let operations = world
            .require_job(id)
            .map(|j| multipliers.get(&j.company_id).map(|m| m.operations))?
            .unwrap_or(Decimal::ONE);
        match advance_job(world, id, progress_step(cfg.base_progress_per_tick, operations))? {
            Step::Blocked => summary.blocked.push(id),
            Step::Advanced => summary.advanced.push(id),
            Step::Completed => summary.completed.push(id),
        }
    }
    debug!(
        tick,
        advanced = summary.advanced.len(),
        blocked = summary.blocked.len(),
        completed = summary.completed.len(),
        "production evaluated"
    );
    Ok(summary)
}

fn set_state(world: &mut WorldState, id: JobId, state: JobState, progress: u32) {
    if let Some(j) = world.job_mut(id) {
        j.state = state;
        j.progress = progress;
    }
}

fn advance_job(world: &mut WorldState, id: JobId, step: u32) -> Result<Step, SimError> {
    let job = world.require_job(id)?.clone();
    let recipe = world.require_recipe(job.recipe_id)?.clone();
    let building = world.require_building(job.building_id)?;
    if building.status != BuildingStatus::Active || building.company_id != job.company_id {
        set_state(world, id, JobState::Blocked, job.progress);
        return Ok(Step::Blocked);
    }

    let mut progress = job.progress;
    if progress < recipe.work_required {
        let inputs = scaled_inputs(&recipe, job.quantity)?;
        let keys: Vec<(StockKey, u64)> = inputs
            .iter()
            .map(|&(item, qty)| (StockKey::new(job.company_id, job.region_id, item), qty))
            .collect();
        if !keys.iter().all(|&(key, qty)| world.inventory.has(key, qty)) {
            set_state(world, id, JobState::Blocked, progress);
            return Ok(Step::Blocked);
        }
        for (key, qty) in keys {
            world.inventory.remove(key, qty)?;
        }
        progress = progress.saturating_add(step).min(recipe.work_required);
    }

    if progress >= recipe.work_required {
        let output = recipe
            .output_quantity
            .checked_mul(job.quantity)
            .ok_or(SimError::Overflow("recipe output"))?;
        world.inventory.add(
            StockKey::new(job.company_id, job.region_id, recipe.output_item),
            output,
        )?;
        set_state(world, id, JobState::Completed, progress);
        debug!(job = %id, output, "job completed");
        return Ok(Step::Completed);
    }
    set_state(world, id, JobState::Running, progress);
    Ok(Step::Advanced)
}
