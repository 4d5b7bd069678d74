//! Entity types that make up the simulated world.
//!
//! Money is always held in integer cents (`i64`); quantities of goods are
//! unsigned. Status enums encode each entity's lifecycle.

use crate::ids::*;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Discrete simulation time.
pub type Tick = u64;

/// Signed fixed-point money amount in cents.
pub type Cents = i64;

/// World clock and optimistic-concurrency token.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct WorldClock {
    /// Last committed tick (monotonic).
    pub current_tick: Tick,
    /// Incremented once per committed tick and once per committed command.
    pub lock_version: u64,
    /// Wall-clock time of the last committed advancement.
    pub last_advanced_at: Option<DateTime<Utc>>,
}

/// A company participating in the economy.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Company {
    pub id: CompanyId,
    pub name: String,
    /// Spendable cash. May go negative through fees.
    pub cash_cents: Cents,
    /// Cash earmarked for open buy orders and buyer contracts (>= 0).
    pub reserved_cash_cents: Cents,
    /// Bot companies receive exogenous liquidity each tick.
    pub is_bot: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub id: RegionId,
    pub name: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub name: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum BuildingStatus {
    Active,
    Inactive,
}

/// A building owned by a company in a region. Production jobs run inside one.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Building {
    pub id: BuildingId,
    pub company_id: CompanyId,
    pub region_id: RegionId,
    /// Free-form building type, matched against [`Recipe::building_kind`].
    pub kind: String,
    pub status: BuildingStatus,
    /// Maximum number of unfinished jobs the building accepts.
    pub capacity: u32,
}

/// One input line of a recipe, drawn per tick per job quantity unit.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipeInput {
    pub item_id: ItemId,
    pub quantity: u64,
}

/// Reference data describing how to turn inputs into an output.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipe {
    pub id: RecipeId,
    pub name: String,
    pub building_kind: String,
    pub inputs: Vec<RecipeInput>,
    pub output_item: ItemId,
    pub output_quantity: u64,
    /// Progress points needed to complete a job.
    pub work_required: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobState {
    Queued,
    Running,
    Blocked,
    Completed,
    Cancelled,
}

impl JobState {
    /// Whether the scheduler still evaluates jobs in this state.
    pub fn is_active(self) -> bool {
        matches!(self, JobState::Queued | JobState::Running | JobState::Blocked)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductionJob {
    pub id: JobId,
    pub company_id: CompanyId,
    pub building_id: BuildingId,
    /// Region of the building, copied at creation.
    pub region_id: RegionId,
    pub recipe_id: RecipeId,
    /// Batch multiplier: inputs drawn and outputs produced scale with it.
    pub quantity: u64,
    pub progress: u32,
    pub state: JobState,
    pub created_tick: Tick,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum OrderSide {
    Buy,
    Sell,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    Open,
    PartiallyFilled,
    Filled,
    Cancelled,
}

impl OrderStatus {
    /// Open and partially filled orders participate in matching.
    pub fn is_open(self) -> bool {
        matches!(self, OrderStatus::Open | OrderStatus::PartiallyFilled)
    }
}

/// A limit order resting on a `(region, item)` market.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketOrder {
    pub id: OrderId,
    pub company_id: CompanyId,
    pub region_id: RegionId,
    pub item_id: ItemId,
    pub side: OrderSide,
    /// Limit price per unit in cents (> 0).
    pub price_cents: Cents,
    pub quantity: u64,
    /// Unfilled quantity; `remaining <= quantity`.
    pub remaining: u64,
    pub status: OrderStatus,
    pub created_tick: Tick,
}

impl MarketOrder {
    pub fn is_open(&self) -> bool {
        self.status.is_open() && self.remaining > 0
    }

    /// Status implied by the remaining quantity after a fill.
    pub fn fill_status(&self) -> OrderStatus {
        if self.remaining == 0 {
            OrderStatus::Filled
        } else if self.remaining < self.quantity {
            OrderStatus::PartiallyFilled
        } else {
            OrderStatus::Open
        }
    }
}

/// Immutable record of one match. Created only by market clearing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trade {
    pub id: TradeId,
    pub tick: Tick,
    pub region_id: RegionId,
    pub item_id: ItemId,
    pub price_cents: Cents,
    pub quantity: u64,
    pub buyer_company_id: CompanyId,
    pub seller_company_id: CompanyId,
    pub buy_order_id: OrderId,
    pub sell_order_id: OrderId,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShipmentStatus {
    InTransit,
    Delivered,
    Cancelled,
}

/// Goods moving between regions. Debited from origin at creation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shipment {
    pub id: ShipmentId,
    pub company_id: CompanyId,
    pub from_region_id: RegionId,
    pub to_region_id: RegionId,
    pub item_id: ItemId,
    pub quantity: u64,
    pub status: ShipmentStatus,
    pub created_tick: Tick,
    pub eta_tick: Tick,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContractStatus {
    Open,
    PartiallyFulfilled,
    Fulfilled,
    Cancelled,
}

impl ContractStatus {
    pub fn is_open(self) -> bool {
        matches!(self, ContractStatus::Open | ContractStatus::PartiallyFulfilled)
    }
}

/// Standing delivery agreement. Without a buyer it is a market-standing
/// offer paid out of the world's market pool.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contract {
    pub id: ContractId,
    pub seller_company_id: CompanyId,
    pub buyer_company_id: Option<CompanyId>,
    pub region_id: RegionId,
    pub item_id: ItemId,
    pub quantity: u64,
    pub fulfilled: u64,
    pub price_cents: Cents,
    pub status: ContractStatus,
    pub created_tick: Tick,
}

impl Contract {
    pub fn outstanding(&self) -> u64 {
        self.quantity.saturating_sub(self.fulfilled)
    }
}

/// Standing workforce split for a company. Percentages sum to exactly 100.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkforceAllocation {
    pub company_id: CompanyId,
    pub operations_pct: u8,
    pub research_pct: u8,
    pub logistics_pct: u8,
    pub corporate_pct: u8,
}

impl WorkforceAllocation {
    /// Even split used for companies that never configured an allocation.
    pub fn even(company_id: CompanyId) -> Self {
        Self {
            company_id,
            operations_pct: 25,
            research_pct: 25,
            logistics_pct: 25,
            corporate_pct: 25,
        }
    }

    /// Operations, research, logistics and corporate percentages, in that order.
    pub fn percentages(&self) -> [u8; 4] {
        [
            self.operations_pct,
            self.research_pct,
            self.logistics_pct,
            self.corporate_pct,
        ]
    }
}
