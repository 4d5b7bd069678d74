//! The world snapshot: every entity plus the clock and version token.
//!
//! A [`WorldState`] is a plain value. Engines take it by reference (preflight,
//! audit) or mutate a working copy (tick advancement, commands); persistence
//! stores and compare-and-swaps whole snapshots. Entity vectors are kept in
//! ascending id order, which lets lookups binary-search and keeps iteration
//! deterministic.

use crate::error::SimError;
use crate::ids::*;
use crate::model::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Inventory location: one company's stock of one item in one region.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StockKey {
    pub company_id: CompanyId,
    pub region_id: RegionId,
    pub item_id: ItemId,
}

impl StockKey {
    pub fn new(company_id: CompanyId, region_id: RegionId, item_id: ItemId) -> Self {
        Self {
            company_id,
            region_id,
            item_id,
        }
    }
}

/// Serialized form of one inventory balance.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockEntry {
    pub company_id: CompanyId,
    pub region_id: RegionId,
    pub item_id: ItemId,
    pub quantity: u64,
}

/// Region-scoped goods held by companies. Zero balances are not stored.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<StockEntry>", into = "Vec<StockEntry>")]
pub struct Inventory {
    stock: BTreeMap<StockKey, u64>,
}

impl From<Vec<StockEntry>> for Inventory {
    fn from(entries: Vec<StockEntry>) -> Self {
        let mut stock = BTreeMap::new();
        for e in entries {
            if e.quantity > 0 {
                let key = StockKey::new(e.company_id, e.region_id, e.item_id);
                let slot = stock.entry(key).or_insert(0u64);
                *slot = slot.saturating_add(e.quantity);
            }
        }
        Self { stock }
    }
}

impl From<Inventory> for Vec<StockEntry> {
    fn from(inv: Inventory) -> Self {
        inv.stock
            .into_iter()
            .map(|(k, quantity)| StockEntry {
                company_id: k.company_id,
                region_id: k.region_id,
                item_id: k.item_id,
                quantity,
            })
            .collect()
    }
}

impl Inventory {
    pub fn quantity(&self, key: StockKey) -> u64 {
        self.stock.get(&key).copied().unwrap_or(0)
    }

    pub fn has(&self, key: StockKey, quantity: u64) -> bool {
        self.quantity(key) >= quantity
    }

    pub fn add(&mut self, key: StockKey, quantity: u64) -> Result<(), SimError> {
        if quantity == 0 {
            return Ok(());
        }
        let slot = self.stock.entry(key).or_insert(0);
        *slot = slot
            .checked_add(quantity)
            .ok_or(SimError::Overflow("inventory quantity"))?;
        Ok(())
    }

    /// Remove `quantity` or fail with [`SimError::InsufficientInventory`]
    /// without touching the balance.
    pub fn remove(&mut self, key: StockKey, quantity: u64) -> Result<(), SimError> {
        if quantity == 0 {
            return Ok(());
        }
        let available = self.quantity(key);
        if available < quantity {
            return Err(SimError::InsufficientInventory {
                company: key.company_id,
                region: key.region_id,
                item: key.item_id,
                required: quantity,
                available,
            });
        }
        if available == quantity {
            self.stock.remove(&key);
        } else {
            self.stock.insert(key, available - quantity);
        }
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&StockKey, &u64)> {
        self.stock.iter()
    }

    /// Total units of `item` across all companies and regions.
    pub fn total_of(&self, item: ItemId) -> u128 {
        self.stock
            .iter()
            .filter(|(k, _)| k.item_id == item)
            .map(|(_, &q)| u128::from(q))
            .sum()
    }
}

/// Complete world snapshot. One instance per world.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct WorldState {
    pub clock: WorldClock,
    pub regions: Vec<Region>,
    pub items: Vec<Item>,
    pub recipes: Vec<Recipe>,
    pub companies: Vec<Company>,
    pub buildings: Vec<Building>,
    pub jobs: Vec<ProductionJob>,
    pub orders: Vec<MarketOrder>,
    pub trades: Vec<Trade>,
    pub shipments: Vec<Shipment>,
    pub contracts: Vec<Contract>,
    /// Sorted by company id.
    pub allocations: Vec<WorkforceAllocation>,
    pub inventory: Inventory,
    /// Floating pool funding buyer-less contracts; outside company ledgers.
    pub market_pool_cents: Cents,
    /// Last identifier handed out.
    pub next_id: u64,
}

macro_rules! lookup {
    ($get:ident, $get_mut:ident, $require:ident, $field:ident, $id:ty, $ty:ty, $label:literal) => {
        pub fn $get(&self, id: $id) -> Option<&$ty> {
            self.$field
                .binary_search_by_key(&id, |e| e.id)
                .ok()
                .map(|i| &self.$field[i])
        }

        pub fn $get_mut(&mut self, id: $id) -> Option<&mut $ty> {
            match self.$field.binary_search_by_key(&id, |e| e.id) {
                Ok(i) => Some(&mut self.$field[i]),
                Err(_) => None,
            }
        }

        pub fn $require(&self, id: $id) -> Result<&$ty, SimError> {
            self.$get(id).ok_or(SimError::not_found($label, id.0))
        }
    };
}

impl WorldState {
    lookup!(company, company_mut, require_company, companies, CompanyId, Company, "company");
    lookup!(region, region_mut, require_region, regions, RegionId, Region, "region");
    lookup!(item, item_mut, require_item, items, ItemId, Item, "item");
    lookup!(recipe, recipe_mut, require_recipe, recipes, RecipeId, Recipe, "recipe");
    lookup!(building, building_mut, require_building, buildings, BuildingId, Building, "building");
    lookup!(job, job_mut, require_job, jobs, JobId, ProductionJob, "job");
    lookup!(order, order_mut, require_order, orders, OrderId, MarketOrder, "order");
    lookup!(shipment, shipment_mut, require_shipment, shipments, ShipmentId, Shipment, "shipment");
    lookup!(contract, contract_mut, require_contract, contracts, ContractId, Contract, "contract");

    /// Hand out the next identifier. Only mutations call this; preflights never do.
    pub fn allocate_id(&mut self) -> Result<u64, SimError> {
        self.next_id = self
            .next_id
            .checked_add(1)
            .ok_or(SimError::Overflow("id sequence"))?;
        Ok(self.next_id)
    }

    pub fn allocation_for(&self, company: CompanyId) -> Option<&WorkforceAllocation> {
        self.allocations
            .binary_search_by_key(&company, |a| a.company_id)
            .ok()
            .map(|i| &self.allocations[i])
    }

    /// Insert or replace a company's allocation, keeping id order.
    pub fn put_allocation(&mut self, allocation: WorkforceAllocation) {
        match self
            .allocations
            .binary_search_by_key(&allocation.company_id, |a| a.company_id)
        {
            Ok(i) => self.allocations[i] = allocation,
            Err(i) => self.allocations.insert(i, allocation),
        }
    }

    pub fn orders_for_company(&self, company: CompanyId) -> impl Iterator<Item = &MarketOrder> {
        self.orders.iter().filter(move |o| o.company_id == company)
    }

    /// Drop trades that fell out of the `window` ticks ending at `now`.
    /// The snapshot only keeps what the recent-trades view reads; full
    /// history is appended by the store on commit.
    pub fn retain_recent_trades(&mut self, now: Tick, window: u64) -> usize {
        let before = self.trades.len();
        match window.checked_sub(1) {
            Some(span) => {
                let from = now.saturating_sub(span);
                self.trades.retain(|t| t.tick >= from);
            }
            None => self.trades.clear(),
        }
        before - self.trades.len()
    }

    pub fn open_order_count(&self) -> usize {
        self.orders.iter().filter(|o| o.is_open()).count()
    }

    pub fn bot_count(&self) -> usize {
        self.companies.iter().filter(|c| c.is_bot).count()
    }

    /// `Σ cash_cents`, or `None` on overflow.
    pub fn sum_cash_cents(&self) -> Option<i64> {
        self.companies
            .iter()
            .try_fold(0i64, |acc, c| acc.checked_add(c.cash_cents))
    }

    /// `Σ reserved_cash_cents`, or `None` on overflow.
    pub fn sum_reserved_cash_cents(&self) -> Option<i64> {
        self.companies
            .iter()
            .try_fold(0i64, |acc, c| acc.checked_add(c.reserved_cash_cents))
    }

    /// Total money held by companies: the conserved quantity.
    pub fn ledger_total_cents(&self) -> Option<i64> {
        self.sum_cash_cents()?
            .checked_add(self.sum_reserved_cash_cents()?)
    }

    // Seed helpers. They allocate ids from the shared sequence so entities
    // stay in ascending order.

    pub fn add_region(&mut self, name: &str) -> RegionId {
        let id = RegionId(self.bump());
        self.regions.push(Region {
            id,
            name: name.to_string(),
        });
        id
    }

    pub fn add_item(&mut self, name: &str) -> ItemId {
        let id = ItemId(self.bump());
        self.items.push(Item {
            id,
            name: name.to_string(),
        });
        id
    }

    pub fn add_company(&mut self, name: &str, cash_cents: Cents, is_bot: bool) -> CompanyId {
        let id = CompanyId(self.bump());
        self.companies.push(Company {
            id,
            name: name.to_string(),
            cash_cents,
            reserved_cash_cents: 0,
            is_bot,
        });
        id
    }

    pub fn add_building(
        &mut self,
        company_id: CompanyId,
        region_id: RegionId,
        kind: &str,
        capacity: u32,
    ) -> BuildingId {
        let id = BuildingId(self.bump());
        self.buildings.push(Building {
            id,
            company_id,
            region_id,
            kind: kind.to_string(),
            status: BuildingStatus::Active,
            capacity,
        });
        id
    }

    pub fn add_recipe(
        &mut self,
        name: &str,
        building_kind: &str,
        inputs: Vec<RecipeInput>,
        output_item: ItemId,
        output_quantity: u64,
        work_required: u32,
    ) -> RecipeId {
        let id = RecipeId(self.bump());
        self.recipes.push(Recipe {
            id,
            name: name.to_string(),
            building_kind: building_kind.to_string(),
            inputs,
            output_item,
            output_quantity,
            work_required,
        });
        id
    }

    fn bump(&mut self) -> u64 {
        self.next_id = self.next_id.saturating_add(1);
        self.next_id
    }
}
