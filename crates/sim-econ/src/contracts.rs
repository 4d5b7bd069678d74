//! Standing contracts and their per-tick settlement.
//!
//! A buyer contract reserves `price × quantity` from the buyer when created;
//! each settlement draws the delivered units' value from that reservation
//! into the seller's cash, the same rule market clearing uses. Contracts
//! without a buyer are market-standing offers paid out of the world's
//! market pool, which lies outside company ledgers.

use crate::ledger::{release_reserved, reserve_cash, settle_reserved, CashFlows};
use serde::Serialize;
use sim_core::{
    notional, CompanyId, Contract, ContractId, ContractStatus, ItemId, RegionId, SimError,
    StockKey, Tick, WorldState,
};
use tracing::debug;

/// Terms of a new supply contract.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ContractRequest {
    /// Company delivering the goods.
    pub seller_company_id: CompanyId,
    /// Paying company; `None` means the market pool pays.
    pub buyer_company_id: Option<CompanyId>,
    /// Region whose inventory the goods come from and go to.
    pub region_id: RegionId,
    pub item_id: ItemId,
    /// Units to deliver over the contract's life.
    pub quantity: u64,
    /// Unit price in cents.
    pub price_cents: i64,
}

/// Feasibility check for [`create_contract`]; returns the buyer reservation.
pub fn plan_contract(world: &WorldState, req: &ContractRequest) -> Result<i64, SimError> {
    if req.price_cents <= 0 || req.quantity == 0 {
        return Err(SimError::invalid(
            "contract price and quantity must be positive",
        ));
    }
    if req.buyer_company_id == Some(req.seller_company_id) {
        return Err(SimError::invalid("contract buyer and seller must differ"));
    }
    world.require_company(req.seller_company_id)?;
    world.require_region(req.region_id)?;
    world.require_item(req.item_id)?;
    let total = notional(req.price_cents, req.quantity)?;
    match req.buyer_company_id {
        Some(buyer) => {
            let b = world.require_company(buyer)?;
            if b.cash_cents < total {
                return Err(SimError::InsufficientFunds {
                    company: buyer,
                    required_cents: total,
                    available_cents: b.cash_cents,
                });
            }
            Ok(total)
        }
        None => Ok(0),
    }
}

pub fn create_contract(world: &mut WorldState, req: &ContractRequest) -> Result<ContractId, SimError> {
    let reserve = plan_contract(world, req)?;
    if let Some(buyer) = req.buyer_company_id {
        reserve_cash(world, buyer, reserve)?;
    }
    let id = ContractId(world.allocate_id()?);
    world.contracts.push(Contract {
        id,
        seller_company_id: req.seller_company_id,
        buyer_company_id: req.buyer_company_id,
        region_id: req.region_id,
        item_id: req.item_id,
        quantity: req.quantity,
        fulfilled: 0,
        price_cents: req.price_cents,
        status: ContractStatus::Open,
        created_tick: world.clock.current_tick,
    });
    Ok(id)
}

/// Cancel an open contract, releasing the buyer's outstanding reservation.
pub fn cancel_contract(world: &mut WorldState, id: ContractId) -> Result<(), SimError> {
    let c = world.require_contract(id)?.clone();
    if !c.status.is_open() {
        return Err(SimError::invalid_state("contract", id.0, c.status, "cancel"));
    }
    if let Some(buyer) = c.buyer_company_id {
        release_reserved(world, buyer, notional(c.price_cents, c.outstanding())?)?;
    }
    if let Some(c) = world.contract_mut(id) {
        c.status = ContractStatus::Cancelled;
    }
    Ok(())
}

/// One contract's delivery during a tick.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ContractDelivery {
    pub contract_id: ContractId,
    pub tick: Tick,
    /// Units delivered this tick.
    pub quantity: u64,
    /// `quantity × price_cents`, paid to the seller.
    pub value_cents: i64,
}

/// Settle every open contract in id order.
///
/// Each contract takes `min(outstanding, seller stock)`; buyer-less contracts
/// are further limited by what the market pool can pay. A contract that can
/// settle nothing is left as it is for the next tick.
pub fn settle_contracts(
    world: &mut WorldState,
    tick: Tick,
    flows: &mut CashFlows,
) -> Result<Vec<ContractDelivery>, SimError> {
    let open: Vec<ContractId> = world
        .contracts
        .iter()
        .filter(|c| c.status.is_open())
        .map(|c| c.id)
        .collect();
    let mut deliveries = Vec::new();
    for id in open {
        let c = world.require_contract(id)?.clone();
        let seller_key = StockKey::new(c.seller_company_id, c.region_id, c.item_id);
        let mut qty = c.outstanding().min(world.inventory.quantity(seller_key));
        if c.buyer_company_id.is_none() {
            let affordable = u64::try_from(world.market_pool_cents.max(0) / c.price_cents)
                .unwrap_or(0);
            qty = qty.min(affordable);
        }
        if qty == 0 {
            continue;
        }
        let value = notional(c.price_cents, qty)?;
        world.inventory.remove(seller_key, qty)?;
        match c.buyer_company_id {
            Some(buyer) => {
                settle_reserved(world, buyer, c.seller_company_id, c.price_cents, c.price_cents, qty)?;
                world
                    .inventory
                    .add(StockKey::new(buyer, c.region_id, c.item_id), qty)?;
            }
            None => {
                world.market_pool_cents -= value;
                let seller = world
                    .company_mut(c.seller_company_id)
                    .ok_or(SimError::not_found("company", c.seller_company_id.0))?;
                seller.cash_cents = seller
                    .cash_cents
                    .checked_add(value)
                    .ok_or(SimError::Overflow("seller cash"))?;
                flows.record_inflow(value)?;
            }
        }
        if let Some(contract) = world.contract_mut(id) {
            contract.fulfilled += qty;
            contract.status = if contract.outstanding() == 0 {
                ContractStatus::Fulfilled
            } else {
                ContractStatus::PartiallyFulfilled
            };
        }
        debug!(contract = %id, qty, value, "contract settled");
        deliveries.push(ContractDelivery {
            contract_id: id,
            tick,
            quantity: qty,
            value_cents: value,
        });
    }
    Ok(deliveries)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixture {
        world: WorldState,
        seller: CompanyId,
        buyer: CompanyId,
        region: RegionId,
        item: ItemId,
    }

    fn fixture(stock: u64) -> Fixture {
        let mut world = WorldState::default();
        let region = world.add_region("R");
        let item = world.add_item("I");
        let seller = world.add_company("S", 0, false);
        let buyer = world.add_company("B", 10_000, false);
        world
            .inventory
            .add(StockKey::new(seller, region, item), stock)
            .unwrap();
        Fixture {
            world,
            seller,
            buyer,
            region,
            item,
        }
    }

    fn request(f: &Fixture, buyer: Option<CompanyId>, qty: u64, price: i64) -> ContractRequest {
        ContractRequest {
            seller_company_id: f.seller,
            buyer_company_id: buyer,
            region_id: f.region,
            item_id: f.item,
            quantity: qty,
            price_cents: price,
        }
    }

    #[test]
    fn partial_then_full_settlement() {
        let mut f = fixture(4);
        let req = request(&f, Some(f.buyer), 10, 50);
        let id = create_contract(&mut f.world, &req).unwrap();
        assert_eq!(f.world.company(f.buyer).unwrap().reserved_cash_cents, 500);

        let mut flows = CashFlows::default();
        let d = settle_contracts(&mut f.world, 1, &mut flows).unwrap();
        assert_eq!(d[0].quantity, 4);
        let c = f.world.contract(id).unwrap();
        assert_eq!(c.status, ContractStatus::PartiallyFulfilled);
        assert_eq!(c.fulfilled, 4);
        assert_eq!(f.world.company(f.seller).unwrap().cash_cents, 200);
        assert_eq!(f.world.company(f.buyer).unwrap().reserved_cash_cents, 300);

        // Nothing in stock: contract untouched, not cancelled.
        let before = f.world.clone();
        assert!(settle_contracts(&mut f.world, 2, &mut flows).unwrap().is_empty());
        assert_eq!(f.world, before);

        f.world
            .inventory
            .add(StockKey::new(f.seller, f.region, f.item), 10)
            .unwrap();
        settle_contracts(&mut f.world, 3, &mut flows).unwrap();
        let c = f.world.contract(id).unwrap();
        assert_eq!(c.status, ContractStatus::Fulfilled);
        assert_eq!(c.fulfilled, 10);
        assert_eq!(f.world.company(f.buyer).unwrap().reserved_cash_cents, 0);
        assert_eq!(
            f.world
                .inventory
                .quantity(StockKey::new(f.buyer, f.region, f.item)),
            10
        );
        assert_eq!(f.world.ledger_total_cents(), Some(10_000));
        assert_eq!(flows, CashFlows::default());
    }

    #[test]
    fn buyerless_contract_draws_from_pool() {
        let mut f = fixture(10);
        f.world.market_pool_cents = 120;
        let req = request(&f, None, 10, 50);
        let id = create_contract(&mut f.world, &req).unwrap();
        let mut flows = CashFlows::default();
        settle_contracts(&mut f.world, 1, &mut flows).unwrap();
        assert_eq!(f.world.contract(id).unwrap().fulfilled, 2);
        assert_eq!(f.world.market_pool_cents, 20);
        assert_eq!(f.world.company(f.seller).unwrap().cash_cents, 100);
        assert_eq!(flows.inflow_cents, 100);
    }

    #[test]
    fn contract_requires_buyer_funds() {
        let mut f = fixture(0);
        let req = request(&f, Some(f.buyer), 1_000, 50);
        let before = f.world.clone();
        assert!(matches!(
            create_contract(&mut f.world, &req),
            Err(SimError::InsufficientFunds { .. })
        ));
        assert_eq!(f.world, before);
    }

    #[test]
    fn cancel_releases_outstanding_only() {
        let mut f = fixture(3);
        let req = request(&f, Some(f.buyer), 10, 50);
        let id = create_contract(&mut f.world, &req).unwrap();
        settle_contracts(&mut f.world, 1, &mut CashFlows::default()).unwrap();
        cancel_contract(&mut f.world, id).unwrap();
        let b = f.world.company(f.buyer).unwrap();
        assert_eq!(b.reserved_cash_cents, 0);
        assert_eq!(b.cash_cents, 10_000 - 150);
        assert!(cancel_contract(&mut f.world, id).is_err());
    }
}
