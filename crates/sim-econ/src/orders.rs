//! Order placement, cancellation and their preflight.
//!
//! Buy orders reserve `price × quantity` of the company's cash; sell orders
//! escrow their goods out of inventory. Both are undone on cancellation for
//! the unfilled remainder. [`plan_order`] is the single feasibility
//! computation behind both the preflight and the mutation.

use crate::ledger::{release_reserved, reserve_cash};
use serde::Serialize;
use sim_core::{
    notional, CompanyId, ItemId, MarketOrder, OrderId, OrderSide, OrderStatus, RegionId, SimError,
    StockKey, WorldState,
};
use tracing::debug;

/// Validated input for placing a limit order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct OrderRequest {
    /// Company placing the order.
    pub company_id: CompanyId,
    /// Market region; sell orders escrow stock held here.
    pub region_id: RegionId,
    pub item_id: ItemId,
    pub side: OrderSide,
    /// Limit price per unit, in cents. Must be positive.
    pub price_cents: i64,
    /// Units to buy or sell. Must be positive.
    pub quantity: u64,
}

/// Result of a successful feasibility check.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct OrderPlan {
    pub side: OrderSide,
    /// Cash that placement would reserve (buy side).
    pub reserve_cents: i64,
    /// Goods that placement would escrow (sell side).
    pub escrow_quantity: u64,
    /// Company cash not already reserved.
    pub available_cash_cents: i64,
    /// Stock the company holds in the order's region.
    pub available_quantity: u64,
}

/// Check whether `req` could be placed right now. Never mutates.
pub fn plan_order(world: &WorldState, req: &OrderRequest) -> Result<OrderPlan, SimError> {
    if req.price_cents <= 0 {
        return Err(SimError::invalid(format!(
            "order price must be positive, got {}",
            req.price_cents
        )));
    }
    if req.quantity == 0 {
        return Err(SimError::invalid("order quantity must be positive"));
    }
    let company = world.require_company(req.company_id)?;
    world.require_region(req.region_id)?;
    world.require_item(req.item_id)?;

    let key = StockKey::new(req.company_id, req.region_id, req.item_id);
    let available_quantity = world.inventory.quantity(key);
    let total = notional(req.price_cents, req.quantity)?;
    match req.side {
        OrderSide::Buy => {
            if company.cash_cents < total {
                return Err(SimError::InsufficientFunds {
                    company: req.company_id,
                    required_cents: total,
                    available_cents: company.cash_cents,
                });
            }
            Ok(OrderPlan {
                side: req.side,
                reserve_cents: total,
                escrow_quantity: 0,
                available_cash_cents: company.cash_cents,
                available_quantity,
            })
        }
        OrderSide::Sell => {
            if available_quantity < req.quantity {
                return Err(SimError::InsufficientInventory {
                    company: req.company_id,
                    region: req.region_id,
                    item: req.item_id,
                    required: req.quantity,
                    available: available_quantity,
                });
            }
            Ok(OrderPlan {
                side: req.side,
                reserve_cents: 0,
                escrow_quantity: req.quantity,
                available_cash_cents: company.cash_cents,
                available_quantity,
            })
        }
    }
}

/// Dry-run counterpart of [`place_order`].
pub fn preflight_place_order(world: &WorldState, req: &OrderRequest) -> Result<OrderPlan, SimError> {
    plan_order(world, req)
}

/// Place a limit order, reserving cash or escrowing goods.
pub fn place_order(world: &mut WorldState, req: &OrderRequest) -> Result<OrderId, SimError> {
    let plan = plan_order(world, req)?;
    match req.side {
        OrderSide::Buy => reserve_cash(world, req.company_id, plan.reserve_cents)?,
        OrderSide::Sell => world.inventory.remove(
            StockKey::new(req.company_id, req.region_id, req.item_id),
            plan.escrow_quantity,
        )?,
    }
    let id = OrderId(world.allocate_id()?);
    world.orders.push(MarketOrder {
        id,
        company_id: req.company_id,
        region_id: req.region_id,
        item_id: req.item_id,
        side: req.side,
        price_cents: req.price_cents,
        quantity: req.quantity,
        remaining: req.quantity,
        status: OrderStatus::Open,
        created_tick: world.clock.current_tick,
    });
    debug!(order = %id, side = ?req.side, price = req.price_cents, qty = req.quantity, "order placed");
    Ok(id)
}

/// Cancel an open order and release its unfilled remainder.
pub fn cancel_order(world: &mut WorldState, order_id: OrderId) -> Result<(), SimError> {
    let order = world.require_order(order_id)?.clone();
    if !order.status.is_open() {
        return Err(SimError::invalid_state("order", order_id.0, order.status, "cancel"));
    }
    match order.side {
        OrderSide::Buy => {
            let amount = notional(order.price_cents, order.remaining)?;
            release_reserved(world, order.company_id, amount)?;
        }
        OrderSide::Sell => world.inventory.add(
            StockKey::new(order.company_id, order.region_id, order.item_id),
            order.remaining,
        )?,
    }
    if let Some(o) = world.order_mut(order_id) {
        o.status = OrderStatus::Cancelled;
    }
    debug!(order = %order_id, "order cancelled");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixture {
        world: WorldState,
        company: CompanyId,
        region: RegionId,
        item: ItemId,
    }

    fn fixture() -> Fixture {
        let mut world = WorldState::default();
        let region = world.add_region("R");
        let item = world.add_item("I");
        let company = world.add_company("C", 1_000, false);
        world
            .inventory
            .add(StockKey::new(company, region, item), 10)
            .unwrap();
        Fixture {
            world,
            company,
            region,
            item,
        }
    }

    fn req(f: &Fixture, side: OrderSide, price: i64, qty: u64) -> OrderRequest {
        OrderRequest {
            company_id: f.company,
            region_id: f.region,
            item_id: f.item,
            side,
            price_cents: price,
            quantity: qty,
        }
    }

    #[test]
    fn buy_reserves_cash() {
        let mut f = fixture();
        let r = req(&f, OrderSide::Buy, 100, 5);
        let id = place_order(&mut f.world, &r).unwrap();
        let c = f.world.company(f.company).unwrap();
        assert_eq!(c.cash_cents, 500);
        assert_eq!(c.reserved_cash_cents, 500);
        assert_eq!(f.world.order(id).unwrap().remaining, 5);
    }

    #[test]
    fn sell_escrows_goods() {
        let mut f = fixture();
        let r = req(&f, OrderSide::Sell, 100, 4);
        place_order(&mut f.world, &r).unwrap();
        let key = StockKey::new(f.company, f.region, f.item);
        assert_eq!(f.world.inventory.quantity(key), 6);
    }

    #[test]
    fn preflight_matches_mutation_and_does_not_mutate() {
        let f = fixture();
        let r = req(&f, OrderSide::Buy, 300, 4);
        let before = f.world.clone();
        let first = preflight_place_order(&f.world, &r);
        let second = preflight_place_order(&f.world, &r);
        assert_eq!(first, second);
        assert!(matches!(
            first,
            Err(SimError::InsufficientFunds {
                required_cents: 1_200,
                available_cents: 1_000,
                ..
            })
        ));
        assert_eq!(f.world, before);
        assert_eq!(f.world.next_id, before.next_id);
    }

    #[test]
    fn rejects_non_positive_inputs() {
        let f = fixture();
        assert!(matches!(
            plan_order(&f.world, &req(&f, OrderSide::Buy, 0, 1)),
            Err(SimError::InvalidRequest(_))
        ));
        assert!(matches!(
            plan_order(&f.world, &req(&f, OrderSide::Sell, 5, 0)),
            Err(SimError::InvalidRequest(_))
        ));
        assert!(matches!(
            plan_order(&f.world, &req(&f, OrderSide::Sell, 5, 11)),
            Err(SimError::InsufficientInventory { available: 10, .. })
        ));
    }

    #[test]
    fn cancel_releases_remainder_once() {
        let mut f = fixture();
        let buy_req = req(&f, OrderSide::Buy, 100, 5);
        let sell_req = req(&f, OrderSide::Sell, 100, 3);
        let buy = place_order(&mut f.world, &buy_req).unwrap();
        let sell = place_order(&mut f.world, &sell_req).unwrap();
        cancel_order(&mut f.world, buy).unwrap();
        cancel_order(&mut f.world, sell).unwrap();
        let c = f.world.company(f.company).unwrap();
        assert_eq!(c.cash_cents, 1_000);
        assert_eq!(c.reserved_cash_cents, 0);
        let key = StockKey::new(f.company, f.region, f.item);
        assert_eq!(f.world.inventory.quantity(key), 10);
        assert!(matches!(
            cancel_order(&mut f.world, buy),
            Err(SimError::InvalidState { .. })
        ));
    }
}
