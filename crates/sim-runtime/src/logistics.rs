//! Inter-region shipments.
//!
//! Goods leave the origin when the shipment is created and reach the
//! destination on the first tick at or after `eta_tick`. Delivery charges a
//! per-unit fee, discounted by the company's logistics multiplier, which
//! leaves the economy.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Serialize;
use sim_core::{
    CompanyId, ItemId, LogisticsConfig, RegionId, Shipment, ShipmentId, ShipmentStatus, SimError,
    StockKey, Tick, WorldState,
};
use sim_econ::{charge_fee, CashFlows, Multipliers};
use std::collections::BTreeMap;
use tracing::debug;

/// A transfer of one company's goods between two of its regional stocks.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ShipmentRequest {
    /// Owner of the goods; also pays the delivery fee.
    pub company_id: CompanyId,
    /// Origin; the goods leave it when the shipment is created.
    pub from_region_id: RegionId,
    /// Destination; credited once, on delivery.
    pub to_region_id: RegionId,
    pub item_id: ItemId,
    pub quantity: u64,
    /// Ticks from creation to `eta_tick`. At least the configured minimum.
    pub transit_ticks: u64,
}

/// Check a shipment request and return its eta tick. Never mutates.
pub fn plan_shipment(
    world: &WorldState,
    req: &ShipmentRequest,
    cfg: &LogisticsConfig,
) -> Result<Tick, SimError> {
    if req.quantity == 0 {
        return Err(SimError::invalid("shipment quantity must be positive"));
    }
    if req.from_region_id == req.to_region_id {
        return Err(SimError::invalid("shipment origin and destination must differ"));
    }
    let min_transit = cfg.min_transit_ticks.max(1);
    if req.transit_ticks < min_transit {
        return Err(SimError::invalid(format!(
            "transit must take at least {min_transit} ticks, got {}",
            req.transit_ticks
        )));
    }
    world.require_company(req.company_id)?;
    world.require_region(req.from_region_id)?;
    world.require_region(req.to_region_id)?;
    world.require_item(req.item_id)?;
    let key = StockKey::new(req.company_id, req.from_region_id, req.item_id);
    let available = world.inventory.quantity(key);
    if available < req.quantity {
        return Err(SimError::InsufficientInventory {
            company: req.company_id,
            region: req.from_region_id,
            item: req.item_id,
            required: req.quantity,
            available,
        });
    }
    world
        .clock
        .current_tick
        .checked_add(req.transit_ticks)
        .ok_or(SimError::Overflow("shipment eta"))
}

pub fn create_shipment(
    world: &mut WorldState,
    req: &ShipmentRequest,
    cfg: &LogisticsConfig,
) -> Result<ShipmentId, SimError> {
    let eta_tick = plan_shipment(world, req, cfg)?;
    world.inventory.remove(
        StockKey::new(req.company_id, req.from_region_id, req.item_id),
        req.quantity,
    )?;
    let id = ShipmentId(world.allocate_id()?);
    world.shipments.push(Shipment {
        id,
        company_id: req.company_id,
        from_region_id: req.from_region_id,
        to_region_id: req.to_region_id,
        item_id: req.item_id,
        quantity: req.quantity,
        status: ShipmentStatus::InTransit,
        created_tick: world.clock.current_tick,
        eta_tick,
    });
    debug!(shipment = %id, eta_tick, "shipment dispatched");
    Ok(id)
}

/// Cancel an in-transit shipment and return its goods to the origin.
pub fn cancel_shipment(world: &mut WorldState, id: ShipmentId) -> Result<(), SimError> {
    let s = world.require_shipment(id)?.clone();
    if s.status != ShipmentStatus::InTransit {
        return Err(SimError::invalid_state("shipment", id.0, s.status, "cancel"));
    }
    world
        .inventory
        .add(StockKey::new(s.company_id, s.from_region_id, s.item_id), s.quantity)?;
    if let Some(s) = world.shipment_mut(id) {
        s.status = ShipmentStatus::Cancelled;
    }
    Ok(())
}

/// `floor(fee_cents_per_unit × quantity ÷ logistics multiplier)`.
pub fn delivery_fee(
    cfg: &LogisticsConfig,
    quantity: u64,
    logistics: Decimal,
) -> Result<i64, SimError> {
    Decimal::from(cfg.fee_cents_per_unit)
        .checked_mul(Decimal::from(quantity))
        .and_then(|v| v.checked_div(logistics))
        .and_then(|v| v.floor().to_i64())
        .ok_or(SimError::Overflow("delivery fee"))
}

/// Deliver every in-transit shipment whose eta has been reached.
pub fn advance_shipments(
    world: &mut WorldState,
    tick: Tick,
    multipliers: &BTreeMap<CompanyId, Multipliers>,
    cfg: &LogisticsConfig,
    flows: &mut CashFlows,
) -> Result<Vec<ShipmentId>, SimError> {
    let due: Vec<Shipment> = world
        .shipments
        .iter()
        .filter(|s| s.status == ShipmentStatus::InTransit && tick >= s.eta_tick)
        .cloned()
        .collect();
    let mut delivered = Vec::with_capacity(due.len());
    for s in due {
        world
            .inventory
            .add(StockKey::new(s.company_id, s.to_region_id, s.item_id), s.quantity)?;
        let logistics = multipliers
            .get(&s.company_id)
            .map(|m| m.logistics)
            .unwrap_or(Decimal::ONE);
        let fee = delivery_fee(cfg, s.quantity, logistics)?;
        if fee > 0 {
            charge_fee(world, s.company_id, fee, flows)?;
        }
        if let Some(sh) = world.shipment_mut(s.id) {
            sh.status = ShipmentStatus::Delivered;
        }
        debug!(shipment = %s.id, tick, fee, "shipment delivered");
        delivered.push(s.id);
    }
    Ok(delivered)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Route {
        world: WorldState,
        company: CompanyId,
        from: RegionId,
        to: RegionId,
        item: ItemId,
    }

    fn route() -> Route {
        let mut world = WorldState::default();
        let from = world.add_region("A");
        let to = world.add_region("B");
        let item = world.add_item("I");
        let company = world.add_company("C", 1_000, false);
        world
            .inventory
            .add(StockKey::new(company, from, item), 50)
            .unwrap();
        Route {
            world,
            company,
            from,
            to,
            item,
        }
    }

    fn request(r: &Route, qty: u64, transit: u64) -> ShipmentRequest {
        ShipmentRequest {
            company_id: r.company,
            from_region_id: r.from,
            to_region_id: r.to,
            item_id: r.item,
            quantity: qty,
            transit_ticks: transit,
        }
    }

    fn stock(r: &Route, region: RegionId) -> u64 {
        r.world
            .inventory
            .quantity(StockKey::new(r.company, region, r.item))
    }

    #[test]
    fn delivers_once_at_eta() {
        let mut r = route();
        r.world.clock.current_tick = 10;
        let cfg = LogisticsConfig::default();
        let req = request(&r, 20, 3);
        let id = create_shipment(&mut r.world, &req, &cfg).unwrap();
        assert_eq!(r.world.shipment(id).unwrap().eta_tick, 13);
        assert_eq!(stock(&r, r.from), 30);

        let none = BTreeMap::new();
        let mut flows = CashFlows::default();
        for t in 11..=12 {
            let d = advance_shipments(&mut r.world, t, &none, &cfg, &mut flows).unwrap();
            assert!(d.is_empty());
        }
        assert_eq!(stock(&r, r.to), 0);
        let d = advance_shipments(&mut r.world, 13, &none, &cfg, &mut flows).unwrap();
        assert_eq!(d, vec![id]);
        assert_eq!(stock(&r, r.to), 20);
        advance_shipments(&mut r.world, 14, &none, &cfg, &mut flows).unwrap();
        assert_eq!(stock(&r, r.to), 20);
        assert_eq!(flows.outflow_cents, 40);
        assert_eq!(r.world.company(r.company).unwrap().cash_cents, 960);
    }

    #[test]
    fn fee_scales_with_logistics_multiplier() {
        let cfg = LogisticsConfig::default();
        assert_eq!(delivery_fee(&cfg, 10, Decimal::ONE).unwrap(), 20);
        assert_eq!(delivery_fee(&cfg, 10, Decimal::new(150, 2)).unwrap(), 13);
        assert!(delivery_fee(&cfg, 10, Decimal::ZERO).is_err());
    }

    #[test]
    fn cancel_returns_goods_until_delivered() {
        let mut r = route();
        let cfg = LogisticsConfig::default();
        let req = request(&r, 5, 1);
        let a = create_shipment(&mut r.world, &req, &cfg).unwrap();
        cancel_shipment(&mut r.world, a).unwrap();
        assert_eq!(stock(&r, r.from), 50);

        let b = create_shipment(&mut r.world, &req, &cfg).unwrap();
        advance_shipments(&mut r.world, 1, &BTreeMap::new(), &cfg, &mut CashFlows::default())
            .unwrap();
        assert!(matches!(
            cancel_shipment(&mut r.world, b),
            Err(SimError::InvalidState { .. })
        ));
        assert_eq!(stock(&r, r.to), 5);
    }

    #[test]
    fn rejects_bad_requests_without_mutation() {
        let r = route();
        let cfg = LogisticsConfig::default();
        let before = r.world.clone();
        assert!(plan_shipment(&r.world, &request(&r, 0, 1), &cfg).is_err());
        assert!(plan_shipment(&r.world, &request(&r, 5, 0), &cfg).is_err());
        assert!(matches!(
            plan_shipment(&r.world, &request(&r, 51, 1), &cfg),
            Err(SimError::InsufficientInventory { .. })
        ));
        assert_eq!(r.world, before);
    }
}
