//! Cash movement rules shared by market clearing and contract settlement.
//!
//! Internal transfers keep `Σ cash + Σ reserved` unchanged. The only ways
//! money enters or leaves company ledgers are the exogenous flows recorded in
//! [`CashFlows`]: bot liquidity and market-pool payouts in, delivery fees out.
//! Every helper validates before it mutates, so a failed call leaves both
//! parties untouched.

use serde::Serialize;
use sim_core::{notional, CompanyId, SimError, WorldState};

/// Exogenous money flows observed during one tick.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct CashFlows {
    /// Money that entered company ledgers from outside.
    pub inflow_cents: i64,
    /// Money that left company ledgers.
    pub outflow_cents: i64,
}

impl CashFlows {
    pub fn record_inflow(&mut self, cents: i64) -> Result<(), SimError> {
        self.inflow_cents = self
            .inflow_cents
            .checked_add(cents)
            .ok_or(SimError::Overflow("exogenous inflow"))?;
        Ok(())
    }

    pub fn record_outflow(&mut self, cents: i64) -> Result<(), SimError> {
        self.outflow_cents = self
            .outflow_cents
            .checked_add(cents)
            .ok_or(SimError::Overflow("exogenous outflow"))?;
        Ok(())
    }

    /// Expected change of the conserved total.
    pub fn net_cents(&self) -> Option<i64> {
        self.inflow_cents.checked_sub(self.outflow_cents)
    }

    pub fn merge(&mut self, other: CashFlows) -> Result<(), SimError> {
        self.record_inflow(other.inflow_cents)?;
        self.record_outflow(other.outflow_cents)
    }
}

fn checked(v: Option<i64>, what: &'static str) -> Result<i64, SimError> {
    v.ok_or(SimError::Overflow(what))
}

/// Move `amount` from available cash into reserved cash.
pub fn reserve_cash(world: &mut WorldState, company: CompanyId, amount: i64) -> Result<(), SimError> {
    let c = world
        .company_mut(company)
        .ok_or(SimError::not_found("company", company.0))?;
    if amount < 0 {
        return Err(SimError::invalid("reservation must be non-negative"));
    }
    if c.cash_cents < amount {
        return Err(SimError::InsufficientFunds {
            company,
            required_cents: amount,
            available_cents: c.cash_cents,
        });
    }
    let reserved = checked(c.reserved_cash_cents.checked_add(amount), "reserved cash")?;
    c.cash_cents -= amount;
    c.reserved_cash_cents = reserved;
    Ok(())
}

/// Return `amount` of reserved cash to available cash.
pub fn release_reserved(
    world: &mut WorldState,
    company: CompanyId,
    amount: i64,
) -> Result<(), SimError> {
    let c = world
        .company_mut(company)
        .ok_or(SimError::not_found("company", company.0))?;
    if amount < 0 || c.reserved_cash_cents < amount {
        return Err(SimError::InsufficientFunds {
            company,
            required_cents: amount,
            available_cents: c.reserved_cash_cents,
        });
    }
    let cash = checked(c.cash_cents.checked_add(amount), "cash")?;
    c.reserved_cash_cents -= amount;
    c.cash_cents = cash;
    Ok(())
}

/// Outcome of one reserved-cash settlement, in cents.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Settlement {
    /// Taken out of the buyer's reservation.
    pub debited_reserved: i64,
    /// Price improvement handed back to the buyer's available cash.
    pub refunded: i64,
    /// Paid to the seller.
    pub paid: i64,
}

/// Settle `quantity` units reserved at `reserved_price` and executed at
/// `exec_price`.
///
/// The buyer's reservation drops by `quantity × reserved_price`, the
/// difference to the executed price is refunded to the buyer's cash and the
/// seller receives `quantity × exec_price`.
pub fn settle_reserved(
    world: &mut WorldState,
    buyer: CompanyId,
    seller: CompanyId,
    reserved_price: i64,
    exec_price: i64,
    quantity: u64,
) -> Result<Settlement, SimError> {
    if exec_price > reserved_price {
        return Err(SimError::invalid(format!(
            "execution price {exec_price} exceeds reserved price {reserved_price}"
        )));
    }
    let debited_reserved = notional(reserved_price, quantity)?;
    let paid = notional(exec_price, quantity)?;
    let refunded = debited_reserved - paid;

    let b = world.require_company(buyer)?;
    if b.reserved_cash_cents < debited_reserved {
        return Err(SimError::InsufficientFunds {
            company: buyer,
            required_cents: debited_reserved,
            available_cents: b.reserved_cash_cents,
        });
    }
    let buyer_cash = checked(b.cash_cents.checked_add(refunded), "buyer cash")?;
    // A company may trade with itself; its refund and payment then stack.
    let seller_base = if seller == buyer {
        buyer_cash
    } else {
        world.require_company(seller)?.cash_cents
    };
    let seller_cash = checked(seller_base.checked_add(paid), "seller cash")?;

    if let Some(b) = world.company_mut(buyer) {
        b.reserved_cash_cents -= debited_reserved;
        b.cash_cents = buyer_cash;
    }
    if let Some(s) = world.company_mut(seller) {
        s.cash_cents = seller_cash;
    }
    Ok(Settlement {
        debited_reserved,
        refunded,
        paid,
    })
}

/// Credit money arriving from outside the company ledgers.
pub fn credit_exogenous(
    world: &mut WorldState,
    company: CompanyId,
    amount: i64,
    flows: &mut CashFlows,
) -> Result<(), SimError> {
    let c = world
        .company_mut(company)
        .ok_or(SimError::not_found("company", company.0))?;
    c.cash_cents = checked(c.cash_cents.checked_add(amount), "cash")?;
    flows.record_inflow(amount)
}

/// Charge a fee that leaves the system. Cash may go negative.
pub fn charge_fee(
    world: &mut WorldState,
    company: CompanyId,
    amount: i64,
    flows: &mut CashFlows,
) -> Result<(), SimError> {
    let c = world
        .company_mut(company)
        .ok_or(SimError::not_found("company", company.0))?;
    c.cash_cents = checked(c.cash_cents.checked_sub(amount), "cash")?;
    flows.record_outflow(amount)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn world() -> (WorldState, CompanyId, CompanyId) {
        let mut w = WorldState::default();
        let a = w.add_company("Buyer", 1_000, false);
        let b = w.add_company("Seller", 0, false);
        (w, a, b)
    }

    #[test]
    fn reserve_then_release_restores_cash() {
        let (mut w, a, _) = world();
        reserve_cash(&mut w, a, 600).unwrap();
        assert_eq!(w.company(a).unwrap().cash_cents, 400);
        assert_eq!(w.company(a).unwrap().reserved_cash_cents, 600);
        release_reserved(&mut w, a, 600).unwrap();
        assert_eq!(w.company(a).unwrap().cash_cents, 1_000);
        assert_eq!(w.company(a).unwrap().reserved_cash_cents, 0);
    }

    #[test]
    fn over_reservation_leaves_state_untouched() {
        let (mut w, a, _) = world();
        let before = w.clone();
        let err = reserve_cash(&mut w, a, 1_001).unwrap_err();
        assert!(matches!(err, SimError::InsufficientFunds { .. }));
        assert_eq!(w, before);
    }

    #[test]
    fn settlement_refunds_price_improvement() {
        let (mut w, a, b) = world();
        reserve_cash(&mut w, a, 500).unwrap();
        let s = settle_reserved(&mut w, a, b, 100, 95, 5).unwrap();
        assert_eq!(
            s,
            Settlement {
                debited_reserved: 500,
                refunded: 25,
                paid: 475
            }
        );
        let buyer = w.company(a).unwrap();
        assert_eq!(buyer.reserved_cash_cents, 0);
        assert_eq!(buyer.cash_cents, 525);
        assert_eq!(w.company(b).unwrap().cash_cents, 475);
        assert_eq!(w.ledger_total_cents(), Some(1_000));
    }

    #[test]
    fn settlement_without_reservation_fails_cleanly() {
        let (mut w, a, b) = world();
        let before = w.clone();
        assert!(settle_reserved(&mut w, a, b, 10, 10, 1).is_err());
        assert_eq!(w, before);
    }

    #[test]
    fn exogenous_flows_are_recorded() {
        let (mut w, a, b) = world();
        let mut flows = CashFlows::default();
        credit_exogenous(&mut w, b, 300, &mut flows).unwrap();
        charge_fee(&mut w, a, 1_200, &mut flows).unwrap();
        assert_eq!(w.company(a).unwrap().cash_cents, -200);
        assert_eq!(flows.net_cents(), Some(-900));
        assert_eq!(w.ledger_total_cents(), Some(1_000 - 900));
    }
}
