//! Read-only invariant audit of a committed snapshot.
//!
//! Findings are reported, never corrected.

use serde::Serialize;
use sim_core::{validate_allocation, CompanyId, OrderSide, OrderStatus, Tick, WorldState};
use std::collections::BTreeMap;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    NegativeReservedCash,
    RemainingExceedsQuantity,
    FilledStatusMismatch,
    AllocationSum,
    ReservationMismatch,
    ContractOverfulfilled,
    SumOverflow,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvariantIssue {
    pub kind: IssueKind,
    pub entity: &'static str,
    pub id: u64,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditReport {
    pub current_tick: Tick,
    pub lock_version: u64,
    /// `None` when the sum overflows.
    pub sum_cash_cents: Option<i64>,
    pub sum_reserved_cash_cents: Option<i64>,
    pub issues: Vec<InvariantIssue>,
    pub truncated: bool,
}

impl AuditReport {
    pub fn has_violations(&self) -> bool {
        !self.issues.is_empty() || self.truncated
    }
}

struct Sink {
    limit: usize,
    issues: Vec<InvariantIssue>,
    truncated: bool,
}

impl Sink {
    fn push(&mut self, kind: IssueKind, entity: &'static str, id: u64, detail: String) {
        if self.issues.len() < self.limit {
            self.issues.push(InvariantIssue {
                kind,
                entity,
                id,
                detail,
            });
        } else {
            self.truncated = true;
        }
    }
}

/// Audit `world`, reporting at most `issue_limit` issues.
pub fn audit(world: &WorldState, issue_limit: usize) -> AuditReport {
    let mut sink = Sink {
        limit: issue_limit,
        issues: Vec::new(),
        truncated: false,
    };

    let sum_cash_cents = world.sum_cash_cents();
    let sum_reserved_cash_cents = world.sum_reserved_cash_cents();
    if sum_cash_cents.is_none() || sum_reserved_cash_cents.is_none() {
        sink.push(
            IssueKind::SumOverflow,
            "world",
            0,
            "ledger sums overflow i64".to_string(),
        );
    }

    for c in &world.companies {
        if c.reserved_cash_cents < 0 {
            sink.push(
                IssueKind::NegativeReservedCash,
                "company",
                c.id.0,
                format!("reserved cash is {}", c.reserved_cash_cents),
            );
        }
    }

    // Outstanding obligations backing each company's reservation.
    let mut obligations: BTreeMap<CompanyId, i128> = BTreeMap::new();
    for o in &world.orders {
        if o.remaining > o.quantity {
            sink.push(
                IssueKind::RemainingExceedsQuantity,
                "order",
                o.id.0,
                format!("remaining {} exceeds quantity {}", o.remaining, o.quantity),
            );
        }
        if (o.status == OrderStatus::Filled) != (o.remaining == 0) {
            sink.push(
                IssueKind::FilledStatusMismatch,
                "order",
                o.id.0,
                format!("status {:?} with remaining {}", o.status, o.remaining),
            );
        }
        if o.side == OrderSide::Buy && o.status.is_open() {
            *obligations.entry(o.company_id).or_default() +=
                i128::from(o.price_cents) * i128::from(o.remaining);
        }
    }
    for c in &world.contracts {
        if c.fulfilled > c.quantity {
            sink.push(
                IssueKind::ContractOverfulfilled,
                "contract",
                c.id.0,
                format!("fulfilled {} exceeds quantity {}", c.fulfilled, c.quantity),
            );
        }
        if let Some(buyer) = c.buyer_company_id.filter(|_| c.status.is_open()) {
            *obligations.entry(buyer).or_default() +=
                i128::from(c.price_cents) * i128::from(c.outstanding());
        }
    }
    for c in &world.companies {
        let owed = obligations.get(&c.id).copied().unwrap_or(0);
        if i128::from(c.reserved_cash_cents) != owed {
            sink.push(
                IssueKind::ReservationMismatch,
                "company",
                c.id.0,
                format!(
                    "reserved {} but open obligations total {}",
                    c.reserved_cash_cents, owed
                ),
            );
        }
    }

    for a in &world.allocations {
        if let Err(e) = validate_allocation(a) {
            sink.push(IssueKind::AllocationSum, "allocation", a.company_id.0, e.to_string());
        }
    }

    AuditReport {
        current_tick: world.clock.current_tick,
        lock_version: world.clock.lock_version,
        sum_cash_cents,
        sum_reserved_cash_cents,
        issues: sink.issues,
        truncated: sink.truncated,
    }
}
