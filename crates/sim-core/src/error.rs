//! Error taxonomy shared by every engine component.

use crate::ids::{CompanyId, ItemId, RegionId};
use crate::validation::ValidationError;
use thiserror::Error;

/// Errors surfaced by engine operations, preflights and commands.
///
/// Every variant is raised before any mutation becomes observable: a failing
/// command leaves the world untouched and a failing tick aborts the whole
/// advancement request.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SimError {
    /// Malformed input caught before any mutation attempt.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    /// Optimistic-lock conflict; the caller may retry from a fresh read.
    #[error("concurrent modification: expected lock version {expected}, found {found}")]
    ConcurrentModification { expected: u64, found: u64 },
    #[error(
        "insufficient funds for {company}: required {required_cents} cents, available {available_cents}"
    )]
    InsufficientFunds {
        company: CompanyId,
        required_cents: i64,
        available_cents: i64,
    },
    #[error(
        "insufficient inventory of {item} for {company} in {region}: required {required}, available {available}"
    )]
    InsufficientInventory {
        company: CompanyId,
        region: RegionId,
        item: ItemId,
        required: u64,
        available: u64,
    },
    /// Operation attempted against an entity in an incompatible lifecycle state.
    #[error("cannot {operation} {entity} #{id} in state {state}")]
    InvalidState {
        entity: &'static str,
        id: u64,
        state: String,
        operation: &'static str,
    },
    #[error("{entity} #{id} not found")]
    NotFound { entity: &'static str, id: u64 },
    #[error("arithmetic overflow while computing {0}")]
    Overflow(&'static str),
    #[error("storage error: {0}")]
    Storage(String),
}

impl SimError {
    /// Only optimistic-lock conflicts are worth retrying unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SimError::ConcurrentModification { .. })
    }

    pub fn invalid(msg: impl Into<String>) -> Self {
        SimError::InvalidRequest(msg.into())
    }

    pub fn not_found(entity: &'static str, id: u64) -> Self {
        SimError::NotFound { entity, id }
    }

    pub fn invalid_state(
        entity: &'static str,
        id: u64,
        state: impl std::fmt::Debug,
        operation: &'static str,
    ) -> Self {
        SimError::InvalidState {
            entity,
            id,
            state: format!("{state:?}"),
            operation,
        }
    }
}

impl From<ValidationError> for SimError {
    fn from(e: ValidationError) -> Self {
        SimError::InvalidRequest(e.to_string())
    }
}

/// Checked `price × quantity` in cents.
pub fn notional(price_cents: i64, quantity: u64) -> Result<i64, SimError> {
    let qty = i64::try_from(quantity).map_err(|_| SimError::Overflow("notional quantity"))?;
    price_cents
        .checked_mul(qty)
        .ok_or(SimError::Overflow("notional value"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_conflicts_are_retryable() {
        let conflict = SimError::ConcurrentModification {
            expected: 3,
            found: 4,
        };
        assert!(conflict.is_retryable());
        assert!(!SimError::invalid("ticks must be positive").is_retryable());
    }

    #[test]
    fn notional_detects_overflow() {
        assert_eq!(notional(95, 5), Ok(475));
        assert_eq!(
            notional(i64::MAX, 2),
            Err(SimError::Overflow("notional value"))
        );
        assert!(notional(1, u64::MAX).is_err());
    }

    #[test]
    fn invalid_state_message_names_operation() {
        let e = SimError::invalid_state("shipment", 9, crate::ShipmentStatus::Delivered, "cancel");
        assert_eq!(e.to_string(), "cannot cancel shipment #9 in state Delivered");
    }
}
