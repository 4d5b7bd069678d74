//! Reusable input contracts: bounded-integer sums, ranges and enum
//! membership, plus structural validation of a world snapshot.
//!
//! The same contracts back the workforce allocator and the outer request
//! boundary (CLI flags, command payloads), so a value rejected in one place is
//! rejected everywhere.

use crate::model::*;
use crate::state::WorldState;
use std::collections::BTreeSet;
use thiserror::Error;

/// Validation errors for input contracts and world structure.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// Components must add up to an exact total.
    #[error("{field} components sum to {actual}, expected exactly {expected}")]
    BoundedSum {
        field: &'static str,
        expected: u32,
        actual: u32,
    },
    /// Integer outside its accepted range.
    #[error("{field} must be within [{min}, {max}], got {value}")]
    OutOfRange {
        field: &'static str,
        value: i64,
        min: i64,
        max: i64,
    },
    /// Value is not a member of the accepted set.
    #[error("{field} must be one of [{allowed}], got {value:?}")]
    NotAMember {
        field: &'static str,
        value: String,
        allowed: String,
    },
    /// Required input was not supplied.
    #[error("{0} is required")]
    Missing(&'static str),
    /// Value could not be parsed as an integer.
    #[error("{field} is not an integer: {value:?}")]
    NotAnInteger { field: &'static str, value: String },
    /// Cross-reference to a missing entity.
    #[error("{entity} references missing {target} #{id}")]
    DanglingReference {
        entity: &'static str,
        target: &'static str,
        id: u64,
    },
    /// Entity ids must be unique and ascending.
    #[error("{entity} ids are not strictly ascending at #{id}")]
    UnorderedIds { entity: &'static str, id: u64 },
    /// A ledger field holds an impossible value.
    #[error("{0}")]
    Ledger(String),
}

/// Check that `values` sum to exactly `expected`.
///
/// Each component is implicitly bounded by `expected` since all are unsigned.
pub fn validate_bounded_sum(
    field: &'static str,
    values: &[u8],
    expected: u32,
) -> Result<(), ValidationError> {
    let actual: u32 = values.iter().map(|&v| u32::from(v)).sum();
    if actual != expected {
        return Err(ValidationError::BoundedSum {
            field,
            expected,
            actual,
        });
    }
    Ok(())
}

/// Check that `value` lies in `[min, max]`.
pub fn validate_range(
    field: &'static str,
    value: i64,
    min: i64,
    max: i64,
) -> Result<i64, ValidationError> {
    if value < min || value > max {
        return Err(ValidationError::OutOfRange {
            field,
            value,
            min,
            max,
        });
    }
    Ok(value)
}

/// Parse a raw string as an integer and range-check it.
pub fn parse_bounded_int(
    field: &'static str,
    raw: &str,
    min: i64,
    max: i64,
) -> Result<i64, ValidationError> {
    let value: i64 = raw
        .trim()
        .parse()
        .map_err(|_| ValidationError::NotAnInteger {
            field,
            value: raw.to_string(),
        })?;
    validate_range(field, value, min, max)
}

/// Enums whose members can be named at a request boundary.
pub trait EnumMember: Sized + Copy + 'static {
    /// Accepted spellings, lower-case.
    const MEMBERS: &'static [(&'static str, Self)];
}

/// Resolve `raw` (case-insensitive) to a member of `T`.
pub fn parse_member<T: EnumMember>(field: &'static str, raw: &str) -> Result<T, ValidationError> {
    let needle = raw.trim().to_ascii_lowercase();
    T::MEMBERS
        .iter()
        .find(|(name, _)| *name == needle)
        .map(|(_, v)| *v)
        .ok_or_else(|| ValidationError::NotAMember {
            field,
            value: raw.to_string(),
            allowed: T::MEMBERS
                .iter()
                .map(|(name, _)| *name)
                .collect::<Vec<_>>()
                .join(", "),
        })
}

impl EnumMember for OrderSide {
    const MEMBERS: &'static [(&'static str, Self)] =
        &[("buy", OrderSide::Buy), ("sell", OrderSide::Sell)];
}

/// Validate a workforce allocation: the four percentages sum to exactly 100.
pub fn validate_allocation(a: &WorkforceAllocation) -> Result<(), ValidationError> {
    validate_bounded_sum("workforce allocation", &a.percentages(), 100)
}

fn ascending<T>(
    entity: &'static str,
    items: &[T],
    key: impl Fn(&T) -> u64,
) -> Result<BTreeSet<u64>, ValidationError> {
    let mut seen = BTreeSet::new();
    let mut last: Option<u64> = None;
    for it in items {
        let id = key(it);
        if last.is_some_and(|l| l >= id) {
            return Err(ValidationError::UnorderedIds { entity, id });
        }
        last = Some(id);
        seen.insert(id);
    }
    Ok(seen)
}

fn require(
    ids: &BTreeSet<u64>,
    entity: &'static str,
    target: &'static str,
    id: u64,
) -> Result<(), ValidationError> {
    if !ids.contains(&id) {
        return Err(ValidationError::DanglingReference { entity, target, id });
    }
    Ok(())
}

/// Validate the structure of a world snapshot, including cross-references.
///
/// Seed worlds are checked before they are stored and the SQLite store checks
/// every snapshot it loads. Ledger-level checks belong to the invariant audit.
pub fn validate_world(world: &WorldState) -> Result<(), ValidationError> {
    let regions = ascending("region", &world.regions, |r| r.id.0)?;
    let items = ascending("item", &world.items, |i| i.id.0)?;
    let companies = ascending("company", &world.companies, |c| c.id.0)?;
    let recipes = ascending("recipe", &world.recipes, |r| r.id.0)?;
    let buildings = ascending("building", &world.buildings, |b| b.id.0)?;
    ascending("job", &world.jobs, |j| j.id.0)?;
    ascending("order", &world.orders, |o| o.id.0)?;
    ascending("trade", &world.trades, |t| t.id.0)?;
    ascending("shipment", &world.shipments, |s| s.id.0)?;
    ascending("contract", &world.contracts, |c| c.id.0)?;
    ascending("workforce allocation", &world.allocations, |a| {
        a.company_id.0
    })?;

    for c in &world.companies {
        if c.reserved_cash_cents < 0 {
            return Err(ValidationError::Ledger(format!(
                "{} has negative reserved cash {}",
                c.id, c.reserved_cash_cents
            )));
        }
    }
    for r in &world.recipes {
        require(&items, "recipe", "item", r.output_item.0)?;
        for input in &r.inputs {
            require(&items, "recipe", "item", input.item_id.0)?;
        }
    }
    for b in &world.buildings {
        require(&companies, "building", "company", b.company_id.0)?;
        require(&regions, "building", "region", b.region_id.0)?;
    }
    for j in &world.jobs {
        require(&companies, "job", "company", j.company_id.0)?;
        require(&buildings, "job", "building", j.building_id.0)?;
        require(&recipes, "job", "recipe", j.recipe_id.0)?;
    }
    for o in &world.orders {
        require(&companies, "order", "company", o.company_id.0)?;
        require(&regions, "order", "region", o.region_id.0)?;
        require(&items, "order", "item", o.item_id.0)?;
        if o.remaining > o.quantity {
            return Err(ValidationError::Ledger(format!(
                "{} has remaining {} above quantity {}",
                o.id, o.remaining, o.quantity
            )));
        }
    }
    for s in &world.shipments {
        require(&companies, "shipment", "company", s.company_id.0)?;
        require(&regions, "shipment", "region", s.from_region_id.0)?;
        require(&regions, "shipment", "region", s.to_region_id.0)?;
        require(&items, "shipment", "item", s.item_id.0)?;
    }
    for c in &world.contracts {
        require(&companies, "contract", "company", c.seller_company_id.0)?;
        if let Some(buyer) = c.buyer_company_id {
            require(&companies, "contract", "company", buyer.0)?;
        }
        require(&regions, "contract", "region", c.region_id.0)?;
        require(&items, "contract", "item", c.item_id.0)?;
    }
    for a in &world.allocations {
        require(&companies, "workforce allocation", "company", a.company_id.0)?;
        validate_allocation(a)?;
    }
    for (key, _) in world.inventory.iter() {
        require(&companies, "inventory", "company", key.company_id.0)?;
        require(&regions, "inventory", "region", key.region_id.0)?;
        require(&items, "inventory", "item", key.item_id.0)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::CompanyId;
    use proptest::prelude::*;

    #[test]
    fn bounded_sum_rejects_off_by_one() {
        assert!(validate_bounded_sum("alloc", &[25, 25, 25, 25], 100).is_ok());
        let err = validate_bounded_sum("alloc", &[25, 25, 25, 24], 100).unwrap_err();
        assert_eq!(
            err,
            ValidationError::BoundedSum {
                field: "alloc",
                expected: 100,
                actual: 99
            }
        );
    }

    #[test]
    fn parse_member_is_case_insensitive() {
        assert_eq!(parse_member::<OrderSide>("side", "BUY"), Ok(OrderSide::Buy));
        assert_eq!(
            parse_member::<OrderSide>("side", " sell "),
            Ok(OrderSide::Sell)
        );
        let err = parse_member::<OrderSide>("side", "hold").unwrap_err();
        assert!(err.to_string().contains("buy, sell"));
    }

    #[test]
    fn parse_bounded_int_rejects_garbage_and_range() {
        assert_eq!(parse_bounded_int("ticks", "3", 1, 10), Ok(3));
        assert!(matches!(
            parse_bounded_int("ticks", "three", 1, 10),
            Err(ValidationError::NotAnInteger { .. })
        ));
        assert!(matches!(
            parse_bounded_int("ticks", "0", 1, 10),
            Err(ValidationError::OutOfRange { value: 0, .. })
        ));
    }

    #[test]
    fn empty_world_is_valid() {
        assert!(validate_world(&WorldState::default()).is_ok());
    }

    #[test]
    fn world_with_dangling_building_is_rejected() {
        let mut w = WorldState::default();
        let c = w.add_company("Acme", 1_000, false);
        w.buildings.push(Building {
            id: crate::ids::BuildingId(99),
            company_id: c,
            region_id: crate::ids::RegionId(42),
            kind: "factory".into(),
            status: BuildingStatus::Active,
            capacity: 1,
        });
        assert_eq!(
            validate_world(&w),
            Err(ValidationError::DanglingReference {
                entity: "building",
                target: "region",
                id: 42
            })
        );
    }

    proptest! {
        #[test]
        fn allocation_valid_iff_sums_to_100(a in 0u8..=100, b in 0u8..=100, c in 0u8..=100, d in 0u8..=100) {
            let alloc = WorkforceAllocation {
                company_id: CompanyId(1),
                operations_pct: a,
                research_pct: b,
                logistics_pct: c,
                corporate_pct: d,
            };
            let sum = u32::from(a) + u32::from(b) + u32::from(c) + u32::from(d);
            prop_assert_eq!(validate_allocation(&alloc).is_ok(), sum == 100);
        }
    }
}
