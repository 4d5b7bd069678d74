//! Workforce allocation and the multipliers derived from it.
//!
//! Multipliers are a pure function of the standing allocation and the
//! configuration; the tick advancer recomputes them at the start of every
//! tick instead of storing them.

use rust_decimal::Decimal;
use serde::Serialize;
use sim_core::{
    validate_allocation, CompanyId, SimError, WorkforceAllocation, WorkforceConfig, WorldState,
};
use std::collections::BTreeMap;

/// Per-function productivity multipliers for one company.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Multipliers {
    pub operations: Decimal,
    pub research: Decimal,
    pub logistics: Decimal,
    pub corporate: Decimal,
}

impl Multipliers {
    pub const NEUTRAL: Multipliers = Multipliers {
        operations: Decimal::ONE,
        research: Decimal::ONE,
        logistics: Decimal::ONE,
        corporate: Decimal::ONE,
    };
}

/// `max(min_multiplier, 1 + (pct − baseline_pct) / 100)`.
pub fn multiplier(pct: u8, cfg: &WorkforceConfig) -> Decimal {
    let delta = Decimal::from(i64::from(pct) - i64::from(cfg.baseline_pct));
    let m = Decimal::ONE + delta / Decimal::ONE_HUNDRED;
    m.max(cfg.min_multiplier)
}

pub fn multipliers_for(allocation: &WorkforceAllocation, cfg: &WorkforceConfig) -> Multipliers {
    Multipliers {
        operations: multiplier(allocation.operations_pct, cfg),
        research: multiplier(allocation.research_pct, cfg),
        logistics: multiplier(allocation.logistics_pct, cfg),
        corporate: multiplier(allocation.corporate_pct, cfg),
    }
}

/// Multipliers for every company in the world. Companies without a standing
/// allocation get [`Multipliers::NEUTRAL`].
pub fn company_multipliers(
    world: &WorldState,
    cfg: &WorkforceConfig,
) -> BTreeMap<CompanyId, Multipliers> {
    world
        .companies
        .iter()
        .map(|c| {
            let m = world
                .allocation_for(c.id)
                .map(|a| multipliers_for(a, cfg))
                .unwrap_or(Multipliers::NEUTRAL);
            (c.id, m)
        })
        .collect()
}

/// Replace a company's standing allocation after validating the sum.
pub fn set_workforce_allocation(
    world: &mut WorldState,
    allocation: WorkforceAllocation,
) -> Result<(), SimError> {
    world.require_company(allocation.company_id)?;
    validate_allocation(&allocation)?;
    world.put_allocation(allocation);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn alloc(company: CompanyId, pcts: [u8; 4]) -> WorkforceAllocation {
        WorkforceAllocation {
            company_id: company,
            operations_pct: pcts[0],
            research_pct: pcts[1],
            logistics_pct: pcts[2],
            corporate_pct: pcts[3],
        }
    }

    #[test]
    fn baseline_maps_to_one() {
        let cfg = WorkforceConfig::default();
        assert_eq!(multiplier(25, &cfg), Decimal::ONE);
        assert_eq!(multiplier(55, &cfg), Decimal::new(130, 2));
        assert_eq!(multiplier(0, &cfg), Decimal::new(75, 2));
    }

    #[test]
    fn floor_applies() {
        let cfg = WorkforceConfig {
            baseline_pct: 90,
            min_multiplier: Decimal::new(25, 2),
        };
        assert_eq!(multiplier(0, &cfg), Decimal::new(25, 2));
    }

    #[test]
    fn missing_allocation_is_neutral() {
        let mut w = WorldState::default();
        let c = w.add_company("C", 0, false);
        let m = company_multipliers(&w, &WorkforceConfig::default());
        assert_eq!(m[&c], Multipliers::NEUTRAL);
    }

    #[test]
    fn allocation_must_sum_to_hundred() {
        let mut w = WorldState::default();
        let c = w.add_company("C", 0, false);
        let before = w.clone();
        let err = set_workforce_allocation(&mut w, alloc(c, [50, 30, 10, 5])).unwrap_err();
        assert!(matches!(err, SimError::InvalidRequest(_)));
        assert_eq!(w, before);

        set_workforce_allocation(&mut w, alloc(c, [70, 10, 10, 10])).unwrap();
        let m = company_multipliers(&w, &WorkforceConfig::default());
        assert_eq!(m[&c].operations, Decimal::new(145, 2));
        assert_eq!(m[&c].logistics, Decimal::new(85, 2));
    }

    proptest! {
        #[test]
        fn multiplier_is_monotonic_and_floored(a in 0u8..=100, b in 0u8..=100) {
            let cfg = WorkforceConfig::default();
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(multiplier(lo, &cfg) <= multiplier(hi, &cfg));
            prop_assert!(multiplier(lo, &cfg) >= cfg.min_multiplier);
        }
    }
}
