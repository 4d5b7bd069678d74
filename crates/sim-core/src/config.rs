//! Engine configuration.
//!
//! Every field has a default so a partial YAML document (or none at all)
//! yields a working engine. Money is in cents; multipliers use [`Decimal`].

use crate::validation::ValidationError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Top-level engine configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Upper bound on ticks accepted by one advancement request.
    pub max_ticks_per_request: u32,
    pub production: ProductionConfig,
    pub workforce: WorkforceConfig,
    pub logistics: LogisticsConfig,
    pub bots: BotConfig,
    pub health: HealthConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_ticks_per_request: 10_000,
            production: ProductionConfig::default(),
            workforce: WorkforceConfig::default(),
            logistics: LogisticsConfig::default(),
            bots: BotConfig::default(),
            health: HealthConfig::default(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProductionConfig {
    /// Progress points a job gains per tick at a 1.0 operations multiplier.
    pub base_progress_per_tick: u32,
}

impl Default for ProductionConfig {
    fn default() -> Self {
        Self {
            base_progress_per_tick: 10,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkforceConfig {
    /// Allocation percentage that maps to a 1.0 multiplier.
    pub baseline_pct: u8,
    /// Floor applied to every multiplier.
    pub min_multiplier: Decimal,
}

impl Default for WorkforceConfig {
    fn default() -> Self {
        Self {
            baseline_pct: 25,
            min_multiplier: Decimal::new(25, 2),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogisticsConfig {
    /// Delivery fee per unit at a 1.0 logistics multiplier. Paid out of the system.
    pub fee_cents_per_unit: i64,
    /// Shortest allowed transit time.
    pub min_transit_ticks: u64,
}

impl Default for LogisticsConfig {
    fn default() -> Self {
        Self {
            fee_cents_per_unit: 2,
            min_transit_ticks: 1,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    /// Cash injected into every bot company each tick.
    pub liquidity_cents_per_tick: i64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthConfig {
    /// Window used for the recent-trades count.
    pub trades_window_ticks: u64,
    /// Issue cap when the caller does not pass one.
    pub default_issue_limit: usize,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            trades_window_ticks: 100,
            default_issue_limit: 20,
        }
    }
}

/// Validate configuration ranges.
pub fn validate_config(cfg: &EngineConfig) -> Result<(), ValidationError> {
    let out_of_range = |field: &'static str, value: i64, min: i64, max: i64| {
        ValidationError::OutOfRange {
            field,
            value,
            min,
            max,
        }
    };
    if cfg.max_ticks_per_request == 0 {
        return Err(out_of_range("max_ticks_per_request", 0, 1, i64::from(u32::MAX)));
    }
    if cfg.production.base_progress_per_tick == 0 {
        return Err(out_of_range(
            "production.base_progress_per_tick",
            0,
            1,
            i64::from(u32::MAX),
        ));
    }
    if cfg.workforce.baseline_pct > 100 {
        return Err(out_of_range(
            "workforce.baseline_pct",
            i64::from(cfg.workforce.baseline_pct),
            0,
            100,
        ));
    }
    if cfg.workforce.min_multiplier <= Decimal::ZERO {
        return Err(ValidationError::Ledger(
            "workforce.min_multiplier must be > 0".to_string(),
        ));
    }
    if cfg.logistics.fee_cents_per_unit < 0 {
        return Err(out_of_range(
            "logistics.fee_cents_per_unit",
            cfg.logistics.fee_cents_per_unit,
            0,
            i64::MAX,
        ));
    }
    if cfg.logistics.min_transit_ticks == 0 {
        return Err(out_of_range("logistics.min_transit_ticks", 0, 1, i64::MAX));
    }
    if cfg.bots.liquidity_cents_per_tick < 0 {
        return Err(out_of_range(
            "bots.liquidity_cents_per_tick",
            cfg.bots.liquidity_cents_per_tick,
            0,
            i64::MAX,
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(validate_config(&EngineConfig::default()).is_ok());
    }

    #[test]
    fn partial_json_fills_defaults() {
        let cfg: EngineConfig =
            serde_json::from_str(r#"{"logistics":{"fee_cents_per_unit":0}}"#).unwrap();
        assert_eq!(cfg.logistics.fee_cents_per_unit, 0);
        assert_eq!(cfg.logistics.min_transit_ticks, 1);
        assert_eq!(cfg.production.base_progress_per_tick, 10);
        assert_eq!(cfg.health.trades_window_ticks, 100);
    }

    #[test]
    fn zero_progress_is_rejected() {
        let mut cfg = EngineConfig::default();
        cfg.production.base_progress_per_tick = 0;
        assert!(validate_config(&cfg).is_err());
    }
}
