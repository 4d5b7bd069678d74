#![deny(warnings)]

//! Operational CLI: seed a world, advance it and inspect its health.
//!
//! ```text
//! cli init          [--seed <n>]
//! cli advance       [--ticks <n>]            (default 1)
//! cli health        [--invariant-limit <n>]  (default 20)
//! cli state
//! cli order         --company <id> --region <id> --item <id> --side <buy|sell>
//!                   --price <cents> --qty <n>
//! cli cancel-order  --order <id>
//! common:           [--db <url>] [--config <path>]
//! ```
//!
//! Flag values are validated before the engine is touched; invalid input
//! exits with status 2.

use anyhow::{Context, Result};
use persistence::{default_sqlite_url, BlockingSqliteStore};
use serde::Serialize;
use sim_core::{
    parse_bounded_int, parse_member, CompanyId, EngineConfig, ItemId, OrderId, OrderSide,
    RegionId, ValidationError,
};
use sim_econ::OrderRequest;
use sim_runtime::{demo_world, load_config, HealthOptions, ScenarioParams, Simulation, WorldTickState};
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::EnvFilter;

const MAX_ISSUE_LIMIT: i64 = 10_000;

#[derive(Clone, Debug, PartialEq, Eq)]
enum Command {
    Init { seed: u64 },
    Advance { ticks: i64 },
    Health { invariant_limit: usize },
    State,
    Order(OrderRequest),
    CancelOrder { order: OrderId },
    Version,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
struct RawArgs {
    command: String,
    ticks: Option<String>,
    invariant_limit: Option<String>,
    seed: Option<String>,
    company: Option<String>,
    region: Option<String>,
    item: Option<String>,
    side: Option<String>,
    price: Option<String>,
    qty: Option<String>,
    order: Option<String>,
    db: Option<String>,
    config: Option<PathBuf>,
}

fn parse_args(mut it: impl Iterator<Item = String>) -> Result<RawArgs, String> {
    let command = it
        .next()
        .ok_or("missing command (init|advance|health|state|order|cancel-order)")?;
    let mut raw = RawArgs {
        command,
        ..RawArgs::default()
    };
    while let Some(arg) = it.next() {
        let mut value = |flag: &str| it.next().ok_or(format!("{flag} needs a value"));
        match arg.as_str() {
            "--ticks" => raw.ticks = Some(value("--ticks")?),
            "--invariant-limit" => raw.invariant_limit = Some(value("--invariant-limit")?),
            "--seed" => raw.seed = Some(value("--seed")?),
            "--company" => raw.company = Some(value("--company")?),
            "--region" => raw.region = Some(value("--region")?),
            "--item" => raw.item = Some(value("--item")?),
            "--side" => raw.side = Some(value("--side")?),
            "--price" => raw.price = Some(value("--price")?),
            "--qty" => raw.qty = Some(value("--qty")?),
            "--order" => raw.order = Some(value("--order")?),
            "--db" => raw.db = Some(value("--db")?),
            "--config" => raw.config = Some(PathBuf::from(value("--config")?)),
            other => return Err(format!("unknown argument {other}")),
        }
    }
    Ok(raw)
}

fn required<'a>(field: &'static str, raw: &'a Option<String>) -> Result<&'a str, ValidationError> {
    raw.as_deref().ok_or(ValidationError::Missing(field))
}

fn positive(field: &'static str, raw: &Option<String>) -> Result<u64, ValidationError> {
    let n = parse_bounded_int(field, required(field, raw)?, 1, i64::MAX)?;
    Ok(n.unsigned_abs())
}

/// Turn raw flags into a validated command.
fn validate(raw: &RawArgs, cfg: &EngineConfig) -> Result<Command, ValidationError> {
    match raw.command.as_str() {
        "init" => {
            let seed = match &raw.seed {
                Some(s) => parse_bounded_int("seed", s, 0, i64::MAX)?,
                None => 42,
            };
            Ok(Command::Init {
                seed: seed.unsigned_abs(),
            })
        }
        "advance" => {
            let ticks = match &raw.ticks {
                Some(s) => {
                    parse_bounded_int("ticks", s, 1, i64::from(cfg.max_ticks_per_request))?
                }
                None => 1,
            };
            Ok(Command::Advance { ticks })
        }
        "health" => {
            let limit = match &raw.invariant_limit {
                Some(s) => parse_bounded_int("invariant-limit", s, 0, MAX_ISSUE_LIMIT)?,
                None => 20,
            };
            Ok(Command::Health {
                invariant_limit: usize::try_from(limit).unwrap_or_default(),
            })
        }
        "state" => Ok(Command::State),
        "order" => Ok(Command::Order(OrderRequest {
            company_id: CompanyId(positive("company", &raw.company)?),
            region_id: RegionId(positive("region", &raw.region)?),
            item_id: ItemId(positive("item", &raw.item)?),
            side: parse_member::<OrderSide>("side", required("side", &raw.side)?)?,
            price_cents: parse_bounded_int("price", required("price", &raw.price)?, 1, i64::MAX)?,
            quantity: positive("qty", &raw.qty)?,
        })),
        "cancel-order" => Ok(Command::CancelOrder {
            order: OrderId(positive("order", &raw.order)?),
        }),
        "version" | "--version" => Ok(Command::Version),
        other => Err(ValidationError::NotAMember {
            field: "command",
            value: other.to_string(),
            allowed: "init, advance, health, state, order, cancel-order, version".to_string(),
        }),
    }
}

fn ensure_db_dir(url: &str) -> Result<()> {
    let path = url
        .strip_prefix("sqlite://")
        .or_else(|| url.strip_prefix("sqlite:"));
    if let Some(parent) = path.and_then(|p| std::path::Path::new(p).parent()) {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
    }
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn open_store(db: &str) -> Result<BlockingSqliteStore> {
    ensure_db_dir(db)?;
    Ok(BlockingSqliteStore::connect(db)?)
}

fn open_simulation(db: &str, cfg: &EngineConfig) -> Result<Simulation<BlockingSqliteStore>> {
    Ok(Simulation::new(open_store(db)?, cfg.clone())?)
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct OrderPlaced {
    order_id: OrderId,
}

fn run(command: Command, db: &str, cfg: &EngineConfig) -> Result<()> {
    match command {
        Command::Version => {
            println!(
                "cli {} (git {}, built {})",
                env!("CARGO_PKG_VERSION"),
                env!("GIT_SHA"),
                env!("BUILD_DATE")
            );
        }
        Command::Init { seed } => {
            let store = open_store(db)?;
            let world = demo_world(seed, &ScenarioParams::default())?;
            store.init_world(&world)?;
            print_json(&WorldTickState::from(&world))?;
        }
        Command::Advance { ticks } => {
            let result = open_simulation(db, cfg)?.advance_simulation_ticks(ticks)?;
            info!(ticks, to = result.to_tick, "advance committed");
            print_json(&result)?;
        }
        Command::Health { invariant_limit } => {
            let health = open_simulation(db, cfg)?.get_simulation_health(&HealthOptions {
                invariant_issue_limit: Some(invariant_limit),
            })?;
            print_json(&health)?;
        }
        Command::State => {
            print_json(&open_simulation(db, cfg)?.get_world_tick_state()?)?;
        }
        Command::Order(req) => {
            let order_id = open_simulation(db, cfg)?.place_order(&req)?;
            print_json(&OrderPlaced { order_id })?;
        }
        Command::CancelOrder { order } => {
            open_simulation(db, cfg)?.cancel_order(order)?;
            info!(%order, "order cancelled");
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    // Logging setup
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_max_level(Level::INFO)
        .with_writer(std::io::stderr)
        .init();

    let raw = match parse_args(std::env::args().skip(1)) {
        Ok(raw) => raw,
        Err(msg) => {
            eprintln!("error: {msg}");
            std::process::exit(2);
        }
    };
    let cfg = match &raw.config {
        Some(path) => load_config(path).with_context(|| format!("loading {}", path.display()))?,
        None => EngineConfig::default(),
    };
    let command = match validate(&raw, &cfg) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(2);
        }
    };
    let db = raw.db.clone().unwrap_or_else(|| default_sqlite_url().to_string());
    info!(?command, db = %db, "starting CLI");
    run(command, &db, &cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(s: &str) -> impl Iterator<Item = String> + '_ {
        s.split_whitespace().map(str::to_string)
    }

    fn command(s: &str) -> Result<Command, ValidationError> {
        let raw = parse_args(args(s)).unwrap();
        validate(&raw, &EngineConfig::default())
    }

    #[test]
    fn defaults_apply() {
        assert_eq!(command("advance").unwrap(), Command::Advance { ticks: 1 });
        assert_eq!(
            command("health").unwrap(),
            Command::Health {
                invariant_limit: 20
            }
        );
        assert_eq!(command("init").unwrap(), Command::Init { seed: 42 });
    }

    #[test]
    fn explicit_values_are_parsed() {
        assert_eq!(
            command("advance --ticks 12").unwrap(),
            Command::Advance { ticks: 12 }
        );
        assert_eq!(
            command("health --invariant-limit 0").unwrap(),
            Command::Health { invariant_limit: 0 }
        );
    }

    #[test]
    fn order_flags_resolve_side_by_name() {
        assert_eq!(
            command("order --company 7 --region 1 --item 3 --side SELL --price 95 --qty 5").unwrap(),
            Command::Order(OrderRequest {
                company_id: CompanyId(7),
                region_id: RegionId(1),
                item_id: ItemId(3),
                side: OrderSide::Sell,
                price_cents: 95,
                quantity: 5,
            })
        );
        assert_eq!(
            command("cancel-order --order 12").unwrap(),
            Command::CancelOrder { order: OrderId(12) }
        );
    }

    #[test]
    fn invalid_values_fail_before_the_engine() {
        assert!(matches!(
            command("advance --ticks 0"),
            Err(ValidationError::OutOfRange { .. })
        ));
        assert!(matches!(
            command("advance --ticks -3"),
            Err(ValidationError::OutOfRange { .. })
        ));
        assert!(matches!(
            command("advance --ticks abc"),
            Err(ValidationError::NotAnInteger { .. })
        ));
        assert!(matches!(
            command("health --invariant-limit -1"),
            Err(ValidationError::OutOfRange { .. })
        ));
        assert!(matches!(
            command("order --company 7 --region 1 --item 3 --side hold --price 95 --qty 5"),
            Err(ValidationError::NotAMember { .. })
        ));
        assert!(matches!(
            command("order --company 7 --region 1 --item 3 --side buy --qty 5"),
            Err(ValidationError::Missing("price"))
        ));
        assert!(matches!(
            command("explode"),
            Err(ValidationError::NotAMember { .. })
        ));
    }

    #[test]
    fn malformed_flags_are_rejected() {
        assert!(parse_args(args("advance --ticks")).is_err());
        assert!(parse_args(args("advance --fast")).is_err());
        assert!(parse_args(args("")).is_err());
    }
}
