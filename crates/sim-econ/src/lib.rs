#![deny(warnings)]

//! Economic engines for the tick-driven business world.
//!
//! - [`ledger`]: cash reservation and settlement rules shared by every engine
//! - [`orders`]: order placement, cancellation and preflight
//! - [`market`]: price-time priority clearing per `(region, item)` market
//! - [`contracts`]: standing contracts and their per-tick settlement
//! - [`workforce`]: allocation validation and derived multipliers
//!
//! Every function operates on a `sim_core::WorldState` passed in by the
//! caller and returns `sim_core::SimError` on failure.

pub mod contracts;
pub mod ledger;
pub mod market;
pub mod orders;
pub mod workforce;

pub use contracts::*;
pub use ledger::*;
pub use market::*;
pub use orders::*;
pub use workforce::*;
