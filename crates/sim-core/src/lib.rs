#![deny(warnings)]

//! Core domain model for the tick-driven business world.
//!
//! This crate defines the serializable world snapshot, entity types and the
//! error taxonomy shared by every engine, together with reusable validation
//! contracts (bounded sums, ranges, enum membership) applied both inside the
//! engine and at its request boundary.

pub mod config;
pub mod error;
pub mod ids;
pub mod model;
pub mod state;
pub mod validation;

pub use config::*;
pub use error::*;
pub use ids::*;
pub use model::*;
pub use state::*;
pub use validation::*;
