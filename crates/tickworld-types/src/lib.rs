//! Shared wire types for the Tickworld action pipeline.
//!
//! This crate is the single source of truth for the payloads exchanged
//! between submitters, the world server, and the tick scheduler.
//!
//! # Modules
//!
//! - [`ids`] -- World identifiers and fixed-width agent addresses
//! - [`params`] -- The closed set of action parameter values
//! - [`actions`] -- Signed actions and per-tick execution reports

pub mod actions;
pub mod ids;
pub mod params;

// Re-export all public types at crate root for convenience.
pub use actions::{ActionOutcome, ActionReport, SignedAction, TickReport};
pub use ids::{AddressParseError, AgentAddress, WorldId, ADDRESS_LEN};
pub use params::ParamValue;
