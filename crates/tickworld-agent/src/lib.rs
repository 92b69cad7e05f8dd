//! Agent-side client for Tickworld.
//!
//! An agent holds a secret key, signs actions for one world, and submits
//! them over HTTP. Nonces are assigned locally, starting at 0 and increasing
//! by one per signed action.
//!
//! ```text
//! AgentClient::sign_action --> POST /world/{id}/action --> queued for next tick
//! ```

pub mod client;
pub mod config;
pub mod error;

pub use client::{AgentClient, QueuedReceipt};
pub use config::AgentConfig;
pub use error::AgentError;
