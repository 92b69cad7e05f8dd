//! Action admission, nonce ledger, and tick scheduling for Tickworld.
//!
//! This crate owns the pipeline that turns untrusted signed commands into
//! ordered batches executed against a world's state-transition engine:
//!
//! ```text
//! submitter --> admit (signature, world, nonce) --> queue --> tick: flush --> engine
//! ```
//!
//! # Modules
//!
//! - [`signature`] -- Canonical action encoding, [`SignatureVerifier`], and
//!   the matching [`ActionSigner`].
//! - [`queue`] -- [`AdmissionQueue`] with its embedded nonce ledger.
//! - [`engine`] -- The [`ExecutionEngine`] seam and the in-memory
//!   [`ActionRegistry`] engine.
//! - [`scheduler`] -- [`TickScheduler`]: lifecycle, admission entry point,
//!   and the per-tick batch protocol.
//! - [`config`] -- Configuration loading from `tickworld-config.yaml` into
//!   strongly-typed structs.
//!
//! [`SignatureVerifier`]: signature::SignatureVerifier
//! [`ActionSigner`]: signature::ActionSigner
//! [`AdmissionQueue`]: queue::AdmissionQueue
//! [`ExecutionEngine`]: engine::ExecutionEngine
//! [`ActionRegistry`]: engine::ActionRegistry
//! [`TickScheduler`]: scheduler::TickScheduler

pub mod config;
pub mod engine;
pub mod queue;
pub mod scheduler;
pub mod signature;
