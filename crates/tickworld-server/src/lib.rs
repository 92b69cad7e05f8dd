//! World API server for Tickworld.
//!
//! This crate provides an Axum HTTP server that hosts one world at a time:
//!
//! - **World lifecycle** (`POST /world/create`, `POST /world/{id}/destroy`)
//! - **Action submission** (`POST /world/{id}/action`) feeding the world's
//!   [`TickScheduler`](tickworld_core::scheduler::TickScheduler)
//! - **State queries** (`GET /world/{id}/state`, `GET /health`)
//! - **`WebSocket` endpoint** (`/ws`) streaming tick reports via
//!   [`tokio::sync::broadcast`]
//!
//! # Architecture
//!
//! Handlers never execute actions. They admit them into the active world's
//! scheduler and return immediately; the scheduler's timer task executes the
//! batch and publishes the [`TickReport`](tickworld_types::TickReport)
//! through [`BroadcastSink`] to every connected `WebSocket` client.

pub mod error;
pub mod handlers;
pub mod router;
pub mod server;
pub mod state;
pub mod ws;

// Re-export primary types for convenience.
pub use error::ApiError;
pub use router::build_router;
pub use server::{ServerError, start_server};
pub use state::{ActiveWorld, AppState, BroadcastSink, ServerMessage};
