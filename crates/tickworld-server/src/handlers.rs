//! REST API endpoint handlers for the world server.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET` | `/health` | Liveness and active world id |
//! | `POST` | `/world/create` | Create and start the world |
//! | `POST` | `/world/{worldId}/action` | Submit a signed action |
//! | `GET` | `/world/{worldId}/state` | Tick count, queue size, deployed actions |
//! | `POST` | `/world/{worldId}/destroy` | Stop and drop the world |

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use serde::Serialize;
use tickworld_core::config::WorldConfig;
use tickworld_types::{SignedAction, WorldId};

use crate::error::ApiError;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Response bodies
// ---------------------------------------------------------------------------

/// Body of `GET /health`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// Always `"ok"`.
    pub status: &'static str,
    /// The active world, if any.
    pub world_id: Option<WorldId>,
}

/// Body of a successful `POST /world/create`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateWorldResponse {
    /// The created world.
    pub world_id: WorldId,
    /// The parameters it was created with.
    pub config: WorldConfig,
    /// Milliseconds between ticks.
    pub tick_rate: u64,
}

/// Body of a successful `POST /world/{worldId}/action`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueuedResponse {
    /// Always `true`.
    pub queued: bool,
    /// Queue length right after admission.
    pub queue_size: usize,
    /// The tick expected to execute the action.
    pub next_tick: u64,
}

/// Body of `GET /world/{worldId}/state`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorldStateResponse {
    /// The world.
    pub world_id: WorldId,
    /// Ticks run so far.
    pub tick_count: u64,
    /// Actions waiting for the next tick.
    pub queue_size: usize,
    /// Nonces committed so far.
    pub committed_nonces: usize,
    /// Whether the tick loop is running.
    pub running: bool,
    /// Deployed action names, sorted.
    pub actions: Vec<String>,
}

/// Body of a successful `POST /world/{worldId}/destroy`.
#[derive(Debug, Serialize)]
pub struct DestroyedResponse {
    /// Always `true`.
    pub destroyed: bool,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// `GET /health`
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let world_id = state
        .active()
        .await
        .map(|active| active.scheduler.world_id().clone());
    Json(HealthResponse {
        status: "ok",
        world_id,
    })
}

/// `POST /world/create`
///
/// # Errors
///
/// `409` if a world is already active, `400` on a malformed body.
pub async fn create_world(
    State(state): State<Arc<AppState>>,
    body: Result<Json<WorldConfig>, JsonRejection>,
) -> Result<Json<CreateWorldResponse>, ApiError> {
    let Json(config) = body.map_err(|e| ApiError::InvalidRequest(e.body_text()))?;
    let active = state.create_world(config).await?;
    Ok(Json(CreateWorldResponse {
        world_id: active.scheduler.world_id().clone(),
        config: active.config,
        tick_rate: state.ticks.tick_interval_ms,
    }))
}

/// `POST /world/{worldId}/action`
///
/// The world is resolved before the body is looked at, so a request for a
/// missing world is a `404` whatever it carries.
///
/// # Errors
///
/// `404` if the world is not active, `400` on a malformed body or a
/// rejected admission.
pub async fn submit_action(
    State(state): State<Arc<AppState>>,
    Path(world_id): Path<String>,
    body: Result<Json<SignedAction>, JsonRejection>,
) -> Result<Json<QueuedResponse>, ApiError> {
    let active = state.world(&world_id).await?;
    let Json(action) = body.map_err(|e| ApiError::InvalidRequest(e.body_text()))?;
    let admission = active.scheduler.admit(action)?;
    Ok(Json(QueuedResponse {
        queued: true,
        queue_size: admission.queue_size,
        next_tick: admission.next_tick,
    }))
}

/// `GET /world/{worldId}/state`
///
/// # Errors
///
/// `404` if the world is not active.
pub async fn world_state(
    State(state): State<Arc<AppState>>,
    Path(world_id): Path<String>,
) -> Result<Json<WorldStateResponse>, ApiError> {
    let active = state.world(&world_id).await?;
    let scheduler = &active.scheduler;
    Ok(Json(WorldStateResponse {
        world_id: scheduler.world_id().clone(),
        tick_count: scheduler.tick_count(),
        queue_size: scheduler.queue_size(),
        committed_nonces: scheduler.committed_nonce_count(),
        running: scheduler.is_running(),
        actions: scheduler.engine().deployed(),
    }))
}

/// `POST /world/{worldId}/destroy`
///
/// # Errors
///
/// `404` if the world is not active.
pub async fn destroy_world(
    State(state): State<Arc<AppState>>,
    Path(world_id): Path<String>,
) -> Result<Json<DestroyedResponse>, ApiError> {
    state.destroy_world(&world_id).await?;
    Ok(Json(DestroyedResponse { destroyed: true }))
}
