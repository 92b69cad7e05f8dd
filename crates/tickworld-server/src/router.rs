//! Axum router construction for the world API.

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;
use crate::ws;

/// Build the complete Axum router for the world server.
///
/// The router includes:
/// - `GET /health` -- liveness
/// - `GET /ws` -- `WebSocket` tick stream
/// - `POST /world/create` -- create the world
/// - `POST /world/{worldId}/action` -- submit a signed action
/// - `GET /world/{worldId}/state` -- world counters
/// - `POST /world/{worldId}/destroy` -- tear the world down
///
/// CORS allows any origin so browser-hosted agents can submit directly.
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handlers::health))
        .route("/ws", get(ws::ws_handler))
        .route("/world/create", post(handlers::create_world))
        .route("/world/{world_id}/action", post(handlers::submit_action))
        .route("/world/{world_id}/state", get(handlers::world_state))
        .route("/world/{world_id}/destroy", post(handlers::destroy_world))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
