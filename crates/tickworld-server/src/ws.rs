//! `WebSocket` handler for real-time tick streaming.
//!
//! Clients connect to `GET /ws`. While a world is active the first frame is
//! an `init` message with the world id and current tick count; after that
//! every [`ServerMessage`] published on the broadcast channel is forwarded
//! as a JSON text frame.
//!
//! If a client falls behind, lagged messages are skipped and the client
//! resumes from the most recent one.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::state::{AppState, ServerMessage};

/// Upgrade an HTTP request to a `WebSocket` connection and begin
/// streaming world messages.
///
/// # Route
///
/// `GET /ws`
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_ws(socket, state))
}

async fn send_json(socket: &mut WebSocket, message: &ServerMessage) -> bool {
    let json = match serde_json::to_string(message) {
        Ok(j) => j,
        Err(e) => {
            warn!("Failed to serialize server message: {e}");
            return true;
        }
    };
    socket.send(Message::Text(json.into())).await.is_ok()
}

async fn handle_ws(mut socket: WebSocket, state: Arc<AppState>) {
    let client_id = Uuid::now_v7();
    debug!(%client_id, "WebSocket client connected");

    // Subscribe before reading the world so no tick falls between the
    // init frame and the stream.
    let mut rx = state.subscribe();

    if let Some(active) = state.active().await {
        let init = ServerMessage::Init {
            world_id: active.scheduler.world_id().clone(),
            tick_count: active.scheduler.tick_count(),
        };
        if !send_json(&mut socket, &init).await {
            debug!(%client_id, "WebSocket client disconnected (init failed)");
            return;
        }
    }

    loop {
        tokio::select! {
            result = rx.recv() => {
                match result {
                    Ok(message) => {
                        if !send_json(&mut socket, &message).await {
                            debug!(%client_id, "WebSocket client disconnected (send failed)");
                            return;
                        }
                    }
                    Err(RecvError::Lagged(n)) => {
                        debug!(%client_id, skipped = n, "WebSocket client lagged, skipping ahead");
                    }
                    Err(RecvError::Closed) => {
                        debug!(%client_id, "Broadcast channel closed, shutting down WebSocket");
                        return;
                    }
                }
            }
            msg = socket.recv() => {
                match msg {
                    Some(Ok(Message::Close(_))) | None => {
                        debug!(%client_id, "WebSocket client disconnected");
                        return;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if socket.send(Message::Pong(data)).await.is_err() {
                            debug!(%client_id, "WebSocket client disconnected (pong failed)");
                            return;
                        }
                    }
                    Some(Err(e)) => {
                        debug!(%client_id, "WebSocket error: {e}");
                        return;
                    }
                    // Clients have nothing to say on this socket.
                    _ => {}
                }
            }
        }
    }
}
