//! Shared application state for the world API server.
//!
//! [`AppState`] holds the broadcast channel for `WebSocket` messages and the
//! single active world, if any. The world slot sits behind a read-write
//! lock: admissions and queries take the read side, so they never wait on
//! each other, and only create/destroy take the write side.

use std::sync::Arc;

use serde::Serialize;
use tickworld_core::config::{TickConfig, WorldConfig};
use tickworld_core::engine::ActionRegistry;
use tickworld_core::scheduler::{SchedulerConfig, SchedulerError, TickScheduler, TickSink};
use tickworld_types::{TickReport, WorldId};
use tokio::sync::{RwLock, broadcast};
use tracing::{debug, info};

use crate::error::ApiError;

/// Capacity of the broadcast channel for `WebSocket` messages.
///
/// If a subscriber falls behind by more than this many messages it will
/// receive a [`broadcast::error::RecvError::Lagged`] and skip to the
/// newest message.
const BROADCAST_CAPACITY: usize = 256;

/// JSON message pushed over the `WebSocket`, tagged by `type`.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ServerMessage {
    /// Sent once on connect while a world is active.
    Init {
        /// The active world.
        world_id: WorldId,
        /// Ticks run so far.
        tick_count: u64,
    },
    /// The report of a non-empty tick.
    Tick(TickReport),
    /// The world was torn down.
    Destroyed {
        /// The destroyed world.
        world_id: WorldId,
    },
}

/// [`TickSink`] that republishes every tick report on the broadcast channel.
#[derive(Debug, Clone)]
pub struct BroadcastSink {
    tx: broadcast::Sender<ServerMessage>,
}

impl TickSink for BroadcastSink {
    fn on_tick(&self, report: &TickReport) {
        // send returns Err only when there are zero receivers,
        // which is normal when no WebSocket clients are connected.
        let receivers = self.tx.send(ServerMessage::Tick(report.clone())).unwrap_or(0);
        debug!(tick = report.tick, receivers, "tick report broadcast");
    }
}

/// The world currently hosted by the server.
#[derive(Debug, Clone)]
pub struct ActiveWorld {
    /// Parameters the world was created with.
    pub config: WorldConfig,
    /// The world's admission entry point and tick loop.
    pub scheduler: Arc<TickScheduler<ActionRegistry>>,
}

/// Shared state for the Axum application.
///
/// Wrapped in [`Arc`] and injected via Axum's `State` extractor.
pub struct AppState {
    /// Broadcast sender for `WebSocket` messages.
    pub tx: broadcast::Sender<ServerMessage>,
    /// Timing applied to every world this server creates.
    pub ticks: TickConfig,
    world: RwLock<Option<ActiveWorld>>,
}

impl AppState {
    /// Create a state with no active world.
    pub fn new(ticks: TickConfig) -> Self {
        let (tx, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self {
            tx,
            ticks,
            world: RwLock::new(None),
        }
    }

    /// Subscribe to the `WebSocket` message channel.
    pub fn subscribe(&self) -> broadcast::Receiver<ServerMessage> {
        self.tx.subscribe()
    }

    /// Publish a message to all connected clients.
    ///
    /// Returns the number of receivers that received the message.
    /// Returns 0 if no clients are connected (this is not an error).
    pub fn broadcast(&self, message: ServerMessage) -> usize {
        self.tx.send(message).unwrap_or(0)
    }

    /// The active world, if any.
    pub async fn active(&self) -> Option<ActiveWorld> {
        self.world.read().await.clone()
    }

    /// Resolve the active world by id.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::NoWorld`] if nothing is active, or
    /// [`ApiError::WorldNotFound`] if `world_id` names a different world.
    pub async fn world(&self, world_id: &str) -> Result<ActiveWorld, ApiError> {
        let guard = self.world.read().await;
        let active = guard.as_ref().ok_or(ApiError::NoWorld)?;
        if active.scheduler.world_id().as_str() != world_id {
            return Err(ApiError::WorldNotFound(world_id.to_owned()));
        }
        Ok(active.clone())
    }

    /// Build a world from `config` and start its tick loop.
    ///
    /// Each name in `config.systems` is deployed into the world's
    /// [`ActionRegistry`] with a receipt handler.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::WorldExists`] if a world is already active,
    /// [`ApiError::InvalidRequest`] if the world id is blank, or
    /// [`ApiError::Scheduler`] if the tick loop cannot start.
    pub async fn create_world(&self, config: WorldConfig) -> Result<ActiveWorld, ApiError> {
        if config.world_id.trim().is_empty() {
            return Err(ApiError::InvalidRequest(String::from(
                "worldId must not be empty",
            )));
        }

        let mut slot = self.world.write().await;
        if let Some(active) = slot.as_ref() {
            return Err(ApiError::WorldExists(active.scheduler.world_id().to_string()));
        }

        let sink = Arc::new(BroadcastSink {
            tx: self.tx.clone(),
        });
        let scheduler = Arc::new(TickScheduler::new(
            WorldId::new(config.world_id.clone()),
            ActionRegistry::with_receipts(config.systems.iter().cloned()),
            sink,
            SchedulerConfig::from(&self.ticks),
        ));
        scheduler.start()?;

        info!(
            world_id = %config.world_id,
            grid_size = config.grid_size,
            systems = ?config.systems,
            "world created"
        );

        let active = ActiveWorld { config, scheduler };
        *slot = Some(active.clone());
        Ok(active)
    }

    /// Tear down the world named `world_id`.
    ///
    /// Stops the tick loop and waits for an in-flight tick, drops the queue
    /// and nonce ledger, then tells clients the world is gone.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::NoWorld`] or [`ApiError::WorldNotFound`] as
    /// [`world`](Self::world) does.
    pub async fn destroy_world(&self, world_id: &str) -> Result<(), ApiError> {
        let active = {
            let mut slot = self.world.write().await;
            let current = slot.as_ref().ok_or(ApiError::NoWorld)?;
            if current.scheduler.world_id().as_str() != world_id {
                return Err(ApiError::WorldNotFound(world_id.to_owned()));
            }
            slot.take().ok_or(ApiError::NoWorld)?
        };

        let ticks = stop_scheduler(&active.scheduler).await;
        active.scheduler.clear();

        let world_id = active.scheduler.world_id().clone();
        info!(%world_id, ticks, "world destroyed");
        self.broadcast(ServerMessage::Destroyed { world_id });
        Ok(())
    }

    /// Stop the active world's tick loop, if any, waiting for an in-flight
    /// tick. The world stays registered.
    pub async fn shutdown(&self) {
        if let Some(active) = self.active().await {
            let ticks = stop_scheduler(&active.scheduler).await;
            info!(world_id = %active.scheduler.world_id(), ticks, "world stopped");
        }
    }
}

async fn stop_scheduler(scheduler: &TickScheduler<ActionRegistry>) -> u64 {
    match scheduler.shutdown().await {
        Ok(ticks) => ticks,
        Err(SchedulerError::NotRunning | SchedulerError::AlreadyRunning) => scheduler.tick_count(),
    }
}

impl core::fmt::Debug for AppState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AppState")
            .field("ticks", &self.ticks)
            .field("receivers", &self.tx.receiver_count())
            .finish_non_exhaustive()
    }
}
