//! Node binary for Tickworld.
//!
//! Loads configuration, starts the world server, and keeps it running until
//! Ctrl-C. On shutdown the active world's tick loop is stopped after any
//! in-flight tick completes.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `tickworld-config.yaml`
//! 2. Initialize structured logging (tracing)
//! 3. Create the shared server state
//! 4. Create the startup world, if configured
//! 5. Serve until Ctrl-C
//! 6. Stop the active world

mod error;

use std::path::PathBuf;
use std::sync::Arc;

use tickworld_core::config::{ConfigError, LogFormat, LoggingConfig, NodeConfig};
use tickworld_server::AppState;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::error::NodeError;

/// Environment variable naming an alternative config file.
const CONFIG_PATH_VAR: &str = "TICKWORLD_CONFIG";

/// Config file read when [`CONFIG_PATH_VAR`] is unset.
const DEFAULT_CONFIG_PATH: &str = "tickworld-config.yaml";

/// Application entry point for the node.
///
/// # Errors
///
/// Returns an error if configuration is invalid, the startup world cannot
/// be created, or the server cannot bind.
#[tokio::main]
async fn main() -> Result<(), NodeError> {
    // 1. Load configuration. Logging is not up yet, so the outcome is
    //    reported once it is.
    let (config, config_source) = load_config()?;

    // 2. Initialize structured logging.
    init_tracing(&config.logging);
    info!(config = %config_source, "tickworld-node starting");
    info!(
        host = %config.server.host,
        port = config.server.port,
        tick_interval_ms = config.ticks.tick_interval_ms,
        execution_timeout_ms = ?config.ticks.execution_timeout_ms,
        "Configuration loaded"
    );

    // 3. Create shared server state.
    let state = Arc::new(AppState::new(config.ticks.clone()));

    // 4. Bootstrap the configured world.
    if let Some(world) = config.world.clone() {
        let active = state.create_world(world).await?;
        info!(world_id = %active.scheduler.world_id(), "Startup world created");
    }

    // 5. Serve until Ctrl-C.
    tickworld_server::start_server(&config.server, Arc::clone(&state), shutdown_signal()).await?;

    // 6. Stop the active world.
    state.shutdown().await;
    info!("tickworld-node stopped");
    Ok(())
}

/// Load the node configuration.
///
/// A missing file is not an error: defaults are used, with environment
/// overrides still applied. Returns the config and a description of where
/// it came from.
fn load_config() -> Result<(NodeConfig, String), ConfigError> {
    let path = std::env::var(CONFIG_PATH_VAR)
        .map_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH), PathBuf::from);

    if path.exists() {
        let config = NodeConfig::from_file(&path)?;
        Ok((config, path.display().to_string()))
    } else {
        let mut config = NodeConfig::default();
        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok((config, String::from("defaults")))
    }
}

fn init_tracing(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    match logging.format {
        LogFormat::Pretty => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for Ctrl-C, shutting down");
    }
    info!("Shutdown signal received");
}
