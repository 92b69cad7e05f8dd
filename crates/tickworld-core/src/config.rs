//! Configuration loading and typed config structures for a Tickworld node.
//!
//! The canonical configuration lives in `tickworld-config.yaml`. This module
//! defines strongly-typed structs that mirror the YAML structure and a
//! loader that reads and validates the file. Every section is optional and
//! falls back to the defaults below.
//!
//! ```yaml
//! server:
//!   host: 0.0.0.0
//!   port: 3000
//! ticks:
//!   tick_interval_ms: 1000
//!   execution_timeout_ms: 5000
//! logging:
//!   level: info
//!   format: json
//! world:
//!   worldId: arena-1
//!   gridSize: 10
//!   systems: [AgentRegistry, Movement]
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// A value parsed but is out of range.
    #[error("invalid configuration: {reason}")]
    Invalid {
        /// Explanation of what is wrong with the configuration.
        reason: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level node configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct NodeConfig {
    /// HTTP/WebSocket listener settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Tick scheduler settings.
    #[serde(default)]
    pub ticks: TickConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// World to create at startup, if any.
    #[serde(default)]
    pub world: Option<WorldConfig>,
}

impl NodeConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// Environment variables override YAML values:
    /// - `TICKWORLD_HOST` overrides `server.host`
    /// - `TICKWORLD_PORT` overrides `server.port`
    /// - `TICKWORLD_TICK_INTERVAL_MS` overrides `ticks.tick_interval_ms`
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Yaml`] if the content is not valid YAML, or
    /// [`ConfigError::Invalid`] if a value is out of range.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string, then apply environment
    /// overrides and validate.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML, or
    /// [`ConfigError::Invalid`] if a value is out of range.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let mut config: Self = serde_yml::from_str(yaml)?;
        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from a variable lookup (the process environment in
    /// production). Unparseable numeric values are logged and ignored.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(val) = lookup("TICKWORLD_HOST") {
            self.server.host = val;
        }
        if let Some(val) = lookup("TICKWORLD_PORT") {
            match val.parse() {
                Ok(port) => self.server.port = port,
                Err(e) => warn!(value = %val, error = %e, "ignoring invalid TICKWORLD_PORT"),
            }
        }
        if let Some(val) = lookup("TICKWORLD_TICK_INTERVAL_MS") {
            match val.parse() {
                Ok(ms) => self.ticks.tick_interval_ms = ms,
                Err(e) => {
                    warn!(value = %val, error = %e, "ignoring invalid TICKWORLD_TICK_INTERVAL_MS");
                }
            }
        }
    }

    /// Check value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if the tick interval or execution
    /// timeout is zero, or the bootstrap world id is empty.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ticks.tick_interval_ms == 0 {
            return Err(ConfigError::Invalid {
                reason: "ticks.tick_interval_ms must be at least 1".to_owned(),
            });
        }
        if self.ticks.execution_timeout_ms == Some(0) {
            return Err(ConfigError::Invalid {
                reason: "ticks.execution_timeout_ms must be at least 1 when set".to_owned(),
            });
        }
        if self
            .world
            .as_ref()
            .is_some_and(|world| world.world_id.trim().is_empty())
        {
            return Err(ConfigError::Invalid {
                reason: "world.worldId must not be empty".to_owned(),
            });
        }
        Ok(())
    }
}

/// HTTP listener configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServerConfig {
    /// Address to bind.
    #[serde(default = "default_host")]
    pub host: String,

    /// TCP port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Tick scheduler configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TickConfig {
    /// Real-time milliseconds between ticks.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// Per-action execution deadline in milliseconds. Unset means a slow
    /// engine call stalls its tick until it completes.
    #[serde(default)]
    pub execution_timeout_ms: Option<u64>,
}

impl TickConfig {
    /// The tick period as a [`Duration`].
    pub const fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    /// The per-action deadline, if configured.
    pub fn execution_timeout(&self) -> Option<Duration> {
        self.execution_timeout_ms.map(Duration::from_millis)
    }
}

impl Default for TickConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
            execution_timeout_ms: None,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Pretty,
    /// One JSON object per line.
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive (trace, debug, info, warn, error).
    /// `RUST_LOG` takes precedence when set.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format.
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

/// Parameters of a world. Also the body of `POST /world/create`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorldConfig {
    /// Identifier every admitted action must be addressed to.
    #[serde(alias = "world_id")]
    pub world_id: String,

    /// Side length of the world grid, passed through to the engine.
    #[serde(default = "default_grid_size", alias = "grid_size")]
    pub grid_size: u32,

    /// Action names to deploy into the world's engine.
    #[serde(default)]
    pub systems: Vec<String>,
}

// ---------------------------------------------------------------------------
// Default value functions (serde default requires named functions)
// ---------------------------------------------------------------------------

fn default_host() -> String {
    "0.0.0.0".to_owned()
}

const fn default_port() -> u16 {
    3000
}

const fn default_tick_interval_ms() -> u64 {
    1_000
}

fn default_log_level() -> String {
    "info".to_owned()
}

const fn default_grid_size() -> u32 {
    10
}
