//! Configuration for the agent binary.
//!
//! All configuration is loaded from environment variables:
//!
//! - `TICKWORLD_SERVER_URL` -- world server base URL (default `http://localhost:3000`)
//! - `TICKWORLD_WORLD_ID` -- world to submit to (required for submissions)
//! - `TICKWORLD_AGENT_KEY` -- hex secret key (a fresh key is generated if unset)
//! - `TICKWORLD_AGENT_NONCE` -- first nonce to sign with (defaults to the
//!   current Unix time in microseconds, so successive runs with one key
//!   never reuse a nonce)

use chrono::Utc;
use tickworld_core::signature::ActionSigner;
use tickworld_types::WorldId;

use crate::error::AgentError;

const DEFAULT_SERVER_URL: &str = "http://localhost:3000";

/// Agent configuration loaded from the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentConfig {
    /// World server base URL.
    pub server_url: String,
    /// World to submit to.
    pub world_id: Option<String>,
    /// Hex-encoded secret key.
    pub agent_key: Option<String>,
    /// Explicit first nonce.
    pub agent_nonce: Option<String>,
}

impl AgentConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        Self {
            server_url: non_empty("TICKWORLD_SERVER_URL")
                .unwrap_or_else(|| DEFAULT_SERVER_URL.to_owned()),
            world_id: non_empty("TICKWORLD_WORLD_ID"),
            agent_key: non_empty("TICKWORLD_AGENT_KEY"),
            agent_nonce: non_empty("TICKWORLD_AGENT_NONCE"),
        }
    }

    /// The configured world.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::Config`] if `TICKWORLD_WORLD_ID` is unset.
    pub fn world_id(&self) -> Result<WorldId, AgentError> {
        self.world_id
            .as_deref()
            .map(WorldId::from)
            .ok_or_else(|| AgentError::Config("missing required env var TICKWORLD_WORLD_ID".to_owned()))
    }

    /// The nonce the first signed action should carry.
    ///
    /// Falls back to the wall clock in microseconds when
    /// `TICKWORLD_AGENT_NONCE` is unset.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::Config`] if the configured value is not an
    /// unsigned integer.
    pub fn start_nonce(&self) -> Result<u64, AgentError> {
        match &self.agent_nonce {
            Some(raw) => raw.trim().parse().map_err(|e| {
                AgentError::Config(format!("invalid TICKWORLD_AGENT_NONCE {raw:?}: {e}"))
            }),
            None => Ok(u64::try_from(Utc::now().timestamp_micros()).unwrap_or_default()),
        }
    }

    /// Build the signer. Returns `true` alongside it when the key was
    /// freshly generated rather than configured.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::Config`] if the configured key is not 32 bytes
    /// of hex.
    pub fn signer(&self) -> Result<(ActionSigner, bool), AgentError> {
        match &self.agent_key {
            Some(key) => ActionSigner::from_hex(key)
                .map(|signer| (signer, false))
                .map_err(|e| AgentError::Config(format!("invalid TICKWORLD_AGENT_KEY: {e}"))),
            None => Ok((ActionSigner::from_secret(rand::random::<[u8; 32]>()), true)),
        }
    }
}
