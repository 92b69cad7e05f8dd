//! HTTP client that signs and submits actions for one agent.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tickworld_core::signature::ActionSigner;
use tickworld_types::{AgentAddress, ParamValue, SignedAction, WorldId};
use tracing::debug;

use crate::error::AgentError;

/// Fallback message when a rejection carries no readable `error` field.
const GENERIC_REJECTION: &str = "Action submission failed";

/// The server's acknowledgement of a queued action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueuedReceipt {
    /// Always `true` on success.
    pub queued: bool,
    /// Queue length right after admission.
    pub queue_size: usize,
    /// The tick expected to execute the action.
    pub next_tick: u64,
}

/// Signs actions as one agent and submits them to a world server.
#[derive(Debug)]
pub struct AgentClient {
    client: reqwest::Client,
    signer: ActionSigner,
    world_id: WorldId,
    server_url: String,
    nonce: AtomicU64,
}

impl AgentClient {
    /// Create a client for `world_id` on the server at `server_url`.
    ///
    /// Nonces start at 0, which suits one long-lived client per key.
    pub fn new(signer: ActionSigner, world_id: WorldId, server_url: &str) -> Self {
        Self::with_start_nonce(signer, world_id, server_url, 0)
    }

    /// Like [`new`](Self::new), but the first signed action carries
    /// `start_nonce`.
    ///
    /// Clients that share a key across processes must start from disjoint
    /// nonces, or the server rejects the later ones as replays.
    pub fn with_start_nonce(
        signer: ActionSigner,
        world_id: WorldId,
        server_url: &str,
        start_nonce: u64,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            signer,
            world_id,
            server_url: server_url.trim_end_matches('/').to_owned(),
            nonce: AtomicU64::new(start_nonce),
        }
    }

    /// The address actions are signed as.
    pub const fn address(&self) -> AgentAddress {
        self.signer.address()
    }

    /// The nonce the next signed action will carry.
    pub fn next_nonce(&self) -> u64 {
        self.nonce.load(Ordering::Acquire)
    }

    /// Sign an action with the next nonce and the current time.
    ///
    /// The nonce is consumed even if the action is never submitted.
    pub fn sign_action(
        &self,
        action: &str,
        params: Vec<ParamValue>,
    ) -> Result<SignedAction, AgentError> {
        let nonce = self
            .nonce
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_add(1))
            .map_err(|_exhausted| AgentError::NonceExhausted)?;
        let timestamp = Utc::now().timestamp_millis();
        Ok(self
            .signer
            .sign(self.world_id.clone(), action, params, nonce, timestamp)?)
    }

    /// Sign an action and submit it for the next tick.
    pub async fn submit_action(
        &self,
        action: &str,
        params: Vec<ParamValue>,
    ) -> Result<QueuedReceipt, AgentError> {
        let signed = self.sign_action(action, params)?;
        let url = format!("{}/world/{}/action", self.server_url, self.world_id);
        debug!(%url, action, nonce = signed.nonce, "submitting action");

        let response = self
            .client
            .post(&url)
            .json(&signed)
            .send()
            .await
            .map_err(|e| AgentError::Request(format!("submit failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AgentError::Rejected {
                status: status.as_u16(),
                message: rejection_message(&body),
            });
        }

        response
            .json()
            .await
            .map_err(|e| AgentError::Request(format!("unreadable receipt: {e}")))
    }

    /// Join the world at `(x, y)`.
    pub async fn join(&self, x: i64, y: i64) -> Result<QueuedReceipt, AgentError> {
        self.submit_action("AgentRegistry", vec![x.into(), y.into()])
            .await
    }

    /// Move by `(dx, dy)`.
    pub async fn move_by(&self, dx: i64, dy: i64) -> Result<QueuedReceipt, AgentError> {
        self.submit_action("Movement", vec![dx.into(), dy.into()])
            .await
    }
}

/// Extract the `error` field of a JSON error body.
fn rejection_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|json| json.get("error").and_then(|e| e.as_str()).map(ToOwned::to_owned))
        .unwrap_or_else(|| GENERIC_REJECTION.to_owned())
}
