//! Signed actions and the per-tick execution report.
//!
//! A [`SignedAction`] is what a submitter sends: a command addressed to one
//! world, authored by one agent, carrying a replay-protection nonce and a
//! signature over everything else. A [`TickReport`] is what the scheduler
//! emits after executing a non-empty batch: one [`ActionReport`] per action,
//! in execution order.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{AgentAddress, WorldId};
use crate::params::ParamValue;

// ---------------------------------------------------------------------------
// SignedAction
// ---------------------------------------------------------------------------

/// A command submitted by an agent, signed over its canonical encoding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedAction {
    /// The world this action is addressed to.
    pub world_id: WorldId,
    /// The claimed author of the action.
    pub agent_address: AgentAddress,
    /// Name of the capability to invoke. Not interpreted by the pipeline.
    #[serde(rename = "action")]
    pub action_name: String,
    /// Ordered arguments, passed through unmodified.
    #[serde(default)]
    pub params: Vec<ParamValue>,
    /// Per-agent uniqueness token used only for replay prevention.
    pub nonce: u64,
    /// Submission time in Unix milliseconds. Informational only.
    pub timestamp: i64,
    /// Hex signature over the canonical encoding of the other fields.
    pub signature: String,
}

// ---------------------------------------------------------------------------
// Execution outcomes
// ---------------------------------------------------------------------------

/// Result of one action's execution attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOutcome {
    /// The engine applied the action and returned a result.
    Success {
        /// Engine-defined result payload.
        result: serde_json::Value,
    },
    /// The engine call failed; the action is discarded.
    Failure {
        /// Human-readable failure description.
        error: String,
    },
}

impl ActionOutcome {
    /// Whether the action executed successfully.
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

/// One entry of a tick's result list.
///
/// Serialized flat as `{action, success, result}` or
/// `{action, success, error}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "WireActionReport", try_from = "WireActionReport")]
pub struct ActionReport {
    /// The executed action.
    pub action: SignedAction,
    /// What happened when it was executed.
    pub outcome: ActionOutcome,
}

#[derive(Serialize, Deserialize)]
struct WireActionReport {
    action: SignedAction,
    success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    result: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl From<ActionReport> for WireActionReport {
    fn from(report: ActionReport) -> Self {
        match report.outcome {
            ActionOutcome::Success { result } => Self {
                action: report.action,
                success: true,
                result: Some(result),
                error: None,
            },
            ActionOutcome::Failure { error } => Self {
                action: report.action,
                success: false,
                result: None,
                error: Some(error),
            },
        }
    }
}

impl TryFrom<WireActionReport> for ActionReport {
    type Error = String;

    fn try_from(wire: WireActionReport) -> Result<Self, Self::Error> {
        let outcome = if wire.success {
            ActionOutcome::Success {
                result: wire.result.unwrap_or(serde_json::Value::Null),
            }
        } else {
            ActionOutcome::Failure {
                error: wire
                    .error
                    .ok_or_else(|| "failed action report is missing `error`".to_owned())?,
            }
        };
        Ok(Self {
            action: wire.action,
            outcome,
        })
    }
}

// ---------------------------------------------------------------------------
// TickReport
// ---------------------------------------------------------------------------

/// Ordered results of one tick's batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TickReport {
    /// The tick that executed this batch.
    pub tick: u64,
    /// The world the batch was executed against.
    pub world_id: WorldId,
    /// Wall-clock time the last action finished.
    pub completed_at: DateTime<Utc>,
    /// One entry per action, in execution (admission) order.
    pub results: Vec<ActionReport>,
}

impl TickReport {
    /// Number of actions that executed successfully.
    pub fn succeeded(&self) -> usize {
        self.results
            .iter()
            .filter(|r| r.outcome.is_success())
            .count()
    }

    /// Number of actions whose execution failed.
    pub fn failed(&self) -> usize {
        self.results.len().saturating_sub(self.succeeded())
    }
}
