//! State-transition engine seam and the in-memory action registry.
//!
//! The tick scheduler never applies actions itself. For every action in a
//! batch it calls [`ExecutionEngine::execute`] with the agent, the action
//! name, the fixed entry-point method [`EXECUTE_METHOD`], and the untouched
//! parameters. How the engine applies the action (a contract call, a
//! simulation step, a remote RPC) is its own business.
//!
//! [`ActionRegistry`] is the engine the world server runs with: a table of
//! named handlers standing in for deployed action contracts. Executing a
//! name that was never registered fails with
//! [`ExecutionError::NotDeployed`].

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;

use serde_json::{Value, json};
use tickworld_types::{AgentAddress, ParamValue};

/// Method name the scheduler invokes on every action.
pub const EXECUTE_METHOD: &str = "execute";

/// Errors an engine may report for a single action.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExecutionError {
    /// No handler exists for the action name.
    #[error("action {0} is not deployed")]
    NotDeployed(String),

    /// The handler ran and rejected the action.
    #[error("action reverted: {0}")]
    Reverted(String),

    /// The engine could not process the call at all.
    #[error("engine error: {0}")]
    Internal(String),
}

/// One call into the engine.
#[derive(Debug, Clone, Copy)]
pub struct ExecutionRequest<'a> {
    /// The agent the action runs as.
    pub agent: &'a AgentAddress,
    /// Name of the action to run.
    pub action: &'a str,
    /// Entry-point method. Always [`EXECUTE_METHOD`] from the scheduler.
    pub method: &'a str,
    /// Arguments, exactly as submitted.
    pub params: &'a [ParamValue],
}

/// A component that applies actions to world state.
///
/// Each call is independent: a failure affects only the action it was
/// called for.
pub trait ExecutionEngine: Send + Sync + 'static {
    /// Apply one action and return its engine-defined result.
    fn execute(
        &self,
        request: ExecutionRequest<'_>,
    ) -> impl Future<Output = Result<Value, ExecutionError>> + Send;
}

// ---------------------------------------------------------------------------
// ActionRegistry
// ---------------------------------------------------------------------------

/// A synchronous handler for one registered action.
pub type ActionHandler =
    Arc<dyn Fn(&ExecutionRequest<'_>) -> Result<Value, ExecutionError> + Send + Sync>;

/// In-memory engine dispatching actions to registered handlers by name.
#[derive(Clone, Default)]
pub struct ActionRegistry {
    handlers: BTreeMap<String, ActionHandler>,
}

impl ActionRegistry {
    /// Create a registry with no actions deployed.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry where every name in `actions` returns a receipt.
    pub fn with_receipts<I, S>(actions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut registry = Self::new();
        for name in actions {
            registry.register(name, receipt_handler());
        }
        registry
    }

    /// Deploy (or replace) the handler for an action name.
    pub fn register(&mut self, action: impl Into<String>, handler: ActionHandler) {
        self.handlers.insert(action.into(), handler);
    }

    /// Builder form of [`register`](Self::register).
    #[must_use]
    pub fn with_handler(mut self, action: impl Into<String>, handler: ActionHandler) -> Self {
        self.register(action, handler);
        self
    }

    /// Names of all deployed actions, sorted.
    pub fn deployed(&self) -> Vec<String> {
        self.handlers.keys().cloned().collect()
    }

    /// Whether an action name has a handler.
    pub fn is_deployed(&self, action: &str) -> bool {
        self.handlers.contains_key(action)
    }

    fn dispatch(&self, request: &ExecutionRequest<'_>) -> Result<Value, ExecutionError> {
        let handler = self
            .handlers
            .get(request.action)
            .ok_or_else(|| ExecutionError::NotDeployed(request.action.to_owned()))?;
        handler(request)
    }
}

impl core::fmt::Debug for ActionRegistry {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ActionRegistry")
            .field("deployed", &self.handlers.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl ExecutionEngine for ActionRegistry {
    fn execute(
        &self,
        request: ExecutionRequest<'_>,
    ) -> impl Future<Output = Result<Value, ExecutionError>> + Send {
        let outcome = self.dispatch(&request);
        async move { outcome }
    }
}

/// Handler that accepts every call and echoes it back as a receipt.
pub fn receipt_handler() -> ActionHandler {
    Arc::new(|request: &ExecutionRequest<'_>| {
        Ok(json!({
            "agent": request.agent,
            "action": request.action,
            "method": request.method,
            "params": request.params,
        }))
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn request<'a>(
        agent: &'a AgentAddress,
        action: &'a str,
        params: &'a [ParamValue],
    ) -> ExecutionRequest<'a> {
        ExecutionRequest {
            agent,
            action,
            method: EXECUTE_METHOD,
            params,
        }
    }

    #[tokio::test]
    async fn receipt_echoes_call() {
        let registry = ActionRegistry::with_receipts(["Movement"]);
        let agent = AgentAddress::from_bytes([1; 32]);
        let params = [ParamValue::Integer(1), ParamValue::Integer(0)];

        let result = registry
            .execute(request(&agent, "Movement", &params))
            .await
            .unwrap();
        assert_eq!(result["action"], json!("Movement"));
        assert_eq!(result["method"], json!("execute"));
        assert_eq!(result["agent"], json!(agent.to_string()));
        assert_eq!(result["params"][1]["value"], json!(0));
    }

    #[tokio::test]
    async fn unknown_action_is_not_deployed() {
        let registry = ActionRegistry::with_receipts(["Movement"]);
        let agent = AgentAddress::from_bytes([1; 32]);

        let err = registry
            .execute(request(&agent, "Combat", &[]))
            .await
            .unwrap_err();
        assert_eq!(err, ExecutionError::NotDeployed(String::from("Combat")));
    }

    #[tokio::test]
    async fn handler_errors_propagate() {
        let registry = ActionRegistry::new().with_handler(
            "Fail",
            Arc::new(|_: &ExecutionRequest<'_>| Err(ExecutionError::Reverted("no".to_owned()))),
        );
        let agent = AgentAddress::from_bytes([1; 32]);

        let err = registry.execute(request(&agent, "Fail", &[])).await.unwrap_err();
        assert_eq!(err.to_string(), "action reverted: no");
    }

    #[test]
    fn deployed_names_are_sorted() {
        let registry = ActionRegistry::with_receipts(["Movement", "AgentRegistry"]);
        assert_eq!(registry.deployed(), ["AgentRegistry", "Movement"]);
        assert!(registry.is_deployed("Movement"));
        assert!(!registry.is_deployed("Combat"));
    }
}
