//! Error types for the agent client.

use tickworld_core::signature::SignatureError;

/// Errors that can occur while signing or submitting actions.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    /// Configuration is invalid or missing.
    #[error("config error: {0}")]
    Config(String),

    /// The action could not be signed.
    #[error("signing error: {0}")]
    Signature(#[from] SignatureError),

    /// The server was unreachable or the response unreadable.
    #[error("request error: {0}")]
    Request(String),

    /// The server refused the action.
    #[error("server rejected action ({status}): {message}")]
    Rejected {
        /// HTTP status code.
        status: u16,
        /// The server's `error` message.
        message: String,
    },

    /// Every nonce has been used.
    #[error("nonce space exhausted")]
    NonceExhausted,
}
