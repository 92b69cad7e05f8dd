//! Error types for the node binary.
//!
//! [`NodeError`] is the top-level error type that wraps all possible
//! failure modes during startup and serving.

/// Top-level error for the node binary.
#[derive(Debug, thiserror::Error)]
pub enum NodeError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: tickworld_core::config::ConfigError,
    },

    /// The world server failed to bind or serve.
    #[error("server error: {source}")]
    Server {
        /// The underlying server error.
        #[from]
        source: tickworld_server::ServerError,
    },

    /// The configured startup world could not be created.
    #[error("bootstrap error: {source}")]
    Bootstrap {
        /// The underlying API error.
        #[from]
        source: tickworld_server::ApiError,
    },
}
