//! Error types for the world API.
//!
//! [`ApiError`] unifies all failure modes into a single enum that can be
//! converted into an Axum HTTP response via its
//! [`IntoResponse`](axum::response::IntoResponse) implementation. Every error
//! body has the shape `{"error": <message>, "status": <code>}`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tickworld_core::scheduler::{AdmissionError, SchedulerError};

/// Errors that can occur in the world API layer.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// No world has been created.
    #[error("No world created")]
    NoWorld,

    /// The path names a world other than the active one.
    #[error("World not found: {0}")]
    WorldNotFound(String),

    /// A world is already active.
    #[error("World already active: {0}")]
    WorldExists(String),

    /// The action was refused at admission.
    #[error(transparent)]
    Admission(#[from] AdmissionError),

    /// The request body was malformed or out of range.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The world's scheduler could not be driven.
    #[error(transparent)]
    Scheduler(#[from] SchedulerError),
}

impl ApiError {
    /// HTTP status this error is reported with.
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::NoWorld | Self::WorldNotFound(_) => StatusCode::NOT_FOUND,
            Self::WorldExists(_) => StatusCode::CONFLICT,
            Self::Admission(_) | Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::Scheduler(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = serde_json::json!({
            "error": self.to_string(),
            "status": status.as_u16(),
        });

        (status, axum::Json(body)).into_response()
    }
}
