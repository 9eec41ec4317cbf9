//! Core error types for ClipForge.
//!
//! `ServerError` is used by the stores and the HTTP/CLI adapters. When the
//! `axum` feature is enabled, it also implements `IntoResponse` so it can be
//! used directly as an axum handler error type.
//!
//! `EngineError` covers workflow construction failures. These are raised
//! before any agent is dispatched, so no partial state exists when one is
//! returned.

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Fatal workflow construction errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    #[error("Unknown agent type: {0}")]
    UnknownAgentType(String),

    #[error("Prompt must not be empty")]
    EmptyPrompt,

    #[error("At least one platform must be selected")]
    NoPlatformsSelected,

    #[error("Unsupported platform: {0}")]
    UnsupportedPlatform(String),

    #[error("Invalid execution mode: {0}")]
    InvalidMode(String),
}

impl From<EngineError> for ServerError {
    fn from(e: EngineError) -> Self {
        ServerError::BadRequest(e.to_string())
    }
}

// ---------------------------------------------------------------------------
// axum integration (opt-in via feature flag)
// ---------------------------------------------------------------------------

#[cfg(feature = "axum")]
impl axum::response::IntoResponse for ServerError {
    fn into_response(self) -> axum::response::Response {
        use axum::http::StatusCode;

        let (status, message) = match &self {
            ServerError::Database(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
            ServerError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            ServerError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ServerError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            ServerError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
        };

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}
