//! Error types for the session core.

use std::time::Duration;

use thiserror::Error;

/// Result type alias for session operations.
pub type SessionResult<T> = Result<T, SessionError>;

/// Result type alias for backend collaborator calls.
pub type BackendResult<T> = Result<T, BackendError>;

/// Failures reported by the backend collaborator.
///
/// The `Display` output is the human-readable message that ends up in
/// `SessionState::last_error` or in an assistant error turn.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BackendError {
    #[error("{0}")]
    Transport(String),

    #[error("{message} (HTTP {status})")]
    Rejected { status: u16, message: String },

    #[error("Malformed response: {0}")]
    Decode(String),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),
}

impl BackendError {
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport(message.into())
    }
}

/// Errors raised by the session core itself.
///
/// None of these mutate the session: they report misuse, or results that
/// arrived too late to be applied.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Invalid state for {operation}: current={current}, expected={expected}")]
    InvalidState {
        current: String,
        expected: String,
        operation: String,
    },

    #[error("A question is already awaiting an answer")]
    Busy,

    #[error("Response arrived for a superseded session")]
    StaleResponse,

    #[error("Session has been shut down")]
    Closed,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl SessionError {
    pub(crate) fn invalid_state(
        current: impl std::fmt::Debug,
        expected: &str,
        operation: &str,
    ) -> Self {
        Self::InvalidState {
            current: format!("{:?}", current),
            expected: expected.to_string(),
            operation: operation.to_string(),
        }
    }
}
