//! Error types for building the HTTP client.
//!
//! Failures of individual requests are reported as
//! [`vidrag_core::BackendError`] so the session core can record them.

use thiserror::Error;

/// Result type alias for client construction.
pub type ClientResult<T> = Result<T, ClientError>;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Invalid API base URL '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    #[error("Failed to build HTTP client: {0}")]
    Http(#[from] reqwest::Error),
}
