//! # vidrag_client
//!
//! HTTP implementation of [`vidrag_core::VideoBackend`].
//!
//! | Operation          | Request                      |
//! |--------------------|------------------------------|
//! | submit ingestion   | `POST /api/ingest`           |
//! | fetch status       | `GET /api/status/{id}`       |
//! | fetch metadata     | `GET /api/metadata/{id}`     |
//! | submit query       | `POST /api/query`            |
//! | health             | `GET /health`                |
//!
//! Non-2xx responses become [`vidrag_core::BackendError::Rejected`] carrying
//! the backend's `detail` message.

pub mod config;
pub mod error;
pub mod http;
mod wire;

pub use config::{ClientConfig, DEFAULT_API_URL};
pub use error::{ClientError, ClientResult};
pub use http::HttpBackend;
pub use wire::HealthStatus;
