//! reqwest-backed implementation of [`VideoBackend`].
//!
//! Each call is a single request. Retrying is left to the caller: the session
//! core records a failed request instead of trying again.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Url};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};
use vidrag_core::{
    BackendError, BackendResult, IngestReceipt, QueryAnswer, StatusReport, VideoBackend, VideoId,
    VideoMetadata,
};

use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};
use crate::wire::{
    error_message, HealthStatus, IngestRequest, IngestResponse, MetadataResponse, QueryRequest,
    QueryResponse, StatusResponse,
};

/// HTTP client for the ingestion and Q&A API.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: Client,
    base_url: Url,
    timeout: Option<Duration>,
}

impl HttpBackend {
    pub fn new(config: &ClientConfig) -> ClientResult<Self> {
        let base_url = parse_base_url(&config.base_url)?;
        let timeout = config.request_timeout();

        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            client: builder.build()?,
            base_url,
            timeout,
        })
    }

    /// Client for the backend named by `VIDRAG_API_URL`, or the local default.
    pub fn from_env() -> ClientResult<Self> {
        Self::new(&ClientConfig::default().merge_env())
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Check that the backend is up.
    pub async fn health(&self) -> BackendResult<HealthStatus> {
        let url = self.endpoint(&["health"])?;
        self.send(self.client.get(url)).await
    }

    fn endpoint(&self, segments: &[&str]) -> BackendResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| BackendError::transport(format!("Invalid API base URL: {}", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> BackendResult<T> {
        let response = request.send().await.map_err(|e| self.request_error(e))?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = error_message(&body, status.canonical_reason());
            warn!(status = status.as_u16(), %message, "Backend rejected request");
            return Err(BackendError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        response.json::<T>().await.map_err(|e| {
            if e.is_timeout() {
                self.request_error(e)
            } else {
                BackendError::Decode(e.to_string())
            }
        })
    }

    fn request_error(&self, error: reqwest::Error) -> BackendError {
        if error.is_timeout() {
            return BackendError::Timeout(self.timeout.unwrap_or_default());
        }
        if error.is_connect() {
            return BackendError::transport(format!(
                "Could not reach backend at {}",
                self.base_url
            ));
        }
        BackendError::transport(format!("Request failed: {}", error))
    }
}

fn parse_base_url(raw: &str) -> ClientResult<Url> {
    let invalid = |reason: String| ClientError::InvalidBaseUrl {
        url: raw.to_string(),
        reason,
    };

    let url = Url::parse(raw.trim()).map_err(|e| invalid(e.to_string()))?;
    if url.cannot_be_a_base() || !matches!(url.scheme(), "http" | "https") {
        return Err(invalid("expected an http or https URL".to_string()));
    }
    Ok(url)
}

#[async_trait]
impl VideoBackend for HttpBackend {
    async fn submit_ingestion(&self, url: &str) -> BackendResult<IngestReceipt> {
        debug!(%url, "Submitting video for ingestion");
        let endpoint = self.endpoint(&["api", "ingest"])?;
        let response: IngestResponse = self
            .send(self.client.post(endpoint).json(&IngestRequest { url }))
            .await?;
        Ok(response.into())
    }

    async fn fetch_status(&self, video_id: &VideoId) -> BackendResult<StatusReport> {
        let endpoint = self.endpoint(&["api", "status", video_id.as_str()])?;
        let response: StatusResponse = self.send(self.client.get(endpoint)).await?;
        Ok(response.into())
    }

    async fn fetch_metadata(&self, video_id: &VideoId) -> BackendResult<VideoMetadata> {
        let endpoint = self.endpoint(&["api", "metadata", video_id.as_str()])?;
        let response: MetadataResponse = self.send(self.client.get(endpoint)).await?;
        Ok(response.into())
    }

    async fn submit_query(&self, video_id: &VideoId, question: &str) -> BackendResult<QueryAnswer> {
        debug!(video_id = %video_id, "Submitting question");
        let endpoint = self.endpoint(&["api", "query"])?;
        let body = QueryRequest {
            video_id: video_id.as_str(),
            question,
        };
        let response: QueryResponse = self.send(self.client.post(endpoint).json(&body)).await?;
        Ok(response.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend(base: &str) -> HttpBackend {
        HttpBackend::new(&ClientConfig::new(base)).unwrap()
    }

    #[test]
    fn test_endpoint_joins_segments() {
        let backend = backend("http://localhost:8000");
        let url = backend.endpoint(&["api", "status", "abc123"]).unwrap();
        assert_eq!(url.as_str(), "http://localhost:8000/api/status/abc123");
    }

    #[test]
    fn test_endpoint_keeps_base_path_prefix() {
        let backend = backend("https://example.com/rag/");
        let url = backend.endpoint(&["api", "ingest"]).unwrap();
        assert_eq!(url.as_str(), "https://example.com/rag/api/ingest");
    }

    #[test]
    fn test_endpoint_escapes_video_id() {
        let backend = backend("http://localhost:8000");
        let url = backend.endpoint(&["api", "metadata", "a/b c"]).unwrap();
        assert_eq!(url.as_str(), "http://localhost:8000/api/metadata/a%2Fb%20c");
    }

    #[test]
    fn test_rejects_non_http_base_url() {
        let err = HttpBackend::new(&ClientConfig::new("ftp://example.com")).unwrap_err();
        assert!(matches!(err, ClientError::InvalidBaseUrl { .. }));

        let err = HttpBackend::new(&ClientConfig::new("not a url")).unwrap_err();
        assert!(matches!(err, ClientError::InvalidBaseUrl { .. }));
    }
}
