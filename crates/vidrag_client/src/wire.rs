//! JSON bodies exchanged with the backend API.

use serde::{Deserialize, Serialize};
use vidrag_core::{
    IngestReceipt, QueryAnswer, RemoteStatus, SourceRef, StatusReport, VideoId, VideoMetadata,
};

#[derive(Debug, Serialize)]
pub(crate) struct IngestRequest<'a> {
    pub url: &'a str,
}

#[derive(Debug, Deserialize)]
pub(crate) struct IngestResponse {
    pub video_id: String,
    #[serde(default)]
    pub status: Option<String>,
}

impl From<IngestResponse> for IngestReceipt {
    fn from(response: IngestResponse) -> Self {
        Self {
            video_id: VideoId::new(response.video_id),
            status: response
                .status
                .as_deref()
                .map(RemoteStatus::parse)
                .unwrap_or(RemoteStatus::Processing),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct StatusResponse {
    pub status: String,
    #[serde(default)]
    pub stage: Option<String>,
    #[serde(default)]
    pub progress: Option<f64>,
    #[serde(default)]
    pub error: Option<String>,
}

impl From<StatusResponse> for StatusReport {
    fn from(response: StatusResponse) -> Self {
        Self {
            status: RemoteStatus::parse(&response.status),
            stage: response.stage.unwrap_or_default(),
            progress: response.progress.unwrap_or(0.0),
            error: response.error,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct MetadataResponse {
    pub title: String,
    pub duration: f64,
    pub num_chunks: u32,
}

impl From<MetadataResponse> for VideoMetadata {
    fn from(response: MetadataResponse) -> Self {
        Self {
            title: response.title,
            duration: response.duration,
            chunk_count: response.num_chunks,
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct QueryRequest<'a> {
    pub video_id: &'a str,
    pub question: &'a str,
}

#[derive(Debug, Deserialize)]
pub(crate) struct QueryResponse {
    pub answer: String,
    #[serde(default)]
    pub sources: Vec<SourceRef>,
}

impl From<QueryResponse> for QueryAnswer {
    fn from(response: QueryResponse) -> Self {
        Self {
            answer: response.answer,
            sources: response.sources,
        }
    }
}

/// Body of `GET /health`.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct HealthStatus {
    pub status: String,
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        self.status.eq_ignore_ascii_case("healthy") || self.status.eq_ignore_ascii_case("ok")
    }
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    detail: serde_json::Value,
}

/// Human-readable message for a failed response body.
///
/// Prefers the `detail` field of the backend's error bodies, then the raw
/// body, then the status reason.
pub(crate) fn error_message(body: &str, reason: Option<&str>) -> String {
    if let Ok(parsed) = serde_json::from_str::<ErrorBody>(body) {
        return match parsed.detail {
            serde_json::Value::String(detail) => detail,
            other => other.to_string(),
        };
    }
    let body = body.trim();
    if !body.is_empty() {
        return body.to_string();
    }
    reason.unwrap_or("Request failed").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_response_normalizes_vocabulary() {
        let response: StatusResponse = serde_json::from_str(
            r#"{"video_id":"abc","status":"complete","stage":"complete","progress":1.0,"error":null,"metadata":null}"#,
        )
        .unwrap();
        let report = StatusReport::from(response);
        assert_eq!(report.status, RemoteStatus::Ready);
        assert_eq!(report.progress, 1.0);
        assert!(report.error.is_none());
    }

    #[test]
    fn test_status_response_tolerates_missing_fields() {
        let response: StatusResponse =
            serde_json::from_str(r#"{"status":"processing","stage":null}"#).unwrap();
        let report = StatusReport::from(response);
        assert_eq!(report.status, RemoteStatus::Processing);
        assert_eq!(report.stage, "");
        assert_eq!(report.progress, 0.0);
    }

    #[test]
    fn test_query_response_keeps_source_details() {
        let response: QueryResponse = serde_json::from_str(
            r#"{
                "answer": "It covers lifetimes.",
                "video_id": "abc",
                "sources": [{
                    "text": "lifetimes are",
                    "start_time": 61.5,
                    "end_time": 75.0,
                    "similarity": 0.82,
                    "timestamp_url": "https://youtube.com/watch?v=abc&t=61s"
                }]
            }"#,
        )
        .unwrap();
        let answer = QueryAnswer::from(response);
        assert_eq!(answer.sources.len(), 1);
        assert_eq!(answer.sources[0].start_time, Some(61.5));
        assert_eq!(answer.sources[0].timestamp_url, "https://youtube.com/watch?v=abc&t=61s");
    }

    #[test]
    fn test_metadata_maps_chunk_count() {
        let response: MetadataResponse = serde_json::from_str(
            r#"{"video_id":"abc","url":"u","title":"Talk","duration":321.0,"num_chunks":14,"processed_at":"2024-01-01"}"#,
        )
        .unwrap();
        let metadata = VideoMetadata::from(response);
        assert_eq!(metadata.chunk_count, 14);
    }

    #[test]
    fn test_error_message_prefers_detail() {
        assert_eq!(error_message(r#"{"detail":"Video not found"}"#, Some("Not Found")), "Video not found");
        assert_eq!(error_message("", Some("Not Found")), "Not Found");
        assert_eq!(error_message("upstream exploded", None), "upstream exploded");
        assert_eq!(
            error_message(r#"{"detail":[{"msg":"invalid url"}]}"#, None),
            r#"[{"msg":"invalid url"}]"#
        );
    }
}
