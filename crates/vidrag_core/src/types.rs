//! Core types shared by the session state machine and its collaborators.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier the backend assigns to an ingested video.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VideoId(String);

impl VideoId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VideoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for VideoId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for VideoId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Lifecycle status of a session
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    /// Nothing submitted yet, or the session was reset
    #[default]
    Idle,
    /// The backend is ingesting the video
    Processing,
    /// Ingestion finished; questions may be asked
    Ready,
    /// Submission or polling failed
    Error,
}

impl SessionStatus {
    /// Ready and Error end the automatic progression.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Ready | Self::Error)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Processing => "processing",
            Self::Ready => "ready",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What kind of failure put the session into the Error state.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The ingestion request itself failed
    Submission,
    /// A status fetch failed at the transport level
    Poll,
    /// The backend reported that processing failed
    Remote,
    /// Processing finished but metadata could not be fetched
    Metadata,
    /// The job did not reach a terminal state in time
    PollTimeout,
}

/// Who authored a turn
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// A transcript excerpt backing an answer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SourceRef {
    /// Link to the video at the excerpt's timestamp
    pub timestamp_url: String,
    /// Excerpt text
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub similarity: Option<f64>,
}

impl SourceRef {
    pub fn new(timestamp_url: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            timestamp_url: timestamp_url.into(),
            text: text.into(),
            start_time: None,
            end_time: None,
            similarity: None,
        }
    }
}

/// One message in the conversation log
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    /// Unique turn ID (UUID)
    pub id: String,
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<SourceRef>,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

impl Turn {
    /// Create a user question turn
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content.into(), Vec::new())
    }

    /// Create an assistant answer turn
    pub fn assistant(content: impl Into<String>, sources: Vec<SourceRef>) -> Self {
        Self::new(Role::Assistant, content.into(), sources)
    }

    /// Create an assistant turn describing a failed query
    pub fn assistant_error(message: impl fmt::Display) -> Self {
        Self::new(Role::Assistant, format!("Error: {}", message), Vec::new())
    }

    fn new(role: Role, content: String, sources: Vec<SourceRef>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            role,
            content,
            sources,
            created_at: Utc::now(),
        }
    }
}

/// Descriptive information about a processed video.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VideoMetadata {
    pub title: String,
    /// Length in seconds
    pub duration: f64,
    /// Number of transcript chunks indexed
    pub chunk_count: u32,
}

impl VideoMetadata {
    /// Duration as `m:ss`.
    pub fn duration_label(&self) -> String {
        let total = self.duration.max(0.0) as u64;
        format!("{}:{:02}", total / 60, total % 60)
    }
}

/// Processing status as reported by the backend, normalized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteStatus {
    Processing,
    Ready,
    Error,
    /// A value outside the known vocabulary
    Other(String),
}

impl RemoteStatus {
    /// Normalize the backend's status vocabulary.
    ///
    /// Deployed backends disagree on "complete" vs "ready"; both mean Ready.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "processing" | "pending" | "queued" => Self::Processing,
            "complete" | "completed" | "ready" => Self::Ready,
            "error" | "failed" => Self::Error,
            other => Self::Other(other.to_string()),
        }
    }
}

/// One status observation for an ingestion job
#[derive(Debug, Clone, PartialEq)]
pub struct StatusReport {
    pub status: RemoteStatus,
    pub stage: String,
    pub progress: f64,
    pub error: Option<String>,
}

impl StatusReport {
    pub fn processing(stage: impl Into<String>, progress: f64) -> Self {
        Self {
            status: RemoteStatus::Processing,
            stage: stage.into(),
            progress,
            error: None,
        }
    }

    pub fn ready() -> Self {
        Self {
            status: RemoteStatus::Ready,
            stage: "complete".to_string(),
            progress: 1.0,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            status: RemoteStatus::Error,
            stage: "error".to_string(),
            progress: 0.0,
            error: Some(error.into()),
        }
    }
}

/// Acknowledgement of an ingestion request
#[derive(Debug, Clone, PartialEq)]
pub struct IngestReceipt {
    pub video_id: VideoId,
    pub status: RemoteStatus,
}

/// Answer to a question about a video
#[derive(Debug, Clone, PartialEq)]
pub struct QueryAnswer {
    pub answer: String,
    pub sources: Vec<SourceRef>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_status_normalization() {
        assert_eq!(RemoteStatus::parse("complete"), RemoteStatus::Ready);
        assert_eq!(RemoteStatus::parse("ready"), RemoteStatus::Ready);
        assert_eq!(RemoteStatus::parse("Processing"), RemoteStatus::Processing);
        assert_eq!(RemoteStatus::parse("error"), RemoteStatus::Error);
        assert_eq!(
            RemoteStatus::parse("unknown"),
            RemoteStatus::Other("unknown".to_string())
        );
    }

    #[test]
    fn test_error_turn_content() {
        let turn = Turn::assistant_error("timeout");
        assert_eq!(turn.role, Role::Assistant);
        assert_eq!(turn.content, "Error: timeout");
        assert!(turn.sources.is_empty());
    }

    #[test]
    fn test_duration_label() {
        let meta = VideoMetadata {
            title: "Talk".to_string(),
            duration: 754.6,
            chunk_count: 12,
        };
        assert_eq!(meta.duration_label(), "12:34");
    }

    #[test]
    fn test_status_terminality() {
        assert!(SessionStatus::Ready.is_terminal());
        assert!(SessionStatus::Error.is_terminal());
        assert!(!SessionStatus::Processing.is_terminal());
        assert!(!SessionStatus::Idle.is_terminal());
    }
}
