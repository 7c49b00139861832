//! Backend collaborator trait.
//!
//! The session core never talks HTTP itself; it drives one of these.

use async_trait::async_trait;

use crate::error::BackendResult;
use crate::types::{IngestReceipt, QueryAnswer, StatusReport, VideoId, VideoMetadata};

/// The four operations the session core needs from the ingestion backend.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VideoBackend: Send + Sync {
    /// Start ingesting the video at `url`.
    async fn submit_ingestion(&self, url: &str) -> BackendResult<IngestReceipt>;

    /// Fetch the current processing status of a job.
    async fn fetch_status(&self, video_id: &VideoId) -> BackendResult<StatusReport>;

    /// Fetch metadata for a processed video.
    async fn fetch_metadata(&self, video_id: &VideoId) -> BackendResult<VideoMetadata>;

    /// Ask a question about a processed video.
    async fn submit_query(&self, video_id: &VideoId, question: &str)
        -> BackendResult<QueryAnswer>;
}
