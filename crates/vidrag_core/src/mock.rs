//! Scripted backend for testing.
//!
//! Provides a configurable implementation of the [`VideoBackend`] trait so
//! session behaviour can be exercised without a running ingestion service.
//! Replies can be delayed to reproduce slow or out-of-order responses.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::backend::VideoBackend;
use crate::error::{BackendError, BackendResult};
use crate::types::{
    IngestReceipt, QueryAnswer, RemoteStatus, StatusReport, VideoId, VideoMetadata,
};

/// Predefined reply for one backend call.
#[derive(Debug, Clone)]
pub struct MockReply<T> {
    result: Result<T, BackendError>,
    delay: Duration,
}

impl<T> MockReply<T> {
    pub fn ok(value: T) -> Self {
        Self {
            result: Ok(value),
            delay: Duration::ZERO,
        }
    }

    /// A transport failure whose message is `message`.
    pub fn err(message: impl Into<String>) -> Self {
        Self::error(BackendError::transport(message))
    }

    pub fn error(error: BackendError) -> Self {
        Self {
            result: Err(error),
            delay: Duration::ZERO,
        }
    }

    /// Resolve only after `delay`.
    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

/// Captured call information for verification.
#[derive(Debug, Clone)]
pub struct CapturedCall {
    pub method: String,
    pub video_id: Option<VideoId>,
    /// URL for ingestion, question for queries
    pub argument: Option<String>,
}

/// Mock backend for testing.
///
/// Ingestion and status replies are consumed in order; the last one keeps
/// being returned once the script runs out.
#[derive(Clone)]
pub struct MockBackend {
    ingest_replies: Arc<RwLock<VecDeque<MockReply<IngestReceipt>>>>,
    status_replies: Arc<RwLock<VecDeque<MockReply<StatusReport>>>>,
    metadata_reply: Arc<RwLock<MockReply<VideoMetadata>>>,
    query_replies: Arc<RwLock<HashMap<String, MockReply<QueryAnswer>>>>,
    captured_calls: Arc<RwLock<Vec<CapturedCall>>>,
    ingest_count: Arc<AtomicUsize>,
    status_in_flight: Arc<AtomicUsize>,
    status_max_in_flight: Arc<AtomicUsize>,
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MockBackend {
    /// Create a backend that accepts every job, reports it ready on the first
    /// poll and answers every question.
    pub fn new() -> Self {
        Self {
            ingest_replies: Arc::new(RwLock::new(VecDeque::new())),
            status_replies: Arc::new(RwLock::new(VecDeque::new())),
            metadata_reply: Arc::new(RwLock::new(MockReply::ok(Self::sample_metadata()))),
            query_replies: Arc::new(RwLock::new(HashMap::new())),
            captured_calls: Arc::new(RwLock::new(Vec::new())),
            ingest_count: Arc::new(AtomicUsize::new(0)),
            status_in_flight: Arc::new(AtomicUsize::new(0)),
            status_max_in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Metadata returned unless configured otherwise.
    pub fn sample_metadata() -> VideoMetadata {
        VideoMetadata {
            title: "Mock Video".to_string(),
            duration: 125.0,
            chunk_count: 8,
        }
    }

    pub fn with_ingest_reply(self, reply: MockReply<IngestReceipt>) -> Self {
        self.ingest_replies.write().push_back(reply);
        self
    }

    /// Accept the next ingestion under `video_id`.
    pub fn with_video_id(self, video_id: impl Into<VideoId>) -> Self {
        self.with_ingest_reply(MockReply::ok(IngestReceipt {
            video_id: video_id.into(),
            status: RemoteStatus::Processing,
        }))
    }

    pub fn with_status(self, report: StatusReport) -> Self {
        self.with_status_reply(MockReply::ok(report))
    }

    pub fn with_statuses(self, reports: Vec<StatusReport>) -> Self {
        for report in reports {
            self.status_replies.write().push_back(MockReply::ok(report));
        }
        self
    }

    pub fn with_status_reply(self, reply: MockReply<StatusReport>) -> Self {
        self.status_replies.write().push_back(reply);
        self
    }

    pub fn with_metadata_reply(self, reply: MockReply<VideoMetadata>) -> Self {
        *self.metadata_reply.write() = reply;
        self
    }

    /// Reply used whenever `question` is asked.
    pub fn with_query_reply(self, question: impl Into<String>, reply: MockReply<QueryAnswer>) -> Self {
        self.query_replies.write().insert(question.into(), reply);
        self
    }

    /// Get all captured calls.
    pub fn get_calls(&self) -> Vec<CapturedCall> {
        self.captured_calls.read().clone()
    }

    /// Number of calls made to `method`.
    pub fn call_count(&self, method: &str) -> usize {
        self.captured_calls
            .read()
            .iter()
            .filter(|c| c.method == method)
            .count()
    }

    /// Highest number of status fetches that were in flight at once.
    pub fn max_concurrent_status_fetches(&self) -> usize {
        self.status_max_in_flight.load(Ordering::SeqCst)
    }

    fn record_call(&self, method: &str, video_id: Option<&VideoId>, argument: Option<&str>) {
        self.captured_calls.write().push(CapturedCall {
            method: method.to_string(),
            video_id: video_id.cloned(),
            argument: argument.map(str::to_string),
        });
    }

    fn next_reply<T: Clone>(queue: &RwLock<VecDeque<MockReply<T>>>) -> Option<MockReply<T>> {
        let mut queue = queue.write();
        if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        }
    }

    async fn resolve<T>(reply: MockReply<T>) -> BackendResult<T> {
        if !reply.delay.is_zero() {
            tokio::time::sleep(reply.delay).await;
        }
        reply.result
    }
}

/// Decrements the in-flight counter even when the fetch future is dropped.
struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl VideoBackend for MockBackend {
    async fn submit_ingestion(&self, url: &str) -> BackendResult<IngestReceipt> {
        self.record_call("submit_ingestion", None, Some(url));
        let n = self.ingest_count.fetch_add(1, Ordering::SeqCst) + 1;
        let reply = Self::next_reply(&self.ingest_replies).unwrap_or_else(|| {
            MockReply::ok(IngestReceipt {
                video_id: VideoId::new(format!("video-{}", n)),
                status: RemoteStatus::Processing,
            })
        });
        Self::resolve(reply).await
    }

    async fn fetch_status(&self, video_id: &VideoId) -> BackendResult<StatusReport> {
        self.record_call("fetch_status", Some(video_id), None);
        let current = self.status_in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.status_max_in_flight.fetch_max(current, Ordering::SeqCst);
        let _guard = InFlight(&self.status_in_flight);

        let reply = Self::next_reply(&self.status_replies)
            .unwrap_or_else(|| MockReply::ok(StatusReport::ready()));
        Self::resolve(reply).await
    }

    async fn fetch_metadata(&self, video_id: &VideoId) -> BackendResult<VideoMetadata> {
        self.record_call("fetch_metadata", Some(video_id), None);
        let reply = self.metadata_reply.read().clone();
        Self::resolve(reply).await
    }

    async fn submit_query(&self, video_id: &VideoId, question: &str) -> BackendResult<QueryAnswer> {
        self.record_call("submit_query", Some(video_id), Some(question));
        let reply = self
            .query_replies
            .read()
            .get(question)
            .cloned()
            .unwrap_or_else(|| {
                MockReply::ok(QueryAnswer {
                    answer: format!("Mock answer to: {}", question),
                    sources: Vec::new(),
                })
            });
        Self::resolve(reply).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_status_script_repeats_last_reply() {
        let backend = MockBackend::new().with_statuses(vec![
            StatusReport::processing("downloading", 0.1),
            StatusReport::ready(),
        ]);
        let id = VideoId::new("abc");

        let first = backend.fetch_status(&id).await.unwrap();
        assert_eq!(first.status, RemoteStatus::Processing);
        for _ in 0..3 {
            let next = backend.fetch_status(&id).await.unwrap();
            assert_eq!(next.status, RemoteStatus::Ready);
        }
        assert_eq!(backend.call_count("fetch_status"), 4);
    }

    #[tokio::test]
    async fn test_default_ingest_ids_are_distinct() {
        let backend = MockBackend::new();
        let a = backend.submit_ingestion("https://youtu.be/a").await.unwrap();
        let b = backend.submit_ingestion("https://youtu.be/b").await.unwrap();
        assert_ne!(a.video_id, b.video_id);

        let calls = backend.get_calls();
        assert_eq!(calls[0].argument.as_deref(), Some("https://youtu.be/a"));
    }

    #[tokio::test]
    async fn test_query_failure_reply() {
        let backend = MockBackend::new().with_query_reply("why?", MockReply::err("timeout"));
        let err = backend
            .submit_query(&VideoId::new("abc"), "why?")
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "timeout");
    }
}
