//! Status poller.
//!
//! While a job is Processing, a background task fetches its status on a fixed
//! interval and drives the session to Ready or Error.
//!
//! # Guarantees
//!
//! - At most one loop runs per poller; starting a new one cancels the old one.
//! - Ticks never overlap: the fetch is awaited inside the tick, and ticks
//!   missed while it was pending are skipped.
//! - Cancellation is synchronous and idempotent. Results of a fetch that was
//!   in flight when the loop was cancelled are never applied, because the
//!   store rejects their ticket.
//! - A transport failure ends the loop. There is no retry.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::backend::VideoBackend;
use crate::config::{SessionConfig, MIN_POLL_INTERVAL};
use crate::state::SessionEvent;
use crate::store::{SessionStore, Ticket};
use crate::types::{FailureKind, RemoteStatus, VideoId};

/// Message recorded when the backend reports an error without details.
const UNKNOWN_ERROR: &str = "Unknown error";

/// The job a poll loop watches, and the generation it belongs to.
#[derive(Debug, Clone)]
pub struct PollTarget {
    pub ticket: Ticket,
    pub video_id: VideoId,
}

/// Handle to a running poll loop.
///
/// Dropping the handle cancels the loop.
pub struct PollHandle {
    video_id: VideoId,
    token: CancellationToken,
    task: JoinHandle<()>,
}

impl PollHandle {
    /// Stop the loop. Safe to call any number of times.
    pub fn cancel(&self) {
        if !self.token.is_cancelled() {
            debug!(video_id = %self.video_id, "Cancelling status poll");
        }
        self.token.cancel();
        self.task.abort();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Whether the loop has exited, by cancellation or by reaching a terminal state.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    pub fn video_id(&self) -> &VideoId {
        &self.video_id
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[derive(Debug, PartialEq, Eq)]
enum PollStep {
    Continue,
    Stop,
}

/// Drives Processing sessions to a terminal state.
pub struct StatusPoller {
    store: Arc<SessionStore>,
    backend: Arc<dyn VideoBackend>,
    interval: Duration,
    max_duration: Option<Duration>,
    active: Mutex<Option<PollHandle>>,
}

impl StatusPoller {
    pub fn new(
        store: Arc<SessionStore>,
        backend: Arc<dyn VideoBackend>,
        config: &SessionConfig,
    ) -> Self {
        let mut interval = config.poll_interval();
        if interval < MIN_POLL_INTERVAL {
            warn!(
                poll_interval_ms = config.poll_interval_ms,
                "Poll interval below minimum; using {}ms",
                MIN_POLL_INTERVAL.as_millis()
            );
            interval = MIN_POLL_INTERVAL;
        }
        Self {
            store,
            backend,
            interval,
            max_duration: config.max_poll_duration(),
            active: Mutex::new(None),
        }
    }

    /// Start polling `target`, replacing any loop that is already running.
    ///
    /// Does nothing unless the session is Processing under `target.ticket`.
    /// Must be called from within a Tokio runtime.
    pub fn start(&self, target: PollTarget) -> bool {
        let eligible = self.store.is_current(target.ticket)
            && self.store.read(|s| {
                s.is_processing() && s.video_id.as_ref() == Some(&target.video_id)
            });
        if !eligible {
            debug!(video_id = %target.video_id, "Session not processing; poll not started");
            return false;
        }

        let token = CancellationToken::new();
        let task = tokio::spawn(poll_loop(
            self.store.clone(),
            self.backend.clone(),
            target.clone(),
            self.interval,
            self.max_duration,
            token.clone(),
        ));
        let handle = PollHandle {
            video_id: target.video_id.clone(),
            token,
            task,
        };

        info!(
            video_id = %target.video_id,
            generation = target.ticket.generation(),
            interval_ms = self.interval.as_millis() as u64,
            "Started status polling"
        );
        // The replaced handle cancels its loop on drop.
        let previous = self.active.lock().replace(handle);
        drop(previous);
        true
    }

    /// Cancel the active loop, if any.
    pub fn stop(&self) {
        if let Some(handle) = self.active.lock().take() {
            handle.cancel();
        }
    }

    /// Whether a loop is currently running.
    pub fn is_active(&self) -> bool {
        self.active
            .lock()
            .as_ref()
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }
}

impl Drop for StatusPoller {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn poll_loop(
    store: Arc<SessionStore>,
    backend: Arc<dyn VideoBackend>,
    target: PollTarget,
    interval: Duration,
    max_duration: Option<Duration>,
    token: CancellationToken,
) {
    let started = Instant::now();
    let deadline = max_duration.map(|limit| started + limit);
    let mut ticker = tokio::time::interval_at(started + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    // The deadline also bounds fetches that never return.
    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => break,
            _ = expire(deadline) => {
                time_out(&store, &target, max_duration);
                break;
            }
            _ = ticker.tick() => {}
        }

        let step = tokio::select! {
            biased;
            _ = token.cancelled() => break,
            _ = expire(deadline) => {
                time_out(&store, &target, max_duration);
                break;
            }
            step = poll_once(&store, backend.as_ref(), &target) => step,
        };
        if step == PollStep::Stop {
            break;
        }
    }
    debug!(video_id = %target.video_id, "Status poll loop exited");
}

/// Resolves at `deadline`, or never when there is none.
async fn expire(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

fn time_out(store: &SessionStore, target: &PollTarget, limit: Option<Duration>) {
    let secs = limit.map(|l| l.as_secs()).unwrap_or_default();
    warn!(video_id = %target.video_id, limit_secs = secs, "Status polling timed out");
    let message = format!("Processing did not finish within {}s", secs);
    finish(store, target, FailureKind::PollTimeout, message);
}

async fn poll_once(store: &SessionStore, backend: &dyn VideoBackend, target: &PollTarget) -> PollStep {
    let report = match backend.fetch_status(&target.video_id).await {
        Ok(report) => report,
        Err(e) => {
            warn!(video_id = %target.video_id, error = %e, "Status fetch failed");
            return finish(store, target, FailureKind::Poll, e.to_string());
        }
    };
    debug!(
        video_id = %target.video_id,
        status = ?report.status,
        stage = %report.stage,
        progress = report.progress,
        "Status report"
    );

    match report.status {
        RemoteStatus::Error => {
            let message = report.error.unwrap_or_else(|| UNKNOWN_ERROR.to_string());
            warn!(video_id = %target.video_id, error = %message, "Backend reported ingestion failure");
            finish(store, target, FailureKind::Remote, message)
        }
        RemoteStatus::Ready => {
            if record_progress(store, target, report.progress, report.stage) == PollStep::Stop {
                return PollStep::Stop;
            }
            match backend.fetch_metadata(&target.video_id).await {
                Ok(metadata) => {
                    info!(video_id = %target.video_id, title = %metadata.title, "Video ready");
                    let _ = store.apply(target.ticket, SessionEvent::IngestionCompleted { metadata });
                    PollStep::Stop
                }
                Err(e) => {
                    warn!(video_id = %target.video_id, error = %e, "Metadata fetch failed");
                    finish(store, target, FailureKind::Metadata, e.to_string())
                }
            }
        }
        RemoteStatus::Processing => record_progress(store, target, report.progress, report.stage),
        RemoteStatus::Other(raw) => {
            warn!(video_id = %target.video_id, status = %raw, "Unrecognized status; still polling");
            record_progress(store, target, report.progress, report.stage)
        }
    }
}

fn record_progress(store: &SessionStore, target: &PollTarget, progress: f64, stage: String) -> PollStep {
    match store.apply(target.ticket, SessionEvent::ProgressReported { progress, stage }) {
        Ok(true) => PollStep::Continue,
        // Superseded, reset, or no longer Processing.
        _ => PollStep::Stop,
    }
}

fn finish(store: &SessionStore, target: &PollTarget, kind: FailureKind, message: String) -> PollStep {
    let _ = store.apply(target.ticket, SessionEvent::IngestionFailed { kind, message });
    PollStep::Stop
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockBackend, MockReply};
    use crate::types::{SessionStatus, StatusReport};

    const TICK: Duration = Duration::from_millis(2000);

    fn setup(backend: MockBackend, config: SessionConfig) -> (Arc<SessionStore>, StatusPoller, PollTarget) {
        let store = Arc::new(SessionStore::new());
        let ticket = store.advance(SessionEvent::SubmissionStarted).unwrap();
        let video_id = VideoId::new("abc");
        store
            .apply(ticket, SessionEvent::IngestionAccepted { video_id: video_id.clone() })
            .unwrap();
        let poller = StatusPoller::new(store.clone(), Arc::new(backend), &config);
        (store, poller, PollTarget { ticket, video_id })
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_poll_happens_after_one_interval() {
        let backend = MockBackend::new().with_status(StatusReport::processing("downloading", 0.1));
        let (_store, poller, target) = setup(backend.clone(), SessionConfig::default());
        assert!(poller.start(target));

        tokio::time::sleep(TICK - Duration::from_millis(1)).await;
        assert_eq!(backend.call_count("fetch_status"), 0);

        tokio::time::sleep(Duration::from_millis(2)).await;
        assert_eq!(backend.call_count("fetch_status"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_fetch_does_not_overlap_ticks() {
        let backend = MockBackend::new().with_status_reply(
            MockReply::ok(StatusReport::processing("transcribing", 0.3)).delayed(Duration::from_secs(5)),
        );
        let (_store, poller, target) = setup(backend.clone(), SessionConfig::default());
        poller.start(target);

        // Tick at 2s starts a fetch that resolves at 7s; ticks at 4s and 6s are skipped.
        tokio::time::sleep(Duration::from_millis(6500)).await;
        assert_eq!(backend.call_count("fetch_status"), 1);
        assert_eq!(backend.max_concurrent_status_fetches(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_not_started_unless_processing() {
        let backend = MockBackend::new();
        let (store, poller, target) = setup(backend.clone(), SessionConfig::default());
        store.reset().unwrap();

        assert!(!poller.start(target));
        assert!(!poller.is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_discards_in_flight_result() {
        let backend = MockBackend::new().with_status_reply(
            MockReply::ok(StatusReport::ready()).delayed(Duration::from_secs(1)),
        );
        let (store, poller, target) = setup(backend.clone(), SessionConfig::default());
        poller.start(target);

        tokio::time::sleep(TICK + Duration::from_millis(500)).await;
        assert_eq!(backend.call_count("fetch_status"), 1);
        poller.stop();
        poller.stop();

        tokio::time::sleep(Duration::from_secs(10)).await;
        let state = store.snapshot();
        assert_eq!(state.status, SessionStatus::Processing);
        assert!(state.metadata.is_none());
        assert_eq!(backend.call_count("fetch_metadata"), 0);
        assert!(!poller.is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_timeout_fails_session() {
        let backend = MockBackend::new().with_status(StatusReport::processing("indexing", 0.5));
        let config = SessionConfig::default().with_max_poll_duration(Some(Duration::from_secs(10)));
        let (store, poller, target) = setup(backend.clone(), config);
        poller.start(target);

        tokio::time::sleep(Duration::from_secs(30)).await;
        let state = store.snapshot();
        assert_eq!(state.status, SessionStatus::Error);
        assert_eq!(state.failure, Some(FailureKind::PollTimeout));
        assert!(state.last_error.unwrap().contains("10s"));
        assert!(!poller.is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_timeout_fires_while_fetch_hangs() {
        let backend = MockBackend::new().with_status_reply(
            MockReply::ok(StatusReport::processing("downloading", 0.1))
                .delayed(Duration::from_secs(24 * 60 * 60)),
        );
        let config = SessionConfig::default().with_max_poll_duration(Some(Duration::from_secs(10)));
        let (store, poller, target) = setup(backend.clone(), config);
        poller.start(target);

        tokio::time::sleep(Duration::from_secs(11)).await;
        let state = store.snapshot();
        assert_eq!(backend.call_count("fetch_status"), 1);
        assert_eq!(state.status, SessionStatus::Error);
        assert_eq!(state.failure, Some(FailureKind::PollTimeout));
        assert!(!poller.is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_timeout_bounds_metadata_fetch() {
        let backend = MockBackend::new()
            .with_status(StatusReport::ready())
            .with_metadata_reply(
                MockReply::ok(MockBackend::sample_metadata()).delayed(Duration::from_secs(3600)),
            );
        let config = SessionConfig::default().with_max_poll_duration(Some(Duration::from_secs(5)));
        let (store, poller, target) = setup(backend.clone(), config);
        poller.start(target);

        tokio::time::sleep(Duration::from_secs(6)).await;
        let state = store.snapshot();
        assert_eq!(state.status, SessionStatus::Error);
        assert_eq!(state.failure, Some(FailureKind::PollTimeout));
        assert!(state.metadata.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_interval_is_clamped() {
        let backend = MockBackend::new().with_status(StatusReport::ready());
        let config = SessionConfig {
            poll_interval_ms: 0,
            ..SessionConfig::default()
        };
        let (store, poller, target) = setup(backend.clone(), config);
        assert!(poller.start(target));

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(store.snapshot().status, SessionStatus::Ready);
        assert_eq!(backend.call_count("fetch_status"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_metadata_failure_fails_session() {
        let backend = MockBackend::new()
            .with_status(StatusReport::ready())
            .with_metadata_reply(MockReply::err("Video not found"));
        let (store, poller, target) = setup(backend.clone(), SessionConfig::default());
        poller.start(target);

        tokio::time::sleep(TICK * 2).await;
        let state = store.snapshot();
        assert_eq!(state.status, SessionStatus::Error);
        assert_eq!(state.failure, Some(FailureKind::Metadata));
        assert_eq!(state.last_error.as_deref(), Some("Video not found"));
        assert!(state.metadata.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_error_without_message_uses_placeholder() {
        let mut report = StatusReport::failed("ignored");
        report.error = None;
        let backend = MockBackend::new().with_status(report);
        let (store, poller, target) = setup(backend, SessionConfig::default());
        poller.start(target);

        tokio::time::sleep(TICK * 2).await;
        assert_eq!(store.snapshot().last_error.as_deref(), Some(UNKNOWN_ERROR));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unrecognized_status_keeps_polling() {
        let backend = MockBackend::new()
            .with_statuses(vec![
                StatusReport {
                    status: RemoteStatus::Other("warming_up".to_string()),
                    stage: "queued".to_string(),
                    progress: 0.0,
                    error: None,
                },
                StatusReport::ready(),
            ]);
        let (store, poller, target) = setup(backend.clone(), SessionConfig::default());
        poller.start(target);

        tokio::time::sleep(TICK * 3).await;
        assert_eq!(backend.call_count("fetch_status"), 2);
        assert_eq!(store.snapshot().status, SessionStatus::Ready);
    }
}
