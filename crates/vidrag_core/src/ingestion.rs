//! Ingestion controller.

use std::sync::Arc;

use tracing::{info, warn};

use crate::backend::VideoBackend;
use crate::error::SessionError;
use crate::poller::{PollTarget, StatusPoller};
use crate::state::SessionEvent;
use crate::store::{SessionStore, Ticket};
use crate::types::VideoId;

/// What became of a submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// The job was accepted and is being polled
    Accepted(VideoId),
    /// The submission failed; the session is in the Error state
    Failed(String),
    /// A reset or newer submission won; nothing was applied
    Superseded,
    /// The session has been shut down
    Closed,
}

/// Starts ingestion jobs and hands them to the poller.
///
/// A new submission always supersedes the previous job: its poll loop is
/// cancelled and any of its responses still in flight are discarded.
pub struct IngestionController {
    store: Arc<SessionStore>,
    backend: Arc<dyn VideoBackend>,
    poller: Arc<StatusPoller>,
}

impl IngestionController {
    pub fn new(
        store: Arc<SessionStore>,
        backend: Arc<dyn VideoBackend>,
        poller: Arc<StatusPoller>,
    ) -> Self {
        Self {
            store,
            backend,
            poller,
        }
    }

    /// Submit `url` for ingestion.
    ///
    /// Failures are recorded in the session rather than returned as errors.
    pub async fn submit(&self, url: &str) -> SubmitOutcome {
        let ticket = match self.begin() {
            Some(ticket) => ticket,
            None => return SubmitOutcome::Closed,
        };

        let url = url.trim();
        if url.is_empty() {
            return self.fail(ticket, "Please enter a video URL".to_string());
        }

        info!(url = %url, generation = ticket.generation(), "Submitting video for ingestion");
        match self.backend.submit_ingestion(url).await {
            Ok(receipt) => self.accept(ticket, receipt.video_id),
            Err(e) => {
                warn!(url = %url, error = %e, "Ingestion request failed");
                self.fail(ticket, e.to_string())
            }
        }
    }

    /// Follow a job that was submitted earlier, e.g. by another client.
    pub fn attach(&self, video_id: VideoId) -> SubmitOutcome {
        match self.begin() {
            Some(ticket) => {
                info!(video_id = %video_id, "Attaching to existing ingestion job");
                self.accept(ticket, video_id)
            }
            None => SubmitOutcome::Closed,
        }
    }

    fn begin(&self) -> Option<Ticket> {
        let ticket = self.store.advance(SessionEvent::SubmissionStarted).ok()?;
        self.poller.stop();
        Some(ticket)
    }

    fn accept(&self, ticket: Ticket, video_id: VideoId) -> SubmitOutcome {
        let event = SessionEvent::IngestionAccepted {
            video_id: video_id.clone(),
        };
        match self.store.apply(ticket, event) {
            Ok(_) => {
                self.poller.start(PollTarget {
                    ticket,
                    video_id: video_id.clone(),
                });
                SubmitOutcome::Accepted(video_id)
            }
            Err(e) => Self::discarded(e),
        }
    }

    fn fail(&self, ticket: Ticket, message: String) -> SubmitOutcome {
        let event = SessionEvent::SubmissionFailed {
            message: message.clone(),
        };
        match self.store.apply(ticket, event) {
            Ok(_) => SubmitOutcome::Failed(message),
            Err(e) => Self::discarded(e),
        }
    }

    fn discarded(err: SessionError) -> SubmitOutcome {
        match err {
            SessionError::Closed => SubmitOutcome::Closed,
            _ => SubmitOutcome::Superseded,
        }
    }
}
