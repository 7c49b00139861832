//! Session facade.
//!
//! Owns one session and wires the ingestion controller, status poller and
//! chat controller to it.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::info;

use crate::backend::VideoBackend;
use crate::chat::{AskOutcome, ChatController};
use crate::config::SessionConfig;
use crate::error::SessionResult;
use crate::ingestion::{IngestionController, SubmitOutcome};
use crate::poller::StatusPoller;
use crate::state::SessionState;
use crate::store::SessionStore;
use crate::types::{SessionStatus, VideoId};

/// Entry point for driving one video Q&A session.
///
/// Dropping the facade tears the session down: the poll loop is cancelled and
/// responses still in flight are discarded.
pub struct SessionFacade {
    store: Arc<SessionStore>,
    poller: Arc<StatusPoller>,
    ingestion: IngestionController,
    chat: ChatController,
}

impl SessionFacade {
    /// Create an Idle session backed by `backend`.
    pub fn new(backend: Arc<dyn VideoBackend>, config: SessionConfig) -> Self {
        let store = Arc::new(SessionStore::new());
        let poller = Arc::new(StatusPoller::new(store.clone(), backend.clone(), &config));
        let ingestion = IngestionController::new(store.clone(), backend.clone(), poller.clone());
        let chat = ChatController::new(store.clone(), backend, config.ask_policy);

        Self {
            store,
            poller,
            ingestion,
            chat,
        }
    }

    /// Submit a video for ingestion, superseding any current job.
    pub async fn submit(&self, url: &str) -> SubmitOutcome {
        self.ingestion.submit(url).await
    }

    /// Follow an already-submitted job.
    pub fn attach(&self, video_id: VideoId) -> SubmitOutcome {
        self.ingestion.attach(video_id)
    }

    /// Ask a question; only valid once the session is Ready.
    pub async fn ask(&self, question: &str) -> SessionResult<AskOutcome> {
        self.chat.ask(question).await
    }

    /// Cancel polling and return to a fresh Idle session.
    pub fn reset(&self) -> SessionResult<()> {
        self.poller.stop();
        self.store.reset()?;
        info!("Session reset");
        Ok(())
    }

    /// Tear the session down. Later operations are rejected.
    pub fn shutdown(&self) {
        self.poller.stop();
        if !self.store.is_closed() {
            self.store.close();
            info!("Session shut down");
        }
    }

    pub fn snapshot(&self) -> SessionState {
        self.store.snapshot()
    }

    pub fn status(&self) -> SessionStatus {
        self.store.read(|s| s.status)
    }

    /// Observe every change to the session.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.store.subscribe()
    }

    pub fn is_polling(&self) -> bool {
        self.poller.is_active()
    }

    /// Whether a question is waiting for its answer.
    pub fn is_asking(&self) -> bool {
        self.chat.is_pending()
    }

    /// Wait until the session leaves the Processing state, or is shut down.
    pub async fn wait_until_settled(&self) -> SessionState {
        let mut updates = self.subscribe();
        tokio::select! {
            settled = updates.wait_for(|s| s.status != SessionStatus::Processing) => match settled {
                Ok(state) => state.clone(),
                Err(_) => self.snapshot(),
            },
            _ = self.store.closed() => self.snapshot(),
        }
    }
}

impl Drop for SessionFacade {
    fn drop(&mut self) {
        self.shutdown();
    }
}
