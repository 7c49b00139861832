//! # vidrag_core
//!
//! Session state machine for vidrag: submit a video for ingestion, follow its
//! progress, then hold a question/answer conversation about it.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │                       SessionFacade                        │
//! │  ┌───────────────────┐ ┌──────────────┐ ┌────────────────┐ │
//! │  │IngestionController│▶│ StatusPoller │ │ ChatController │ │
//! │  └─────────┬─────────┘ └──────┬───────┘ └───────┬────────┘ │
//! │            └──────────────────┼─────────────────┘          │
//! │                               ▼                            │
//! │                 SessionStore (generation-tagged)           │
//! │                         SessionState                       │
//! └────────────────────────────────────────────────────────────┘
//!                               │
//!                               ▼
//!                     VideoBackend (trait)
//! ```
//!
//! - **SessionState**: the record plus its transition rules
//! - **IngestionController**: submits jobs; a new job supersedes the old one
//! - **StatusPoller**: cancellable, non-overlapping status polling
//! - **ChatController**: optimistic question turns, answers in request order
//! - **SessionFacade**: owns all of the above; reset and teardown
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use vidrag_core::{MockBackend, SessionConfig, SessionFacade, SessionStatus};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let facade = SessionFacade::new(Arc::new(MockBackend::new()), SessionConfig::default());
//! facade.submit("https://youtu.be/abc").await;
//!
//! let state = facade.wait_until_settled().await;
//! if state.status == SessionStatus::Ready {
//!     facade.ask("What is the video about?").await?;
//! }
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod chat;
pub mod config;
pub mod error;
pub mod facade;
pub mod ingestion;
pub mod mock;
pub mod poller;
pub mod state;
pub mod store;
pub mod types;

pub use backend::VideoBackend;
pub use chat::{AskOutcome, ChatController};
pub use config::{
    AskPolicy, SessionConfig, DEFAULT_MAX_POLL_SECS, DEFAULT_POLL_INTERVAL_MS, MIN_POLL_INTERVAL,
};
pub use error::{BackendError, BackendResult, SessionError, SessionResult};
pub use facade::SessionFacade;
pub use ingestion::{IngestionController, SubmitOutcome};
pub use mock::{CapturedCall, MockBackend, MockReply};
pub use poller::{PollHandle, PollTarget, StatusPoller};
pub use state::{transition, SessionEvent, SessionState};
pub use store::{SessionStore, Ticket};
pub use types::{
    FailureKind, IngestReceipt, QueryAnswer, RemoteStatus, Role, SessionStatus, SourceRef,
    StatusReport, Turn, VideoId, VideoMetadata,
};
