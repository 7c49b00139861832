//! Session record and its transition rules.
//!
//! Every mutation of a session goes through [`SessionState::apply`]. Events
//! that do not make sense in the current status are ignored, which keeps the
//! invariants local to this module:
//!
//! - `progress` never decreases while Processing, and is reset on leaving it
//! - `metadata` is only present in the Ready state of the current job
//! - `chat_history` only grows, and only while Ready
//! - `last_error` is only written by ingestion and polling failures

use serde::{Deserialize, Serialize};

use crate::types::{FailureKind, SessionStatus, SourceRef, Turn, VideoId, VideoMetadata};

/// Full lifecycle state for one ingested video and its conversation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionState {
    pub video_id: Option<VideoId>,
    pub status: SessionStatus,
    /// Fraction of ingestion completed, in `[0.0, 1.0]`
    pub progress: f64,
    /// Last reported backend phase (display only)
    pub stage: String,
    pub metadata: Option<VideoMetadata>,
    pub chat_history: Vec<Turn>,
    /// Ingestion or polling error; chat failures live in `chat_history`
    pub last_error: Option<String>,
    pub failure: Option<FailureKind>,
}

/// Something that happened to a session.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// A new ingestion request is about to be sent
    SubmissionStarted,
    /// The backend accepted the job
    IngestionAccepted { video_id: VideoId },
    /// The ingestion request failed
    SubmissionFailed { message: String },
    /// A status poll reported progress
    ProgressReported { progress: f64, stage: String },
    /// Processing finished and metadata was fetched
    IngestionCompleted { metadata: VideoMetadata },
    /// Polling ended in failure
    IngestionFailed { kind: FailureKind, message: String },
    /// The user asked a question
    QuestionAsked { question: String },
    /// The backend answered a question
    AnswerReceived {
        answer: String,
        sources: Vec<SourceRef>,
    },
    /// The backend failed to answer a question
    QueryFailed { message: String },
    /// Start over
    Reset,
}

impl SessionEvent {
    /// Short name used in logs
    pub fn name(&self) -> &'static str {
        match self {
            Self::SubmissionStarted => "submission_started",
            Self::IngestionAccepted { .. } => "ingestion_accepted",
            Self::SubmissionFailed { .. } => "submission_failed",
            Self::ProgressReported { .. } => "progress_reported",
            Self::IngestionCompleted { .. } => "ingestion_completed",
            Self::IngestionFailed { .. } => "ingestion_failed",
            Self::QuestionAsked { .. } => "question_asked",
            Self::AnswerReceived { .. } => "answer_received",
            Self::QueryFailed { .. } => "query_failed",
            Self::Reset => "reset",
        }
    }
}

/// Pure transition function: the state after `event` is applied to `state`.
pub fn transition(mut state: SessionState, event: SessionEvent) -> SessionState {
    state.apply(event);
    state
}

impl SessionState {
    /// A fresh Idle session.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_processing(&self) -> bool {
        self.status == SessionStatus::Processing && self.video_id.is_some()
    }

    /// Whether questions can be asked.
    pub fn is_ready(&self) -> bool {
        self.status == SessionStatus::Ready && self.video_id.is_some()
    }

    /// Apply an event in place. Returns false when the event was ignored.
    pub fn apply(&mut self, event: SessionEvent) -> bool {
        match event {
            SessionEvent::SubmissionStarted => {
                self.last_error = None;
                self.failure = None;
                true
            }
            SessionEvent::IngestionAccepted { video_id } => {
                *self = Self {
                    video_id: Some(video_id),
                    status: SessionStatus::Processing,
                    ..Self::default()
                };
                true
            }
            SessionEvent::SubmissionFailed { message } => {
                self.video_id = None;
                self.metadata = None;
                self.status = SessionStatus::Error;
                self.last_error = Some(message);
                self.failure = Some(FailureKind::Submission);
                self.clear_progress();
                true
            }
            SessionEvent::ProgressReported { progress, stage } => {
                if !self.is_processing() {
                    return false;
                }
                if progress.is_finite() {
                    self.progress = self.progress.max(progress.clamp(0.0, 1.0));
                }
                self.stage = stage;
                true
            }
            SessionEvent::IngestionCompleted { metadata } => {
                if !self.is_processing() {
                    return false;
                }
                self.status = SessionStatus::Ready;
                self.metadata = Some(metadata);
                self.clear_progress();
                true
            }
            SessionEvent::IngestionFailed { kind, message } => {
                if !self.is_processing() {
                    return false;
                }
                self.status = SessionStatus::Error;
                self.last_error = Some(message);
                self.failure = Some(kind);
                self.clear_progress();
                true
            }
            SessionEvent::QuestionAsked { question } => {
                self.push_turn(Turn::user(question))
            }
            SessionEvent::AnswerReceived { answer, sources } => {
                self.push_turn(Turn::assistant(answer, sources))
            }
            SessionEvent::QueryFailed { message } => {
                self.push_turn(Turn::assistant_error(message))
            }
            SessionEvent::Reset => {
                *self = Self::default();
                true
            }
        }
    }

    fn push_turn(&mut self, turn: Turn) -> bool {
        if !self.is_ready() {
            return false;
        }
        self.chat_history.push(turn);
        true
    }

    fn clear_progress(&mut self) {
        self.progress = 0.0;
        self.stage.clear();
    }
}
