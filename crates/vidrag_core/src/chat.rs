//! Chat controller.
//!
//! The user's question is appended to the transcript before the backend is
//! asked (optimistic update). Whatever the backend does, exactly one assistant
//! turn follows: the answer, or an `Error: ...` turn. Query failures never
//! touch the session status or `last_error`.
//!
//! Every question gets a sequence number. Answers are held back until all
//! earlier questions have been answered, so the transcript follows the order
//! in which questions were asked even when responses arrive out of order.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::backend::VideoBackend;
use crate::config::AskPolicy;
use crate::error::{SessionError, SessionResult};
use crate::state::SessionEvent;
use crate::store::{SessionStore, Ticket};
use crate::types::VideoId;

/// Recorded when an ask is dropped before the backend answered.
const CANCELLED_MESSAGE: &str = "Request cancelled";

/// How a question was resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AskOutcome {
    /// The answer was appended to the transcript
    Answered,
    /// The query failed; an error turn was appended
    Failed(String),
    /// The session was reset or replaced first; nothing was recorded
    Discarded,
}

#[derive(Debug, Default)]
struct Ledger {
    generation: Option<u64>,
    next_seq: u64,
    next_to_apply: u64,
    in_flight: usize,
    completed: BTreeMap<u64, SessionEvent>,
}

impl Ledger {
    /// Start over when the session generation has moved on.
    fn sync(&mut self, ticket: Ticket) {
        if self.generation != Some(ticket.generation()) {
            *self = Self {
                generation: Some(ticket.generation()),
                ..Self::default()
            };
        }
    }
}

/// Manages the question/answer transcript of a Ready session.
pub struct ChatController {
    store: Arc<SessionStore>,
    backend: Arc<dyn VideoBackend>,
    policy: AskPolicy,
    ledger: Arc<Mutex<Ledger>>,
}

impl ChatController {
    pub fn new(store: Arc<SessionStore>, backend: Arc<dyn VideoBackend>, policy: AskPolicy) -> Self {
        Self {
            store,
            backend,
            policy,
            ledger: Arc::new(Mutex::new(Ledger::default())),
        }
    }

    /// Ask a question about the current video.
    ///
    /// Fails without changing the session when it is not Ready, or when
    /// another question is pending under [`AskPolicy::Exclusive`]. An answer
    /// that comes back after the session was reset or replaced is dropped and
    /// reported as [`AskOutcome::Discarded`].
    pub async fn ask(&self, question: &str) -> SessionResult<AskOutcome> {
        let mut pending = self.begin(question)?;
        debug!(video_id = %pending.video_id, seq = pending.seq, "Submitting question");

        let (event, outcome) = match self.backend.submit_query(&pending.video_id, question).await {
            Ok(answer) => (
                SessionEvent::AnswerReceived {
                    answer: answer.answer,
                    sources: answer.sources,
                },
                AskOutcome::Answered,
            ),
            Err(e) => {
                warn!(video_id = %pending.video_id, error = %e, "Query failed");
                let message = e.to_string();
                (
                    SessionEvent::QueryFailed {
                        message: message.clone(),
                    },
                    AskOutcome::Failed(message),
                )
            }
        };

        if !pending.settle(event) {
            return Ok(AskOutcome::Discarded);
        }
        Ok(outcome)
    }

    /// Whether a question is awaiting its answer.
    pub fn is_pending(&self) -> bool {
        let ledger = self.ledger.lock();
        match self.store.ticket() {
            Ok(ticket) => ledger.generation == Some(ticket.generation()) && ledger.in_flight > 0,
            Err(_) => false,
        }
    }

    fn begin(&self, question: &str) -> SessionResult<PendingAnswer> {
        let ticket = self.store.ticket()?;
        let mut ledger = self.ledger.lock();
        ledger.sync(ticket);

        let (status, video_id) = self.store.read(|s| {
            let id = if s.is_ready() { s.video_id.clone() } else { None };
            (s.status, id)
        });
        let video_id = video_id.ok_or_else(|| SessionError::invalid_state(status, "Ready", "ask"))?;

        if self.policy == AskPolicy::Exclusive && ledger.in_flight > 0 {
            return Err(SessionError::Busy);
        }

        self.store.apply(
            ticket,
            SessionEvent::QuestionAsked {
                question: question.to_string(),
            },
        )?;
        let seq = ledger.next_seq;
        ledger.next_seq += 1;
        ledger.in_flight += 1;

        Ok(PendingAnswer {
            ledger: self.ledger.clone(),
            store: self.store.clone(),
            ticket,
            seq,
            video_id,
            settled: false,
        })
    }
}

/// A question whose assistant turn has not been recorded yet.
///
/// Dropping it unsettled records a cancellation turn, so a user turn is
/// never left without its answer.
struct PendingAnswer {
    ledger: Arc<Mutex<Ledger>>,
    store: Arc<SessionStore>,
    ticket: Ticket,
    seq: u64,
    video_id: VideoId,
    settled: bool,
}

impl PendingAnswer {
    /// Record the answer. Returns `false` when the session has moved on.
    fn settle(&mut self, event: SessionEvent) -> bool {
        self.settled = true;
        let mut ledger = self.ledger.lock();
        if ledger.generation != Some(self.ticket.generation()) || !self.store.is_current(self.ticket) {
            debug!(seq = self.seq, "Discarding answer for superseded session");
            return false;
        }

        ledger.in_flight = ledger.in_flight.saturating_sub(1);
        ledger.completed.insert(self.seq, event);
        loop {
            let next = ledger.next_to_apply;
            let Some(event) = ledger.completed.remove(&next) else {
                break;
            };
            if next != self.seq {
                debug!(seq = next, "Applying held-back answer");
            }
            if self.store.apply(self.ticket, event).is_err() {
                debug!(seq = next, "Session moved on while applying answers");
                return false;
            }
            ledger.next_to_apply += 1;
        }
        true
    }
}

impl Drop for PendingAnswer {
    fn drop(&mut self) {
        if !self.settled {
            self.settle(SessionEvent::QueryFailed {
                message: CANCELLED_MESSAGE.to_string(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::mock::{MockBackend, MockReply};
    use crate::types::{QueryAnswer, Role, SessionStatus, SourceRef, VideoMetadata};

    fn ready_store() -> Arc<SessionStore> {
        let store = Arc::new(SessionStore::new());
        let ticket = store.advance(SessionEvent::SubmissionStarted).unwrap();
        store
            .apply(ticket, SessionEvent::IngestionAccepted { video_id: VideoId::new("abc") })
            .unwrap();
        store
            .apply(
                ticket,
                SessionEvent::IngestionCompleted {
                    metadata: VideoMetadata {
                        title: "Talk".to_string(),
                        duration: 90.0,
                        chunk_count: 3,
                    },
                },
            )
            .unwrap();
        store
    }

    fn answer(text: &str) -> MockReply<QueryAnswer> {
        MockReply::ok(QueryAnswer {
            answer: text.to_string(),
            sources: vec![SourceRef::new("https://youtu.be/abc?t=42", "excerpt")],
        })
    }

    fn contents(store: &SessionStore) -> Vec<(Role, String)> {
        store.read(|s| {
            s.chat_history
                .iter()
                .map(|t| (t.role, t.content.clone()))
                .collect()
        })
    }

    #[tokio::test]
    async fn test_answer_appended_after_question() {
        let store = ready_store();
        let backend = MockBackend::new().with_query_reply("What is it about?", answer("Ownership"));
        let chat = ChatController::new(store.clone(), Arc::new(backend), AskPolicy::Exclusive);

        let outcome = chat.ask("What is it about?").await.unwrap();
        assert_eq!(outcome, AskOutcome::Answered);

        let history = store.read(|s| s.chat_history.clone());
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].role, Role::User);
        assert_eq!(history[1].content, "Ownership");
        assert_eq!(history[1].sources.len(), 1);
    }

    #[tokio::test]
    async fn test_ask_rejected_when_not_ready() {
        let store = Arc::new(SessionStore::new());
        let backend = MockBackend::new();
        let chat = ChatController::new(store.clone(), Arc::new(backend.clone()), AskPolicy::Exclusive);

        let err = chat.ask("anything?").await.unwrap_err();
        assert!(matches!(err, SessionError::InvalidState { .. }));
        assert!(store.snapshot().chat_history.is_empty());
        assert_eq!(backend.call_count("submit_query"), 0);
    }

    #[tokio::test]
    async fn test_query_failure_is_isolated_to_turn() {
        let store = ready_store();
        let backend = MockBackend::new().with_query_reply("q", MockReply::err("timeout"));
        let chat = ChatController::new(store.clone(), Arc::new(backend), AskPolicy::Exclusive);

        let outcome = chat.ask("q").await.unwrap();
        assert_eq!(outcome, AskOutcome::Failed("timeout".to_string()));

        let state = store.snapshot();
        assert_eq!(state.status, SessionStatus::Ready);
        assert!(state.last_error.is_none());
        let last = state.chat_history.last().unwrap();
        assert_eq!(last.content, "Error: timeout");
        assert!(last.sources.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_exclusive_policy_rejects_overlapping_ask() {
        let store = ready_store();
        let backend = MockBackend::new()
            .with_query_reply("first", answer("one").delayed(Duration::from_secs(2)));
        let chat = ChatController::new(store.clone(), Arc::new(backend.clone()), AskPolicy::Exclusive);

        let (first, second) = tokio::join!(chat.ask("first"), chat.ask("second"));
        assert_eq!(first.unwrap(), AskOutcome::Answered);
        assert!(matches!(second, Err(SessionError::Busy)));
        assert_eq!(backend.call_count("submit_query"), 1);
        assert_eq!(
            contents(&store),
            vec![(Role::User, "first".to_string()), (Role::Assistant, "one".to_string())]
        );
        assert!(!chat.is_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn test_pipelined_answers_follow_request_order() {
        let store = ready_store();
        let backend = MockBackend::new()
            .with_query_reply("first", answer("one").delayed(Duration::from_secs(3)))
            .with_query_reply("second", answer("two").delayed(Duration::from_secs(1)));
        let chat = ChatController::new(store.clone(), Arc::new(backend), AskPolicy::Pipelined);

        let (first, second) = tokio::join!(chat.ask("first"), chat.ask("second"));
        assert_eq!(first.unwrap(), AskOutcome::Answered);
        assert_eq!(second.unwrap(), AskOutcome::Answered);

        assert_eq!(
            contents(&store),
            vec![
                (Role::User, "first".to_string()),
                (Role::User, "second".to_string()),
                (Role::Assistant, "one".to_string()),
                (Role::Assistant, "two".to_string()),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_answer_after_reset_is_discarded() {
        let store = ready_store();
        let backend = MockBackend::new()
            .with_query_reply("slow", answer("late").delayed(Duration::from_secs(5)));
        let chat = ChatController::new(store.clone(), Arc::new(backend), AskPolicy::Exclusive);

        let reset = async {
            tokio::time::sleep(Duration::from_secs(1)).await;
            store.reset().unwrap();
        };
        let (result, _) = tokio::join!(chat.ask("slow"), reset);

        assert_eq!(result.unwrap(), AskOutcome::Discarded);
        let state = store.snapshot();
        assert_eq!(state.status, SessionStatus::Idle);
        assert!(state.chat_history.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_ask_records_error_turn() {
        let store = ready_store();
        let backend = MockBackend::new()
            .with_query_reply("slow", answer("never").delayed(Duration::from_secs(60)));
        let chat = ChatController::new(store.clone(), Arc::new(backend), AskPolicy::Exclusive);

        let result = tokio::time::timeout(Duration::from_secs(1), chat.ask("slow")).await;
        assert!(result.is_err());

        assert_eq!(
            contents(&store),
            vec![
                (Role::User, "slow".to_string()),
                (Role::Assistant, format!("Error: {}", CANCELLED_MESSAGE)),
            ]
        );
        assert!(!chat.is_pending());
    }
}
