//! Generation-tagged session store.
//!
//! The store is the single owner of the [`SessionState`]. Every request sent
//! to the backend carries the [`Ticket`] that was current when it was issued,
//! and its result is only applied if that ticket is still current. Resubmit,
//! reset and shutdown all advance the generation, so late results from the
//! previous job are dropped instead of leaking into the new one.

use parking_lot::RwLock;
use tokio::sync::watch;
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};
use tracing::debug;

use crate::error::{SessionError, SessionResult};
use crate::state::{SessionEvent, SessionState};

/// Generation a request was issued under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket {
    generation: u64,
}

impl Ticket {
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

struct Inner {
    state: SessionState,
    generation: u64,
    closed: bool,
}

/// Shared owner of the session state.
pub struct SessionStore {
    inner: RwLock<Inner>,
    updates: watch::Sender<SessionState>,
    shutdown: CancellationToken,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStore {
    pub fn new() -> Self {
        let (updates, _) = watch::channel(SessionState::default());
        Self {
            inner: RwLock::new(Inner {
                state: SessionState::default(),
                generation: 0,
                closed: false,
            }),
            updates,
            shutdown: CancellationToken::new(),
        }
    }

    /// Copy of the current state.
    pub fn snapshot(&self) -> SessionState {
        self.inner.read().state.clone()
    }

    /// Read a value out of the current state without cloning all of it.
    pub fn read<R>(&self, f: impl FnOnce(&SessionState) -> R) -> R {
        f(&self.inner.read().state)
    }

    /// Ticket for the current generation.
    pub fn ticket(&self) -> SessionResult<Ticket> {
        let inner = self.inner.read();
        if inner.closed {
            return Err(SessionError::Closed);
        }
        Ok(Ticket {
            generation: inner.generation,
        })
    }

    pub fn is_current(&self, ticket: Ticket) -> bool {
        let inner = self.inner.read();
        !inner.closed && inner.generation == ticket.generation
    }

    pub fn is_closed(&self) -> bool {
        self.inner.read().closed
    }

    /// Start a new generation and apply `event` to it.
    ///
    /// Everything issued under an older ticket becomes stale.
    pub fn advance(&self, event: SessionEvent) -> SessionResult<Ticket> {
        let mut inner = self.inner.write();
        if inner.closed {
            return Err(SessionError::Closed);
        }
        inner.generation += 1;
        debug!(generation = inner.generation, event = event.name(), "Advancing session generation");
        inner.state.apply(event);
        self.updates.send_replace(inner.state.clone());
        Ok(Ticket {
            generation: inner.generation,
        })
    }

    /// Apply `event` if `ticket` is still current.
    ///
    /// Returns whether the state machine accepted the event.
    pub fn apply(&self, ticket: Ticket, event: SessionEvent) -> SessionResult<bool> {
        self.update(ticket, |state| state.apply(event))
    }

    /// Run `f` against the state if `ticket` is still current.
    pub fn update<R>(&self, ticket: Ticket, f: impl FnOnce(&mut SessionState) -> R) -> SessionResult<R> {
        let mut inner = self.inner.write();
        if inner.closed {
            return Err(SessionError::Closed);
        }
        if inner.generation != ticket.generation {
            debug!(
                issued = ticket.generation,
                current = inner.generation,
                "Discarding stale response"
            );
            return Err(SessionError::StaleResponse);
        }
        let result = f(&mut inner.state);
        self.updates.send_replace(inner.state.clone());
        Ok(result)
    }

    /// Replace the state with a fresh Idle record under a new generation.
    pub fn reset(&self) -> SessionResult<Ticket> {
        self.advance(SessionEvent::Reset)
    }

    /// Invalidate every outstanding ticket for good.
    pub fn close(&self) {
        let mut inner = self.inner.write();
        if !inner.closed {
            inner.closed = true;
            inner.generation += 1;
            debug!(generation = inner.generation, "Session store closed");
        }
        drop(inner);
        self.shutdown.cancel();
    }

    /// Resolves once [`close`](Self::close) has been called.
    pub fn closed(&self) -> WaitForCancellationFuture<'_> {
        self.shutdown.cancelled()
    }

    /// Receiver that observes every applied change.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.updates.subscribe()
    }
}
