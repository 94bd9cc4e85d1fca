//! Observable operation outcomes.
//!
//! Each operation kind owns one [`OutcomeSlot`]. Slots publish through a
//! `tokio::sync::watch` channel and carry a generation counter: starting a call,
//! failing validation, or resetting bumps it, and a completion is only published
//! when it still holds the current generation. All generation reads and writes
//! happen inside the channel's modify closures, so they are serialized with
//! every publish.

use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::watch;

/// State of one auth operation as seen by the UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthOutcome<T> {
    Idle,
    Pending,
    Ok(T),
    Failed(String),
}

impl<T> Default for AuthOutcome<T> {
    fn default() -> Self {
        AuthOutcome::Idle
    }
}

impl<T> AuthOutcome<T> {
    pub fn is_pending(&self) -> bool {
        matches!(self, AuthOutcome::Pending)
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, AuthOutcome::Ok(_))
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            AuthOutcome::Ok(value) => Some(value),
            _ => None,
        }
    }

    pub fn failure(&self) -> Option<&str> {
        match self {
            AuthOutcome::Failed(reason) => Some(reason),
            _ => None,
        }
    }
}

/// Identifies one in-flight request on a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket(u64);

#[derive(Debug)]
pub struct OutcomeSlot<T> {
    tx: watch::Sender<AuthOutcome<T>>,
    generation: AtomicU64,
}

impl<T: Clone> Default for OutcomeSlot<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone> OutcomeSlot<T> {
    pub fn new() -> Self {
        Self {
            tx: watch::Sender::new(AuthOutcome::Idle),
            generation: AtomicU64::new(0),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<AuthOutcome<T>> {
        self.tx.subscribe()
    }

    pub fn current(&self) -> AuthOutcome<T> {
        self.tx.borrow().clone()
    }

    /// Publishes `Pending` for a new request, superseding any in flight.
    pub fn begin(&self) -> Ticket {
        let mut ticket = Ticket(0);
        self.tx.send_modify(|outcome| {
            ticket = Ticket(self.generation.fetch_add(1, Ordering::AcqRel) + 1);
            *outcome = AuthOutcome::Pending;
        });
        ticket
    }

    /// Publishes a failure that never reached the network.
    pub fn fail(&self, reason: impl Into<String>) -> AuthOutcome<T> {
        let failed = AuthOutcome::Failed(reason.into());
        let published = failed.clone();
        self.tx.send_modify(|outcome| {
            self.generation.fetch_add(1, Ordering::AcqRel);
            *outcome = published;
        });
        failed
    }

    /// Returns the slot to `Idle`; completions of earlier tickets are dropped.
    pub fn reset(&self) {
        self.tx.send_modify(|outcome| {
            self.generation.fetch_add(1, Ordering::AcqRel);
            *outcome = AuthOutcome::Idle;
        });
    }

    pub fn is_current(&self, ticket: Ticket) -> bool {
        self.generation.load(Ordering::Acquire) == ticket.0
    }

    /// Completes `ticket` if it is still current.
    ///
    /// `resolve` runs only for the current ticket, so side effects tied to a
    /// completion (such as persisting a session) are skipped for stale ones.
    /// Returns the published outcome, or `None` if the ticket was superseded.
    ///
    /// `resolve` runs while the slot's write lock is held and may do blocking
    /// store I/O. Keep it short; subscribers reading the slot wait on it.
    pub fn commit(
        &self,
        ticket: Ticket,
        resolve: impl FnOnce() -> AuthOutcome<T>,
    ) -> Option<AuthOutcome<T>> {
        let mut published = None;
        self.tx.send_if_modified(|outcome| {
            if self.generation.load(Ordering::Acquire) != ticket.0 {
                return false;
            }
            let next = resolve();
            published = Some(next.clone());
            *outcome = next;
            true
        });
        published
    }
}
