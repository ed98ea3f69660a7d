//! Value debouncing driven by explicit instants
//!
//! The debouncer never owns a timer task. Callers push values with the
//! current time and later ask it to commit; [`Debouncer::deadline`] tells an
//! event loop when the next commit can happen so it can `sleep_until` it.

use std::time::Duration;
use tokio::time::Instant;

/// Delays propagation of a value until it has been stable for `delay`
#[derive(Debug, Clone)]
pub struct Debouncer<T> {
    delay: Duration,
    committed: T,
    pending: Option<(T, Instant)>,
}

impl<T: Clone + PartialEq> Debouncer<T> {
    /// Creates a debouncer whose committed value starts at `initial`
    pub fn new(initial: T, delay: Duration) -> Self {
        Self {
            delay,
            committed: initial,
            pending: None,
        }
    }

    /// Records a new input value, replacing any pending one and restarting
    /// the delay window from `now`
    pub fn push(&mut self, value: T, now: Instant) {
        if self.pending.is_none() && value == self.committed {
            return;
        }
        self.pending = Some((value, now + self.delay));
    }

    /// Commits the pending value if its window has elapsed
    ///
    /// Returns true when the committed value changed.
    pub fn poll(&mut self, now: Instant) -> bool {
        match &self.pending {
            Some((_, deadline)) if *deadline <= now => {}
            _ => return false,
        }

        let Some((value, _)) = self.pending.take() else {
            return false;
        };
        if value == self.committed {
            return false;
        }
        self.committed = value;
        true
    }

    /// Latest committed value
    pub fn value(&self) -> &T {
        &self.committed
    }

    /// When the pending value will commit, if any
    pub fn deadline(&self) -> Option<Instant> {
        self.pending.as_ref().map(|(_, deadline)| *deadline)
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }
}
