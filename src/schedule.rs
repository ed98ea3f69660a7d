//! Polling schedule for one data source
//!
//! Each data source owns its own `RefreshSchedule`; schedules are never
//! synchronized with each other. Like the debouncer, a schedule is driven by
//! explicit instants so tests can step time deterministically.

use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone)]
pub struct RefreshSchedule {
    interval: Duration,
    next_due: Option<Instant>,
}

impl RefreshSchedule {
    /// Creates a stopped schedule
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            next_due: None,
        }
    }

    /// Starts polling; the first refresh is due one interval after `now`
    pub fn start(&mut self, now: Instant) {
        self.next_due = Some(now + self.interval);
    }

    pub fn stop(&mut self) {
        self.next_due = None;
    }

    pub fn is_running(&self) -> bool {
        self.next_due.is_some()
    }

    pub fn is_due(&self, now: Instant) -> bool {
        matches!(self.next_due, Some(due) if due <= now)
    }

    /// Pushes the next refresh one interval past `now`
    ///
    /// Called whenever a fetch is issued for the source, timer-driven or not,
    /// so a user-triggered fetch supersedes the pending poll.
    pub fn reset(&mut self, now: Instant) {
        if self.next_due.is_some() {
            self.next_due = Some(now + self.interval);
        }
    }

    pub fn next_due(&self) -> Option<Instant> {
        self.next_due
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const INTERVAL: Duration = Duration::from_secs(120);

    #[test]
    fn stopped_schedule_is_never_due() {
        let schedule = RefreshSchedule::new(INTERVAL);
        assert!(!schedule.is_running());
        assert!(!schedule.is_due(Instant::now() + Duration::from_secs(3600)));
    }

    #[test]
    fn due_after_interval() {
        let start = Instant::now();
        let mut schedule = RefreshSchedule::new(INTERVAL);
        schedule.start(start);

        assert!(!schedule.is_due(start + Duration::from_secs(119)));
        assert!(schedule.is_due(start + INTERVAL));
    }

    #[test]
    fn reset_postpones_next_poll() {
        let start = Instant::now();
        let mut schedule = RefreshSchedule::new(INTERVAL);
        schedule.start(start);

        schedule.reset(start + Duration::from_secs(100));
        assert!(!schedule.is_due(start + INTERVAL));
        assert_eq!(schedule.next_due(), Some(start + Duration::from_secs(220)));
    }

    #[test]
    fn reset_does_not_start_a_stopped_schedule() {
        let mut schedule = RefreshSchedule::new(INTERVAL);
        schedule.reset(Instant::now());
        assert!(!schedule.is_running());
    }
}
