//! Monotonic deadline timers polled by the run loop.
//!
//! A [`Timer`] holds no task and no callback. It records when it is next
//! due; the owner asks [`Timer::expire`] whether it fired and runs whatever
//! the timer stands for. That keeps every expiry on the single control loop
//! and makes cancelling always safe, even while the loop is mid-dispatch.

use std::time::Duration;

use tokio::time::Instant;

/// A one-shot or repeating deadline.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Timer {
    deadline: Option<Instant>,
    interval: Option<Duration>,
}

impl Timer {
    /// A disabled timer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm as a repeating timer firing every `interval` from now.
    pub fn restart(&mut self, interval: Duration) {
        self.interval = Some(interval);
        self.deadline = Some(Instant::now() + interval);
    }

    /// Arm as a one-shot timer firing once after `delay`.
    pub fn restart_once(&mut self, delay: Duration) {
        self.interval = None;
        self.deadline = Some(Instant::now() + delay);
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
        self.interval = None;
    }

    /// Whether the timer is armed.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.deadline.is_some()
    }

    #[must_use]
    pub fn is_repeating(&self) -> bool {
        self.interval.is_some()
    }

    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Report whether the timer fired at `now`.
    ///
    /// A repeating timer re-arms one interval after `now`; a one-shot
    /// timer disables itself.
    pub fn expire(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if deadline <= now => {
                self.deadline = self.interval.map(|interval| now + interval);
                true
            }
            _ => false,
        }
    }
}
