//! Adaptive poll scheduling.
//!
//! The repeating timer is only replaced when the desired interval changes, so an
//! unchanged status keeps the existing cadence without drift.

use std::time::{Duration, Instant};

use log::{debug, info};

use crate::state::{ConnectionStatus, PollInterval};

/// A repeating timer driven by the shell's event loop.
pub trait Timer {
    /// Start repeating every `every`, counting from now. Replaces any previous arming.
    fn arm(&mut self, every: Duration);
    fn cancel(&mut self);
    /// Returns `true` at most once per elapsed period.
    fn fire_if_due(&mut self, now: Instant) -> bool;
}

/// Cooperative repeating timer, polled from a single thread.
#[derive(Debug, Default)]
pub struct IntervalTimer {
    every: Option<Duration>,
    next_due: Option<Instant>,
}

impl IntervalTimer {
    pub fn new() -> Self {
        Self::default()
    }

    fn arm_at(&mut self, every: Duration, now: Instant) {
        self.every = Some(every);
        self.next_due = Some(now + every);
    }

    pub fn next_due(&self) -> Option<Instant> {
        self.next_due
    }
}

impl Timer for IntervalTimer {
    fn arm(&mut self, every: Duration) {
        self.arm_at(every, Instant::now());
    }

    fn cancel(&mut self) {
        self.every = None;
        self.next_due = None;
    }

    fn fire_if_due(&mut self, now: Instant) -> bool {
        let (Some(every), Some(due)) = (self.every, self.next_due) else {
            return false;
        };
        if now < due {
            return false;
        }

        // Keep the phase; missed periods collapse into this one firing.
        let mut next = due + every;
        if next <= now {
            next = now + every;
        }
        self.next_due = Some(next);
        true
    }
}

pub struct PollScheduler<T: Timer> {
    timer: T,
    armed: Option<PollInterval>,
}

impl<T: Timer> PollScheduler<T> {
    /// Nothing is armed until the first cycle has run.
    pub fn new(timer: T) -> Self {
        Self { timer, armed: None }
    }

    pub fn armed(&self) -> Option<PollInterval> {
        self.armed
    }

    pub fn timer(&self) -> &T {
        &self.timer
    }

    /// Re-arm only when `status` calls for a different interval.
    /// Returns `true` if the timer was replaced.
    pub fn after_cycle(&mut self, status: ConnectionStatus) -> bool {
        let desired = PollInterval::for_status(status);
        if self.armed == Some(desired) {
            debug!("Polling interval unchanged ({:?})", desired.duration());
            return false;
        }

        if self.armed.is_some() {
            self.timer.cancel();
        }
        self.timer.arm(desired.duration());
        self.armed = Some(desired);

        info!(
            "Status is \"{}\", polling frequency set to {}s",
            status,
            desired.duration().as_secs()
        );
        true
    }

    pub fn is_due(&mut self, now: Instant) -> bool {
        self.timer.fire_if_due(now)
    }

    pub fn stop(&mut self) {
        self.timer.cancel();
        self.armed = None;
    }
}
