use std::time::Duration;

use tokio::time::Instant;

use crate::model::student::Hour;
use crate::schedule::cadence::Cadence;
use crate::schedule::scheduler::Activity;

/// How often the desired cadence is recomputed, independent of the timer.
pub const HEARTBEAT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerAction {
    /// Scheduled cadence still matches.
    Keep,
    /// Period or zone changed: the old deadline was dropped and a new one set.
    Restart,
}

/// Deadline for the next check, tagged with the period/zone it was set for.
#[derive(Debug)]
pub struct RefreshTimer {
    key: Option<(Option<Hour>, Cadence)>,
    due: Instant,
}

impl RefreshTimer {
    pub fn new(now: Instant) -> Self {
        Self { key: None, due: now }
    }

    pub fn due(&self) -> Instant {
        self.due
    }

    /// Compares the desired cadence with the scheduled one and restarts the
    /// timer from `now` when they differ.
    pub fn reconcile(&mut self, activity: &Activity, now: Instant) -> TimerAction {
        let key = activity.timer_key();
        if self.key == Some(key) {
            return TimerAction::Keep;
        }
        self.key = Some(key);
        self.due = now + activity.cadence.interval();
        TimerAction::Restart
    }

    /// Schedules the next regular tick after one fired.
    pub fn rearm(&mut self, cadence: Cadence, now: Instant) {
        self.due = now + cadence.interval();
    }
}

/// Applies check results in completion order, discarding any result whose
/// request is older than one already applied.
#[derive(Debug, Default)]
pub struct ResultSequencer {
    issued: u64,
    applied: u64,
}

impl ResultSequencer {
    pub fn issue(&mut self) -> u64 {
        self.issued += 1;
        self.issued
    }

    pub fn accept(&mut self, seq: u64) -> bool {
        if seq <= self.applied {
            return false;
        }
        self.applied = seq;
        true
    }
}
