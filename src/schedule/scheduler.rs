use serde::Serialize;
use tracing::info;
use utoipa::ToSchema;

use crate::model::class_period::{ClassPeriod, ClockTime};
use crate::model::student::Hour;
use crate::schedule::cadence::Cadence;

/// First period whose inclusive window contains `now`.
///
/// Windows are expected not to overlap; if they do, the earlier entry in
/// `periods` wins.
pub fn detect_period(periods: &[ClassPeriod], now: ClockTime) -> Option<&ClassPeriod> {
    periods.iter().find(|p| p.contains(now))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    Idle,
    Detected,
    Manual,
}

/// Outcome of evaluating the scheduler at one instant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Activity {
    pub mode: Mode,
    pub period: Option<ClassPeriod>,
    pub cadence: Cadence,
}

impl Activity {
    /// Timer identity: a change in either field means the timer must restart.
    pub fn timer_key(&self) -> (Option<Hour>, Cadence) {
        (self.period.as_ref().map(|p| p.hour), self.cadence)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PinError {
    UnknownHour(Hour),
    /// A real period is running; detection takes precedence over a pin.
    PeriodActive(Hour),
}

/// Active-period state machine with an optional manual pin.
///
/// ```text
/// Idle          --detect P-->        Detected(P)
/// Detected(P)   --detect none-->     Idle
/// Idle          --pin P-->           Manual(P)
/// Manual(P)     --detect P or Q-->   Detected(P or Q)   (pin dropped if Q != P)
/// Manual(P)     --detect none-->     Manual(P)
/// ```
pub struct PeriodScheduler {
    periods: Vec<ClassPeriod>,
    manual: Option<Hour>,
}

impl PeriodScheduler {
    pub fn new(periods: Vec<ClassPeriod>) -> Self {
        Self {
            periods,
            manual: None,
        }
    }

    pub fn manual(&self) -> Option<Hour> {
        self.manual
    }

    /// Pins `hour` while no real period is running.
    pub fn pin(&mut self, hour: Hour, now: ClockTime) -> Result<(), PinError> {
        if let Some(active) = detect_period(&self.periods, now) {
            return Err(PinError::PeriodActive(active.hour));
        }
        if !self.periods.iter().any(|p| p.hour == hour) {
            return Err(PinError::UnknownHour(hour));
        }
        self.manual = Some(hour);
        Ok(())
    }

    pub fn unpin(&mut self) {
        self.manual = None;
    }

    /// Applies detection at `now` and reports what should be polled and how often.
    pub fn evaluate(&mut self, now: ClockTime) -> Activity {
        if let Some(detected) = detect_period(&self.periods, now) {
            if let Some(pinned) = self.manual {
                if pinned != detected.hour {
                    info!(pinned = %pinned, detected = %detected.hour, "Real period started; dropping manual pin");
                    self.manual = None;
                }
            }
            return Activity {
                mode: Mode::Detected,
                period: Some(detected.clone()),
                cadence: Cadence::for_detected(detected, now),
            };
        }

        match self
            .manual
            .and_then(|hour| self.periods.iter().find(|p| p.hour == hour))
        {
            Some(pinned) => Activity {
                mode: Mode::Manual,
                period: Some(pinned.clone()),
                cadence: Cadence::Steady,
            },
            None => Activity {
                mode: Mode::Idle,
                period: None,
                cadence: Cadence::Idle,
            },
        }
    }
}
