use std::time::Duration;

use serde::Serialize;
use utoipa::ToSchema;

use crate::model::class_period::{ClassPeriod, ClockTime};

/// Length of the ramp-up and closing zones, in minutes.
pub const ZONE_MINUTES: i32 = 10;

/// Polling interval currently in effect, named by where "now" sits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Cadence {
    /// First ten minutes of a detected period.
    RampUp,
    /// Last ten minutes of a detected period.
    Closing,
    /// Mid-class, and every manually pinned period.
    Steady,
    /// Nothing active: only watch for a period to start.
    Idle,
}

impl Cadence {
    pub fn interval(self) -> Duration {
        match self {
            Cadence::RampUp => Duration::from_secs(30),
            Cadence::Closing => Duration::from_secs(15),
            Cadence::Steady => Duration::from_secs(10 * 60),
            Cadence::Idle => Duration::from_secs(60),
        }
    }

    /// Zone for a detected period.
    ///
    /// The ramp-up rule is checked first, so a period shorter than twenty
    /// minutes reports ramp-up wherever the two zones overlap.
    pub fn for_detected(period: &ClassPeriod, now: ClockTime) -> Self {
        let into_class = now.minutes() - period.start_time.minutes();
        let until_end = period.end_time.minutes() - now.minutes();

        if into_class <= ZONE_MINUTES {
            Cadence::RampUp
        } else if until_end <= ZONE_MINUTES {
            Cadence::Closing
        } else {
            Cadence::Steady
        }
    }
}
