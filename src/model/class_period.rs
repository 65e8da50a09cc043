use std::fmt;
use std::str::FromStr;

use chrono::{NaiveTime, Timelike};
use serde::{Serialize, Serializer};
use utoipa::ToSchema;

use crate::model::student::Hour;

/// Wall-clock time truncated to the minute.
///
/// Ordering matches lexicographic comparison of zero-padded `HH:MM` strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClockTime(u16);

impl ClockTime {
    pub fn new(hour: u16, minute: u16) -> Option<Self> {
        (hour < 24 && minute < 60).then(|| Self(hour * 60 + minute))
    }

    pub fn from_time(time: NaiveTime) -> Self {
        Self((time.hour() * 60 + time.minute()) as u16)
    }

    pub const fn hm(hour: u16, minute: u16) -> Self {
        Self(hour * 60 + minute)
    }

    pub fn minutes(self) -> i32 {
        self.0 as i32
    }
}

impl fmt::Display for ClockTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.0 / 60, self.0 % 60)
    }
}

impl FromStr for ClockTime {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (h, m) = s
            .split_once(':')
            .ok_or_else(|| format!("expected HH:MM, got {s:?}"))?;
        let hour = h.parse().map_err(|_| format!("invalid hour in {s:?}"))?;
        let minute = m.parse().map_err(|_| format!("invalid minute in {s:?}"))?;
        ClockTime::new(hour, minute).ok_or_else(|| format!("time out of range: {s:?}"))
    }
}

impl Serialize for ClockTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClassPeriod {
    pub hour: Hour,
    #[schema(example = "1st Hour")]
    pub label: String,
    #[schema(value_type = String, example = "08:20")]
    pub start_time: ClockTime,
    #[schema(value_type = String, example = "09:20")]
    pub end_time: ClockTime,
    /// Time-tracking group holding this period's students.
    pub group_id: Option<String>,
}

impl ClassPeriod {
    pub fn new(
        hour: Hour,
        label: &str,
        start_time: ClockTime,
        end_time: ClockTime,
        group_id: Option<String>,
    ) -> Self {
        Self {
            hour,
            label: label.to_string(),
            start_time,
            end_time,
            group_id,
        }
    }

    /// Inclusive on both ends.
    pub fn contains(&self, now: ClockTime) -> bool {
        self.start_time <= now && now <= self.end_time
    }
}

/// The four class hours, in order, with group ids taken from configuration.
pub fn reference_periods(group_ids: &[Option<String>; 4]) -> Vec<ClassPeriod> {
    vec![
        ClassPeriod::new(Hour::First, "1st Hour", ClockTime::hm(8, 20), ClockTime::hm(9, 20), group_ids[0].clone()),
        ClassPeriod::new(Hour::Second, "2nd Hour", ClockTime::hm(9, 30), ClockTime::hm(11, 0), group_ids[1].clone()),
        ClassPeriod::new(Hour::Third, "3rd Hour", ClockTime::hm(12, 0), ClockTime::hm(13, 10), group_ids[2].clone()),
        ClassPeriod::new(Hour::Fourth, "4th Hour", ClockTime::hm(13, 15), ClockTime::hm(14, 40), group_ids[3].clone()),
    ]
}
