//! In-process stand-in for the time-tracking service.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::clockify::client::{TimeEntry, TimeInterval, TimeTrackingApi, TimeTrackingUser};
use crate::errors::{ServiceError, ServiceResult};

#[derive(Default)]
pub struct FakeTracker {
    members: Vec<TimeTrackingUser>,
    entries: HashMap<String, Vec<TimeEntry>>,
    failing: HashSet<String>,
    members_fail: bool,
    latency: Option<Duration>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    calls: Mutex<HashMap<String, usize>>,
}

impl FakeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn member(mut self, id: &str, email: &str) -> Self {
        self.members.push(TimeTrackingUser {
            id: id.into(),
            email: email.into(),
            name: format!("Member {id}"),
        });
        self
    }

    pub fn entry(mut self, user_id: &str, start: DateTime<Utc>) -> Self {
        self.entries
            .entry(user_id.into())
            .or_default()
            .push(TimeEntry {
                time_interval: TimeInterval { start },
            });
        self
    }

    pub fn failing_member(mut self, user_id: &str) -> Self {
        self.failing.insert(user_id.into());
        self
    }

    pub fn failing_members(mut self) -> Self {
        self.members_fail = true;
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn entry_calls_for(&self, user_id: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .get(user_id)
            .copied()
            .unwrap_or(0)
    }
}

#[async_trait]
impl TimeTrackingApi for FakeTracker {
    async fn group_members(&self, _group_id: &str) -> ServiceResult<Vec<TimeTrackingUser>> {
        if self.members_fail {
            return Err(ServiceError::Upstream("Clockify API error: 503".into()));
        }
        Ok(self.members.clone())
    }

    async fn member_entries(
        &self,
        _group_id: &str,
        user_id: &str,
        _start: DateTime<Utc>,
        _end: DateTime<Utc>,
    ) -> ServiceResult<Vec<TimeEntry>> {
        *self.calls.lock().unwrap().entry(user_id.into()).or_default() += 1;

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.failing.contains(user_id) {
            return Err(ServiceError::Upstream("Clockify API error: 500".into()));
        }
        Ok(self.entries.get(user_id).cloned().unwrap_or_default())
    }
}
