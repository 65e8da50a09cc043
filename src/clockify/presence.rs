use std::collections::HashSet;

use chrono::{DateTime, Duration, Local, NaiveDate, TimeZone, Utc};
use futures::stream::{self, StreamExt};
use tracing::{info, warn};

use crate::clockify::client::TimeTrackingApi;
use crate::errors::ServiceResult;
use crate::model::student::normalize_email;

/// `[local midnight, local midnight + 24h)` for `date`, in UTC.
pub fn day_window(date: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
    day_window_in(&Local, date)
}

pub fn day_window_in<Tz: TimeZone>(tz: &Tz, date: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
    let midnight = date.and_time(chrono::NaiveTime::MIN);
    let start = tz
        .from_local_datetime(&midnight)
        .earliest()
        .map(|t| t.with_timezone(&Utc))
        // midnight skipped by a DST jump: fall back to the UTC day
        .unwrap_or_else(|| Utc.from_utc_datetime(&midnight));
    (start, start + Duration::hours(24))
}

/// Normalized emails of group members with at least one entry starting on `date`.
///
/// The member list is required: failing to fetch it fails the whole check.
/// A failed entry fetch for one member is logged and that member counts as
/// absent. At most `max_concurrency` entry fetches run at once.
pub async fn users_with_entries_on_date(
    api: &dyn TimeTrackingApi,
    group_id: &str,
    date: NaiveDate,
    max_concurrency: usize,
) -> ServiceResult<HashSet<String>> {
    let members = api.group_members(group_id).await?;
    let (start, end) = day_window(date);
    let member_count = members.len();

    let present: HashSet<String> = stream::iter(members)
        .filter(|member| futures::future::ready(!member.email.trim().is_empty()))
        .map(move |member| async move {
            match api.member_entries(group_id, &member.id, start, end).await {
                Ok(entries) => entries
                    .iter()
                    .any(|e| e.starts_within(start, end))
                    .then(|| normalize_email(&member.email)),
                Err(e) => {
                    warn!(error = %e, member = %member.email, name = %member.name, group_id, "Failed to fetch time entries; counting member as absent");
                    None
                }
            }
        })
        .buffer_unordered(max_concurrency.max(1))
        .filter_map(futures::future::ready)
        .collect()
        .await;

    info!(group_id, %date, members = member_count, with_entries = present.len(), "Fetched group activity");
    Ok(present)
}
