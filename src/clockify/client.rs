use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, HeaderValue};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::errors::{ServiceError, ServiceResult};

/// Member of a time-tracking group. Owned by the external service.
#[derive(Debug, Clone, Deserialize)]
pub struct TimeTrackingUser {
    pub id: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub name: String,
}

/// Only the start matters: an entry counts for the day it was started on,
/// running or not.
#[derive(Debug, Clone, Deserialize)]
pub struct TimeInterval {
    pub start: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeEntry {
    pub time_interval: TimeInterval,
}

impl TimeEntry {
    pub fn starts_within(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        start <= self.time_interval.start && self.time_interval.start < end
    }
}

/// Queries the time-tracking service offers. There is no cross-user entry
/// query, so presence checks fan out over [`Self::member_entries`].
#[async_trait]
pub trait TimeTrackingApi: Send + Sync {
    async fn group_members(&self, group_id: &str) -> ServiceResult<Vec<TimeTrackingUser>>;

    async fn member_entries(
        &self,
        group_id: &str,
        user_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> ServiceResult<Vec<TimeEntry>>;
}

const USERS_PAGE_SIZE: usize = 500;
const ENTRIES_PAGE_SIZE: usize = 50;

/// Clockify REST client authenticated with the `X-Api-Key` header.
pub struct ClockifyClient {
    http: reqwest::Client,
    base_url: String,
}

impl ClockifyClient {
    pub fn new(api_key: &str, base_url: &str, timeout: Duration) -> ServiceResult<Self> {
        let mut key = HeaderValue::from_str(api_key)
            .map_err(|_| ServiceError::Configuration("CLOCKIFY_API_KEY is not a valid header value".into()))?;
        key.set_sensitive(true);
        let mut headers = HeaderMap::new();
        headers.insert("X-Api-Key", key);

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| ServiceError::Configuration(format!("cannot build HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> ServiceResult<T> {
        let url = format!("{}{}", self.base_url, path);
        debug!(%path, "Clockify request");

        let response = self
            .http
            .get(&url)
            .query(query)
            .send()
            .await
            .map_err(|e| ServiceError::Upstream(format!("request to {path} failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ServiceError::Upstream(format!(
                "Clockify API error: {status} on {path}"
            )));
        }

        response
            .json()
            .await
            .map_err(|e| ServiceError::Upstream(format!("unexpected response from {path}: {e}")))
    }
}

fn clockify_timestamp(t: DateTime<Utc>) -> String {
    t.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

#[async_trait]
impl TimeTrackingApi for ClockifyClient {
    async fn group_members(&self, group_id: &str) -> ServiceResult<Vec<TimeTrackingUser>> {
        let path = format!("/workspaces/{group_id}/users");
        let mut members = Vec::new();
        for page in 1.. {
            let batch: Vec<TimeTrackingUser> = self
                .get_json(
                    &path,
                    &[
                        ("page", page.to_string()),
                        ("page-size", USERS_PAGE_SIZE.to_string()),
                    ],
                )
                .await?;
            let last = batch.len() < USERS_PAGE_SIZE;
            members.extend(batch);
            if last {
                break;
            }
        }
        Ok(members)
    }

    async fn member_entries(
        &self,
        group_id: &str,
        user_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> ServiceResult<Vec<TimeEntry>> {
        // one page is enough: callers only need to know whether any entry exists
        self.get_json(
            &format!("/workspaces/{group_id}/user/{user_id}/time-entries"),
            &[
                ("start", clockify_timestamp(start)),
                ("end", clockify_timestamp(end)),
                ("page-size", ENTRIES_PAGE_SIZE.to_string()),
            ],
        )
        .await
    }
}
