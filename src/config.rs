use std::env;
use std::str::FromStr;

use dotenvy::dotenv;

use crate::auth::session::MAX_SESSION_TTL;
use crate::errors::ServiceError;

#[derive(Clone)]
pub struct Config {
    pub server_addr: String,
    pub api_prefix: String,

    // Roster document
    pub roster_dir: String,
    pub roster_document: String,

    // Session gate
    pub auth_password_hash: Option<String>,
    pub auth_secret: Option<String>,
    pub session_ttl: usize,
    pub secure_cookies: bool,

    // Time-tracking service
    pub clockify_api_key: Option<String>,
    pub clockify_base_url: String,
    pub clockify_max_concurrency: usize,
    pub clockify_timeout_secs: u64,
    /// Group ids for hours 1..=4, in period order.
    pub period_group_ids: [Option<String>; 4],

    // Rate limiting
    pub rate_login_per_min: u32,
    pub rate_protected_per_min: u32,

    pub log_dir: String,
    pub log_level: tracing::Level,
    pub live_monitor: bool,
}

const PERIOD_GROUP_KEYS: [&str; 4] = [
    "CLOCKIFY_WORKSPACE_1ST_HOUR",
    "CLOCKIFY_WORKSPACE_2ND_HOUR",
    "CLOCKIFY_WORKSPACE_3RD_HOUR",
    "CLOCKIFY_WORKSPACE_4TH_HOUR",
];

impl Config {
    pub fn from_env() -> Result<Self, ServiceError> {
        dotenv().ok();

        Ok(Self {
            server_addr: var_or("SERVER_ADDR", "127.0.0.1:8080"),
            api_prefix: var_or("API_PREFIX", "/api"),

            roster_dir: var_or("ROSTER_DIR", "data"),
            roster_document: var_or("ROSTER_DOCUMENT", "students.json"),

            auth_password_hash: optional("AUTH_PASSWORD_HASH"),
            auth_secret: optional("AUTH_SECRET"),
            session_ttl: checked_session_ttl(parsed("SESSION_TTL", 86_400)?)?, // 24h
            secure_cookies: parsed("SECURE_COOKIES", false)?,

            clockify_api_key: optional("CLOCKIFY_API_KEY"),
            clockify_base_url: var_or("CLOCKIFY_BASE_URL", "https://api.clockify.me/api/v1"),
            clockify_max_concurrency: parsed("CLOCKIFY_MAX_CONCURRENCY", 4)?,
            clockify_timeout_secs: parsed("CLOCKIFY_TIMEOUT_SECS", 15)?,
            period_group_ids: PERIOD_GROUP_KEYS.map(optional),

            rate_login_per_min: parsed("RATE_LOGIN_PER_MIN", 10)?,
            rate_protected_per_min: parsed("RATE_PROTECTED_PER_MIN", 1000)?,

            log_dir: var_or("LOG_DIR", "logs"),
            log_level: parsed("LOG_LEVEL", tracing::Level::INFO)?,
            live_monitor: parsed("LIVE_MONITOR", true)?,
        })
    }
}

fn var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Unset and blank values both count as "not configured".
fn optional(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parsed<T: FromStr>(key: &str, default: T) -> Result<T, ServiceError> {
    match optional(key) {
        None => Ok(default),
        Some(raw) => raw
            .parse()
            .map_err(|_| ServiceError::Configuration(format!("{key} has an invalid value: {raw}"))),
    }
}

fn checked_session_ttl(ttl: usize) -> Result<usize, ServiceError> {
    if ttl == 0 || ttl > MAX_SESSION_TTL {
        return Err(ServiceError::Configuration(format!(
            "SESSION_TTL must be between 1 and {MAX_SESSION_TTL} seconds, got {ttl}"
        )));
    }
    Ok(ttl)
}

#[cfg(test)]
impl Config {
    /// Config with every optional credential unset, for handler tests.
    pub fn for_tests() -> Self {
        Self {
            server_addr: "127.0.0.1:0".into(),
            api_prefix: "/api".into(),
            roster_dir: "data".into(),
            roster_document: "students.json".into(),
            auth_password_hash: None,
            auth_secret: None,
            session_ttl: 86_400,
            secure_cookies: false,
            clockify_api_key: None,
            clockify_base_url: "http://127.0.0.1:9".into(),
            clockify_max_concurrency: 4,
            clockify_timeout_secs: 1,
            period_group_ids: [None, None, None, None],
            rate_login_per_min: 1000,
            rate_protected_per_min: 1000,
            log_dir: "logs".into(),
            log_level: tracing::Level::DEBUG,
            live_monitor: false,
        }
    }
}
