use std::time::{Duration, SystemTime, UNIX_EPOCH};

use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use moka::future::Cache;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::ServiceError;

pub const SESSION_COOKIE_NAME: &str = "attendance_session";
const SESSION_SUBJECT: &str = "dashboard";

/// Longest accepted session lifetime in seconds (one year).
pub const MAX_SESSION_TTL: usize = 365 * 24 * 60 * 60;

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionClaims {
    pub sub: String,
    pub iat: usize,
    pub exp: usize,
    pub jti: String,
}

fn now() -> usize {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as usize)
        .unwrap_or(0)
}

fn secret(configured: Option<&str>) -> Result<&str, ServiceError> {
    configured.ok_or_else(|| ServiceError::Configuration("AUTH_SECRET not configured".into()))
}

/// Signs a new opaque session token valid for `ttl` seconds.
pub fn issue_session_token(
    auth_secret: Option<&str>,
    ttl: usize,
) -> Result<(String, SessionClaims), ServiceError> {
    let secret = secret(auth_secret)?;
    let issued = now();
    let claims = SessionClaims {
        sub: SESSION_SUBJECT.to_string(),
        iat: issued,
        exp: issued.saturating_add(ttl),
        jti: Uuid::new_v4().to_string(),
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| ServiceError::Configuration(format!("cannot sign session: {e}")))?;

    Ok((token, claims))
}

pub fn verify_session_token(token: &str, auth_secret: Option<&str>) -> Result<SessionClaims, ServiceError> {
    let secret = secret(auth_secret)?;
    decode::<SessionClaims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| ServiceError::Unauthorized(format!("Invalid session: {e}")))
}

/// Token ids revoked by logout, remembered until the token would expire anyway.
#[derive(Clone)]
pub struct RevokedSessions {
    jtis: Cache<String, ()>,
}

impl RevokedSessions {
    pub fn new(session_ttl: usize) -> Self {
        Self {
            jtis: Cache::builder()
                .max_capacity(10_000)
                .time_to_live(Duration::from_secs(session_ttl.min(MAX_SESSION_TTL) as u64))
                .build(),
        }
    }

    pub async fn revoke(&self, jti: &str) {
        self.jtis.insert(jti.to_string(), ()).await;
    }

    pub fn is_revoked(&self, jti: &str) -> bool {
        self.jtis.contains_key(jti)
    }
}
