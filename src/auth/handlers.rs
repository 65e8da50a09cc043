use actix_web::cookie::{Cookie, SameSite, time::Duration as CookieDuration};
use actix_web::{HttpResponse, Responder, web};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, instrument};
use utoipa::ToSchema;

use crate::auth::gate::Session;
use crate::auth::password::verify_password;
use crate::auth::session::{RevokedSessions, SESSION_COOKIE_NAME, issue_session_token};
use crate::config::Config;
use crate::errors::ServiceError;

#[derive(Deserialize, ToSchema)]
pub struct LoginRequest {
    #[serde(default)]
    #[schema(example = "hunter2")]
    pub password: String,
}

/// Exchange the shared dashboard password for a session cookie
#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Session cookie issued", body = Object, example = json!({
            "success": true
        })),
        (status = 400, description = "Password is required"),
        (status = 401, description = "Invalid password"),
        (status = 500, description = "Authentication not configured")
    ),
    tag = "Auth"
)]
#[instrument(name = "auth_login", skip(body, config))]
pub async fn login(
    body: web::Json<LoginRequest>,
    config: web::Data<Config>,
) -> Result<HttpResponse, ServiceError> {
    info!("Login request received");

    if body.password.is_empty() {
        return Err(ServiceError::Validation("Password is required".into()));
    }

    if !verify_password(&body.password, config.auth_password_hash.as_deref())? {
        info!("Invalid credentials");
        return Err(ServiceError::Unauthorized("Invalid password".into()));
    }

    let (token, _claims) = issue_session_token(config.auth_secret.as_deref(), config.session_ttl)?;
    let cookie = Cookie::build(SESSION_COOKIE_NAME, token)
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(config.secure_cookies)
        .max_age(CookieDuration::seconds(config.session_ttl as i64))
        .finish();

    info!("Login successful");
    Ok(HttpResponse::Ok().cookie(cookie).json(json!({ "success": true })))
}

/// End the current session
#[utoipa::path(
    post,
    path = "/api/auth/logout",
    responses(
        (status = 200, description = "Session revoked and cookie cleared", body = Object, example = json!({
            "success": true
        }))
    ),
    tag = "Auth"
)]
pub async fn logout(session: Session, revoked: web::Data<RevokedSessions>) -> impl Responder {
    revoked.revoke(&session.jti).await;

    let mut cookie = Cookie::build(SESSION_COOKIE_NAME, "").path("/").finish();
    cookie.make_removal();

    info!("Logged out");
    HttpResponse::Ok().cookie(cookie).json(json!({ "success": true }))
}

/// Target of the gate's redirect. The dashboard UI itself is served elsewhere.
pub async fn login_page() -> impl Responder {
    HttpResponse::Ok()
        .content_type("text/plain; charset=utf-8")
        .body("Login required: POST {\"password\": \"...\"} to /api/auth/login\n")
}
