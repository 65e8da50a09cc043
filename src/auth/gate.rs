use actix_web::{
    Error, FromRequest, HttpMessage, HttpRequest, HttpResponse,
    body::BoxBody,
    dev::{Payload, ServiceRequest, ServiceResponse},
    http::header,
    middleware::Next,
    web::Data,
};
use futures::future::{Ready, ready};
use tracing::debug;

use crate::auth::session::{RevokedSessions, SESSION_COOKIE_NAME, verify_session_token};
use crate::config::Config;
use crate::errors::ServiceError;

pub const LOGIN_PAGE: &str = "/login";

/// Proof that the request carries a valid session cookie.
///
/// Inserted by [`session_gate`]; handlers that read or mutate dashboard data
/// take it as an argument.
#[derive(Debug, Clone)]
pub struct Session {
    pub jti: String,
}

impl FromRequest for Session {
    type Error = Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(
            req.extensions()
                .get::<Session>()
                .cloned()
                .ok_or_else(|| ServiceError::Unauthorized("Unauthorized".into()).into()),
        )
    }
}

fn redirect_to_login(req: ServiceRequest) -> ServiceResponse<BoxBody> {
    let resp = HttpResponse::SeeOther()
        .insert_header((header::LOCATION, LOGIN_PAGE))
        .finish();
    req.into_response(resp.map_into_boxed_body())
}

/// Lets the login routes through and redirects everything else to the login
/// page unless a valid, unrevoked session cookie is present.
pub async fn session_gate(
    req: ServiceRequest,
    next: Next<BoxBody>,
) -> Result<ServiceResponse<BoxBody>, Error> {
    let config = req
        .app_data::<Data<Config>>()
        .cloned()
        .ok_or_else(|| actix_web::error::ErrorInternalServerError("App config missing"))?;

    let login_api = format!("{}/auth/login", config.api_prefix);
    if req.path() == LOGIN_PAGE || req.path() == login_api {
        return next.call(req).await;
    }

    let Some(cookie) = req.cookie(SESSION_COOKIE_NAME) else {
        debug!(path = %req.path(), "No session cookie; redirecting to login");
        return Ok(redirect_to_login(req));
    };

    let claims = match verify_session_token(cookie.value(), config.auth_secret.as_deref()) {
        Ok(claims) => claims,
        Err(e) => {
            debug!(path = %req.path(), error = %e, "Rejected session cookie");
            return Ok(redirect_to_login(req));
        }
    };

    let revoked = req
        .app_data::<Data<RevokedSessions>>()
        .map(|r| r.is_revoked(&claims.jti))
        .unwrap_or(false);
    if revoked {
        debug!(path = %req.path(), "Session was logged out; redirecting to login");
        return Ok(redirect_to_login(req));
    }

    req.extensions_mut().insert(Session { jti: claims.jti });

    next.call(req).await
}
