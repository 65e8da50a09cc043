use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use derive_more::Display;
use serde_json::json;

/// Error taxonomy shared by every handler and service.
///
/// Validation and not-found errors are reported as soon as they are detected.
/// Upstream failures are only surfaced when the whole operation depends on
/// them (the member list); single-member failures never reach this type.
#[derive(Debug, Display, Clone, PartialEq, Eq)]
pub enum ServiceError {
    /// A required credential or setting is missing.
    #[display(fmt = "configuration error: {}", _0)]
    Configuration(String),

    /// The time-tracking service answered non-2xx or could not be reached.
    #[display(fmt = "upstream error: {}", _0)]
    Upstream(String),

    #[display(fmt = "{}", _0)]
    Validation(String),

    #[display(fmt = "{}", _0)]
    NotFound(String),

    #[display(fmt = "{}", _0)]
    Unauthorized(String),

    /// Write-if-match lost against a concurrent writer.
    #[display(fmt = "{}", _0)]
    Conflict(String),

    #[display(fmt = "storage error: {}", _0)]
    Storage(String),
}

impl ResponseError for ServiceError {
    fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ServiceError::Upstream(_) => StatusCode::BAD_GATEWAY,
            ServiceError::Validation(_) => StatusCode::BAD_REQUEST,
            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ServiceError::Conflict(_) => StatusCode::CONFLICT,
            ServiceError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(json!({ "error": self.to_string() }))
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;
