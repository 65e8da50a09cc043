use actix_web::{HttpResponse, web};
use chrono::NaiveDate;
use serde::Deserialize;
use tracing::instrument;
use utoipa::ToSchema;

use crate::attendance::service::AttendanceService;
use crate::auth::gate::Session;
use crate::errors::ServiceError;
#[allow(unused_imports)] // named in #[utoipa::path] response bodies
use crate::model::attendance::AttendanceResult;

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceCheck {
    #[schema(example = "2025-09-02", format = "date", value_type = String)]
    pub date: NaiveDate,
    #[schema(example = json!(["ada@school.org", "bob@school.org"]))]
    pub student_emails: Vec<String>,
    #[serde(default)]
    #[schema(example = "64f0c0ffee")]
    pub workspace_id: String,
}

/// Check who logged time on a day
///
/// Every listed student with at least one time entry starting that local day
/// in the given group is present; everyone else is absent.
#[utoipa::path(
    post,
    path = "/api/clockify/attendance",
    request_body = AttendanceCheck,
    responses(
        (status = 200, description = "Students partitioned into present and absent", body = AttendanceResult),
        (status = 400, description = "Missing workspace id or invalid date"),
        (status = 500, description = "Time-tracking API key not configured"),
        (status = 502, description = "Time-tracking service failed")
    ),
    tag = "Attendance"
)]
#[instrument(name = "attendance_endpoint", skip_all, fields(date = %payload.date, workspace = %payload.workspace_id))]
pub async fn check_attendance(
    _session: Session,
    service: web::Data<AttendanceService>,
    payload: web::Json<AttendanceCheck>,
) -> Result<HttpResponse, ServiceError> {
    if payload.workspace_id.trim().is_empty() {
        return Err(ServiceError::Validation("Workspace ID is required".into()));
    }

    let result = service
        .check(payload.date, &payload.student_emails, payload.workspace_id.trim())
        .await?;
    Ok(HttpResponse::Ok().json(result))
}
