use actix_web::{HttpResponse, web};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;
use utoipa::ToSchema;

use crate::auth::gate::Session;
use crate::config::Config;
use crate::errors::ServiceError;
use crate::live::monitor::LiveHandle;
#[allow(unused_imports)] // named in #[utoipa::path] response bodies
use crate::live::monitor::LiveSnapshot;
use crate::model::class_period::{ClockTime, reference_periods};
use crate::model::student::Hour;

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Workspace {
    /// Time-tracking group id.
    pub id: String,
    #[schema(example = "1st Hour")]
    pub label: String,
    pub hour: Hour,
    #[schema(value_type = String, example = "08:20")]
    pub start_time: ClockTime,
    #[schema(value_type = String, example = "09:20")]
    pub end_time: ClockTime,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct WorkspaceList {
    pub workspaces: Vec<Workspace>,
}

#[derive(Deserialize, ToSchema)]
pub struct PinPeriod {
    pub hour: Hour,
}

/// Class periods that have a time-tracking group configured
#[utoipa::path(
    get,
    path = "/api/workspaces",
    responses(
        (status = 200, description = "Configured class periods", body = WorkspaceList)
    ),
    tag = "Live"
)]
pub async fn list_workspaces(_session: Session, config: web::Data<Config>) -> HttpResponse {
    let workspaces = reference_periods(&config.period_group_ids)
        .into_iter()
        .filter_map(|period| {
            Some(Workspace {
                id: period.group_id?,
                label: period.label,
                hour: period.hour,
                start_time: period.start_time,
                end_time: period.end_time,
            })
        })
        .collect();
    HttpResponse::Ok().json(WorkspaceList { workspaces })
}

/// Current live-monitor state and latest attendance
#[utoipa::path(
    get,
    path = "/api/live",
    responses(
        (status = 200, description = "Latest snapshot", body = LiveSnapshot)
    ),
    tag = "Live"
)]
pub async fn live_snapshot(_session: Session, live: web::Data<LiveHandle>) -> HttpResponse {
    HttpResponse::Ok().json(live.snapshot())
}

/// Pin a period while no class is in session
#[utoipa::path(
    post,
    path = "/api/live/manual",
    request_body = PinPeriod,
    responses(
        (status = 200, description = "Period pinned; a check is under way", body = Object, example = json!({
            "success": true
        })),
        (status = 400, description = "No such period configured"),
        (status = 409, description = "A period is currently in session")
    ),
    tag = "Live"
)]
pub async fn pin_period(
    _session: Session,
    live: web::Data<LiveHandle>,
    payload: web::Json<PinPeriod>,
) -> Result<HttpResponse, ServiceError> {
    live.pin(payload.hour).await?;
    info!(hour = %payload.hour, "Manual period selected");
    Ok(HttpResponse::Ok().json(json!({ "success": true })))
}

/// Return to automatic period detection
#[utoipa::path(
    delete,
    path = "/api/live/manual",
    responses(
        (status = 200, description = "Manual selection cleared", body = Object, example = json!({
            "success": true
        }))
    ),
    tag = "Live"
)]
pub async fn unpin_period(
    _session: Session,
    live: web::Data<LiveHandle>,
) -> Result<HttpResponse, ServiceError> {
    live.unpin().await?;
    Ok(HttpResponse::Ok().json(json!({ "success": true })))
}
