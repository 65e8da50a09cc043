use std::str::FromStr;

use actix_web::{HttpResponse, web};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info, instrument};
use utoipa::ToSchema;

use crate::auth::gate::Session;
use crate::errors::ServiceError;
use crate::model::student::{Hour, Student};
#[allow(unused_imports)] // summary types are named in #[utoipa::path] response bodies
use crate::storage::roster::{
    HourChange, MergeSummary, PhotoSummary, RemovalSummary, RosterStats,
};
use crate::storage::roster::{
    PhotoUpdate, RosterStore,
    StudentUpsert,
};
use crate::utils::roster_csv::parse_roster_csv;

/// Wraps a summary with `"success": true`, flattening its fields.
#[derive(Serialize)]
struct Success<T: Serialize> {
    success: bool,
    #[serde(flatten)]
    data: T,
}

fn success<T: Serialize>(data: T) -> HttpResponse {
    HttpResponse::Ok().json(Success {
        success: true,
        data,
    })
}

#[derive(Deserialize, ToSchema)]
pub struct UploadStudents {
    pub students: Vec<StudentUpsert>,
}

#[derive(Deserialize, ToSchema)]
pub struct RemoveStudent {
    #[serde(default)]
    #[schema(example = "ada@school.org", format = "email", value_type = String)]
    pub email: String,
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateHour {
    #[serde(default)]
    #[schema(example = "ada@school.org", format = "email", value_type = String)]
    pub email: String,
    /// `"1"`..`"4"`; anything else is rejected.
    #[serde(default)]
    #[schema(example = "2")]
    pub new_hour: String,
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePhotos {
    pub photo_updates: Vec<PhotoUpdate>,
}

/// List the roster
#[utoipa::path(
    get,
    path = "/api/students",
    responses(
        (status = 200, description = "All students in roster order", body = [Student])
    ),
    tag = "Students"
)]
pub async fn list_students(_session: Session, roster: web::Data<RosterStore>) -> HttpResponse {
    HttpResponse::Ok().json(roster.get_all().await)
}

/// Replace the whole roster
#[utoipa::path(
    put,
    path = "/api/students",
    request_body = Vec<Student>,
    responses(
        (status = 200, description = "Roster replaced", body = Object, example = json!({
            "success": true,
            "totalStudents": 2
        })),
        (status = 500, description = "Roster could not be written")
    ),
    tag = "Students"
)]
#[instrument(name = "roster_replace", skip_all, fields(students = payload.len()))]
pub async fn replace_students(
    _session: Session,
    roster: web::Data<RosterStore>,
    payload: web::Json<Vec<Student>>,
) -> Result<HttpResponse, ServiceError> {
    let students = payload.into_inner();
    let total = students.len();
    roster.replace_all(students).await?;
    Ok(HttpResponse::Ok().json(json!({ "success": true, "totalStudents": total })))
}

/// Merge students into the roster
///
/// Students are matched by email. Matches take the new name and hour;
/// everyone else is kept untouched.
#[utoipa::path(
    post,
    path = "/api/students/upload-csv",
    request_body = UploadStudents,
    responses(
        (status = 200, description = "Students merged", body = MergeSummary),
        (status = 400, description = "Invalid payload"),
        (status = 409, description = "Roster changed concurrently, retry")
    ),
    tag = "Students"
)]
#[instrument(name = "roster_merge", skip_all, fields(incoming = payload.students.len()))]
pub async fn upload_students(
    _session: Session,
    roster: web::Data<RosterStore>,
    payload: web::Json<UploadStudents>,
) -> Result<HttpResponse, ServiceError> {
    let summary = roster.merge_upsert(payload.into_inner().students).await?;
    Ok(success(summary))
}

/// Merge students from raw CSV text
///
/// Accepts `name,email[,hour]` or `email,name[,hour]` rows with an optional
/// header line. Missing hours default to 1.
#[utoipa::path(
    post,
    path = "/api/students/import-csv",
    request_body(content = String, content_type = "text/csv"),
    responses(
        (status = 200, description = "Students merged", body = MergeSummary),
        (status = 400, description = "Malformed CSV or invalid hour"),
        (status = 409, description = "Roster changed concurrently, retry")
    ),
    tag = "Students"
)]
#[instrument(name = "roster_import_csv", skip_all, fields(bytes = body.len()))]
pub async fn import_students_csv(
    _session: Session,
    roster: web::Data<RosterStore>,
    body: String,
) -> Result<HttpResponse, ServiceError> {
    let incoming = parse_roster_csv(&body)?;
    debug!(rows = incoming.len(), "CSV parsed");
    if incoming.is_empty() {
        return Err(ServiceError::Validation(
            "No valid student rows found in CSV".into(),
        ));
    }

    let summary = roster.merge_upsert(incoming).await?;
    info!(
        new = summary.new_students,
        updated = summary.updated_students,
        "Roster imported from CSV"
    );
    Ok(success(summary))
}

/// Remove one student
#[utoipa::path(
    post,
    path = "/api/students/remove",
    request_body = RemoveStudent,
    responses(
        (status = 200, description = "Student removed", body = RemovalSummary),
        (status = 400, description = "Email is required"),
        (status = 404, description = "Student not found"),
        (status = 409, description = "Roster changed concurrently, retry")
    ),
    tag = "Students"
)]
pub async fn remove_student(
    _session: Session,
    roster: web::Data<RosterStore>,
    payload: web::Json<RemoveStudent>,
) -> Result<HttpResponse, ServiceError> {
    if payload.email.trim().is_empty() {
        return Err(ServiceError::Validation("Email is required".into()));
    }
    let summary = roster.remove(&payload.email).await?;
    info!(remaining = summary.remaining_count, "Student removed");
    Ok(success(summary))
}

/// Empty the roster
#[utoipa::path(
    post,
    path = "/api/students/clear",
    responses(
        (status = 200, description = "Roster cleared", body = Object, example = json!({
            "success": true,
            "message": "All students cleared"
        }))
    ),
    tag = "Students"
)]
pub async fn clear_students(
    _session: Session,
    roster: web::Data<RosterStore>,
) -> Result<HttpResponse, ServiceError> {
    roster.clear().await?;
    Ok(HttpResponse::Ok().json(json!({ "success": true, "message": "All students cleared" })))
}

/// Move a student to another class hour
#[utoipa::path(
    post,
    path = "/api/students/update-hour",
    request_body = UpdateHour,
    responses(
        (status = 200, description = "Hour changed", body = HourChange),
        (status = 400, description = "Missing email or invalid hour"),
        (status = 404, description = "Student not found"),
        (status = 409, description = "Roster changed concurrently, retry")
    ),
    tag = "Students"
)]
pub async fn update_student_hour(
    _session: Session,
    roster: web::Data<RosterStore>,
    payload: web::Json<UpdateHour>,
) -> Result<HttpResponse, ServiceError> {
    if payload.email.trim().is_empty() || payload.new_hour.trim().is_empty() {
        return Err(ServiceError::Validation(
            "Email and newHour are required".into(),
        ));
    }
    let hour = Hour::from_str(payload.new_hour.trim()).map_err(|_| {
        ServiceError::Validation("Invalid hour. Must be 1, 2, 3, or 4".into())
    })?;

    let change = roster.reassign_hour(&payload.email, hour).await?;
    info!(old = %change.old_hour, new = %change.new_hour, "Student hour changed");
    Ok(success(change))
}

/// Attach photos to students
#[utoipa::path(
    post,
    path = "/api/students/update-photos",
    request_body = UpdatePhotos,
    responses(
        (status = 200, description = "Photos applied", body = PhotoSummary),
        (status = 400, description = "Invalid payload"),
        (status = 409, description = "Roster changed concurrently, retry")
    ),
    tag = "Students"
)]
#[instrument(name = "roster_photos", skip_all, fields(updates = payload.photo_updates.len()))]
pub async fn update_student_photos(
    _session: Session,
    roster: web::Data<RosterStore>,
    payload: web::Json<UpdatePhotos>,
) -> Result<HttpResponse, ServiceError> {
    let summary = roster
        .update_photos(payload.into_inner().photo_updates)
        .await?;
    info!(
        updated = summary.updated_count,
        not_found = summary.not_found_count,
        "Photos updated"
    );
    Ok(success(summary))
}

/// Roster counts per class hour
#[utoipa::path(
    get,
    path = "/api/students/debug",
    responses(
        (status = 200, description = "Per-hour roster statistics", body = RosterStats)
    ),
    tag = "Students"
)]
pub async fn roster_stats(_session: Session, roster: web::Data<RosterStore>) -> HttpResponse {
    HttpResponse::Ok().json(roster.stats().await)
}
