use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Present/absent partition of a roster for one date. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
#[schema(example = json!({
    "date": "2025-09-02",
    "totalStudents": 2,
    "presentCount": 1,
    "absentCount": 1,
    "presentStudents": ["a@x.org"],
    "absentStudents": ["b@x.org"]
}))]
pub struct AttendanceResult {
    #[schema(value_type = String, format = "date")]
    pub date: NaiveDate,
    pub total_students: usize,
    pub present_count: usize,
    pub absent_count: usize,
    pub present_students: Vec<String>,
    pub absent_students: Vec<String>,
}

/// Absent student with the roster details a dashboard shows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct AbsentStudent {
    pub email: String,
    pub name: String,
    pub photo: Option<String>,
}
