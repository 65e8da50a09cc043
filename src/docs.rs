use crate::api::attendance::AttendanceCheck;
use crate::api::live::{PinPeriod, Workspace, WorkspaceList};
use crate::api::students::{RemoveStudent, UpdateHour, UpdatePhotos, UploadStudents};
use crate::attendance::service::PeriodAttendance;
use crate::auth::handlers::LoginRequest;
use crate::live::monitor::{LiveResult, LiveSnapshot};
use crate::model::attendance::{AbsentStudent, AttendanceResult};
use crate::model::class_period::ClassPeriod;
use crate::model::student::{Hour, Student};
use crate::schedule::cadence::Cadence;
use crate::schedule::scheduler::Mode;
use crate::storage::roster::{
    HourChange, HourStats, MergeSummary, PhotoSummary, PhotoUpdate, RemovalSummary, RosterStats,
    StudentUpsert,
};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Classroom Attendance API",
        version = "1.0.0",
        description = r#"
## Classroom Attendance Dashboard

Tracks which enrolled students logged time in the class's time-tracking group
on a given day.

### 🔹 Key Features
- **Roster Management**
  - Replace, merge, import from CSV, remove, move between hours, attach photos
- **Attendance Checks**
  - Present/absent partition for any day and group
- **Live Monitor**
  - Detects the class period in session and refreshes attendance on an adaptive cadence

### 🔐 Security
Every endpoint except login requires the `attendance_session` cookie issued by
`POST /api/auth/login`. Requests without it are redirected to `/login`.

---
Built with **Rust**, **Actix Web** and **Utoipa**.
"#,
    ),
    paths(
        crate::auth::handlers::login,
        crate::auth::handlers::logout,

        crate::api::students::list_students,
        crate::api::students::replace_students,
        crate::api::students::upload_students,
        crate::api::students::import_students_csv,
        crate::api::students::remove_student,
        crate::api::students::clear_students,
        crate::api::students::update_student_hour,
        crate::api::students::update_student_photos,
        crate::api::students::roster_stats,

        crate::api::attendance::check_attendance,

        crate::api::live::list_workspaces,
        crate::api::live::live_snapshot,
        crate::api::live::pin_period,
        crate::api::live::unpin_period
    ),
    components(
        schemas(
            LoginRequest,
            Hour,
            Student,
            StudentUpsert,
            UploadStudents,
            RemoveStudent,
            UpdateHour,
            PhotoUpdate,
            UpdatePhotos,
            MergeSummary,
            RemovalSummary,
            HourChange,
            PhotoSummary,
            HourStats,
            RosterStats,
            AttendanceCheck,
            AttendanceResult,
            AbsentStudent,
            PeriodAttendance,
            ClassPeriod,
            Workspace,
            WorkspaceList,
            PinPeriod,
            Mode,
            Cadence,
            LiveResult,
            LiveSnapshot
        )
    ),
    tags(
        (name = "Auth", description = "Dashboard login and logout"),
        (name = "Students", description = "Roster management APIs"),
        (name = "Attendance", description = "Attendance check APIs"),
        (name = "Live", description = "Class periods and the live monitor"),
    )
)]
pub struct ApiDoc;
