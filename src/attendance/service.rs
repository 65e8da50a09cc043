use std::sync::Arc;

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{info, instrument};
use utoipa::ToSchema;

use crate::attendance::reconcile::reconcile;
use crate::clockify::client::TimeTrackingApi;
use crate::clockify::presence::users_with_entries_on_date;
use crate::errors::{ServiceError, ServiceResult};
use crate::model::attendance::{AbsentStudent, AttendanceResult};
use crate::model::class_period::ClassPeriod;
use crate::model::student::normalize_email;
use crate::storage::roster::RosterStore;

/// Attendance for one class period, with roster details for absentees.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PeriodAttendance {
    pub attendance: AttendanceResult,
    pub absent_students: Vec<AbsentStudent>,
}

/// Runs attendance checks. Results are computed fresh on every call.
#[derive(Clone)]
pub struct AttendanceService {
    roster: RosterStore,
    tracker: Option<Arc<dyn TimeTrackingApi>>,
    max_concurrency: usize,
}

impl AttendanceService {
    /// `tracker` is `None` when no API key is configured; checks then fail
    /// with a configuration error.
    pub fn new(
        roster: RosterStore,
        tracker: Option<Arc<dyn TimeTrackingApi>>,
        max_concurrency: usize,
    ) -> Self {
        Self {
            roster,
            tracker,
            max_concurrency,
        }
    }

    fn tracker(&self) -> ServiceResult<&dyn TimeTrackingApi> {
        self.tracker
            .as_deref()
            .ok_or_else(|| ServiceError::Configuration("Missing Clockify API key (CLOCKIFY_API_KEY)".into()))
    }

    /// Partitions `student_emails` by whether they logged time in `group_id` on `date`.
    #[instrument(name = "attendance_check", skip(self, student_emails), fields(students = student_emails.len()))]
    pub async fn check(
        &self,
        date: NaiveDate,
        student_emails: &[String],
        group_id: &str,
    ) -> ServiceResult<AttendanceResult> {
        let tracker = self.tracker()?;
        let present = users_with_entries_on_date(tracker, group_id, date, self.max_concurrency).await?;
        let result = reconcile(student_emails, &present).into_result(date);
        info!(
            present = result.present_count,
            absent = result.absent_count,
            "Attendance reconciled"
        );
        Ok(result)
    }

    /// Checks the roster subset enrolled in `period`.
    pub async fn check_period(
        &self,
        period: &ClassPeriod,
        date: NaiveDate,
    ) -> ServiceResult<PeriodAttendance> {
        let group_id = period.group_id.as_deref().ok_or_else(|| {
            ServiceError::Configuration(format!("No time-tracking group configured for {}", period.label))
        })?;

        let students: Vec<_> = self
            .roster
            .get_all()
            .await
            .into_iter()
            .filter(|s| s.hour == period.hour)
            .collect();
        let emails: Vec<String> = students.iter().map(|s| s.email.clone()).collect();

        let attendance = self.check(date, &emails, group_id).await?;
        let absent_students = attendance
            .absent_students
            .iter()
            .map(|email| {
                let student = students.iter().find(|s| normalize_email(&s.email) == *email);
                AbsentStudent {
                    email: email.clone(),
                    name: student.map(|s| s.name.clone()).unwrap_or_else(|| email.clone()),
                    photo: student.and_then(|s| s.photo.clone()),
                }
            })
            .collect();

        Ok(PeriodAttendance {
            attendance,
            absent_students,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clockify::fake::FakeTracker;
    use crate::clockify::presence::day_window;
    use crate::model::class_period::{ClockTime, reference_periods};
    use crate::model::student::{Hour, Student};
    use crate::storage::document::MemoryDocumentStore;
    use chrono::Duration;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 9, 2).unwrap()
    }

    fn student(email: &str, hour: Hour) -> Student {
        Student {
            name: email.split('@').next().unwrap_or_default().to_uppercase(),
            email: email.into(),
            hour,
            photo: None,
        }
    }

    async fn service_with(tracker: Option<FakeTracker>) -> AttendanceService {
        let roster = RosterStore::new(Arc::new(MemoryDocumentStore::default()), "students.json");
        roster
            .replace_all(vec![
                student("a@x", Hour::First),
                student("b@x", Hour::First),
                student("c@x", Hour::Second),
            ])
            .await
            .unwrap();
        AttendanceService::new(
            roster,
            tracker.map(|t| Arc::new(t) as Arc<dyn TimeTrackingApi>),
            4,
        )
    }

    #[actix_web::test]
    async fn period_check_end_to_end() {
        let (start, _) = day_window(date());
        let tracker = FakeTracker::new()
            .member("u1", "a@x")
            .member("u2", "b@x")
            .entry("u1", start + Duration::hours(8));
        let service = service_with(Some(tracker)).await;

        let mut periods = reference_periods(&Default::default());
        periods[0].group_id = Some("g1".into());
        let report = service.check_period(&periods[0], date()).await.unwrap();

        assert_eq!(report.attendance.present_students, ["a@x"]);
        assert_eq!(report.attendance.absent_students, ["b@x"]);
        assert_eq!(report.attendance.total_students, 2);
        assert_eq!(report.absent_students[0].name, "B");
    }

    #[actix_web::test]
    async fn missing_api_key_is_a_configuration_error() {
        let service = service_with(None).await;
        let err = service
            .check(date(), &["a@x".to_string()], "g1")
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Configuration(_)));
    }

    #[actix_web::test]
    async fn period_without_group_is_a_configuration_error() {
        let service = service_with(Some(FakeTracker::new())).await;
        let period = ClassPeriod::new(Hour::Third, "3rd Hour", ClockTime::hm(12, 0), ClockTime::hm(13, 10), None);
        assert!(matches!(
            service.check_period(&period, date()).await,
            Err(ServiceError::Configuration(_))
        ));
    }
}
