use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use utoipa::ToSchema;

use crate::errors::{ServiceError, ServiceResult};
use crate::model::student::{Hour, Student, normalize_email, roster_order};
use crate::storage::document::{DocumentStore, Precondition, Version};

/// Incoming record for a merge-upsert. Photos are never taken from imports.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct StudentUpsert {
    #[serde(default)]
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub hour: Option<Hour>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MergeSummary {
    pub total_students: usize,
    pub new_students: usize,
    pub updated_students: usize,
    pub existing_kept: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RemovalSummary {
    pub removed_count: usize,
    pub remaining_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HourChange {
    pub student_name: String,
    pub old_hour: Hour,
    pub new_hour: Hour,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct PhotoUpdate {
    pub email: String,
    pub photo: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PhotoSummary {
    pub updated_count: usize,
    pub not_found_count: usize,
    pub total_students: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HourStats {
    pub total: usize,
    pub with_photo: usize,
    pub without_photo: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RosterStats {
    pub total_students: usize,
    #[schema(value_type = Object)]
    pub stats_by_hour: BTreeMap<Hour, HourStats>,
}

/// Roster read at a known version, for read-modify-write.
struct Snapshot {
    version: Option<Version>,
    students: Vec<Student>,
}

/// The student roster, kept as one JSON document (`Student[]`).
#[derive(Clone)]
pub struct RosterStore {
    store: Arc<dyn DocumentStore>,
    document: String,
}

impl RosterStore {
    pub fn new(store: Arc<dyn DocumentStore>, document: impl Into<String>) -> Self {
        Self {
            store,
            document: document.into(),
        }
    }

    /// All students. A missing or unreadable document reads as an empty roster.
    pub async fn get_all(&self) -> Vec<Student> {
        match self.snapshot().await {
            Ok(snapshot) => snapshot.students,
            Err(e) => {
                error!(error = %e, document = %self.document, "Failed to read roster; returning empty roster");
                Vec::new()
            }
        }
    }

    /// Overwrites the roster unconditionally (last write wins).
    pub async fn replace_all(&self, mut students: Vec<Student>) -> ServiceResult<()> {
        if let Some(email) = first_duplicate(&students) {
            return Err(ServiceError::Validation(format!(
                "Duplicate email in roster: {email}"
            )));
        }
        students.sort_by(roster_order);
        self.write(&students, Precondition::Any).await?;
        info!(total = students.len(), "Roster replaced");
        Ok(())
    }

    pub async fn clear(&self) -> ServiceResult<()> {
        self.write(&[], Precondition::Any).await?;
        info!("Roster cleared");
        Ok(())
    }

    /// Merges imported records into the roster keyed on normalized email.
    ///
    /// Known emails keep their photo and take the incoming name/hour (an empty
    /// name or a missing hour keeps the stored value). Unknown emails are added
    /// without a photo. Stored records absent from the batch are kept.
    pub async fn merge_upsert(&self, incoming: Vec<StudentUpsert>) -> ServiceResult<MergeSummary> {
        let snapshot = self.snapshot().await?;

        let mut merged: Vec<Student> = Vec::with_capacity(snapshot.students.len() + incoming.len());
        let mut positions: HashMap<String, usize> = HashMap::new();
        if let Some(email) = first_duplicate(&snapshot.students) {
            error!(%email, document = %self.document, "Stored roster holds a duplicate email; refusing to merge");
            return Err(ServiceError::Storage(format!(
                "stored roster holds duplicate email {email}; replace the roster to repair it"
            )));
        }
        let mut untouched: HashMap<String, Student> = snapshot
            .students
            .into_iter()
            .map(|student| (student.key(), student))
            .collect();

        let (mut new_students, mut updated_students) = (0, 0);
        for record in incoming {
            let key = normalize_email(&record.email);
            if key.is_empty() {
                return Err(ServiceError::Validation("Every student needs an email".into()));
            }

            if let Some(&idx) = positions.get(&key) {
                apply_update(&mut merged[idx], &record);
                continue;
            }

            if let Some(mut existing) = untouched.remove(&key) {
                apply_update(&mut existing, &record);
                updated_students += 1;
                positions.insert(key, merged.len());
                merged.push(existing);
            } else {
                new_students += 1;
                positions.insert(key, merged.len());
                merged.push(Student {
                    name: record.name.trim().to_string(),
                    email: record.email.trim().to_string(),
                    hour: record.hour.unwrap_or(Hour::First),
                    photo: None,
                });
            }
        }

        let existing_kept = untouched.len();
        merged.extend(untouched.into_values());
        merged.sort_by(roster_order);

        self.write(&merged, Precondition::Matches(snapshot.version))
            .await?;

        let summary = MergeSummary {
            total_students: merged.len(),
            new_students,
            updated_students,
            existing_kept,
        };
        info!(?summary, "Roster merged");
        Ok(summary)
    }

    pub async fn remove(&self, email: &str) -> ServiceResult<RemovalSummary> {
        let snapshot = self.snapshot().await?;
        let key = normalize_email(email);
        let before = snapshot.students.len();

        let remaining: Vec<Student> = snapshot
            .students
            .into_iter()
            .filter(|s| s.key() != key)
            .collect();
        if remaining.len() == before {
            return Err(ServiceError::NotFound("Student not found".into()));
        }

        self.write(&remaining, Precondition::Matches(snapshot.version))
            .await?;
        Ok(RemovalSummary {
            removed_count: before - remaining.len(),
            remaining_count: remaining.len(),
        })
    }

    pub async fn reassign_hour(&self, email: &str, new_hour: Hour) -> ServiceResult<HourChange> {
        let mut snapshot = self.snapshot().await?;
        if snapshot.students.is_empty() {
            return Err(ServiceError::NotFound("No students found".into()));
        }

        let key = normalize_email(email);
        let student = snapshot
            .students
            .iter_mut()
            .find(|s| s.key() == key)
            .ok_or_else(|| ServiceError::NotFound("Student not found".into()))?;

        let change = HourChange {
            student_name: student.name.clone(),
            old_hour: student.hour,
            new_hour,
        };
        student.hour = new_hour;

        snapshot.students.sort_by(roster_order);
        self.write(&snapshot.students, Precondition::Matches(snapshot.version))
            .await?;
        Ok(change)
    }

    pub async fn update_photos(&self, updates: Vec<PhotoUpdate>) -> ServiceResult<PhotoSummary> {
        let mut snapshot = self.snapshot().await?;

        let photos: HashMap<String, String> = updates
            .into_iter()
            .map(|u| (normalize_email(&u.email), u.photo))
            .collect();

        let mut updated_count = 0;
        for student in snapshot.students.iter_mut() {
            if let Some(photo) = photos.get(&student.key()) {
                student.photo = Some(photo.clone());
                updated_count += 1;
            }
        }
        let not_found_count = photos
            .keys()
            .filter(|email| !snapshot.students.iter().any(|s| &s.key() == *email))
            .count();

        self.write(&snapshot.students, Precondition::Matches(snapshot.version))
            .await?;
        Ok(PhotoSummary {
            updated_count,
            not_found_count,
            total_students: snapshot.students.len(),
        })
    }

    pub async fn stats(&self) -> RosterStats {
        let students = self.get_all().await;
        let mut stats_by_hour: BTreeMap<Hour, HourStats> = BTreeMap::new();
        for student in &students {
            let entry = stats_by_hour.entry(student.hour).or_default();
            entry.total += 1;
            if student.photo.is_some() {
                entry.with_photo += 1;
            } else {
                entry.without_photo += 1;
            }
        }
        RosterStats {
            total_students: students.len(),
            stats_by_hour,
        }
    }

    async fn snapshot(&self) -> ServiceResult<Snapshot> {
        let Some(doc) = self.store.get_latest(&self.document).await? else {
            return Ok(Snapshot {
                version: None,
                students: Vec::new(),
            });
        };

        let students = serde_json::from_slice(&doc.body).map_err(|e| {
            warn!(error = %e, document = %self.document, "Roster document is not a student array");
            ServiceError::Storage(format!("roster document is unreadable: {e}"))
        })?;
        Ok(Snapshot {
            version: Some(doc.version),
            students,
        })
    }

    async fn write(&self, students: &[Student], precondition: Precondition) -> ServiceResult<()> {
        let body = serde_json::to_vec_pretty(students)
            .map_err(|e| ServiceError::Storage(e.to_string()))?;
        self.store
            .put(&self.document, body, precondition)
            .await
            .map_err(|e| {
                error!(error = %e, document = %self.document, "Failed to save roster");
                ServiceError::from(e)
            })?;
        Ok(())
    }
}

/// Normalized email of the first record whose key was already seen.
fn first_duplicate(students: &[Student]) -> Option<String> {
    let mut seen = HashSet::with_capacity(students.len());
    students
        .iter()
        .map(Student::key)
        .find(|key| !seen.insert(key.clone()))
}

fn apply_update(student: &mut Student, record: &StudentUpsert) {
    let name = record.name.trim();
    if !name.is_empty() {
        student.name = name.to_string();
    }
    if let Some(hour) = record.hour {
        student.hour = hour;
    }
}
