use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};
use utoipa::ToSchema;

/// Class hour a student is enrolled in. Serialized as `"1"`..`"4"`.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    ToSchema,
)]
pub enum Hour {
    #[serde(rename = "1")]
    #[strum(serialize = "1")]
    First,
    #[serde(rename = "2")]
    #[strum(serialize = "2")]
    Second,
    #[serde(rename = "3")]
    #[strum(serialize = "3")]
    Third,
    #[serde(rename = "4")]
    #[strum(serialize = "4")]
    Fourth,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "name": "Ada Lovelace",
    "email": "ada@school.org",
    "hour": "1",
    "photo": null
}))]
pub struct Student {
    pub name: String,
    /// Unique key, compared after [`normalize_email`].
    pub email: String,
    pub hour: Hour,
    /// Opaque image reference (usually a data URL).
    #[serde(default)]
    pub photo: Option<String>,
}

impl Student {
    pub fn key(&self) -> String {
        normalize_email(&self.email)
    }
}

/// Lower-cased, trimmed form used for every email comparison.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Roster order: hour ascending, then name.
///
/// Names compare case-insensitively first so "adams" sorts next to "Adams",
/// with the exact string as the final tie-break to keep the order total.
pub fn roster_order(a: &Student, b: &Student) -> Ordering {
    a.hour
        .cmp(&b.hour)
        .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
        .then_with(|| a.name.cmp(&b.name))
}
