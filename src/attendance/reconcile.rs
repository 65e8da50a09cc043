use std::collections::HashSet;

use chrono::NaiveDate;

use crate::model::attendance::AttendanceResult;
use crate::model::student::normalize_email;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Partition {
    pub present: Vec<String>,
    pub absent: Vec<String>,
}

/// Splits roster emails into present/absent against an already-normalized
/// present set. Emails are normalized before lookup; order and duplicates of
/// the input are preserved.
pub fn reconcile<S: AsRef<str>>(roster_emails: &[S], present_set: &HashSet<String>) -> Partition {
    let (present, absent) = roster_emails
        .iter()
        .map(|email| normalize_email(email.as_ref()))
        .partition(|email| present_set.contains(email));
    Partition { present, absent }
}

impl Partition {
    pub fn into_result(self, date: NaiveDate) -> AttendanceResult {
        AttendanceResult {
            date,
            total_students: self.present.len() + self.absent.len(),
            present_count: self.present.len(),
            absent_count: self.absent.len(),
            present_students: self.present,
            absent_students: self.absent,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn set(items: &[&str]) -> HashSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn comparison_ignores_case_and_whitespace() {
        let p = reconcile(&["A@X.com "], &set(&["a@x.com"]));
        assert_eq!(p.present, ["a@x.com"]);
        assert!(p.absent.is_empty());
    }

    #[test]
    fn duplicates_are_kept_positionally() {
        let p = reconcile(&["b@x", "a@x", "B@x", "c@x"], &set(&["b@x"]));
        assert_eq!(p.present, ["b@x", "b@x"]);
        assert_eq!(p.absent, ["a@x", "c@x"]);
    }

    #[test]
    fn empty_roster_gives_empty_result() {
        let p = reconcile::<&str>(&[], &set(&["a@x"]));
        let result = p.into_result(NaiveDate::from_ymd_opt(2025, 9, 2).unwrap());
        assert_eq!(result.total_students, 0);
        assert!(result.present_students.is_empty() && result.absent_students.is_empty());
    }

    proptest! {
        #[test]
        fn partition_is_exhaustive_disjoint_and_ordered(
            roster in prop::collection::vec("[a-dA-D ]{0,2}@[xy]", 0..24),
            picks in prop::collection::vec(any::<bool>(), 24),
        ) {
            let present_set: HashSet<String> = roster
                .iter()
                .zip(&picks)
                .filter(|(_, keep)| **keep)
                .map(|(e, _)| normalize_email(e))
                .collect();

            let p = reconcile(&roster, &present_set);
            prop_assert_eq!(p.present.len() + p.absent.len(), roster.len());
            prop_assert!(p.present.iter().all(|e| present_set.contains(e)));
            prop_assert!(p.absent.iter().all(|e| !present_set.contains(e)));

            // each side is a subsequence of the normalized roster
            let normalized: Vec<String> = roster.iter().map(|e| normalize_email(e)).collect();
            let expected_present: Vec<String> =
                normalized.iter().filter(|e| present_set.contains(*e)).cloned().collect();
            let expected_absent: Vec<String> =
                normalized.iter().filter(|e| !present_set.contains(*e)).cloned().collect();
            prop_assert_eq!(p.present, expected_present);
            prop_assert_eq!(p.absent, expected_absent);
        }
    }
}
