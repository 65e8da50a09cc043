use std::str::FromStr;

use csv::{ReaderBuilder, StringRecord, Trim};

use crate::errors::{ServiceError, ServiceResult};
use crate::model::student::Hour;
use crate::storage::roster::StudentUpsert;

const HEADER_WORDS: [&str; 3] = ["name", "email", "hour"];

/// A first row that names columns instead of holding a student.
fn looks_like_header(record: &StringRecord) -> bool {
    let has_address = record.iter().any(|field| field.contains('@'));
    let mentions_column = record.iter().any(|field| {
        let lower = field.to_lowercase();
        HEADER_WORDS.iter().any(|word| lower.contains(word))
    });
    mentions_column && !has_address
}

/// Parses roster rows of the form `name,email[,hour]` or `email,name[,hour]`.
///
/// Whichever of the first two columns contains `@` is taken as the email.
/// Rows missing a name or an email are skipped; a missing hour defaults to 1,
/// an unparseable one rejects the whole upload.
pub fn parse_roster_csv(text: &str) -> ServiceResult<Vec<StudentUpsert>> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(text.as_bytes());

    let mut records = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| ServiceError::Validation(format!("Malformed CSV: {e}")))?;
        if record.iter().all(str::is_empty) {
            continue;
        }
        records.push(record);
    }

    let skip = records.first().map(looks_like_header).unwrap_or(false) as usize;

    let mut students = Vec::with_capacity(records.len());
    for record in records.iter().skip(skip) {
        let first = record.get(0).unwrap_or_default();
        let second = record.get(1).unwrap_or_default();
        let (email, name) = if first.contains('@') {
            (first, second)
        } else {
            (second, first)
        };
        if email.is_empty() || name.is_empty() {
            continue;
        }

        let hour = match record.get(2).filter(|h| !h.is_empty()) {
            None => Hour::First,
            Some(raw) => Hour::from_str(raw).map_err(|_| {
                let line = record.position().map(|p| p.line()).unwrap_or_default();
                ServiceError::Validation(format!(
                    "Line {line}: invalid hour {raw:?}. Must be 1, 2, 3, or 4"
                ))
            })?,
        };

        students.push(StudentUpsert {
            name: name.to_string(),
            email: email.to_string(),
            hour: Some(hour),
        });
    }

    Ok(students)
}
