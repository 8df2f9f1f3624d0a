//! Field names and helpers for general- and health-data documents.

use std::borrow::Cow;

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::store::{format_timestamp, scalar_text, Fields};

/// Per-field arrays of a flat general-data document, in display order.
pub const GENERAL_DATA_FIELDS: [&str; 7] = [
    "eye",
    "complaint",
    "glass",
    "duration",
    "distance",
    "progression",
    "association",
];

/// Array of condition strings in a health-data document.
pub const CONDITIONS_FIELD: &str = "conditions";

/// Keys under which older general-data documents stored whole rows.
pub const NESTED_ROW_KEYS: [&str; 2] = ["rows", "generalData"];

/// MR number tag on patient-linked documents.
pub const MR_NO_FIELD: &str = "mrNo";

/// Write time of general- and health-data documents.
pub const SAVED_AT_FIELD: &str = "savedAt";

/// Write time used by older general-data documents.
pub const VISIT_DATE_FIELD: &str = "visitDate";

/// Write time of patients and bills.
pub const CREATED_AT_FIELD: &str = "createdAt";

/// Elements of an array field as text. Missing or non-array fields yield an
/// empty list.
pub fn string_list(fields: &Fields, key: &str) -> Vec<String> {
    match fields.get(key) {
        Some(Value::Array(items)) => items.iter().map(scalar_text).collect(),
        _ => Vec::new(),
    }
}

/// When a record was saved: `savedAt`, else the legacy `visitDate`.
pub fn record_timestamp(fields: &Fields) -> Option<Cow<'_, str>> {
    fields
        .get(SAVED_AT_FIELD)
        .and_then(timestamp_text)
        .or_else(|| fields.get(VISIT_DATE_FIELD).and_then(timestamp_text))
}

/// Sortable text of a stored timestamp.
///
/// Strings pass through. Epoch milliseconds and `{seconds, nanoseconds}`
/// objects (older exports also used `_seconds`) become RFC 3339 text.
/// Empty strings and anything else yield `None`.
pub fn timestamp_text(value: &Value) -> Option<Cow<'_, str>> {
    match value {
        Value::String(s) if !s.is_empty() => Some(Cow::Borrowed(s.as_str())),
        Value::Number(n) => n
            .as_i64()
            .and_then(DateTime::<Utc>::from_timestamp_millis)
            .map(|at| Cow::Owned(format_timestamp(at))),
        Value::Object(map) => {
            let seconds = map
                .get("seconds")
                .or_else(|| map.get("_seconds"))
                .and_then(Value::as_i64)?;
            let nanos = map
                .get("nanoseconds")
                .or_else(|| map.get("_nanoseconds"))
                .and_then(Value::as_u64)
                .and_then(|n| u32::try_from(n).ok())
                .unwrap_or(0);
            DateTime::<Utc>::from_timestamp(seconds, nanos).map(|at| Cow::Owned(format_timestamp(at)))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_string_list() {
        let fields = json!({"eye": ["LE", 6, null], "glass": "none"})
            .as_object()
            .cloned()
            .unwrap();
        assert_eq!(string_list(&fields, "eye"), vec!["LE", "6", ""]);
        assert!(string_list(&fields, "glass").is_empty());
        assert!(string_list(&fields, "missing").is_empty());
    }

    #[test]
    fn test_record_timestamp_fallback() {
        let saved = json!({"savedAt": "2024-02-01T00:00:00Z", "visitDate": "2020-01-01"})
            .as_object()
            .cloned()
            .unwrap();
        assert_eq!(record_timestamp(&saved).as_deref(), Some("2024-02-01T00:00:00Z"));

        let legacy = json!({"visitDate": "2020-01-01"}).as_object().cloned().unwrap();
        assert_eq!(record_timestamp(&legacy).as_deref(), Some("2020-01-01"));

        assert_eq!(record_timestamp(&Fields::new()), None);
    }

    #[test]
    fn test_record_timestamp_converts_non_string_saved_at() {
        let seconds = json!({"savedAt": {"seconds": 1706745600, "nanoseconds": 500000000}})
            .as_object()
            .cloned()
            .unwrap();
        assert_eq!(
            record_timestamp(&seconds).as_deref(),
            Some("2024-02-01T00:00:00.500000Z")
        );

        let exported = json!({"savedAt": {"_seconds": 1706745600, "_nanoseconds": 0}})
            .as_object()
            .cloned()
            .unwrap();
        assert_eq!(
            record_timestamp(&exported).as_deref(),
            Some("2024-02-01T00:00:00.000000Z")
        );

        let millis = json!({"savedAt": 1706745600000_i64}).as_object().cloned().unwrap();
        assert_eq!(
            record_timestamp(&millis).as_deref(),
            Some("2024-02-01T00:00:00.000000Z")
        );
    }

    #[test]
    fn test_unreadable_saved_at_falls_back_to_visit_date() {
        let fields = json!({"savedAt": true, "visitDate": "2020-01-01"})
            .as_object()
            .cloned()
            .unwrap();
        assert_eq!(record_timestamp(&fields).as_deref(), Some("2020-01-01"));

        let blank = json!({"savedAt": "", "visitDate": "2019-05-05"})
            .as_object()
            .cloned()
            .unwrap();
        assert_eq!(record_timestamp(&blank).as_deref(), Some("2019-05-05"));
    }
}
