//! Rebuild general-data rows from a patient's most recent record.
//!
//! General-data documents exist in two shapes:
//!
//! ```text
//! flat:    { "eye": ["LE", "RE"], "complaint": ["blur"], ... }   arrays aligned by index
//! nested:  { "rows": [ { "eye": "LE", "complaint": "blur" } ] } one object per row
//! ```
//!
//! [`GeneralDataShape::classify`] picks the shape once; everything after it
//! works on plain [`Row`]s.

use serde_json::Value;
use tracing::{debug, warn};

use crate::models::{
    record_timestamp, string_list, Row, Section, GENERAL_DATA_FIELDS, MR_NO_FIELD,
    NESTED_ROW_KEYS,
};
use crate::store::{Collection, Document, DocumentStore, Fields, Query, StoreResult};

/// Shape of a stored general-data document.
#[derive(Debug, Clone, PartialEq)]
pub enum GeneralDataShape<'a> {
    /// One array per field, aligned by index.
    Flat(Vec<(&'static str, Vec<String>)>),
    /// Array of row objects.
    Nested(&'a [Value]),
    Unrecognized,
}

impl<'a> GeneralDataShape<'a> {
    /// A populated `eye` array means flat; otherwise look for a row array.
    pub fn classify(fields: &'a Fields) -> Self {
        let has_eyes = matches!(fields.get("eye"), Some(Value::Array(items)) if !items.is_empty());
        if has_eyes {
            let columns = GENERAL_DATA_FIELDS
                .iter()
                .filter(|field| matches!(fields.get(**field), Some(Value::Array(_))))
                .map(|field| (*field, string_list(fields, field)))
                .collect();
            return GeneralDataShape::Flat(columns);
        }

        NESTED_ROW_KEYS
            .iter()
            .find_map(|key| match fields.get(*key) {
                Some(Value::Array(items)) => Some(GeneralDataShape::Nested(items.as_slice())),
                _ => None,
            })
            .unwrap_or(GeneralDataShape::Unrecognized)
    }

    /// Rows in canonical form, each with a fresh id.
    pub fn into_rows(self) -> Vec<Row> {
        match self {
            GeneralDataShape::Flat(columns) => {
                let count = columns.iter().map(|(_, values)| values.len()).max().unwrap_or(0);
                (0..count)
                    .map(|i| {
                        let mut row = Section::General.blank_row();
                        for (field, values) in &columns {
                            if let Some(value) = values.get(i) {
                                row.fields.insert(field.to_string(), value.clone());
                            }
                        }
                        row
                    })
                    .collect()
            }
            GeneralDataShape::Nested(items) => items
                .iter()
                .filter_map(Value::as_object)
                .map(|object| Section::General.row_from_object(object))
                .collect(),
            GeneralDataShape::Unrecognized => Vec::new(),
        }
    }
}

/// Rebuild rows from one general-data document.
pub fn normalize_general_rows(fields: &Fields) -> Vec<Row> {
    GeneralDataShape::classify(fields).into_rows()
}

/// Result of looking up a patient's history.
#[derive(Debug, Clone, PartialEq)]
pub enum HistoryOutcome {
    /// No record for the patient (or the lookup failed).
    NoRecord,
    /// A record was found but produced no rows.
    Empty,
    /// Rows rebuilt from the most recent record.
    Rows(Vec<Row>),
}

impl HistoryOutcome {
    pub fn from_document(document: Option<&Document>) -> Self {
        match document {
            None => HistoryOutcome::NoRecord,
            Some(doc) => {
                let rows = normalize_general_rows(&doc.data);
                if rows.is_empty() {
                    HistoryOutcome::Empty
                } else {
                    HistoryOutcome::Rows(rows)
                }
            }
        }
    }
}

/// Most recent general-data document tagged with `mr_no`.
pub fn latest_general_record(
    store: &dyn DocumentStore,
    mr_no: &str,
) -> StoreResult<Option<Document>> {
    if mr_no.trim().is_empty() {
        return Ok(None);
    }
    let documents = store.query(
        Collection::GeneralData,
        &Query::all().where_eq(MR_NO_FIELD, mr_no),
    )?;

    // Later documents win ties so re-saves on the same timestamp pick the newest write
    Ok(documents
        .into_iter()
        .enumerate()
        .max_by(|(ia, a), (ib, b)| {
            record_timestamp(&a.data)
                .cmp(&record_timestamp(&b.data))
                .then(ia.cmp(ib))
        })
        .map(|(_, doc)| doc))
}

/// Best-effort history lookup: failures are logged and reported as
/// [`HistoryOutcome::NoRecord`].
pub fn load_latest_general_rows(store: &dyn DocumentStore, mr_no: &str) -> HistoryOutcome {
    match latest_general_record(store, mr_no) {
        Ok(document) => {
            let outcome = HistoryOutcome::from_document(document.as_ref());
            debug!(mr_no, outcome = %outcome_kind(&outcome), "loaded general-data history");
            outcome
        }
        Err(e) => {
            warn!(mr_no, error = %e, "failed to load general-data history");
            HistoryOutcome::NoRecord
        }
    }
}

fn outcome_kind(outcome: &HistoryOutcome) -> String {
    match outcome {
        HistoryOutcome::NoRecord => "none".into(),
        HistoryOutcome::Empty => "empty".into(),
        HistoryOutcome::Rows(rows) => format!("{} rows", rows.len()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields(value: Value) -> Fields {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_flat_rows_aligned_by_index() {
        let doc = fields(json!({"eye": ["LE", "RE"], "complaint": ["blur"]}));
        let rows = normalize_general_rows(&doc);

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get("eye"), "LE");
        assert_eq!(rows[0].get("complaint"), "blur");
        assert_eq!(rows[0].get("glass"), "");
        assert_eq!(rows[1].get("eye"), "RE");
        assert_eq!(rows[1].get("complaint"), "");
        assert_ne!(rows[0].id, rows[1].id);
    }

    #[test]
    fn test_flat_row_count_is_longest_array() {
        let doc = fields(json!({
            "eye": ["LE"],
            "duration": ["1 week", "2 weeks", "1 month"],
        }));
        let rows = normalize_general_rows(&doc);
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[2].get("duration"), "1 month");
        assert_eq!(rows[2].get("eye"), "");
    }

    #[test]
    fn test_nested_rows_keep_fields() {
        let doc = fields(json!({"rows": [{"id": 1, "eye": "LE", "complaint": "blur"}]}));
        let rows = normalize_general_rows(&doc);

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("eye"), "LE");
        assert_eq!(rows[0].get("complaint"), "blur");
        assert_eq!(rows[0].get("others"), "");
    }

    #[test]
    fn test_nested_under_general_data_key() {
        let doc = fields(json!({"generalData": [{"eye": "RE"}, "junk", {"eye": "LE"}]}));
        let rows = normalize_general_rows(&doc);
        let eyes: Vec<_> = rows.iter().map(|r| r.get("eye").to_string()).collect();
        assert_eq!(eyes, vec!["RE", "LE"]);
    }

    #[test]
    fn test_empty_eye_array_falls_through_to_nested() {
        let doc = fields(json!({"eye": [], "rows": [{"eye": "LE"}]}));
        assert!(matches!(GeneralDataShape::classify(&doc), GeneralDataShape::Nested(_)));
    }

    #[test]
    fn test_unrecognized_shape_gives_no_rows() {
        let doc = fields(json!({"complaint": ["blur"]}));
        assert_eq!(GeneralDataShape::classify(&doc), GeneralDataShape::Unrecognized);
        assert!(normalize_general_rows(&doc).is_empty());
    }

    #[test]
    fn test_outcome_distinguishes_empty_from_missing() {
        assert_eq!(HistoryOutcome::from_document(None), HistoryOutcome::NoRecord);

        let empty = Document {
            id: "g1".into(),
            data: fields(json!({"rows": []})),
        };
        assert_eq!(HistoryOutcome::from_document(Some(&empty)), HistoryOutcome::Empty);
    }

    #[test]
    fn test_latest_record_ranks_object_saved_at() {
        let store = crate::store::SqliteStore::open_in_memory().unwrap();
        store
            .add(
                Collection::GeneralData,
                fields(json!({"mrNo": "MR-9", "savedAt": "2023-01-01T00:00:00Z", "eye": ["LE"]})),
                None,
            )
            .unwrap();
        store
            .add(
                Collection::GeneralData,
                fields(json!({
                    "mrNo": "MR-9",
                    "savedAt": {"seconds": 1706745600, "nanoseconds": 0},
                    "eye": ["RE"]
                })),
                None,
            )
            .unwrap();
        store
            .add(
                Collection::GeneralData,
                fields(json!({"mrNo": "MR-9", "visitDate": "2021-06-01", "eye": ["BE"]})),
                None,
            )
            .unwrap();

        let latest = latest_general_record(&store, "MR-9").unwrap().unwrap();
        assert_eq!(latest.data["eye"], json!(["RE"]));
    }
}
