//! Document store contract.
//!
//! Every service in this crate talks to storage through [`DocumentStore`],
//! handed in by the caller. The crate ships [`SqliteStore`]; tests and other
//! shells can supply their own implementation.

mod sqlite;

pub use sqlite::*;

use serde_json::{Map, Value};
use thiserror::Error;

use crate::db::DbError;

/// Field map of a stored document.
pub type Fields = Map<String, Value>;

/// Upper bound appended to a search term to form a prefix range.
pub const PREFIX_SENTINEL: char = '\u{f8ff}';

/// Store errors.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] DbError),

    #[error("Store lock poisoned: {0}")]
    LockPoisoned(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Named collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Patients,
    GeneralData,
    HealthData,
    Bills,
}

impl Collection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Patients => "patients",
            Collection::GeneralData => "general_data",
            Collection::HealthData => "health_data",
            Collection::Bills => "bills",
        }
    }
}

impl std::fmt::Display for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stored document: store-assigned id plus its fields.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub data: Fields,
}

impl Document {
    /// String value of a top-level field, if it is a string.
    pub fn str_field(&self, name: &str) -> Option<&str> {
        self.data.get(name).and_then(Value::as_str)
    }

    /// Decode the document into a typed model, exposing the id as `"id"`.
    pub fn decode<T: serde::de::DeserializeOwned>(&self) -> serde_json::Result<T> {
        let mut data = self.data.clone();
        data.insert("id".into(), Value::String(self.id.clone()));
        serde_json::from_value(Value::Object(data))
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

/// A single field predicate.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Field equals value.
    Eq { field: String, value: Value },
    /// Field lies in the inclusive string range `[start, end]`.
    Range {
        field: String,
        start: String,
        end: String,
    },
}

/// Query over one collection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    filters: Vec<Filter>,
    order: Option<(String, Direction)>,
    limit: Option<usize>,
}

impl Query {
    /// Match every document.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn where_eq(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::Eq {
            field: field.to_string(),
            value: value.into(),
        });
        self
    }

    /// Match string values starting with `term`.
    pub fn where_prefix(mut self, field: &str, term: &str) -> Self {
        self.filters.push(Filter::Range {
            field: field.to_string(),
            start: term.to_string(),
            end: format!("{term}{PREFIX_SENTINEL}"),
        });
        self
    }

    pub fn order_by(mut self, field: &str, direction: Direction) -> Self {
        self.order = Some((field.to_string(), direction));
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }

    pub fn order(&self) -> Option<(&str, Direction)> {
        self.order.as_ref().map(|(field, dir)| (field.as_str(), *dir))
    }

    pub fn max_results(&self) -> Option<usize> {
        self.limit
    }
}

/// CRUD access to named document collections.
///
/// Calls may block; async callers should move them onto a blocking thread.
pub trait DocumentStore: Send + Sync {
    /// Write a new document and return its id. When `server_timestamp` names a
    /// field, the store sets it to the write time.
    fn add(
        &self,
        collection: Collection,
        fields: Fields,
        server_timestamp: Option<&str>,
    ) -> StoreResult<String>;

    fn get(&self, collection: Collection, id: &str) -> StoreResult<Option<Document>>;

    fn query(&self, collection: Collection, query: &Query) -> StoreResult<Vec<Document>>;

    /// Overwrite the given top-level fields. Returns `false` if the document
    /// does not exist.
    fn update(&self, collection: Collection, id: &str, fields: Fields) -> StoreResult<bool>;

    /// Returns `false` if the document did not exist.
    fn delete(&self, collection: Collection, id: &str) -> StoreResult<bool>;

    /// Every document in insertion order.
    fn list(&self, collection: Collection) -> StoreResult<Vec<Document>> {
        self.query(collection, &Query::all())
    }
}

/// Server-side write timestamp, sortable as a string.
pub fn server_timestamp() -> String {
    format_timestamp(chrono::Utc::now())
}

/// Timestamp text in the same sortable form the store writes.
pub fn format_timestamp(at: chrono::DateTime<chrono::Utc>) -> String {
    at.to_rfc3339_opts(chrono::SecondsFormat::Micros, true)
}

/// Coerce a loosely typed JSON scalar into display text.
///
/// Strings pass through, numbers and booleans are stringified, anything else
/// becomes empty.
pub fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_prefix_query_bounds() {
        let query = Query::all().where_prefix("name", "Jo");
        match &query.filters()[0] {
            Filter::Range { field, start, end } => {
                assert_eq!(field, "name");
                assert_eq!(start, "Jo");
                assert_eq!(end, "Jo\u{f8ff}");
            }
            other => panic!("unexpected filter {:?}", other),
        }
    }

    #[test]
    fn test_document_decode_includes_id() {
        #[derive(serde::Deserialize)]
        struct Named {
            id: String,
            name: String,
        }

        let doc = Document {
            id: "doc-7".into(),
            data: json!({"name": "Ravi"}).as_object().unwrap().clone(),
        };
        let named: Named = doc.decode().unwrap();
        assert_eq!(named.id, "doc-7");
        assert_eq!(named.name, "Ravi");
        assert_eq!(doc.str_field("name"), Some("Ravi"));
        assert_eq!(doc.str_field("missing"), None);
    }

    #[test]
    fn test_server_timestamps_sort_chronologically() {
        let first = server_timestamp();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let second = server_timestamp();
        assert!(first < second);
    }

    #[test]
    fn test_scalar_text() {
        assert_eq!(scalar_text(&json!("LE")), "LE");
        assert_eq!(scalar_text(&json!(42)), "42");
        assert_eq!(scalar_text(&json!(null)), "");
        assert_eq!(scalar_text(&json!(["x"])), "");
    }
}
