//! General- and health-data entry forms and their management lists.

use std::borrow::Cow;
use std::cmp::Ordering;

use thiserror::Error;
use tracing::{info, warn};

use crate::models::{
    record_timestamp, timestamp_text, CONDITIONS_FIELD, GENERAL_DATA_FIELDS, MR_NO_FIELD, SAVED_AT_FIELD,
};
use crate::store::{Collection, DocumentStore, Fields, StoreError};

/// Prompt shown before a record is deleted.
pub const DELETE_RECORD_PROMPT: &str = "Delete this record?";

/// Record errors.
#[derive(Error, Debug)]
pub enum RecordError {
    #[error("Unknown field: {0}")]
    UnknownField(String),

    #[error("No entry {index} in {field}")]
    IndexOutOfRange { field: String, index: usize },

    #[error("Please add at least one condition.")]
    NoConditions,

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

pub type RecordResult<T> = Result<T, RecordError>;

/// Which record collection a list or entry works on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    General,
    Health,
}

impl RecordKind {
    pub fn collection(&self) -> Collection {
        match self {
            RecordKind::General => Collection::GeneralData,
            RecordKind::Health => Collection::HealthData,
        }
    }

    /// Array fields a record of this kind carries.
    pub fn fields(&self) -> &'static [&'static str] {
        match self {
            RecordKind::General => &GENERAL_DATA_FIELDS,
            RecordKind::Health => &[CONDITIONS_FIELD],
        }
    }

    /// Save time of a stored record. Health records predate `visitDate`.
    pub fn timestamp<'a>(&self, fields: &'a Fields) -> Option<Cow<'a, str>> {
        match self {
            RecordKind::General => record_timestamp(fields),
            RecordKind::Health => fields.get(SAVED_AT_FIELD).and_then(timestamp_text),
        }
    }
}

/// An editable list of free-text values. Starts with one empty slot.
#[derive(Debug, Clone, PartialEq)]
struct ValueList {
    field: &'static str,
    values: Vec<String>,
}

impl ValueList {
    fn new(field: &'static str) -> Self {
        Self {
            field,
            values: vec![String::new()],
        }
    }

    fn update(&mut self, index: usize, value: String) -> RecordResult<()> {
        let field = self.field;
        let slot = self
            .values
            .get_mut(index)
            .ok_or_else(|| RecordError::IndexOutOfRange {
                field: field.to_string(),
                index,
            })?;
        *slot = value;
        Ok(())
    }

    fn remove(&mut self, index: usize) -> RecordResult<String> {
        if index >= self.values.len() {
            return Err(RecordError::IndexOutOfRange {
                field: self.field.to_string(),
                index,
            });
        }
        Ok(self.values.remove(index))
    }

    /// Values with blank entries dropped.
    fn cleaned(&self) -> Vec<String> {
        self.values
            .iter()
            .filter(|v| !v.trim().is_empty())
            .cloned()
            .collect()
    }
}

/// The add-general-data form: one list per field.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneralDataEntry {
    lists: Vec<ValueList>,
    mr_no: Option<String>,
}

impl Default for GeneralDataEntry {
    fn default() -> Self {
        Self::new()
    }
}

impl GeneralDataEntry {
    pub fn new() -> Self {
        Self {
            lists: GENERAL_DATA_FIELDS.into_iter().map(ValueList::new).collect(),
            mr_no: None,
        }
    }

    fn list_mut(&mut self, field: &str) -> RecordResult<&mut ValueList> {
        self.lists
            .iter_mut()
            .find(|list| list.field == field)
            .ok_or_else(|| RecordError::UnknownField(field.to_string()))
    }

    pub fn values(&self, field: &str) -> Option<&[String]> {
        self.lists
            .iter()
            .find(|list| list.field == field)
            .map(|list| list.values.as_slice())
    }

    /// Link the record to a patient.
    pub fn set_mr_no(&mut self, mr_no: Option<String>) {
        self.mr_no = mr_no.filter(|mr| !mr.trim().is_empty());
    }

    pub fn add(&mut self, field: &str) -> RecordResult<()> {
        self.list_mut(field)?.values.push(String::new());
        Ok(())
    }

    pub fn update(&mut self, field: &str, index: usize, value: impl Into<String>) -> RecordResult<()> {
        self.list_mut(field)?.update(index, value.into())
    }

    pub fn remove(&mut self, field: &str, index: usize) -> RecordResult<String> {
        self.list_mut(field)?.remove(index)
    }

    /// Replace every value of one field.
    pub fn set_values(&mut self, field: &str, values: Vec<String>) -> RecordResult<()> {
        self.list_mut(field)?.values = values;
        Ok(())
    }

    /// Document to store: every field with blanks dropped, plus the MR tag.
    pub fn to_document(&self) -> Fields {
        let mut fields = Fields::new();
        for list in &self.lists {
            fields.insert(list.field.to_string(), list.cleaned().into());
        }
        if let Some(mr_no) = &self.mr_no {
            fields.insert(MR_NO_FIELD.to_string(), mr_no.trim().into());
        }
        fields
    }

    /// Save and reset. On failure the entry is kept as is.
    pub fn save(&mut self, store: &dyn DocumentStore) -> RecordResult<String> {
        let id = store.add(Collection::GeneralData, self.to_document(), Some(SAVED_AT_FIELD))?;
        info!(%id, mr_no = ?self.mr_no, "saved general data");
        *self = Self::new();
        Ok(id)
    }
}

/// The add-health-data form: a single list of conditions.
#[derive(Debug, Clone, PartialEq)]
pub struct HealthDataEntry {
    conditions: ValueList,
}

impl Default for HealthDataEntry {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthDataEntry {
    pub fn new() -> Self {
        Self {
            conditions: ValueList::new(CONDITIONS_FIELD),
        }
    }

    pub fn conditions(&self) -> &[String] {
        &self.conditions.values
    }

    pub fn add(&mut self) {
        self.conditions.values.push(String::new());
    }

    pub fn update(&mut self, index: usize, value: impl Into<String>) -> RecordResult<()> {
        self.conditions.update(index, value.into())
    }

    pub fn remove(&mut self, index: usize) -> RecordResult<String> {
        self.conditions.remove(index)
    }

    pub fn set_conditions(&mut self, conditions: Vec<String>) {
        self.conditions.values = conditions;
    }

    /// Save and reset. Rejected before any write when every condition is blank.
    pub fn save(&mut self, store: &dyn DocumentStore) -> RecordResult<String> {
        let conditions = self.conditions.cleaned();
        if conditions.is_empty() {
            return Err(RecordError::NoConditions);
        }

        let mut fields = Fields::new();
        fields.insert(CONDITIONS_FIELD.to_string(), conditions.into());
        let id = store.add(Collection::HealthData, fields, Some(SAVED_AT_FIELD))?;
        info!(%id, "saved health data");
        *self = Self::new();
        Ok(id)
    }
}

/// A stored record as listed on a manage screen.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub id: String,
    pub data: Fields,
}

impl Record {
    /// Text values of one array field.
    pub fn values(&self, field: &str) -> Vec<String> {
        crate::models::string_list(&self.data, field)
    }
}

/// Newest first. Records without a timestamp sort ahead of everything.
fn newest_first(a: Option<&str>, b: Option<&str>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a), Some(b)) => b.cmp(a),
    }
}

/// Loaded records of one kind, newest first.
#[derive(Debug, Clone)]
pub struct RecordBook {
    kind: RecordKind,
    records: Vec<Record>,
}

impl RecordBook {
    pub fn load(store: &dyn DocumentStore, kind: RecordKind) -> RecordResult<Self> {
        let mut records: Vec<Record> = store
            .list(kind.collection())?
            .into_iter()
            .map(|doc| Record {
                id: doc.id,
                data: doc.data,
            })
            .collect();
        records.sort_by(|a, b| newest_first(
                kind.timestamp(&a.data).as_deref(),
                kind.timestamp(&b.data).as_deref(),
            ));
        Ok(Self { kind, records })
    }

    pub fn kind(&self) -> RecordKind {
        self.kind
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn get(&self, id: &str) -> Option<&Record> {
        self.records.iter().find(|r| r.id == id)
    }

    /// Overwrite a record's array fields in the store and in the list.
    /// Fields this kind does not carry are rejected.
    pub fn save_record(
        &mut self,
        store: &dyn DocumentStore,
        id: &str,
        arrays: Vec<(String, Vec<String>)>,
    ) -> RecordResult<()> {
        let mut fields = Fields::new();
        for (field, values) in arrays {
            if !self.kind.fields().contains(&field.as_str()) {
                return Err(RecordError::UnknownField(field));
            }
            fields.insert(field, values.into());
        }

        if !store.update(self.kind.collection(), id, fields.clone())? {
            return Err(RecordError::NotFound(id.to_string()));
        }
        match self.records.iter_mut().find(|r| r.id == id) {
            Some(record) => record.data.extend(fields),
            None => warn!(id, "saved record missing from loaded list"),
        }
        info!(id, kind = ?self.kind, "updated record");
        Ok(())
    }

    /// Delete after confirmation and drop the record from the list.
    pub fn delete(
        &mut self,
        store: &dyn DocumentStore,
        id: &str,
        confirm: impl FnOnce(&str) -> bool,
    ) -> RecordResult<bool> {
        if !confirm(DELETE_RECORD_PROMPT) {
            return Ok(false);
        }
        if !store.delete(self.kind.collection(), id)? {
            return Err(RecordError::NotFound(id.to_string()));
        }
        self.records.retain(|r| r.id != id);
        info!(id, kind = ?self.kind, "deleted record");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SqliteStore;
    use serde_json::{json, Value};

    fn fields(value: Value) -> Fields {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_general_entry_save_drops_blanks_and_resets() {
        let store = SqliteStore::open_in_memory().unwrap();
        let mut entry = GeneralDataEntry::new();
        entry.update("eye", 0, "LE").unwrap();
        entry.add("eye").unwrap();
        entry.add("eye").unwrap();
        entry.update("eye", 2, "RE").unwrap();
        entry.update("complaint", 0, "   ").unwrap();
        entry.set_mr_no(Some("MR-9".into()));

        let id = entry.save(&store).unwrap();
        let saved = store.get(Collection::GeneralData, &id).unwrap().unwrap();

        assert_eq!(saved.data["eye"], json!(["LE", "RE"]));
        assert_eq!(saved.data["complaint"], json!([]));
        assert_eq!(saved.data["mrNo"], "MR-9");
        assert!(saved.str_field("savedAt").is_some());
        assert_eq!(entry, GeneralDataEntry::new());
    }

    #[test]
    fn test_general_entry_rejects_unknown_field_and_index() {
        let mut entry = GeneralDataEntry::new();
        assert!(matches!(entry.add("others"), Err(RecordError::UnknownField(_))));
        assert!(matches!(
            entry.update("eye", 3, "LE"),
            Err(RecordError::IndexOutOfRange { .. })
        ));
        entry.remove("eye", 0).unwrap();
        assert_eq!(entry.values("eye"), Some(&[] as &[String]));
    }

    #[test]
    fn test_health_entry_requires_a_condition() {
        let store = SqliteStore::open_in_memory().unwrap();
        let mut entry = HealthDataEntry::new();
        entry.add();
        entry.update(1, "  ").unwrap();

        let err = entry.save(&store).unwrap_err();
        assert!(matches!(err, RecordError::NoConditions));
        assert!(store.list(Collection::HealthData).unwrap().is_empty());
        assert_eq!(entry.conditions().len(), 2);

        entry.update(0, "Diabetes").unwrap();
        entry.save(&store).unwrap();
        assert_eq!(entry.conditions(), &[String::new()]);
    }

    #[test]
    fn test_book_sorts_newest_first_missing_on_top() {
        let store = SqliteStore::open_in_memory().unwrap();
        let add = |data: Value| store.add(Collection::GeneralData, fields(data), None).unwrap();
        let old = add(json!({"savedAt": "2023-01-01T00:00:00.000000Z"}));
        let legacy = add(json!({"visitDate": "2023-06-01T00:00:00.000000Z"}));
        let undated = add(json!({"eye": ["LE"]}));
        let new = add(json!({"savedAt": "2024-01-01T00:00:00.000000Z"}));

        let book = RecordBook::load(&store, RecordKind::General).unwrap();
        let ids: Vec<_> = book.records().iter().map(|r| r.id.clone()).collect();
        assert_eq!(ids, vec![undated, new, legacy, old]);
    }

    #[test]
    fn test_book_save_and_delete() {
        let store = SqliteStore::open_in_memory().unwrap();
        let id = store
            .add(Collection::HealthData, fields(json!({"conditions": ["Asthma"]})), Some("savedAt"))
            .unwrap();
        let mut book = RecordBook::load(&store, RecordKind::Health).unwrap();

        book.save_record(
            &store,
            &id,
            vec![("conditions".into(), vec!["Asthma".into(), "Glaucoma".into()])],
        )
        .unwrap();
        assert_eq!(book.get(&id).unwrap().values("conditions"), vec!["Asthma", "Glaucoma"]);
        let stored = store.get(Collection::HealthData, &id).unwrap().unwrap();
        assert_eq!(stored.data["conditions"], json!(["Asthma", "Glaucoma"]));

        let err = book
            .save_record(&store, &id, vec![("eye".into(), vec![])])
            .unwrap_err();
        assert!(matches!(err, RecordError::UnknownField(_)));

        assert!(!book.delete(&store, &id, |_| false).unwrap());
        assert_eq!(book.records().len(), 1);
        assert!(book.delete(&store, &id, |_| true).unwrap());
        assert!(book.records().is_empty());
        assert!(store.get(Collection::HealthData, &id).unwrap().is_none());
    }
}
