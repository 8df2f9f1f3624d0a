//! Bill entry: patient selection, section rows and the one-shot save.

use thiserror::Error;
use tracing::{info, warn};

use super::{FormResult, RowCollection};
use crate::history::{load_latest_general_rows, HistoryOutcome};
use crate::models::{Patient, Row, RowId, Section, CREATED_AT_FIELD};
use crate::store::{Collection, DocumentStore, Fields, StoreError};

/// Bill save errors.
#[derive(Error, Debug)]
pub enum BillError {
    #[error("Select a patient first.")]
    NoPatientSelected,

    #[error("Error saving bill: {0}")]
    Store(#[from] StoreError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// State of the add-bill form.
///
/// Owns one [`RowCollection`] per [`Section`] and the selected patient
/// snapshot. Every row operation touches exactly one collection.
#[derive(Debug, Clone)]
pub struct BillForm {
    patient: Option<Patient>,
    sections: [RowCollection; 10],
}

impl Default for BillForm {
    fn default() -> Self {
        Self::new()
    }
}

impl BillForm {
    /// Empty form: no patient, one blank row per section.
    pub fn new() -> Self {
        Self {
            patient: None,
            sections: Section::ALL.map(RowCollection::new),
        }
    }

    pub fn patient(&self) -> Option<&Patient> {
        self.patient.as_ref()
    }

    pub fn collection(&self, section: Section) -> &RowCollection {
        &self.sections[section.index()]
    }

    pub fn rows(&self, section: Section) -> &[Row] {
        self.collection(section).rows()
    }

    fn collection_mut(&mut self, section: Section) -> &mut RowCollection {
        &mut self.sections[section.index()]
    }

    // =========================================================================
    // Row operations
    // =========================================================================

    pub fn add_row(&mut self, section: Section) -> RowId {
        self.collection_mut(section).add()
    }

    pub fn update_row(
        &mut self,
        section: Section,
        id: RowId,
        field: &str,
        value: impl Into<String>,
    ) -> FormResult<()> {
        self.collection_mut(section).update(id, field, value)
    }

    pub fn remove_row(&mut self, section: Section, id: RowId) -> FormResult<Row> {
        self.collection_mut(section).remove(id)
    }

    // =========================================================================
    // Patient selection
    // =========================================================================

    /// Select a patient and pre-fill general data from their latest record.
    ///
    /// The lookup is best effort: when it finds nothing usable the general
    /// section keeps whatever rows it already had.
    pub fn select_patient(&mut self, store: &dyn DocumentStore, patient: Patient) -> HistoryOutcome {
        let outcome = load_latest_general_rows(store, &patient.mr_no);
        if let HistoryOutcome::Rows(rows) = &outcome {
            self.collection_mut(Section::General).replace(rows.clone());
        }
        self.patient = Some(patient);
        outcome
    }

    pub fn clear_patient(&mut self) {
        self.patient = None;
    }

    /// Drop the patient and return every section to a single blank row.
    pub fn reset(&mut self) {
        self.patient = None;
        for collection in &mut self.sections {
            collection.reset();
        }
    }

    // =========================================================================
    // Persistence
    // =========================================================================

    /// Bill document: patient snapshot plus one array per section.
    pub fn to_document(&self) -> Result<Fields, BillError> {
        let patient = self.patient.as_ref().ok_or(BillError::NoPatientSelected)?;

        let mut fields = Fields::new();
        fields.insert("patient".into(), serde_json::to_value(patient)?);
        for collection in &self.sections {
            fields.insert(
                collection.section().document_key().into(),
                collection.to_json()?,
            );
        }
        Ok(fields)
    }

    /// Write the bill and reset the form.
    ///
    /// Without a selected patient nothing is written. On a store failure the
    /// form is left exactly as it was so the operator can retry.
    pub fn save(&mut self, store: &dyn DocumentStore) -> Result<String, BillError> {
        let document = self.to_document()?;

        match store.add(Collection::Bills, document, Some(CREATED_AT_FIELD)) {
            Ok(id) => {
                info!(bill_id = %id, "saved bill");
                self.reset();
                Ok(id)
            }
            Err(e) => {
                warn!(error = %e, "failed to save bill");
                Err(e.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{Document, Query, SqliteStore, StoreResult};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn patient() -> Patient {
        Patient {
            id: "p1".into(),
            mr_no: "MR-1".into(),
            name: "Lakshmi".into(),
            age: 61,
            ..Default::default()
        }
    }

    /// Store whose writes always fail and which counts write attempts.
    #[derive(Default)]
    struct BrokenStore {
        writes: AtomicUsize,
    }

    impl DocumentStore for BrokenStore {
        fn add(&self, _: Collection, _: Fields, _: Option<&str>) -> StoreResult<String> {
            self.writes.fetch_add(1, Ordering::SeqCst);
            Err(StoreError::Unavailable("offline".into()))
        }
        fn get(&self, _: Collection, _: &str) -> StoreResult<Option<Document>> {
            Err(StoreError::Unavailable("offline".into()))
        }
        fn query(&self, _: Collection, _: &Query) -> StoreResult<Vec<Document>> {
            Err(StoreError::Unavailable("offline".into()))
        }
        fn update(&self, _: Collection, _: &str, _: Fields) -> StoreResult<bool> {
            Err(StoreError::Unavailable("offline".into()))
        }
        fn delete(&self, _: Collection, _: &str) -> StoreResult<bool> {
            Err(StoreError::Unavailable("offline".into()))
        }
    }

    #[test]
    fn test_new_form_has_one_blank_row_per_section() {
        let form = BillForm::new();
        for section in Section::ALL {
            assert_eq!(form.rows(section).len(), 1);
        }
        assert!(form.patient().is_none());
    }

    #[test]
    fn test_row_ops_touch_one_section() {
        let mut form = BillForm::new();
        let before = form.clone();

        let id = form.add_row(Section::Medication);
        form.update_row(Section::Medication, id, "medication", "Atropine")
            .unwrap();

        for section in Section::ALL {
            if section != Section::Medication {
                assert_eq!(form.rows(section), before.rows(section));
            }
        }
        assert_eq!(form.rows(Section::Medication).len(), 2);
    }

    #[test]
    fn test_save_without_patient_never_writes() {
        let store = BrokenStore::default();
        let mut form = BillForm::new();

        let err = form.save(&store).unwrap_err();
        assert!(matches!(err, BillError::NoPatientSelected));
        assert_eq!(err.to_string(), "Select a patient first.");
        assert_eq!(store.writes.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_failed_save_keeps_state() {
        let store = BrokenStore::default();
        let mut form = BillForm::new();

        // History lookup fails too; selection must still go through
        let outcome = form.select_patient(&store, patient());
        assert_eq!(outcome, HistoryOutcome::NoRecord);

        let id = form.rows(Section::VisualAcuity)[0].id;
        form.update_row(Section::VisualAcuity, id, "withGlass", "6/6")
            .unwrap();

        let err = form.save(&store).unwrap_err();
        assert!(matches!(err, BillError::Store(_)));
        assert_eq!(store.writes.load(Ordering::SeqCst), 1);
        assert_eq!(form.patient().unwrap().mr_no, "MR-1");
        assert_eq!(form.rows(Section::VisualAcuity)[0].get("withGlass"), "6/6");
    }

    #[test]
    fn test_successful_save_resets_form() {
        let store = SqliteStore::open_in_memory().unwrap();
        let mut form = BillForm::new();
        form.select_patient(&store, patient());
        form.add_row(Section::Ocular);
        let id = form.rows(Section::Medication)[0].id;
        form.remove_row(Section::Medication, id).unwrap();

        let bill_id = form.save(&store).unwrap();

        let saved = store.get(Collection::Bills, &bill_id).unwrap().unwrap();
        assert_eq!(saved.data["ocularHistory"].as_array().unwrap().len(), 2);
        assert_eq!(saved.data["medications"], json!([]));
        assert!(saved.str_field("createdAt").is_some());
        assert_eq!(saved.data["patient"]["name"], "Lakshmi");

        assert!(form.patient().is_none());
        for section in Section::ALL {
            assert_eq!(form.rows(section).len(), 1);
            assert!(form.rows(section)[0].is_blank());
        }
    }

    #[test]
    fn test_select_patient_prefills_from_history() {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .add(
                Collection::GeneralData,
                json!({"mrNo": "MR-1", "eye": ["LE", "RE"], "complaint": ["blur"]})
                    .as_object()
                    .cloned()
                    .unwrap(),
                Some("savedAt"),
            )
            .unwrap();

        let mut form = BillForm::new();
        let outcome = form.select_patient(&store, patient());

        assert!(matches!(outcome, HistoryOutcome::Rows(ref rows) if rows.len() == 2));
        let rows = form.rows(Section::General);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get("eye"), "LE");
        assert_eq!(rows[1].get("eye"), "RE");
    }

    #[test]
    fn test_select_patient_without_history_keeps_blank_row() {
        let store = SqliteStore::open_in_memory().unwrap();
        let mut form = BillForm::new();
        let blank = form.rows(Section::General).to_vec();

        let outcome = form.select_patient(&store, patient());
        assert_eq!(outcome, HistoryOutcome::NoRecord);
        assert_eq!(form.rows(Section::General), blank.as_slice());
    }
}
