//! Saved bills: the manage-bills list and the bill detail view.
//!
//! Bills written by older versions of the app stored the patient under
//! `patientDetails` or as flat `patientName`/`mrNo`/`patientMR` fields, and
//! some sections under `*Snapshot` keys. Everything here reads all of them.

use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::models::{Patient, Row, Section, CREATED_AT_FIELD};
use crate::store::{scalar_text, Collection, DocumentStore, Fields, StoreResult};

/// Prompt shown before a bill is deleted.
pub const DELETE_BILL_PROMPT: &str = "Delete record?";

const PATIENT_KEYS: [&str; 2] = ["patient", "patientDetails"];

/// One line of the bills list.
#[derive(Debug, Clone, PartialEq)]
pub struct BillSummary {
    pub id: String,
    /// Patient name, empty when the bill has none.
    pub patient_name: String,
    /// MR number, empty when the bill has none.
    pub mr_no: String,
    pub created_at: Option<String>,
}

impl BillSummary {
    pub fn from_document(id: &str, data: &Fields) -> Self {
        let patient = patient_object(data);
        let nested = |key: &str| patient.and_then(|p| p.get(key)).map(scalar_text);

        let patient_name = data
            .get("patientName")
            .map(scalar_text)
            .filter(|s| !s.is_empty())
            .or_else(|| nested("name"))
            .unwrap_or_default();
        let mr_no = ["mrNo", "patientMR"]
            .iter()
            .filter_map(|key| data.get(*key).map(scalar_text))
            .find(|s| !s.is_empty())
            .or_else(|| nested("mrNo"))
            .unwrap_or_default();

        Self {
            id: id.to_string(),
            patient_name,
            mr_no,
            created_at: data
                .get(CREATED_AT_FIELD)
                .and_then(Value::as_str)
                .map(str::to_string),
        }
    }

    pub fn display_name(&self) -> &str {
        if self.patient_name.is_empty() {
            "Unknown"
        } else {
            &self.patient_name
        }
    }

    pub fn display_mr_no(&self) -> &str {
        if self.mr_no.is_empty() {
            "N/A"
        } else {
            &self.mr_no
        }
    }

    fn matches(&self, needle: &str) -> bool {
        needle.is_empty()
            || self.patient_name.to_lowercase().contains(needle)
            || self.mr_no.to_lowercase().contains(needle)
    }
}

fn patient_object(data: &Fields) -> Option<&Map<String, Value>> {
    PATIENT_KEYS
        .iter()
        .find_map(|key| data.get(*key).and_then(Value::as_object))
}

/// Full view of one bill.
#[derive(Debug, Clone, PartialEq)]
pub struct BillDetail {
    pub summary: BillSummary,
    pub patient: Option<Patient>,
    /// Every section in form order; sections the bill lacks are empty.
    pub sections: Vec<(Section, Vec<Row>)>,
}

impl BillDetail {
    pub fn from_document(id: &str, data: &Fields) -> Self {
        let patient = patient_object(data).and_then(|object| {
            serde_json::from_value(Value::Object(object.clone()))
                .map_err(|e| warn!(bill_id = id, error = %e, "unreadable patient snapshot"))
                .ok()
        });
        let sections = Section::ALL
            .iter()
            .map(|section| (*section, section_rows(*section, data)))
            .collect();

        Self {
            summary: BillSummary::from_document(id, data),
            patient,
            sections,
        }
    }

    pub fn rows(&self, section: Section) -> &[Row] {
        self.sections
            .iter()
            .find(|(s, _)| *s == section)
            .map(|(_, rows)| rows.as_slice())
            .unwrap_or(&[])
    }
}

fn legacy_key(section: Section) -> Option<&'static str> {
    match section {
        Section::General => Some("generalDataSnapshot"),
        Section::Health => Some("healthDataSnapshot"),
        _ => None,
    }
}

/// Rows of one section. Health rows stored as bare strings become
/// `condition` rows; other non-object entries are skipped.
pub fn section_rows(section: Section, data: &Fields) -> Vec<Row> {
    let items = std::iter::once(section.document_key())
        .chain(legacy_key(section))
        .find_map(|key| data.get(key).and_then(Value::as_array));
    let Some(items) = items else {
        return Vec::new();
    };

    items
        .iter()
        .filter_map(|item| match item {
            Value::Object(object) => Some(section.row_from_object(object)),
            Value::String(condition) if section == Section::Health => {
                let mut row = section.blank_row();
                row.fields.insert("condition".into(), condition.clone());
                Some(row)
            }
            _ => None,
        })
        .collect()
}

/// Loaded bills, newest first, with a text filter.
#[derive(Debug, Clone, Default)]
pub struct Ledger {
    bills: Vec<(BillSummary, Fields)>,
    filter: String,
}

impl Ledger {
    pub fn load(store: &dyn DocumentStore) -> StoreResult<Self> {
        let mut bills: Vec<_> = store
            .list(Collection::Bills)?
            .into_iter()
            .map(|doc| (BillSummary::from_document(&doc.id, &doc.data), doc.data))
            .collect();
        // Undated bills sink to the bottom
        bills.sort_by(|(a, _), (b, _)| b.created_at.cmp(&a.created_at));
        Ok(Self {
            bills,
            filter: String::new(),
        })
    }

    pub fn summaries(&self) -> Vec<&BillSummary> {
        self.bills.iter().map(|(summary, _)| summary).collect()
    }

    pub fn set_filter(&mut self, filter: impl Into<String>) {
        self.filter = filter.into();
    }

    /// Bills whose patient name or MR number contains the filter, ignoring case.
    pub fn filtered(&self) -> Vec<&BillSummary> {
        let needle = self.filter.trim().to_lowercase();
        self.bills
            .iter()
            .map(|(summary, _)| summary)
            .filter(|summary| summary.matches(&needle))
            .collect()
    }

    pub fn detail(&self, id: &str) -> Option<BillDetail> {
        self.bills
            .iter()
            .find(|(summary, _)| summary.id == id)
            .map(|(summary, data)| BillDetail::from_document(&summary.id, data))
    }

    /// Delete after confirmation and drop the bill from the list. A bill
    /// already gone from the store is still dropped locally.
    pub fn delete(
        &mut self,
        store: &dyn DocumentStore,
        id: &str,
        confirm: impl FnOnce(&str) -> bool,
    ) -> StoreResult<bool> {
        if !confirm(DELETE_BILL_PROMPT) {
            return Ok(false);
        }
        if !store.delete(Collection::Bills, id)? {
            warn!(bill_id = id, "bill already deleted");
        }
        self.bills.retain(|(summary, _)| summary.id != id);
        info!(bill_id = id, "deleted bill");
        Ok(true)
    }
}
