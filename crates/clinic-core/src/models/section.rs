//! Bill sections and their row schema.
//!
//! Each section of a bill is a list of structurally identical rows. The field
//! list below is the only place a section's shape is spelled out; the row
//! manager, the bill document and the detail view all read it from here.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;
use serde_json::{Map, Value};

use crate::store::scalar_text;

/// Clinical sections of a bill, in form order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Section {
    General,
    Health,
    Ocular,
    Medication,
    Birth,
    PreviousGlass,
    VisualAcuity,
    Refraction,
    Acceptance,
    GlassPrescription,
}

impl Section {
    pub const ALL: [Section; 10] = [
        Section::General,
        Section::Health,
        Section::Ocular,
        Section::Medication,
        Section::Birth,
        Section::PreviousGlass,
        Section::VisualAcuity,
        Section::Refraction,
        Section::Acceptance,
        Section::GlassPrescription,
    ];

    /// Position in [`Section::ALL`].
    pub fn index(&self) -> usize {
        *self as usize
    }

    /// Short key used by form callers (`"general"`, `"rx"`, ...).
    pub fn form_key(&self) -> &'static str {
        match self {
            Section::General => "general",
            Section::Health => "health",
            Section::Ocular => "ocular",
            Section::Medication => "medication",
            Section::Birth => "birth",
            Section::PreviousGlass => "rx",
            Section::VisualAcuity => "va",
            Section::Refraction => "ref",
            Section::Acceptance => "acc",
            Section::GlassPrescription => "gp",
        }
    }

    /// Array field holding this section in a bill document.
    pub fn document_key(&self) -> &'static str {
        match self {
            Section::General => "generalData",
            Section::Health => "healthConditions",
            Section::Ocular => "ocularHistory",
            Section::Medication => "medications",
            Section::Birth => "birthHistory",
            Section::PreviousGlass => "previousGlass",
            Section::VisualAcuity => "visualAcuity",
            Section::Refraction => "refraction",
            Section::Acceptance => "acceptance",
            Section::GlassPrescription => "glassPrescription",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Section::General => "General Data",
            Section::Health => "Health Conditions",
            Section::Ocular => "Ocular History",
            Section::Medication => "Medications",
            Section::Birth => "Birth History",
            Section::PreviousGlass => "Previous Glass Prescription",
            Section::VisualAcuity => "Visual Acuity",
            Section::Refraction => "Refraction",
            Section::Acceptance => "Acceptance",
            Section::GlassPrescription => "Glass Prescription",
        }
    }

    /// Ordered field names of one row.
    pub fn fields(&self) -> &'static [&'static str] {
        match self {
            Section::General => &[
                "eye",
                "complaint",
                "glass",
                "duration",
                "distance",
                "progression",
                "association",
                "others",
            ],
            Section::Health => &["condition", "duration", "investigation"],
            Section::Ocular => &["eye", "condition", "duration", "investigation"],
            Section::Medication => &["medication"],
            Section::Birth => &["birthHistory", "allergies"],
            Section::PreviousGlass => &[
                "date", "eye", "sph", "cyl", "axis", "add", "prism", "base", "lens", "status",
            ],
            Section::VisualAcuity => &["eye", "withoutGlass", "withGlass", "withPh", "contactLens"],
            Section::Refraction => &["eye", "retinoscopy", "dsph", "dcyl", "axis"],
            Section::Acceptance => &[
                "eye",
                "sph",
                "cyl",
                "axis",
                "distVision",
                "add",
                "nearVision",
                "comments",
            ],
            Section::GlassPrescription => &["eye", "sph", "cyl", "axis", "add"],
        }
    }

    pub fn has_field(&self, field: &str) -> bool {
        self.fields().contains(&field)
    }

    /// A row with every field empty and a fresh id.
    pub fn blank_row(&self) -> Row {
        Row {
            id: RowId::next(),
            fields: self
                .fields()
                .iter()
                .map(|f| (f.to_string(), String::new()))
                .collect(),
        }
    }

    /// Build a row from a stored JSON object, keeping only this section's
    /// fields. Missing fields are empty; non-string scalars are stringified.
    /// The stored id is never reused.
    pub fn row_from_object(&self, object: &Map<String, Value>) -> Row {
        let mut row = self.blank_row();
        for field in self.fields() {
            if let Some(value) = object.get(*field) {
                row.fields.insert(field.to_string(), scalar_text(value));
            }
        }
        row
    }
}

impl std::str::FromStr for Section {
    type Err = String;

    /// Accepts either the form key or the document key.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Section::ALL
            .into_iter()
            .find(|section| section.form_key() == s || section.document_key() == s)
            .ok_or_else(|| s.to_string())
    }
}

impl std::fmt::Display for Section {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.form_key())
    }
}

static NEXT_ROW_ID: AtomicU64 = AtomicU64::new(1);

/// Transient row identity, unique for the life of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct RowId(pub u64);

impl RowId {
    /// Issue an id greater than every id issued before it.
    pub fn next() -> Self {
        RowId(NEXT_ROW_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl std::fmt::Display for RowId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One editable row: transient id plus field values.
///
/// Serializes flat, e.g. `{"id": 3, "eye": "LE", "complaint": "blur"}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Row {
    pub id: RowId,
    #[serde(flatten)]
    pub fields: BTreeMap<String, String>,
}

impl Row {
    /// Value of `field`, empty if absent.
    pub fn get(&self, field: &str) -> &str {
        self.fields.get(field).map(String::as_str).unwrap_or("")
    }

    /// True when every field is empty.
    pub fn is_blank(&self) -> bool {
        self.fields.values().all(|v| v.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_all_sections_indexed_in_order() {
        for (i, section) in Section::ALL.iter().enumerate() {
            assert_eq!(section.index(), i);
        }
    }

    #[test]
    fn test_blank_row_has_every_field() {
        for section in Section::ALL {
            let row = section.blank_row();
            assert_eq!(row.fields.len(), section.fields().len());
            assert!(row.is_blank());
        }
    }

    #[test]
    fn test_row_ids_increase() {
        let a = RowId::next();
        let b = RowId::next();
        assert!(b > a);
    }

    #[test]
    fn test_section_from_str() {
        assert_eq!("rx".parse::<Section>(), Ok(Section::PreviousGlass));
        assert_eq!("ocularHistory".parse::<Section>(), Ok(Section::Ocular));
        assert!("invoice".parse::<Section>().is_err());
    }

    #[test]
    fn test_row_from_object_drops_unknown_and_stored_id() {
        let object = json!({"id": 999_999_999u64, "medication": "Timolol", "dose": 2})
            .as_object()
            .cloned()
            .unwrap();
        let row = Section::Medication.row_from_object(&object);

        assert_eq!(row.get("medication"), "Timolol");
        assert_eq!(row.fields.len(), 1);
        assert_ne!(row.id, RowId(999_999_999));
    }

    #[test]
    fn test_row_serializes_flat() {
        let mut row = Section::Birth.blank_row();
        row.fields.insert("allergies".into(), "Penicillin".into());

        let value = serde_json::to_value(&row).unwrap();
        assert_eq!(value["id"], json!(row.id.0));
        assert_eq!(value["allergies"], "Penicillin");
        assert_eq!(value["birthHistory"], "");
    }
}
