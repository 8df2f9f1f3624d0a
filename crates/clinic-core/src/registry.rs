//! Patient registration, editing and the manage-patients list.

use chrono::{Local, NaiveDate};
use serde_json::Value;
use thiserror::Error;
use tracing::{info, warn};

use crate::models::{age_on, parse_dob, Gender, Patient, CREATED_AT_FIELD, MR_NO_FIELD};
use crate::store::{Collection, DocumentStore, Fields, Query, StoreError};

/// Prompt shown before a patient is deleted.
pub const DELETE_PATIENT_PROMPT: &str =
    "Are you sure you want to delete this patient record? This cannot be undone.";

/// Registry errors.
#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("{0} is required")]
    MissingField(&'static str),

    #[error("Invalid date of birth: {0:?}")]
    InvalidDob(String),

    #[error("MR number already registered: {0}")]
    DuplicateMrNo(String),

    #[error("Patient not found: {0}")]
    NotFound(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type RegistryResult<T> = Result<T, RegistryError>;

/// Registration form input.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewPatient {
    pub mr_no: String,
    pub name: String,
    pub phone: String,
    pub dob: String,
    pub gender: Gender,
    pub address: String,
}

/// Editable patient fields. `None` leaves the stored value alone; the MR
/// number is not editable.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PatientUpdate {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub dob: Option<String>,
    pub gender: Option<Gender>,
    pub address: Option<String>,
}

impl PatientUpdate {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// Age for an optional date of birth. Empty means unknown (age 0); anything
/// else must parse.
fn age_for(dob: &str, today: NaiveDate) -> RegistryResult<u32> {
    if dob.trim().is_empty() {
        return Ok(0);
    }
    parse_dob(dob)
        .map(|date| age_on(date, today))
        .ok_or_else(|| RegistryError::InvalidDob(dob.to_string()))
}

/// Patient CRUD over the `patients` collection.
pub struct PatientRegistry<'a> {
    store: &'a dyn DocumentStore,
}

impl<'a> PatientRegistry<'a> {
    pub fn new(store: &'a dyn DocumentStore) -> Self {
        Self { store }
    }

    /// Register a patient and return the stored record.
    pub fn register(&self, new: NewPatient) -> RegistryResult<Patient> {
        self.register_on(new, today())
    }

    /// [`register`](Self::register) with an explicit date for the age.
    pub fn register_on(&self, new: NewPatient, today: NaiveDate) -> RegistryResult<Patient> {
        let mr_no = new.mr_no.trim().to_string();
        if mr_no.is_empty() {
            return Err(RegistryError::MissingField("MR number"));
        }
        let name = new.name.trim().to_string();
        if name.is_empty() {
            return Err(RegistryError::MissingField("Name"));
        }
        let age = age_for(&new.dob, today)?;

        let existing = self
            .store
            .query(Collection::Patients, &Query::all().where_eq(MR_NO_FIELD, mr_no.as_str()).limit(1))?;
        if !existing.is_empty() {
            return Err(RegistryError::DuplicateMrNo(mr_no));
        }

        let mut patient = Patient {
            id: String::new(),
            mr_no,
            name,
            phone: new.phone.trim().to_string(),
            dob: new.dob.trim().to_string(),
            gender: new.gender,
            age,
            address: new.address.trim().to_string(),
            created_at: None,
        };

        let mut fields = match serde_json::to_value(&patient)? {
            Value::Object(fields) => fields,
            _ => Fields::new(),
        };
        fields.remove("id");

        patient.id = self
            .store
            .add(Collection::Patients, fields, Some(CREATED_AT_FIELD))?;
        info!(id = %patient.id, mr_no = %patient.mr_no, "registered patient");

        self.get(&patient.id)
    }

    pub fn get(&self, id: &str) -> RegistryResult<Patient> {
        let doc = self
            .store
            .get(Collection::Patients, id)?
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))?;
        Ok(doc.decode()?)
    }

    /// Every patient, in registration order. Undecodable documents are
    /// skipped.
    pub fn list(&self) -> RegistryResult<Vec<Patient>> {
        let docs = self.store.list(Collection::Patients)?;
        Ok(docs
            .iter()
            .filter_map(|doc| match doc.decode() {
                Ok(patient) => Some(patient),
                Err(e) => {
                    warn!(id = %doc.id, error = %e, "skipping undecodable patient");
                    None
                }
            })
            .collect())
    }

    /// Apply an edit. A changed date of birth recomputes the age.
    pub fn update(&self, id: &str, update: PatientUpdate) -> RegistryResult<Patient> {
        self.update_on(id, update, today())
    }

    pub fn update_on(
        &self,
        id: &str,
        update: PatientUpdate,
        today: NaiveDate,
    ) -> RegistryResult<Patient> {
        let mut fields = Fields::new();
        if let Some(name) = update.name {
            let name = name.trim().to_string();
            if name.is_empty() {
                return Err(RegistryError::MissingField("Name"));
            }
            fields.insert("name".into(), name.into());
        }
        if let Some(phone) = update.phone {
            fields.insert("phone".into(), phone.trim().into());
        }
        if let Some(dob) = update.dob {
            let age = age_for(&dob, today)?;
            fields.insert("dob".into(), dob.trim().into());
            fields.insert("age".into(), age.into());
        }
        if let Some(gender) = update.gender {
            fields.insert("gender".into(), gender.as_str().into());
        }
        if let Some(address) = update.address {
            fields.insert("address".into(), address.trim().into());
        }

        if !fields.is_empty() && !self.store.update(Collection::Patients, id, fields)? {
            return Err(RegistryError::NotFound(id.to_string()));
        }
        info!(id, "updated patient");
        self.get(id)
    }

    /// Delete after confirmation. Returns `Ok(false)` when declined.
    pub fn delete(&self, id: &str, confirm: impl FnOnce(&str) -> bool) -> RegistryResult<bool> {
        if !confirm(DELETE_PATIENT_PROMPT) {
            return Ok(false);
        }
        if !self.store.delete(Collection::Patients, id)? {
            return Err(RegistryError::NotFound(id.to_string()));
        }
        info!(id, "deleted patient");
        Ok(true)
    }
}

/// Loaded patient list with a text filter, as on the manage-patients screen.
#[derive(Debug, Clone, Default)]
pub struct PatientDirectory {
    patients: Vec<Patient>,
    filter: String,
}

impl PatientDirectory {
    pub fn new(patients: Vec<Patient>) -> Self {
        Self {
            patients,
            filter: String::new(),
        }
    }

    pub fn load(registry: &PatientRegistry<'_>) -> RegistryResult<Self> {
        Ok(Self::new(registry.list()?))
    }

    pub fn all(&self) -> &[Patient] {
        &self.patients
    }

    pub fn set_filter(&mut self, filter: impl Into<String>) {
        self.filter = filter.into();
    }

    /// Patients whose name or MR number contains the filter, ignoring case.
    pub fn filtered(&self) -> Vec<&Patient> {
        let needle = self.filter.trim().to_lowercase();
        self.patients
            .iter()
            .filter(|p| {
                needle.is_empty()
                    || p.name.to_lowercase().contains(&needle)
                    || p.mr_no.to_lowercase().contains(&needle)
            })
            .collect()
    }

    /// Delete through the registry and drop the patient from the list.
    pub fn delete(
        &mut self,
        registry: &PatientRegistry<'_>,
        id: &str,
        confirm: impl FnOnce(&str) -> bool,
    ) -> RegistryResult<bool> {
        let deleted = registry.delete(id, confirm)?;
        if deleted {
            self.patients.retain(|p| p.id != id);
        }
        Ok(deleted)
    }

    /// Replace the local copy after an edit.
    pub fn apply_update(&mut self, patient: Patient) {
        if let Some(slot) = self.patients.iter_mut().find(|p| p.id == patient.id) {
            *slot = patient;
        }
    }
}
