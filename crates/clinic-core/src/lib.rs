//! Clinic Core Library
//!
//! Front-desk core of an eye clinic: patient registration, clinical
//! records and bill entry over a local JSON document store.
//!
//! # Architecture
//!
//! ```text
//!   Patient search ──(debounced prefix queries)──┐
//!                                                 ▼
//!   Option harvest ──► pick-lists        Selected patient ──► latest general data
//!                                                 │                 │
//!                                                 │          (flat | nested)
//!                                                 ▼                 ▼
//!                                        BillForm: ten row collections
//!                                                 │
//!                                                 ▼
//!                                       bills (one document, createdAt)
//! ```
//!
//! # Modules
//!
//! - [`db`]: SQLite layer holding JSON documents per collection
//! - [`store`]: [`DocumentStore`] contract and its SQLite implementation
//! - [`models`]: Patients, bill sections and row schema
//! - [`form`]: Row collections and the bill form
//! - [`history`]: Rebuild general-data rows from stored records
//! - [`harvest`]: Pick-list options from previous records
//! - [`search`]: Debounced patient search
//! - [`registry`], [`records`], [`ledger`], [`dashboard`]: CRUD screens
//! - [`routes`]: Navigation targets
//! - [`config`]: Startup configuration

pub mod config;
pub mod dashboard;
pub mod db;
pub mod form;
pub mod harvest;
pub mod history;
pub mod ledger;
pub mod models;
pub mod records;
pub mod registry;
pub mod routes;
pub mod search;
pub mod store;

// Re-export commonly used types
pub use config::{ClinicConfig, ConfigError};
pub use db::Database;
pub use form::{BillError, BillForm, FormError, RowCollection};
pub use harvest::{OptionField, OptionHarvester, OptionSets};
pub use history::{normalize_general_rows, GeneralDataShape, HistoryOutcome};
pub use models::{Gender, Patient, Row, RowId, Section};
pub use registry::{NewPatient, PatientDirectory, PatientRegistry, PatientUpdate};
pub use search::{PatientSearch, SearchSnapshot};
pub use store::{Collection, DocumentStore, SqliteStore, StoreError};

// UniFFI setup - using proc macros
uniffi::setup_scaffolding!();

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tracing::{debug, info};

use ledger::{BillDetail, BillSummary, Ledger};
use records::{GeneralDataEntry, HealthDataEntry, RecordBook, RecordError, RecordKind};
use registry::RegistryError;

// =========================================================================
// FFI Error Type
// =========================================================================

#[derive(Debug, thiserror::Error, uniffi::Error)]
pub enum ClinicError {
    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl From<db::DbError> for ClinicError {
    fn from(e: db::DbError) -> Self {
        ClinicError::DatabaseError(e.to_string())
    }
}

impl From<StoreError> for ClinicError {
    fn from(e: StoreError) -> Self {
        ClinicError::DatabaseError(e.to_string())
    }
}

impl From<serde_json::Error> for ClinicError {
    fn from(e: serde_json::Error) -> Self {
        ClinicError::SerializationError(e.to_string())
    }
}

impl From<FormError> for ClinicError {
    fn from(e: FormError) -> Self {
        match e {
            FormError::RowNotFound { .. } => ClinicError::NotFound(e.to_string()),
            _ => ClinicError::InvalidInput(e.to_string()),
        }
    }
}

impl From<BillError> for ClinicError {
    fn from(e: BillError) -> Self {
        match e {
            BillError::NoPatientSelected => ClinicError::InvalidInput(e.to_string()),
            BillError::Store(e) => e.into(),
            BillError::Serialization(e) => e.into(),
        }
    }
}

impl From<RegistryError> for ClinicError {
    fn from(e: RegistryError) -> Self {
        match e {
            RegistryError::NotFound(id) => ClinicError::NotFound(id),
            RegistryError::Store(e) => e.into(),
            RegistryError::Serialization(e) => e.into(),
            other => ClinicError::InvalidInput(other.to_string()),
        }
    }
}

impl From<RecordError> for ClinicError {
    fn from(e: RecordError) -> Self {
        match e {
            RecordError::NotFound(id) => ClinicError::NotFound(id),
            RecordError::Store(e) => e.into(),
            other => ClinicError::InvalidInput(other.to_string()),
        }
    }
}

impl From<ConfigError> for ClinicError {
    fn from(e: ConfigError) -> Self {
        ClinicError::ConfigError(e.to_string())
    }
}

impl<T> From<std::sync::PoisonError<T>> for ClinicError {
    fn from(e: std::sync::PoisonError<T>) -> Self {
        ClinicError::DatabaseError(format!("Lock poisoned: {}", e))
    }
}

fn parse_section(section: &str) -> Result<Section, ClinicError> {
    section
        .parse()
        .map_err(|s| FormError::UnknownSection(s).into())
}

// =========================================================================
// Factory Functions (exported to FFI)
// =========================================================================

/// Open or create a clinic database at the given path.
#[uniffi::export]
pub fn open_clinic(path: String) -> Result<Arc<ClinicCore>, ClinicError> {
    ClinicCore::with_config(ClinicConfig::default().with_database_path(path)).map(Arc::new)
}

/// Create an in-memory clinic (for testing).
#[uniffi::export]
pub fn open_clinic_in_memory() -> Result<Arc<ClinicCore>, ClinicError> {
    ClinicCore::with_config(ClinicConfig::default()).map(Arc::new)
}

/// Open the clinic described by the `CLINIC_*` environment variables.
#[uniffi::export]
pub fn open_clinic_from_env() -> Result<Arc<ClinicCore>, ClinicError> {
    ClinicCore::with_config(ClinicConfig::from_env()?).map(Arc::new)
}

/// Install a log subscriber, e.g. `init_logging("clinic_core=debug")`.
/// Later calls are ignored.
#[uniffi::export]
pub fn init_logging(filter: String) -> Result<(), ClinicError> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let filter = tracing_subscriber::EnvFilter::try_new(&filter)
        .map_err(|e| ClinicError::ConfigError(e.to_string()))?;
    if tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .is_err()
    {
        debug!("log subscriber already installed");
    }
    Ok(())
}

/// Sidebar navigation, in display order.
#[uniffi::export]
pub fn navigation() -> Vec<FfiRoute> {
    routes::Route::ALL
        .iter()
        .map(|route| FfiRoute {
            path: route.path().to_string(),
            label: route.label().to_string(),
        })
        .collect()
}

// =========================================================================
// Main API Object
// =========================================================================

/// Thread-safe clinic handle for FFI.
#[derive(uniffi::Object)]
pub struct ClinicCore {
    store: Arc<dyn DocumentStore>,
    bill: Mutex<BillForm>,
    config: ClinicConfig,
}

impl ClinicCore {
    pub fn with_config(config: ClinicConfig) -> Result<Self, ClinicError> {
        let store = match config.database_path() {
            Some(path) => SqliteStore::open(path)?,
            None => SqliteStore::open_in_memory()?,
        };
        info!(path = ?config.database_path(), "opened clinic store");
        Ok(Self::with_store(Arc::new(store), config))
    }

    /// Clinic over an already opened store.
    pub fn with_store(store: Arc<dyn DocumentStore>, config: ClinicConfig) -> Self {
        Self {
            store,
            bill: Mutex::new(BillForm::new()),
            config,
        }
    }

    /// Shared store handle, e.g. for a [`PatientSearch`].
    pub fn store(&self) -> Arc<dyn DocumentStore> {
        self.store.clone()
    }

    pub fn config(&self) -> &ClinicConfig {
        &self.config
    }

    fn registry(&self) -> PatientRegistry<'_> {
        PatientRegistry::new(&*self.store)
    }
}

#[uniffi::export]
impl ClinicCore {
    // =========================================================================
    // Patient Operations
    // =========================================================================

    /// Register a new patient.
    pub fn register_patient(&self, patient: FfiNewPatient) -> Result<FfiPatient, ClinicError> {
        Ok(self.registry().register(patient.into())?.into())
    }

    /// Edit a patient. The MR number cannot change.
    pub fn update_patient(
        &self,
        id: String,
        update: FfiPatientUpdate,
    ) -> Result<FfiPatient, ClinicError> {
        Ok(self.registry().update(&id, update.into())?.into())
    }

    pub fn get_patient(&self, id: String) -> Result<FfiPatient, ClinicError> {
        Ok(self.registry().get(&id)?.into())
    }

    pub fn list_patients(&self) -> Result<Vec<FfiPatient>, ClinicError> {
        let patients = self.registry().list()?;
        Ok(patients.into_iter().map(|p| p.into()).collect())
    }

    /// Delete a patient the operator has confirmed.
    pub fn delete_patient(&self, id: String, confirmed: bool) -> Result<bool, ClinicError> {
        Ok(self.registry().delete(&id, |_| confirmed)?)
    }

    /// Search-as-you-type handle tied to this clinic's bill form.
    pub fn patient_search(self: Arc<Self>) -> Result<Arc<ClinicSearch>, ClinicError> {
        ClinicSearch::new(self).map(Arc::new)
    }

    // =========================================================================
    // Bill Form Operations
    // =========================================================================

    /// Pick-list options for the bill form.
    pub fn harvest_options(&self) -> Vec<FfiOptionSet> {
        let options = OptionHarvester::new(&*self.store).harvest();
        OptionField::ALL
            .iter()
            .map(|field| FfiOptionSet {
                field: field.key().to_string(),
                values: options.get(*field),
            })
            .collect()
    }

    pub fn bill_rows(&self, section: String) -> Result<Vec<FfiRow>, ClinicError> {
        let section = parse_section(&section)?;
        let bill = self.bill.lock()?;
        Ok(bill.rows(section).iter().map(FfiRow::from).collect())
    }

    pub fn bill_add_row(&self, section: String) -> Result<u64, ClinicError> {
        let section = parse_section(&section)?;
        Ok(self.bill.lock()?.add_row(section).0)
    }

    pub fn bill_update_row(
        &self,
        section: String,
        row_id: u64,
        field: String,
        value: String,
    ) -> Result<(), ClinicError> {
        let section = parse_section(&section)?;
        self.bill
            .lock()?
            .update_row(section, RowId(row_id), &field, value)?;
        Ok(())
    }

    pub fn bill_remove_row(&self, section: String, row_id: u64) -> Result<(), ClinicError> {
        let section = parse_section(&section)?;
        self.bill.lock()?.remove_row(section, RowId(row_id))?;
        Ok(())
    }

    /// Select the bill's patient and pre-fill general data from history.
    pub fn bill_select_patient(&self, patient_id: String) -> Result<FfiHistoryOutcome, ClinicError> {
        let patient = self.registry().get(&patient_id)?;
        let outcome = self.bill.lock()?.select_patient(&*self.store, patient);
        Ok(outcome.into())
    }

    pub fn bill_patient(&self) -> Result<Option<FfiPatient>, ClinicError> {
        Ok(self.bill.lock()?.patient().cloned().map(|p| p.into()))
    }

    pub fn bill_clear_patient(&self) -> Result<(), ClinicError> {
        self.bill.lock()?.clear_patient();
        Ok(())
    }

    pub fn bill_reset(&self) -> Result<(), ClinicError> {
        self.bill.lock()?.reset();
        Ok(())
    }

    /// Save the bill and reset the form. Returns the new bill id.
    pub fn bill_save(&self) -> Result<String, ClinicError> {
        Ok(self.bill.lock()?.save(&*self.store)?)
    }

    // =========================================================================
    // Bill Ledger Operations
    // =========================================================================

    pub fn list_bills(&self) -> Result<Vec<FfiBillSummary>, ClinicError> {
        let ledger = Ledger::load(&*self.store)?;
        Ok(ledger.summaries().into_iter().cloned().map(|b| b.into()).collect())
    }

    pub fn bill_detail(&self, id: String) -> Result<Option<FfiBillDetail>, ClinicError> {
        let doc = self.store.get(Collection::Bills, &id)?;
        Ok(doc.map(|doc| BillDetail::from_document(&doc.id, &doc.data).into()))
    }

    pub fn delete_bill(&self, id: String, confirmed: bool) -> Result<bool, ClinicError> {
        let mut ledger = Ledger::load(&*self.store)?;
        Ok(ledger.delete(&*self.store, &id, |_| confirmed)?)
    }

    // =========================================================================
    // Record Operations
    // =========================================================================

    pub fn save_general_data(&self, data: FfiGeneralData) -> Result<String, ClinicError> {
        let mut entry = GeneralDataEntry::new();
        for (field, values) in data.fields {
            entry.set_values(&field, values)?;
        }
        entry.set_mr_no(data.mr_no);
        Ok(entry.save(&*self.store)?)
    }

    pub fn save_health_data(&self, conditions: Vec<String>) -> Result<String, ClinicError> {
        let mut entry = HealthDataEntry::new();
        entry.set_conditions(conditions);
        Ok(entry.save(&*self.store)?)
    }

    /// Records of one kind, newest first.
    pub fn list_records(&self, kind: FfiRecordKind) -> Result<Vec<FfiRecord>, ClinicError> {
        let kind: RecordKind = kind.into();
        let book = RecordBook::load(&*self.store, kind)?;
        Ok(book
            .records()
            .iter()
            .map(|record| FfiRecord {
                id: record.id.clone(),
                saved_at: kind.timestamp(&record.data).map(|ts| ts.into_owned()),
                fields: kind
                    .fields()
                    .iter()
                    .map(|field| (field.to_string(), record.values(field)))
                    .collect(),
            })
            .collect())
    }

    pub fn update_record(
        &self,
        kind: FfiRecordKind,
        id: String,
        fields: HashMap<String, Vec<String>>,
    ) -> Result<(), ClinicError> {
        let mut book = RecordBook::load(&*self.store, kind.into())?;
        book.save_record(&*self.store, &id, fields.into_iter().collect())?;
        Ok(())
    }

    pub fn delete_record(
        &self,
        kind: FfiRecordKind,
        id: String,
        confirmed: bool,
    ) -> Result<bool, ClinicError> {
        let mut book = RecordBook::load(&*self.store, kind.into())?;
        Ok(book.delete(&*self.store, &id, |_| confirmed)?)
    }

    // =========================================================================
    // Dashboard
    // =========================================================================

    pub fn dashboard(&self) -> Result<FfiDashboard, ClinicError> {
        Ok(dashboard::DashboardStats::load(&*self.store)?.into())
    }
}

// =========================================================================
// Patient Search Handle
// =========================================================================

/// Debounced patient search for the shell.
///
/// Debounce timers and queries run on a runtime the handle owns, so callers
/// need no async context. Results are polled through
/// [`ClinicSearch::snapshot`]. While the bill form has a patient selected,
/// input clears the results instead of searching.
#[derive(uniffi::Object)]
pub struct ClinicSearch {
    // Must drop before `runtime`
    search: Mutex<PatientSearch>,
    core: Arc<ClinicCore>,
    runtime: tokio::runtime::Runtime,
}

impl ClinicSearch {
    fn new(core: Arc<ClinicCore>) -> Result<Self, ClinicError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("clinic-search")
            .enable_time()
            .build()
            .map_err(|e| ClinicError::ConfigError(format!("search runtime: {}", e)))?;
        let search = PatientSearch::new(core.store(), &core.config);
        Ok(Self {
            search: Mutex::new(search),
            core,
            runtime,
        })
    }

    /// Mirror the bill form's patient into the search selection.
    fn follow_bill(&self, search: &mut PatientSearch) -> Result<(), ClinicError> {
        let patient = self.core.bill.lock()?.patient().cloned();
        if search.selected() != patient.as_ref() {
            debug!(selected = patient.is_some(), "search selection follows bill");
            match patient {
                Some(patient) => search.select(patient),
                None => search.clear_selection(),
            }
        }
        Ok(())
    }
}

#[uniffi::export]
impl ClinicSearch {
    /// Handle a change of the search box.
    pub fn input(&self, term: String) -> Result<(), ClinicError> {
        let mut search = self.search.lock()?;
        self.follow_bill(&mut search)?;
        let _runtime = self.runtime.enter();
        search.input(term);
        Ok(())
    }

    /// Pick a result as the bill's patient. Clears the term and results.
    pub fn select(&self, patient_id: String) -> Result<FfiHistoryOutcome, ClinicError> {
        let patient = self.core.registry().get(&patient_id)?;
        let outcome = self
            .core
            .bill
            .lock()?
            .select_patient(&*self.core.store, patient.clone());
        self.search.lock()?.select(patient);
        Ok(outcome.into())
    }

    pub fn clear_selection(&self) -> Result<(), ClinicError> {
        self.core.bill.lock()?.clear_patient();
        self.search.lock()?.clear_selection();
        Ok(())
    }

    pub fn snapshot(&self) -> Result<FfiSearchSnapshot, ClinicError> {
        let search = self.search.lock()?;
        let snapshot = search.snapshot();
        Ok(FfiSearchSnapshot {
            term: snapshot.term,
            patients: snapshot.patients.into_iter().map(|p| p.into()).collect(),
            loading: snapshot.loading,
            selected: search.selected().cloned().map(|p| p.into()),
        })
    }
}

// =========================================================================
// FFI Types
// =========================================================================

/// FFI-safe patient.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiPatient {
    pub id: String,
    pub mr_no: String,
    pub name: String,
    pub phone: String,
    pub dob: String,
    pub gender: String,
    pub age: u32,
    pub address: String,
    pub created_at: Option<String>,
}

impl From<Patient> for FfiPatient {
    fn from(patient: Patient) -> Self {
        Self {
            id: patient.id,
            mr_no: patient.mr_no,
            name: patient.name,
            phone: patient.phone,
            dob: patient.dob,
            gender: patient.gender.as_str().to_string(),
            age: patient.age,
            address: patient.address,
            created_at: patient.created_at,
        }
    }
}

/// Registration input.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiNewPatient {
    pub mr_no: String,
    pub name: String,
    pub phone: String,
    pub dob: String,
    pub gender: String,
    pub address: String,
}

impl From<FfiNewPatient> for NewPatient {
    fn from(p: FfiNewPatient) -> Self {
        Self {
            mr_no: p.mr_no,
            name: p.name,
            phone: p.phone,
            dob: p.dob,
            gender: Gender::from(p.gender),
            address: p.address,
        }
    }
}

#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiPatientUpdate {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub dob: Option<String>,
    pub gender: Option<String>,
    pub address: Option<String>,
}

impl From<FfiPatientUpdate> for PatientUpdate {
    fn from(u: FfiPatientUpdate) -> Self {
        Self {
            name: u.name,
            phone: u.phone,
            dob: u.dob,
            gender: u.gender.map(Gender::from),
            address: u.address,
        }
    }
}

/// One bill-form row.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiRow {
    pub id: u64,
    pub fields: HashMap<String, String>,
}

impl From<&Row> for FfiRow {
    fn from(row: &Row) -> Self {
        Self {
            id: row.id.0,
            fields: row
                .fields
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        }
    }
}

/// What the search box shows.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiSearchSnapshot {
    pub term: String,
    pub patients: Vec<FfiPatient>,
    pub loading: bool,
    pub selected: Option<FfiPatient>,
}

#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiOptionSet {
    pub field: String,
    pub values: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, uniffi::Enum)]
pub enum FfiHistoryOutcome {
    NoRecord,
    Empty,
    Rows { count: u32 },
}

impl From<HistoryOutcome> for FfiHistoryOutcome {
    fn from(outcome: HistoryOutcome) -> Self {
        match outcome {
            HistoryOutcome::NoRecord => FfiHistoryOutcome::NoRecord,
            HistoryOutcome::Empty => FfiHistoryOutcome::Empty,
            HistoryOutcome::Rows(rows) => FfiHistoryOutcome::Rows {
                count: rows.len() as u32,
            },
        }
    }
}

#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiBillSummary {
    pub id: String,
    pub patient_name: String,
    pub mr_no: String,
    pub created_at: Option<String>,
}

impl From<BillSummary> for FfiBillSummary {
    fn from(summary: BillSummary) -> Self {
        Self {
            patient_name: summary.display_name().to_string(),
            mr_no: summary.display_mr_no().to_string(),
            id: summary.id,
            created_at: summary.created_at,
        }
    }
}

#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiBillSection {
    pub key: String,
    pub title: String,
    pub rows: Vec<FfiRow>,
}

#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiBillDetail {
    pub summary: FfiBillSummary,
    pub patient: Option<FfiPatient>,
    pub sections: Vec<FfiBillSection>,
}

impl From<BillDetail> for FfiBillDetail {
    fn from(detail: BillDetail) -> Self {
        Self {
            summary: detail.summary.into(),
            patient: detail.patient.map(|p| p.into()),
            sections: detail
                .sections
                .iter()
                .map(|(section, rows)| FfiBillSection {
                    key: section.form_key().to_string(),
                    title: section.title().to_string(),
                    rows: rows.iter().map(FfiRow::from).collect(),
                })
                .collect(),
        }
    }
}

/// General-data entry: values per field plus an optional patient tag.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiGeneralData {
    pub fields: HashMap<String, Vec<String>>,
    pub mr_no: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, uniffi::Enum)]
pub enum FfiRecordKind {
    General,
    Health,
}

impl From<FfiRecordKind> for RecordKind {
    fn from(kind: FfiRecordKind) -> Self {
        match kind {
            FfiRecordKind::General => RecordKind::General,
            FfiRecordKind::Health => RecordKind::Health,
        }
    }
}

#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiRecord {
    pub id: String,
    pub saved_at: Option<String>,
    pub fields: HashMap<String, Vec<String>>,
}

#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiActivity {
    pub patient_id: String,
    pub title: String,
    pub subtitle: String,
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiDashboard {
    pub total_patients: u32,
    pub recent_activity: Vec<FfiActivity>,
}

impl From<dashboard::DashboardStats> for FfiDashboard {
    fn from(stats: dashboard::DashboardStats) -> Self {
        Self {
            total_patients: stats.total_patients as u32,
            recent_activity: stats
                .recent_activity
                .into_iter()
                .map(|a| FfiActivity {
                    patient_id: a.patient_id,
                    title: a.title,
                    subtitle: a.subtitle,
                    created_at: a.created_at,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiRoute {
    pub path: String,
    pub label: String,
}
