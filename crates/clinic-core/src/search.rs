//! Debounced patient search by name or MR number prefix.
//!
//! Each keystroke supersedes the one before it: the pending timer task is
//! aborted and a generation counter is bumped, so only the most recent term
//! can ever publish results.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::config::ClinicConfig;
use crate::models::{Patient, MR_NO_FIELD};
use crate::store::{Collection, Document, DocumentStore, Query, StoreError, StoreResult};

/// Patient field searched alongside the MR number.
pub const NAME_FIELD: &str = "name";

/// What the search box currently shows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchSnapshot {
    pub term: String,
    pub patients: Vec<Patient>,
    pub loading: bool,
}

/// Search-as-you-type over the patients collection.
///
/// [`PatientSearch::input`] spawns onto the current Tokio runtime and must be
/// called from within one.
pub struct PatientSearch {
    store: Arc<dyn DocumentStore>,
    debounce: Duration,
    min_chars: usize,
    generation: Arc<AtomicU64>,
    pending: Option<JoinHandle<()>>,
    selected: Option<Patient>,
    tx: Arc<watch::Sender<SearchSnapshot>>,
}

impl PatientSearch {
    pub fn new(store: Arc<dyn DocumentStore>, config: &ClinicConfig) -> Self {
        let (tx, _rx) = watch::channel(SearchSnapshot::default());
        Self {
            store,
            debounce: config.search_debounce(),
            min_chars: config.search_min_chars(),
            generation: Arc::new(AtomicU64::new(0)),
            pending: None,
            selected: None,
            tx: Arc::new(tx),
        }
    }

    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    /// Receiver that sees every published snapshot.
    pub fn subscribe(&self) -> watch::Receiver<SearchSnapshot> {
        self.tx.subscribe()
    }

    pub fn snapshot(&self) -> SearchSnapshot {
        self.tx.borrow().clone()
    }

    pub fn selected(&self) -> Option<&Patient> {
        self.selected.as_ref()
    }

    /// Handle a change of the search term.
    ///
    /// Too-short terms, or any term while a patient is selected, clear the
    /// results at once. Otherwise a search runs after the debounce window
    /// unless another call arrives first.
    pub fn input(&mut self, term: impl Into<String>) {
        let term = term.into();
        let generation = self.supersede();

        if term.chars().count() < self.min_chars || self.selected.is_some() {
            self.tx.send_replace(SearchSnapshot {
                term,
                ..Default::default()
            });
            return;
        }

        self.tx.send_modify(|snapshot| snapshot.term = term.clone());
        debug!(%term, generation, "scheduled patient search");

        let store = Arc::clone(&self.store);
        let tx = Arc::clone(&self.tx);
        let current = Arc::clone(&self.generation);
        let debounce = self.debounce;

        self.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(debounce).await;
            publish(&tx, &current, generation, |snapshot| snapshot.loading = true);

            let patients = match search_patients(store, &term).await {
                Ok(patients) => patients,
                Err(e) => {
                    warn!(%term, error = %e, "patient search failed");
                    Vec::new()
                }
            };
            debug!(%term, generation, hits = patients.len(), "patient search finished");

            publish(&tx, &current, generation, move |snapshot| {
                snapshot.patients = patients;
                snapshot.loading = false;
            });
        }));
    }

    /// Pick a patient from the results. Clears the term and the results.
    pub fn select(&mut self, patient: Patient) {
        self.supersede();
        self.selected = Some(patient);
        self.tx.send_replace(SearchSnapshot::default());
    }

    pub fn clear_selection(&mut self) {
        self.supersede();
        self.selected = None;
        self.tx.send_replace(SearchSnapshot::default());
    }

    /// Cancel the pending search and invalidate anything still in flight.
    fn supersede(&mut self) -> u64 {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }
}

impl Drop for PatientSearch {
    fn drop(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
    }
}

/// Apply `update` only if `generation` is still the newest.
fn publish(
    tx: &watch::Sender<SearchSnapshot>,
    current: &AtomicU64,
    generation: u64,
    update: impl FnOnce(&mut SearchSnapshot),
) {
    tx.send_if_modified(|snapshot| {
        if current.load(Ordering::SeqCst) != generation {
            return false;
        }
        update(snapshot);
        true
    });
}

fn name_query(term: &str) -> Query {
    Query::all().where_prefix(NAME_FIELD, term)
}

fn mr_query(term: &str) -> Query {
    Query::all().where_prefix(MR_NO_FIELD, term)
}

/// Run the name and MR prefix queries in parallel on the blocking pool.
pub async fn search_patients(store: Arc<dyn DocumentStore>, term: &str) -> StoreResult<Vec<Patient>> {
    let by_name = {
        let store = Arc::clone(&store);
        let query = name_query(term);
        tokio::task::spawn_blocking(move || store.query(Collection::Patients, &query))
    };
    let by_mr = {
        let query = mr_query(term);
        tokio::task::spawn_blocking(move || store.query(Collection::Patients, &query))
    };

    let (names, mrs) =
        tokio::try_join!(by_name, by_mr).map_err(|e| StoreError::Unavailable(e.to_string()))?;
    Ok(merge_unique(names?, mrs?))
}

/// Union of both hit lists by document id, name hits first.
pub fn merge_unique(by_name: Vec<Document>, by_mr: Vec<Document>) -> Vec<Patient> {
    let mut seen = HashSet::new();
    by_name
        .into_iter()
        .chain(by_mr)
        .filter(|doc| seen.insert(doc.id.clone()))
        .filter_map(|doc| match doc.decode::<Patient>() {
            Ok(patient) => Some(patient),
            Err(e) => {
                warn!(id = %doc.id, error = %e, "skipping undecodable patient");
                None
            }
        })
        .collect()
}
