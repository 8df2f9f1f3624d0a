//! Pick-list options harvested from previously saved records.
//!
//! Option sets are rebuilt on every form load and never persisted. Values are
//! deduplicated and sorted byte-wise, so the result does not depend on the
//! order in which documents come back from the store.

use std::collections::{BTreeMap, BTreeSet};

use serde_json::Value;
use tracing::{debug, warn};

use crate::models::{string_list, CONDITIONS_FIELD, NESTED_ROW_KEYS};
use crate::store::{scalar_text, Collection, DocumentStore, Fields};

/// Label of the "none selected" entry every pick-list offers.
pub const NONE_SELECTED_LABEL: &str = "Select";

/// Fields that carry harvested pick-list options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum OptionField {
    Eye,
    Complaint,
    Glass,
    Duration,
    Distance,
    Progression,
    Association,
    Conditions,
    LensType,
}

impl OptionField {
    pub const ALL: [OptionField; 9] = [
        OptionField::Eye,
        OptionField::Complaint,
        OptionField::Glass,
        OptionField::Duration,
        OptionField::Distance,
        OptionField::Progression,
        OptionField::Association,
        OptionField::Conditions,
        OptionField::LensType,
    ];

    /// Fields read from general-data documents.
    const GENERAL: [OptionField; 8] = [
        OptionField::Eye,
        OptionField::Complaint,
        OptionField::Glass,
        OptionField::Duration,
        OptionField::Distance,
        OptionField::Progression,
        OptionField::Association,
        OptionField::LensType,
    ];

    /// Document field name.
    pub fn key(&self) -> &'static str {
        match self {
            OptionField::Eye => "eye",
            OptionField::Complaint => "complaint",
            OptionField::Glass => "glass",
            OptionField::Duration => "duration",
            OptionField::Distance => "distance",
            OptionField::Progression => "progression",
            OptionField::Association => "association",
            OptionField::Conditions => CONDITIONS_FIELD,
            OptionField::LensType => "lensType",
        }
    }
}

impl std::str::FromStr for OptionField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OptionField::ALL
            .into_iter()
            .find(|field| field.key() == s)
            .ok_or_else(|| s.to_string())
    }
}

/// One entry of a pick-list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Choice {
    pub value: String,
    pub label: String,
}

/// Harvested options, one sorted set per field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OptionSets {
    sets: BTreeMap<OptionField, BTreeSet<String>>,
}

impl OptionSets {
    /// Sorted, duplicate-free values for `field`.
    pub fn get(&self, field: OptionField) -> Vec<String> {
        self.sets
            .get(&field)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Pick-list for `field`: the "none selected" sentinel, then every value.
    pub fn choices(&self, field: OptionField) -> Vec<Choice> {
        std::iter::once(Choice {
            value: String::new(),
            label: NONE_SELECTED_LABEL.to_string(),
        })
        .chain(self.get(field).into_iter().map(|value| Choice {
            label: value.clone(),
            value,
        }))
        .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.values().all(BTreeSet::is_empty)
    }

    fn insert(&mut self, field: OptionField, value: String) {
        if value.is_empty() {
            return;
        }
        self.sets.entry(field).or_default().insert(value);
    }

    /// Add the options carried by one general-data document.
    pub fn absorb_general(&mut self, fields: &Fields) {
        for field in OptionField::GENERAL {
            for value in string_list(fields, field.key()) {
                self.insert(field, value);
            }
        }

        let nested = NESTED_ROW_KEYS.iter().filter_map(|key| match fields.get(*key) {
            Some(Value::Array(items)) => Some(items),
            _ => None,
        });
        for row in nested.flatten().filter_map(Value::as_object) {
            for field in OptionField::GENERAL {
                if let Some(value) = row.get(field.key()) {
                    self.insert(field, scalar_text(value));
                }
            }
        }
    }

    /// Add the conditions carried by one health-data document.
    pub fn absorb_health(&mut self, fields: &Fields) {
        for value in string_list(fields, CONDITIONS_FIELD) {
            self.insert(OptionField::Conditions, value);
        }
    }
}

/// Builds [`OptionSets`] from every stored general- and health-data record.
pub struct OptionHarvester<'a> {
    store: &'a dyn DocumentStore,
}

impl<'a> OptionHarvester<'a> {
    pub fn new(store: &'a dyn DocumentStore) -> Self {
        Self { store }
    }

    /// Harvest both collections. A failed read leaves that collection's
    /// fields empty and does not affect the other.
    pub fn harvest(&self) -> OptionSets {
        let mut options = OptionSets::default();

        match self.store.list(Collection::GeneralData) {
            Ok(documents) => {
                for doc in &documents {
                    options.absorb_general(&doc.data);
                }
                debug!(documents = documents.len(), "harvested general-data options");
            }
            Err(e) => warn!(error = %e, "failed to harvest general-data options"),
        }

        match self.store.list(Collection::HealthData) {
            Ok(documents) => {
                for doc in &documents {
                    options.absorb_health(&doc.data);
                }
                debug!(documents = documents.len(), "harvested health-data options");
            }
            Err(e) => warn!(error = %e, "failed to harvest health-data options"),
        }

        options
    }
}
