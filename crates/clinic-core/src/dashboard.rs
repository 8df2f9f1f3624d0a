//! Dashboard statistics.

use tracing::warn;

use crate::models::{Patient, CREATED_AT_FIELD};
use crate::store::{Collection, Direction, DocumentStore, Query, StoreResult};

/// Registrations the dashboard looks at.
pub const RECENT_PATIENT_WINDOW: usize = 50;

/// Entries in the recent-activity list.
pub const RECENT_ACTIVITY_LEN: usize = 5;

/// One recent-activity entry.
#[derive(Debug, Clone, PartialEq)]
pub struct Activity {
    pub patient_id: String,
    pub title: String,
    pub subtitle: String,
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DashboardStats {
    /// Patients within the recent window, not the whole registry.
    pub total_patients: usize,
    pub recent_activity: Vec<Activity>,
}

impl DashboardStats {
    pub fn load(store: &dyn DocumentStore) -> StoreResult<Self> {
        let query = Query::all()
            .order_by(CREATED_AT_FIELD, Direction::Descending)
            .limit(RECENT_PATIENT_WINDOW);
        let docs = store.query(Collection::Patients, &query)?;

        let recent_activity = docs
            .iter()
            .filter_map(|doc| match doc.decode::<Patient>() {
                Ok(patient) => Some(patient),
                Err(e) => {
                    warn!(id = %doc.id, error = %e, "skipping undecodable patient");
                    None
                }
            })
            .take(RECENT_ACTIVITY_LEN)
            .map(|patient| Activity {
                subtitle: patient.summary(),
                title: "New Patient Registered".into(),
                patient_id: patient.id,
                created_at: patient.created_at,
            })
            .collect();

        Ok(Self {
            total_patients: docs.len(),
            recent_activity,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{Fields, SqliteStore};
    use serde_json::json;

    #[test]
    fn test_recent_activity_newest_first() {
        let store = SqliteStore::open_in_memory().unwrap();
        for i in 0..7 {
            let fields: Fields = json!({"name": format!("P{i}"), "gender": "Male", "age": 30 + i})
                .as_object()
                .cloned()
                .unwrap();
            store.add(Collection::Patients, fields, Some("createdAt")).unwrap();
        }

        let stats = DashboardStats::load(&store).unwrap();
        assert_eq!(stats.total_patients, 7);
        assert_eq!(stats.recent_activity.len(), 5);
        assert_eq!(stats.recent_activity[0].subtitle, "P6 (Male, 36y)");
        assert_eq!(stats.recent_activity[4].subtitle, "P2 (Male, 32y)");
    }

    #[test]
    fn test_empty_registry() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert_eq!(DashboardStats::load(&store).unwrap(), DashboardStats::default());
    }
}
