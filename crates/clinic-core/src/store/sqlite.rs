//! SQLite-backed document store.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use serde_json::Value;

use super::{
    server_timestamp, Collection, Document, DocumentStore, Fields, Query, StoreError, StoreResult,
};
use crate::db::Database;

/// [`DocumentStore`] over a single SQLite connection.
pub struct SqliteStore {
    db: Mutex<Database>,
}

impl SqliteStore {
    /// Open the store at `path`, creating it if needed.
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        Ok(Self {
            db: Mutex::new(Database::open(path)?),
        })
    }

    /// Create an in-memory store (for testing).
    pub fn open_in_memory() -> StoreResult<Self> {
        Ok(Self {
            db: Mutex::new(Database::open_in_memory()?),
        })
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Database>> {
        self.db
            .lock()
            .map_err(|e| StoreError::LockPoisoned(e.to_string()))
    }
}

impl DocumentStore for SqliteStore {
    fn add(
        &self,
        collection: Collection,
        mut fields: Fields,
        server_timestamp_field: Option<&str>,
    ) -> StoreResult<String> {
        if let Some(field) = server_timestamp_field {
            fields.insert(field.to_string(), Value::String(server_timestamp()));
        }
        let id = uuid::Uuid::new_v4().to_string();
        self.lock()?
            .insert_document(collection.as_str(), &id, &fields)?;
        Ok(id)
    }

    fn get(&self, collection: Collection, id: &str) -> StoreResult<Option<Document>> {
        Ok(self.lock()?.get_document(collection.as_str(), id)?)
    }

    fn query(&self, collection: Collection, query: &Query) -> StoreResult<Vec<Document>> {
        Ok(self.lock()?.query_documents(collection.as_str(), query)?)
    }

    fn update(&self, collection: Collection, id: &str, fields: Fields) -> StoreResult<bool> {
        Ok(self.lock()?.patch_document(collection.as_str(), id, &fields)?)
    }

    fn delete(&self, collection: Collection, id: &str) -> StoreResult<bool> {
        Ok(self.lock()?.delete_document(collection.as_str(), id)?)
    }
}
