//! SQLite schema definition.

/// Complete database schema for the clinic document store.
pub const SCHEMA: &str = r#"
-- ============================================================================
-- Documents
-- ============================================================================

-- One row per document. `data` holds the JSON object exactly as written by
-- the application (arrays of strings, row objects, embedded snapshots).
CREATE TABLE IF NOT EXISTS documents (
    collection TEXT NOT NULL CHECK (collection IN ('patients', 'general_data', 'health_data', 'bills')),
    id TEXT NOT NULL,
    data TEXT NOT NULL CHECK (json_valid(data) AND json_type(data) = 'object'),
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (collection, id)
);

CREATE INDEX IF NOT EXISTS idx_documents_collection ON documents(collection);
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn test_schema_valid() {
        let conn = Connection::open_in_memory().unwrap();
        let result = conn.execute_batch(SCHEMA);
        assert!(result.is_ok(), "Schema should be valid SQL: {:?}", result);
    }

    #[test]
    fn test_rejects_unknown_collection() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(SCHEMA).unwrap();

        let result = conn.execute(
            "INSERT INTO documents (collection, id, data) VALUES (?, ?, ?)",
            ["invoices", "doc-1", "{}"],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_rejects_non_object_payload() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(SCHEMA).unwrap();

        let result = conn.execute(
            "INSERT INTO documents (collection, id, data) VALUES (?, ?, ?)",
            ["patients", "doc-1", "[1, 2, 3]"],
        );
        assert!(result.is_err());
    }
}
