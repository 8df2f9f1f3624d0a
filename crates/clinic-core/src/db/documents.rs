//! Document database operations.

use rusqlite::types::Value as SqlValue;
use rusqlite::{params, params_from_iter, OptionalExtension};
use serde_json::Value;

use super::{Database, DbResult};
use crate::store::{Direction, Document, Fields, Filter, Query};

impl Database {
    /// Insert a new document.
    pub fn insert_document(&self, collection: &str, id: &str, data: &Fields) -> DbResult<()> {
        let data_json = serde_json::to_string(data)?;
        self.conn.execute(
            "INSERT INTO documents (collection, id, data) VALUES (?1, ?2, ?3)",
            params![collection, id, data_json],
        )?;
        Ok(())
    }

    /// Get a document by ID.
    pub fn get_document(&self, collection: &str, id: &str) -> DbResult<Option<Document>> {
        self.conn
            .query_row(
                "SELECT id, data FROM documents WHERE collection = ?1 AND id = ?2",
                params![collection, id],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
            )
            .optional()?
            .map(|(id, data)| decode_document(id, &data))
            .transpose()
    }

    /// Run a filtered, ordered query over one collection.
    pub fn query_documents(&self, collection: &str, query: &Query) -> DbResult<Vec<Document>> {
        let mut sql = String::from("SELECT id, data FROM documents WHERE collection = ?");
        let mut values = vec![SqlValue::Text(collection.to_string())];

        for filter in query.filters() {
            match filter {
                Filter::Eq { field, value } => {
                    sql.push_str(" AND json_extract(data, ?) = ?");
                    values.push(SqlValue::Text(json_path(field)));
                    values.push(to_sql_value(value));
                }
                Filter::Range { field, start, end } => {
                    sql.push_str(" AND json_extract(data, ?) >= ? AND json_extract(data, ?) <= ?");
                    values.push(SqlValue::Text(json_path(field)));
                    values.push(SqlValue::Text(start.clone()));
                    values.push(SqlValue::Text(json_path(field)));
                    values.push(SqlValue::Text(end.clone()));
                }
            }
        }

        match query.order() {
            Some((field, direction)) => {
                let dir = match direction {
                    Direction::Ascending => "ASC",
                    Direction::Descending => "DESC",
                };
                // rowid keeps documents with equal sort keys in insertion order
                sql.push_str(&format!(
                    " ORDER BY json_extract(data, ?) {dir}, rowid {dir}"
                ));
                values.push(SqlValue::Text(json_path(field)));
            }
            None => sql.push_str(" ORDER BY rowid"),
        }

        if let Some(limit) = query.max_results() {
            sql.push_str(" LIMIT ?");
            values.push(SqlValue::Integer(limit as i64));
        }

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(values.iter()), |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut documents = Vec::new();
        for row in rows {
            let (id, data) = row?;
            documents.push(decode_document(id, &data)?);
        }
        Ok(documents)
    }

    /// Merge `patch` into an existing document (top-level keys replaced).
    pub fn patch_document(&self, collection: &str, id: &str, patch: &Fields) -> DbResult<bool> {
        let patch_json = serde_json::to_string(patch)?;
        let rows_affected = self.conn.execute(
            r#"
            UPDATE documents SET
                data = json_patch(data, ?3),
                updated_at = datetime('now')
            WHERE collection = ?1 AND id = ?2
            "#,
            params![collection, id, patch_json],
        )?;
        Ok(rows_affected > 0)
    }

    /// Delete a document.
    pub fn delete_document(&self, collection: &str, id: &str) -> DbResult<bool> {
        let rows_affected = self.conn.execute(
            "DELETE FROM documents WHERE collection = ?1 AND id = ?2",
            params![collection, id],
        )?;
        Ok(rows_affected > 0)
    }
}

fn decode_document(id: String, data: &str) -> DbResult<Document> {
    let data: Fields = serde_json::from_str(data)?;
    Ok(Document { id, data })
}

fn json_path(field: &str) -> String {
    format!("$.\"{}\"", field.replace('"', "\\\""))
}

fn to_sql_value(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Number(n) => match n.as_i64() {
            Some(i) => SqlValue::Integer(i),
            None => SqlValue::Real(n.as_f64().unwrap_or_default()),
        },
        Value::String(s) => SqlValue::Text(s.clone()),
        other => SqlValue::Text(other.to_string()),
    }
}
