//! Ordered row collections.

use serde_json::Value;

use super::{FormError, FormResult};
use crate::models::{Row, RowId, Section};

/// Editable, ordered rows of one bill section.
#[derive(Debug, Clone, PartialEq)]
pub struct RowCollection {
    section: Section,
    rows: Vec<Row>,
}

impl RowCollection {
    /// Collection holding a single blank row.
    pub fn new(section: Section) -> Self {
        Self {
            section,
            rows: vec![section.blank_row()],
        }
    }

    pub fn section(&self) -> Section {
        self.section
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, id: RowId) -> Option<&Row> {
        self.rows.iter().find(|row| row.id == id)
    }

    /// Append a blank row and return its id.
    pub fn add(&mut self) -> RowId {
        let row = self.section.blank_row();
        let id = row.id;
        self.rows.push(row);
        id
    }

    /// Set one field of one row.
    pub fn update(&mut self, id: RowId, field: &str, value: impl Into<String>) -> FormResult<()> {
        if !self.section.has_field(field) {
            return Err(FormError::UnknownField {
                section: self.section,
                field: field.to_string(),
            });
        }
        let section = self.section;
        let row = self
            .rows
            .iter_mut()
            .find(|row| row.id == id)
            .ok_or(FormError::RowNotFound { section, id })?;
        row.fields.insert(field.to_string(), value.into());
        Ok(())
    }

    /// Remove one row. Removing the last row leaves the collection empty.
    pub fn remove(&mut self, id: RowId) -> FormResult<Row> {
        let position = self
            .rows
            .iter()
            .position(|row| row.id == id)
            .ok_or(FormError::RowNotFound {
                section: self.section,
                id,
            })?;
        Ok(self.rows.remove(position))
    }

    /// Replace every row, e.g. with rows rebuilt from history.
    pub fn replace(&mut self, rows: Vec<Row>) {
        self.rows = rows;
    }

    /// Back to a single blank row.
    pub fn reset(&mut self) {
        self.rows = vec![self.section.blank_row()];
    }

    /// Rows as a JSON array, in order.
    pub fn to_json(&self) -> serde_json::Result<Value> {
        serde_json::to_value(&self.rows)
    }
}
