//! In-memory form state for bill entry.

mod bill;
mod rows;

pub use bill::*;
pub use rows::*;

use thiserror::Error;

use crate::models::{RowId, Section};

/// Row editing errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FormError {
    #[error("Unknown section: {0}")]
    UnknownSection(String),

    #[error("Row {id} not found in {section}")]
    RowNotFound { section: Section, id: RowId },

    #[error("Section {section} has no field {field:?}")]
    UnknownField { section: Section, field: String },
}

pub type FormResult<T> = Result<T, FormError>;
