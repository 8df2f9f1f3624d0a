//! Runtime configuration.
//!
//! Resolved once at startup and handed to the services that need it.
//! Nothing in the crate reads the environment while handling an operation.

use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;

pub const DB_PATH_VAR: &str = "CLINIC_DB_PATH";
pub const SEARCH_DEBOUNCE_VAR: &str = "CLINIC_SEARCH_DEBOUNCE_MS";
pub const SEARCH_MIN_CHARS_VAR: &str = "CLINIC_SEARCH_MIN_CHARS";

pub const DEFAULT_SEARCH_DEBOUNCE: Duration = Duration::from_millis(500);
pub const DEFAULT_SEARCH_MIN_CHARS: usize = 2;

/// Configuration errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("{var} must be a non-negative integer, got {value:?}")]
    InvalidNumber { var: &'static str, value: String },

    #[error("{0} cannot be empty")]
    Empty(&'static str),
}

/// Clinic core configuration.
#[derive(Clone, Debug, PartialEq)]
pub struct ClinicConfig {
    database_path: Option<PathBuf>,
    search_debounce: Duration,
    search_min_chars: usize,
}

impl Default for ClinicConfig {
    /// In-memory database, 500 ms debounce, two-character minimum.
    fn default() -> Self {
        Self {
            database_path: None,
            search_debounce: DEFAULT_SEARCH_DEBOUNCE,
            search_min_chars: DEFAULT_SEARCH_MIN_CHARS,
        }
    }
}

impl ClinicConfig {
    /// Resolve from `CLINIC_*` environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Resolve from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(path) = lookup(DB_PATH_VAR) {
            if path.trim().is_empty() {
                return Err(ConfigError::Empty(DB_PATH_VAR));
            }
            config.database_path = Some(PathBuf::from(path));
        }
        if let Some(ms) = lookup(SEARCH_DEBOUNCE_VAR) {
            config.search_debounce = Duration::from_millis(parse_number(SEARCH_DEBOUNCE_VAR, &ms)?);
        }
        if let Some(chars) = lookup(SEARCH_MIN_CHARS_VAR) {
            config.search_min_chars = parse_number(SEARCH_MIN_CHARS_VAR, &chars)? as usize;
        }

        Ok(config)
    }

    pub fn with_database_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.database_path = Some(path.into());
        self
    }

    pub fn with_search_debounce(mut self, debounce: Duration) -> Self {
        self.search_debounce = debounce;
        self
    }

    pub fn with_search_min_chars(mut self, min_chars: usize) -> Self {
        self.search_min_chars = min_chars;
        self
    }

    /// `None` means an in-memory database.
    pub fn database_path(&self) -> Option<&Path> {
        self.database_path.as_deref()
    }

    pub fn search_debounce(&self) -> Duration {
        self.search_debounce
    }

    pub fn search_min_chars(&self) -> usize {
        self.search_min_chars
    }
}

fn parse_number(var: &'static str, value: &str) -> Result<u64, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidNumber {
            var,
            value: value.to_string(),
        })
}
