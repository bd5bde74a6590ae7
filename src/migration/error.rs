//! Error types for the migration bootstrap.

use crate::backend::BackendError;
use std::fmt;

/// Migration bootstrap error type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MigrationError {
    /// DDL or verification against the backend failed.
    Backend(BackendError),
    /// The completion flag could not be persisted.
    Flag(String),
}

impl fmt::Display for MigrationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MigrationError::Backend(e) => write!(f, "Migration backend error: {e}"),
            MigrationError::Flag(s) => write!(f, "Migration flag error: {s}"),
        }
    }
}

impl std::error::Error for MigrationError {}

impl From<BackendError> for MigrationError {
    fn from(err: BackendError) -> Self {
        MigrationError::Backend(err)
    }
}
