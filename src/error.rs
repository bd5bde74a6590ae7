//! Crate-level error type.
//!
//! Each external seam keeps its own small error enum ([`BackendError`],
//! [`ApiError`], [`MigrationError`]); `DataError` is what the entity, store,
//! factory and query layers surface to callers.

use crate::api::ApiError;
use crate::backend::BackendError;
use crate::migration::MigrationError;
use std::fmt;

/// Error type for entity persistence operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataError {
    /// No row exists for the requested id.
    NotFound { data_type: String, id: i64 },
    /// The property is not a declared column and cannot be treated as
    /// metadata (reserved or empty name).
    InvalidProperty(String),
    /// A unique-key value is already taken by another row.
    NonUnique { property: String, value: String },
    /// The external registry reported an error or a falsy result.
    ExternalApi(String),
    /// The underlying relational store failed.
    Persistence(BackendError),
    /// A schema definition was rejected at registration time.
    Schema(String),
}

impl fmt::Display for DataError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataError::NotFound { data_type, id } => {
                write!(f, "No {data_type} found with id {id}")
            }
            DataError::InvalidProperty(prop) => {
                write!(f, "Invalid property: {prop}")
            }
            DataError::NonUnique { property, value } => {
                write!(f, "Value {value:?} for {property} is already in use")
            }
            DataError::ExternalApi(msg) => {
                write!(f, "External registry error: {msg}")
            }
            DataError::Persistence(e) => {
                write!(f, "Persistence error: {e}")
            }
            DataError::Schema(msg) => {
                write!(f, "Schema error: {msg}")
            }
        }
    }
}

impl std::error::Error for DataError {}

impl From<BackendError> for DataError {
    fn from(err: BackendError) -> Self {
        DataError::Persistence(err)
    }
}

impl From<ApiError> for DataError {
    fn from(err: ApiError) -> Self {
        DataError::ExternalApi(err.message)
    }
}

impl From<MigrationError> for DataError {
    fn from(err: MigrationError) -> Self {
        match err {
            MigrationError::Backend(e) => DataError::Persistence(e),
            MigrationError::Flag(msg) => DataError::Persistence(BackendError::Query(msg)),
        }
    }
}
