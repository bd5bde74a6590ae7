//! External domain API seam.
//!
//! The host platform already manages the registry this framework's entity
//! type shadows: creating, updating and deleting the backing record are the
//! registry's job, and its argument vocabulary differs from the local column
//! names. The [`RegistryApi`] trait is that contract, verbatim from the
//! host's side; translating to it is the data store's responsibility (see
//! [`DataStore::reformat`](crate::store::DataStore::reformat)).

use crate::value::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Argument payload for registry calls, keyed by the registry's own argument
/// names (not this framework's column names).
pub type ApiArgs = BTreeMap<String, Value>;

/// Error reported by the external registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub message: String,
}

impl ApiError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Registry error: {}", self.message)
    }
}

impl std::error::Error for ApiError {}

/// The related external value object (the registry's own representation of
/// an entry). Accepted by the factory as an identifier form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryEntry {
    pub id: i64,
    pub name: String,
}

/// Operations of the pre-existing external registry.
///
/// The registry is the system of record for the entity's core row: `create`
/// inserts it, `update` rewrites it, `delete` removes it. Argument names
/// follow the registry's vocabulary and optional arguments must not be
/// passed as empty strings.
pub trait RegistryApi: Send + Sync {
    /// Create a registry entry, returning its assigned id.
    fn create(&self, args: &ApiArgs) -> Result<i64, ApiError>;

    /// Update the entry with the given id. A `false` return means the
    /// registry refused the update without raising an error.
    fn update(&self, id: i64, args: &ApiArgs) -> Result<bool, ApiError>;

    /// Delete the entry with the given id. Returns whether anything was
    /// deleted.
    fn delete(&self, id: i64) -> bool;

    /// Resolve a registry name to an id, `0` when absent.
    fn id_by_name(&self, name: &str) -> i64;

    /// Whether a classification namespace with this name is registered.
    fn taxonomy_exists(&self, taxonomy: &str) -> bool;

    /// Register a classification namespace. Used by the post-creation event
    /// hook; hierarchical namespaces carry the entity label as their display
    /// name.
    fn register_taxonomy(&self, taxonomy: &str, label: &str, hierarchical: bool)
        -> Result<(), ApiError>;
}
