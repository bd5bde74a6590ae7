//! Process-wide persisted flag store seam.
//!
//! The migration component gates its DDL pass on a named boolean that must
//! survive process restarts. The host platform's option storage provides it;
//! [`MemoryOptionStore`] stands in where no host storage exists.

use crate::backend::BackendError;
use std::collections::HashMap;
use std::sync::Mutex;

/// Get/set a named boolean persisted across restarts.
pub trait OptionStore: Send + Sync {
    /// Read a flag; absent flags read as `false`.
    fn get_flag(&self, name: &str) -> bool;

    /// Persist a flag value.
    fn set_flag(&self, name: &str, value: bool) -> Result<(), BackendError>;
}

/// In-process [`OptionStore`]. Persists only for the process lifetime.
#[derive(Debug, Default)]
pub struct MemoryOptionStore {
    flags: Mutex<HashMap<String, bool>>,
}

impl MemoryOptionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl OptionStore for MemoryOptionStore {
    fn get_flag(&self, name: &str) -> bool {
        match self.flags.lock() {
            Ok(flags) => flags.get(name).copied().unwrap_or(false),
            Err(poisoned) => poisoned.into_inner().get(name).copied().unwrap_or(false),
        }
    }

    fn set_flag(&self, name: &str, value: bool) -> Result<(), BackendError> {
        let mut flags = match self.flags.lock() {
            Ok(flags) => flags,
            Err(poisoned) => poisoned.into_inner(),
        };
        flags.insert(name.to_owned(), value);
        Ok(())
    }
}
