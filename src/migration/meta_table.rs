//! Idempotent metadata-table creation gated by a persisted flag.

use super::{MigrationError, MigrationState};
use crate::backend::RelationalBackend;
use crate::config::DataConfig;
use crate::options::OptionStore;
use crate::schema::Schema;
use std::sync::Arc;

/// One table the migration must guarantee exists.
#[derive(Debug, Clone)]
pub struct RequiredTable {
    pub name: String,
    pub ddl: String,
}

/// `CREATE TABLE IF NOT EXISTS` DDL for an entity type's metadata table.
///
/// Layout per the framework's metadata contract: surrogate `meta_id`, owner
/// id column, key, value.
#[must_use]
pub fn meta_table_ddl(meta_table: &str, owner_column: &str) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {meta_table} (\n\
         \x20   meta_id BIGSERIAL PRIMARY KEY,\n\
         \x20   {owner_column} BIGINT NOT NULL,\n\
         \x20   meta_key VARCHAR(255),\n\
         \x20   meta_value TEXT\n\
         )"
    )
}

/// Bootstrap-time migration for one entity type's metadata table.
///
/// Invoked on every process start; once the persisted flag reads verified,
/// the whole pass is a flag read and nothing else.
pub struct MetaTableMigration {
    backend: Arc<dyn RelationalBackend>,
    flags: Arc<dyn OptionStore>,
    flag_name: String,
    tables: Vec<RequiredTable>,
}

impl MetaTableMigration {
    pub fn new(
        backend: Arc<dyn RelationalBackend>,
        flags: Arc<dyn OptionStore>,
        flag_name: impl Into<String>,
        tables: Vec<RequiredTable>,
    ) -> Self {
        Self {
            backend,
            flags,
            flag_name: flag_name.into(),
            tables,
        }
    }

    /// Migration covering a schema's metadata table, with the completion
    /// flag named after the data type.
    pub fn for_schema(
        schema: &Schema,
        config: &DataConfig,
        backend: Arc<dyn RelationalBackend>,
        flags: Arc<dyn OptionStore>,
    ) -> Self {
        let meta_table = schema.resolved_meta_table(&config.table_prefix);
        let ddl = meta_table_ddl(&meta_table, schema.meta_owner_column());
        Self::new(
            backend,
            flags,
            format!("{}_tables_created", schema.data_type()),
            vec![RequiredTable {
                name: meta_table,
                ddl,
            }],
        )
    }

    /// Current state as recorded by the flag store.
    #[must_use]
    pub fn state(&self) -> MigrationState {
        if self.flags.get_flag(&self.flag_name) {
            MigrationState::Verified
        } else {
            MigrationState::Unverified
        }
    }

    /// Run the idempotent bootstrap pass.
    ///
    /// On `Unverified`: issue the DDL, then verify which tables actually
    /// exist; when none are missing, persist the flag and report
    /// `Verified`. A pass that still finds missing tables leaves the flag
    /// unset so the next start retries.
    pub fn bootstrap(&self) -> Result<MigrationState, MigrationError> {
        if self.state().is_verified() {
            log::debug!("{}: tables already verified, skipping DDL", self.flag_name);
            return Ok(MigrationState::Verified);
        }

        self.create_tables()?;

        let missing = self.verify_tables()?;
        if missing.is_empty() {
            self.flags
                .set_flag(&self.flag_name, true)
                .map_err(|e| MigrationError::Flag(e.to_string()))?;
            log::debug!("{}: all tables verified", self.flag_name);
            Ok(MigrationState::Verified)
        } else {
            log::warn!(
                "{}: tables still missing after creation pass: {}",
                self.flag_name,
                missing.join(", ")
            );
            Ok(MigrationState::Unverified)
        }
    }

    fn create_tables(&self) -> Result<(), MigrationError> {
        for table in &self.tables {
            self.backend.create_table(&table.name, &table.ddl)?;
        }
        Ok(())
    }

    /// Names of required tables that still do not exist.
    fn verify_tables(&self) -> Result<Vec<String>, MigrationError> {
        let mut missing = Vec::new();
        for table in &self.tables {
            if !self.backend.table_exists(&table.name)? {
                missing.push(table.name.clone());
            }
        }
        Ok(missing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BackendError, DdlOutcome, MemoryBackend, Row};
    use crate::options::MemoryOptionStore;
    use serde_json::Value as JsonValue;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    fn migration(
        backend: Arc<dyn RelationalBackend>,
        flags: Arc<dyn OptionStore>,
    ) -> MetaTableMigration {
        MetaTableMigration::new(
            backend,
            flags,
            "attribute_tax_tables_created",
            vec![RequiredTable {
                name: "xt_attribute_taxonomymeta".to_owned(),
                ddl: meta_table_ddl("xt_attribute_taxonomymeta", "attribute_taxonomy_id"),
            }],
        )
    }

    #[test]
    fn bootstrap_creates_verifies_and_flips_the_flag() {
        let backend = Arc::new(MemoryBackend::new());
        let flags = Arc::new(MemoryOptionStore::new());
        let migration = migration(backend.clone(), flags.clone());

        assert_eq!(migration.state(), MigrationState::Unverified);
        assert_eq!(migration.bootstrap().unwrap(), MigrationState::Verified);
        assert!(flags.get_flag("attribute_tax_tables_created"));
        assert!(backend.table_exists("xt_attribute_taxonomymeta").unwrap());
    }

    /// Backend that counts DDL issued, to prove the verified path skips it.
    struct CountingBackend {
        inner: MemoryBackend,
        ddl_calls: AtomicUsize,
    }

    impl RelationalBackend for CountingBackend {
        fn get_row(&self, t: &str, f: &str, id: i64) -> Result<Option<Row>, BackendError> {
            self.inner.get_row(t, f, id)
        }
        fn select_ids(
            &self,
            t: &str,
            f: &str,
            fi: &[(String, crate::value::Value)],
            o: &str,
            l: Option<usize>,
            of: usize,
        ) -> Result<Vec<i64>, BackendError> {
            self.inner.select_ids(t, f, fi, o, l, of)
        }
        fn insert_row(&self, t: &str, f: &str, r: Row) -> Result<i64, BackendError> {
            self.inner.insert_row(t, f, r)
        }
        fn update_row(&self, t: &str, f: &str, id: i64, r: Row) -> Result<(), BackendError> {
            self.inner.update_row(t, f, id, r)
        }
        fn delete_row(&self, t: &str, f: &str, id: i64) -> Result<(), BackendError> {
            self.inner.delete_row(t, f, id)
        }
        fn meta_read_all(
            &self,
            t: &str,
            o: &str,
            id: i64,
        ) -> Result<Vec<(String, JsonValue)>, BackendError> {
            self.inner.meta_read_all(t, o, id)
        }
        fn meta_upsert(
            &self,
            t: &str,
            o: &str,
            id: i64,
            k: &str,
            v: &JsonValue,
        ) -> Result<(), BackendError> {
            self.inner.meta_upsert(t, o, id, k, v)
        }
        fn meta_delete_all(&self, t: &str, o: &str, id: i64) -> Result<(), BackendError> {
            self.inner.meta_delete_all(t, o, id)
        }
        fn table_exists(&self, t: &str) -> Result<bool, BackendError> {
            self.inner.table_exists(t)
        }
        fn create_table(&self, t: &str, ddl: &str) -> Result<DdlOutcome, BackendError> {
            self.ddl_calls.fetch_add(1, Ordering::SeqCst);
            self.inner.create_table(t, ddl)
        }
    }

    #[test]
    fn second_bootstrap_skips_ddl_entirely() {
        let backend = Arc::new(CountingBackend {
            inner: MemoryBackend::new(),
            ddl_calls: AtomicUsize::new(0),
        });
        let flags = Arc::new(MemoryOptionStore::new());
        let migration = migration(backend.clone(), flags.clone());

        migration.bootstrap().unwrap();
        assert_eq!(backend.ddl_calls.load(Ordering::SeqCst), 1);

        migration.bootstrap().unwrap();
        assert_eq!(backend.ddl_calls.load(Ordering::SeqCst), 1);
        assert_eq!(migration.state(), MigrationState::Verified);
    }

    /// Flag store whose writes can be made to fail, for partial-failure
    /// recovery.
    struct FlakyFlags {
        inner: MemoryOptionStore,
        fail_writes: Mutex<bool>,
    }

    impl OptionStore for FlakyFlags {
        fn get_flag(&self, name: &str) -> bool {
            self.inner.get_flag(name)
        }
        fn set_flag(&self, name: &str, value: bool) -> Result<(), BackendError> {
            if *self.fail_writes.lock().unwrap() {
                return Err(BackendError::Query("flag write failed".to_owned()));
            }
            self.inner.set_flag(name, value)
        }
    }

    #[test]
    fn bootstrap_self_heals_after_a_failed_flag_write() {
        let backend = Arc::new(MemoryBackend::new());
        let flags = Arc::new(FlakyFlags {
            inner: MemoryOptionStore::new(),
            fail_writes: Mutex::new(true),
        });
        let migration = migration(backend, flags.clone());

        assert!(migration.bootstrap().is_err());
        assert_eq!(migration.state(), MigrationState::Unverified);

        *flags.fail_writes.lock().unwrap() = false;
        assert_eq!(migration.bootstrap().unwrap(), MigrationState::Verified);
    }

    #[test]
    fn ddl_names_the_owner_column() {
        let ddl = meta_table_ddl("xt_attribute_taxonomymeta", "attribute_taxonomy_id");
        assert!(ddl.starts_with("CREATE TABLE IF NOT EXISTS xt_attribute_taxonomymeta"));
        assert!(ddl.contains("attribute_taxonomy_id BIGINT NOT NULL"));
        assert!(ddl.contains("meta_id"));
        assert!(ddl.contains("meta_key"));
        assert!(ddl.contains("meta_value"));
    }
}
