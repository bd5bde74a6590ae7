//! Relational store seam.
//!
//! The framework never talks to a database driver directly. All physical
//! table and metadata-table access goes through the [`RelationalBackend`]
//! trait, which abstracts the handful of operations the core needs: row read
//! by id, id selection by column equality with pagination, row writes keyed
//! by id, metadata read/upsert/delete by owner, and idempotent table DDL.
//!
//! [`MemoryBackend`] is a complete in-process implementation used by the
//! crate's own tests and by embeddable hosts that have no external database.

use crate::value::Value;
use serde_json::Value as JsonValue;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::sync::Mutex;

/// One physical row: map from physical column name to value.
pub type Row = HashMap<String, Value>;

/// Result of an idempotent `CREATE TABLE IF NOT EXISTS` pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DdlOutcome {
    /// The table did not exist and was created.
    Created,
    /// The table was already present; nothing was done.
    AlreadyExists,
}

/// Relational backend error type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// A read or write against a table failed.
    Query(String),
    /// A DDL statement failed.
    Ddl(String),
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendError::Query(s) => write!(f, "Query error: {s}"),
            BackendError::Ddl(s) => write!(f, "DDL error: {s}"),
        }
    }
}

impl std::error::Error for BackendError {}

/// Trait abstracting the relational store for one entity type.
///
/// Implementations are expected to be cheap to share (`Arc`) and internally
/// synchronized; the framework itself issues no transactions and relies on
/// the store's own row-level semantics (see the concurrency notes on
/// [`DataStore`](crate::store::DataStore)).
pub trait RelationalBackend: Send + Sync {
    /// Fetch a single row by primary key. `Ok(None)` when absent.
    fn get_row(&self, table: &str, id_field: &str, id: i64) -> Result<Option<Row>, BackendError>;

    /// Select primary keys matching every equality filter, ordered ascending
    /// by `order_by`, with `offset`/`limit` pagination. `limit: None` means
    /// unbounded. Filters use physical column names.
    fn select_ids(
        &self,
        table: &str,
        id_field: &str,
        filters: &[(String, Value)],
        order_by: &str,
        limit: Option<usize>,
        offset: usize,
    ) -> Result<Vec<i64>, BackendError>;

    /// Insert a row, assigning and returning its primary key.
    fn insert_row(&self, table: &str, id_field: &str, row: Row) -> Result<i64, BackendError>;

    /// Merge the given columns into the row with the given primary key.
    fn update_row(
        &self,
        table: &str,
        id_field: &str,
        id: i64,
        row: Row,
    ) -> Result<(), BackendError>;

    /// Delete a row by primary key. Deleting an absent row is not an error.
    fn delete_row(&self, table: &str, id_field: &str, id: i64) -> Result<(), BackendError>;

    /// Read all metadata rows for an owner as `(meta_key, meta_value)` pairs.
    fn meta_read_all(
        &self,
        meta_table: &str,
        owner_column: &str,
        owner_id: i64,
    ) -> Result<Vec<(String, JsonValue)>, BackendError>;

    /// Upsert one metadata value keyed by `(owner, key)`.
    fn meta_upsert(
        &self,
        meta_table: &str,
        owner_column: &str,
        owner_id: i64,
        key: &str,
        value: &JsonValue,
    ) -> Result<(), BackendError>;

    /// Delete every metadata row belonging to an owner.
    fn meta_delete_all(
        &self,
        meta_table: &str,
        owner_column: &str,
        owner_id: i64,
    ) -> Result<(), BackendError>;

    /// Whether a table exists in the active database.
    fn table_exists(&self, table: &str) -> Result<bool, BackendError>;

    /// Execute idempotent `CREATE TABLE IF NOT EXISTS` DDL.
    fn create_table(&self, table: &str, ddl: &str) -> Result<DdlOutcome, BackendError>;
}

/// Total ordering over [`Value`] used for in-memory result ordering.
fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Less,
        (_, Value::Null) => Ordering::Greater,
        (Value::Int(x), Value::Int(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        _ => a.to_string().cmp(&b.to_string()),
    }
}

#[derive(Debug, Default)]
struct MemTable {
    rows: BTreeMap<i64, Row>,
    next_id: i64,
}

#[derive(Debug, Clone)]
struct MetaRow {
    owner_id: i64,
    key: String,
    value: JsonValue,
}

#[derive(Debug, Default)]
struct MemoryInner {
    tables: HashMap<String, MemTable>,
    meta: HashMap<String, Vec<MetaRow>>,
    created: HashSet<String>,
}

/// In-process [`RelationalBackend`] with BTree-backed tables and monotonic
/// id assignment.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    inner: Mutex<MemoryInner>,
}

impl MemoryBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryInner> {
        // Lock poisoning only happens after a panic in another holder; the
        // data is still structurally sound for tests, so recover.
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl RelationalBackend for MemoryBackend {
    fn get_row(&self, table: &str, _id_field: &str, id: i64) -> Result<Option<Row>, BackendError> {
        let inner = self.lock();
        Ok(inner
            .tables
            .get(table)
            .and_then(|t| t.rows.get(&id))
            .cloned())
    }

    fn select_ids(
        &self,
        table: &str,
        id_field: &str,
        filters: &[(String, Value)],
        order_by: &str,
        limit: Option<usize>,
        offset: usize,
    ) -> Result<Vec<i64>, BackendError> {
        let inner = self.lock();
        let Some(mem) = inner.tables.get(table) else {
            return Ok(Vec::new());
        };

        let mut matches: Vec<(&i64, &Row)> = mem
            .rows
            .iter()
            .filter(|(_, row)| {
                filters
                    .iter()
                    .all(|(col, val)| row.get(col).is_some_and(|v| v == val))
            })
            .collect();

        if order_by != id_field {
            matches.sort_by(|(_, a), (_, b)| {
                let av = a.get(order_by).unwrap_or(&Value::Null);
                let bv = b.get(order_by).unwrap_or(&Value::Null);
                compare_values(av, bv)
            });
        }

        let ids = matches
            .into_iter()
            .map(|(id, _)| *id)
            .skip(offset)
            .take(limit.unwrap_or(usize::MAX))
            .collect();
        Ok(ids)
    }

    fn insert_row(&self, table: &str, id_field: &str, mut row: Row) -> Result<i64, BackendError> {
        let mut inner = self.lock();
        let mem = inner.tables.entry(table.to_owned()).or_default();
        mem.next_id += 1;
        let id = mem.next_id;
        row.insert(id_field.to_owned(), Value::Int(id));
        mem.rows.insert(id, row);
        Ok(id)
    }

    fn update_row(
        &self,
        table: &str,
        _id_field: &str,
        id: i64,
        row: Row,
    ) -> Result<(), BackendError> {
        let mut inner = self.lock();
        let existing = inner
            .tables
            .get_mut(table)
            .and_then(|t| t.rows.get_mut(&id))
            .ok_or_else(|| BackendError::Query(format!("no row {id} in {table}")))?;
        for (col, val) in row {
            existing.insert(col, val);
        }
        Ok(())
    }

    fn delete_row(&self, table: &str, _id_field: &str, id: i64) -> Result<(), BackendError> {
        let mut inner = self.lock();
        if let Some(mem) = inner.tables.get_mut(table) {
            mem.rows.remove(&id);
        }
        Ok(())
    }

    fn meta_read_all(
        &self,
        meta_table: &str,
        _owner_column: &str,
        owner_id: i64,
    ) -> Result<Vec<(String, JsonValue)>, BackendError> {
        let inner = self.lock();
        Ok(inner
            .meta
            .get(meta_table)
            .map(|rows| {
                rows.iter()
                    .filter(|m| m.owner_id == owner_id)
                    .map(|m| (m.key.clone(), m.value.clone()))
                    .collect()
            })
            .unwrap_or_default())
    }

    fn meta_upsert(
        &self,
        meta_table: &str,
        _owner_column: &str,
        owner_id: i64,
        key: &str,
        value: &JsonValue,
    ) -> Result<(), BackendError> {
        let mut inner = self.lock();
        let rows = inner.meta.entry(meta_table.to_owned()).or_default();
        if let Some(existing) = rows
            .iter_mut()
            .find(|m| m.owner_id == owner_id && m.key == key)
        {
            existing.value = value.clone();
        } else {
            rows.push(MetaRow {
                owner_id,
                key: key.to_owned(),
                value: value.clone(),
            });
        }
        Ok(())
    }

    fn meta_delete_all(
        &self,
        meta_table: &str,
        _owner_column: &str,
        owner_id: i64,
    ) -> Result<(), BackendError> {
        let mut inner = self.lock();
        if let Some(rows) = inner.meta.get_mut(meta_table) {
            rows.retain(|m| m.owner_id != owner_id);
        }
        Ok(())
    }

    fn table_exists(&self, table: &str) -> Result<bool, BackendError> {
        let inner = self.lock();
        Ok(inner.created.contains(table)
            || inner.tables.contains_key(table)
            || inner.meta.contains_key(table))
    }

    fn create_table(&self, table: &str, _ddl: &str) -> Result<DdlOutcome, BackendError> {
        let mut inner = self.lock();
        if inner.created.insert(table.to_owned()) {
            log::debug!("memory backend: created table {table}");
            Ok(DdlOutcome::Created)
        } else {
            Ok(DdlOutcome::AlreadyExists)
        }
    }
}
