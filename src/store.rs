//! Data store: the sole reader/writer of one entity type's tables and the
//! single point of adaptation to the external registry.
//!
//! The registry is the system of record for the core row: `create`,
//! `update` and `delete` go through [`RegistryApi`]. The store itself reads
//! the physical table and owns the metadata table. The
//! [`reformat`](DataStore::reformat) step is the one place where the local
//! column vocabulary and the registry's argument vocabulary are kept in
//! sync. Adding an entity property needs a reformat-table entry, not a
//! change to the create/update logic.

use crate::api::{ApiArgs, RegistryApi};
use crate::backend::RelationalBackend;
use crate::cache::EntityCache;
use crate::config::DataConfig;
use crate::entity::{Context, Entity};
use crate::error::DataError;
use crate::query::DataQuery;
use crate::schema::Schema;
use crate::value::Value;
use std::sync::Arc;

/// What a [`DataStore::save`] actually did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveAction {
    /// The entity was transient and was created; carries the assigned id.
    Created(i64),
    /// An existing row (and/or its metadata) was updated.
    Updated,
    /// Nothing was dirty; no call was made.
    Unchanged,
}

/// Mapping from logical property names to the external registry's argument
/// names. Unmapped properties keep their logical name.
#[derive(Debug, Clone, Default)]
pub struct ReformatTable {
    map: Vec<(String, String)>,
}

impl ReformatTable {
    #[must_use]
    pub fn new(pairs: &[(&str, &str)]) -> Self {
        Self {
            map: pairs
                .iter()
                .map(|(from, to)| ((*from).to_owned(), (*to).to_owned()))
                .collect(),
        }
    }

    #[must_use]
    pub fn external_name<'a>(&'a self, logical: &'a str) -> &'a str {
        self.map
            .iter()
            .find(|(from, _)| from == logical)
            .map_or(logical, |(_, to)| to.as_str())
    }
}

/// CRUD over one entity type's physical table and metadata table,
/// reconciled with the external registry.
///
/// Concurrency: the store issues no transactions and assumes last-writer-wins
/// row semantics from the underlying database. The uniqueness pre-check is
/// racy by design (two concurrent creates can both pass it); a database-level
/// unique constraint is the hardening path.
pub struct DataStore {
    schema: Arc<Schema>,
    table: String,
    meta_table: String,
    backend: Arc<dyn RelationalBackend>,
    api: Arc<dyn RegistryApi>,
    cache: Arc<dyn EntityCache>,
    reformat: ReformatTable,
    namespace_prefix: String,
}

impl DataStore {
    pub fn new(
        schema: Arc<Schema>,
        config: &DataConfig,
        backend: Arc<dyn RelationalBackend>,
        api: Arc<dyn RegistryApi>,
        cache: Arc<dyn EntityCache>,
    ) -> Self {
        let table = schema.resolved_table(&config.table_prefix);
        let meta_table = schema.resolved_meta_table(&config.table_prefix);
        Self {
            schema,
            table,
            meta_table,
            backend,
            api,
            cache,
            reformat: ReformatTable::default(),
            namespace_prefix: String::new(),
        }
    }

    /// Install the external argument-name mapping.
    #[must_use]
    pub fn with_reformat(mut self, reformat: ReformatTable) -> Self {
        self.reformat = reformat;
        self
    }

    /// Namespace prefix the external system prepends to entity names
    /// (stripped before name lookups).
    #[must_use]
    pub fn with_namespace_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.namespace_prefix = prefix.into();
        self
    }

    #[must_use]
    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    #[must_use]
    pub fn table(&self) -> &str {
        &self.table
    }

    #[must_use]
    pub fn meta_table(&self) -> &str {
        &self.meta_table
    }

    pub(crate) fn backend(&self) -> &Arc<dyn RelationalBackend> {
        &self.backend
    }

    pub(crate) fn registry(&self) -> &Arc<dyn RegistryApi> {
        &self.api
    }

    /// Fresh transient entity of this store's type.
    #[must_use]
    pub fn new_entity(&self) -> Entity {
        Entity::new(Arc::clone(&self.schema))
    }

    /// Create the backing registry entry for a transient entity.
    ///
    /// On any failure before the registry call returns an id, the entity is
    /// left untouched: id stays `0` and the change set is retained so the
    /// caller can retry `save`.
    pub fn create(&self, entity: &mut Entity) -> Result<(), DataError> {
        let keys: Vec<&str> = self.schema.unique_keys().iter().map(String::as_str).collect();
        self.check_unique_keys(entity, &keys)?;

        let args = self.reformat(entity);
        let id = self.api.create(&args)?;
        if id <= 0 {
            return Err(DataError::ExternalApi(
                "create returned no id".to_owned(),
            ));
        }

        entity.set_id(id);
        self.commit_meta(entity)?;
        self.cache.invalidate(id);
        entity.apply_changes();
        log::debug!("created {} {id}", self.schema.data_type());
        Ok(())
    }

    /// Load the physical row and all metadata rows into the entity. The id
    /// must already be set.
    pub fn read(&self, entity: &mut Entity) -> Result<(), DataError> {
        let id = entity.id();
        let row = self
            .backend
            .get_row(&self.table, self.schema.id_field(), id)?
            .ok_or_else(|| DataError::NotFound {
                data_type: self.schema.data_type().to_owned(),
                id,
            })?;
        entity.hydrate_row(&row);

        let meta =
            self.backend
                .meta_read_all(&self.meta_table, self.schema.meta_owner_column(), id)?;
        entity.hydrate_meta(meta);
        Ok(())
    }

    /// Push changed core columns to the registry and commit buffered
    /// metadata.
    ///
    /// The registry call fires only when a declared column actually changed;
    /// metadata commits and cache invalidation run regardless, because
    /// metadata changes independently of core columns. If the registry
    /// rejects the update, the entity stays dirty and nothing else runs.
    pub fn update(&self, entity: &mut Entity) -> Result<(), DataError> {
        let id = entity.id();
        if id <= 0 {
            return Err(DataError::NotFound {
                data_type: self.schema.data_type().to_owned(),
                id,
            });
        }

        let changed: Vec<String> = entity
            .changes()
            .keys()
            .filter(|k| self.schema.has_column(k))
            .cloned()
            .collect();

        if !changed.is_empty() {
            let changed_unique: Vec<&str> = self
                .schema
                .unique_keys()
                .iter()
                .filter(|k| changed.iter().any(|c| c == *k))
                .map(String::as_str)
                .collect();
            self.check_unique_keys(entity, &changed_unique)?;

            let mut args = self.reformat(entity);
            args.remove("id");
            if !self.api.update(id, &args)? {
                return Err(DataError::ExternalApi(format!(
                    "update of {} {id} rejected",
                    self.schema.data_type()
                )));
            }
        }

        self.commit_meta(entity)?;
        self.cache.invalidate(id);
        entity.apply_changes();
        log::debug!("updated {} {id}", self.schema.data_type());
        Ok(())
    }

    /// Delete the registry entry and, on success, every metadata row. A
    /// rejected external deletion leaves the metadata in place.
    pub fn delete(&self, entity: &mut Entity) -> Result<(), DataError> {
        let id = entity.id();
        if id <= 0 {
            return Ok(());
        }
        if !self.api.delete(id) {
            return Err(DataError::ExternalApi(format!(
                "delete of {} {id} rejected",
                self.schema.data_type()
            )));
        }
        self.backend
            .meta_delete_all(&self.meta_table, self.schema.meta_owner_column(), id)?;
        self.cache.invalidate(id);
        entity.set_id(0);
        log::debug!("deleted {} {id}", self.schema.data_type());
        Ok(())
    }

    /// Create a transient entity, update a dirty one, skip a clean one.
    pub fn save(&self, entity: &mut Entity) -> Result<SaveAction, DataError> {
        if entity.id() == 0 {
            self.create(entity)?;
            Ok(SaveAction::Created(entity.id()))
        } else if entity.is_dirty() {
            self.update(entity)?;
            Ok(SaveAction::Updated)
        } else {
            Ok(SaveAction::Unchanged)
        }
    }

    /// Build the registry argument payload for a create/update.
    ///
    /// Core data is taken in edit context, each logical name mapped through
    /// the reformat table; every rename reads the original value (so a
    /// `label`→`name`, `name`→`slug` table cannot chain). Arguments holding
    /// an empty string are stripped: the registry rejects explicit
    /// empty-string values for optional fields.
    #[must_use]
    pub fn reformat(&self, entity: &Entity) -> ApiArgs {
        let mut args = ApiArgs::new();
        args.insert("id".to_owned(), Value::Int(entity.id()));
        for (logical, value) in entity.get_core_data(Context::Edit) {
            args.insert(self.reformat.external_name(&logical).to_owned(), value);
        }
        args.retain(|_, v| !v.is_empty_string());
        args
    }

    /// Whether no other row holds `value` in the given column.
    ///
    /// Accepts either the logical property or the already-prefixed physical
    /// column name. Fails closed: a backend error reports the value as
    /// taken.
    #[must_use]
    pub fn is_unique(&self, prop_or_column: &str, value: &Value, excluding_id: i64) -> bool {
        let column = if prop_or_column.starts_with(self.schema.column_prefix()) {
            prop_or_column.to_owned()
        } else {
            self.schema.physical_column(prop_or_column)
        };

        match self.backend.select_ids(
            &self.table,
            self.schema.id_field(),
            &[(column, value.clone())],
            self.schema.id_field(),
            None,
            0,
        ) {
            Ok(ids) => ids.into_iter().all(|id| id == excluding_id),
            Err(err) => {
                log::warn!(
                    "uniqueness check for {prop_or_column} failed, treating value as taken: {err}"
                );
                false
            }
        }
    }

    /// Look up one entity by its externally-supplied name, stripping the
    /// registry's namespace prefix first. `Ok(None)` when absent.
    pub fn find_by_name(&self, name: &str) -> Result<Option<Entity>, DataError> {
        let name = self.strip_namespace(name);
        if name.is_empty() {
            return Ok(None);
        }
        let entities = DataQuery::new(self).filter("name", name).per_page(1).objects()?;
        Ok(entities.into_iter().next())
    }

    /// Like [`find_by_name`](Self::find_by_name) but returning the bare id,
    /// `0` when absent.
    pub fn id_by_name(&self, name: &str) -> Result<i64, DataError> {
        let name = self.strip_namespace(name);
        if name.is_empty() {
            return Ok(0);
        }
        let ids = DataQuery::new(self).filter("name", name).per_page(1).ids()?;
        Ok(ids.first().copied().unwrap_or(0))
    }

    fn strip_namespace<'a>(&self, name: &'a str) -> &'a str {
        name.strip_prefix(self.namespace_prefix.as_str()).unwrap_or(name)
    }

    fn check_unique_keys(&self, entity: &Entity, keys: &[&str]) -> Result<(), DataError> {
        for key in keys {
            let value = entity.get(key, Context::Edit)?;
            if value.is_null() || value.is_empty_string() {
                continue;
            }
            if !self.is_unique(key, &value, entity.id()) {
                return Err(DataError::NonUnique {
                    property: (*key).to_owned(),
                    value: value.to_string(),
                });
            }
        }
        Ok(())
    }

    fn commit_meta(&self, entity: &mut Entity) -> Result<(), DataError> {
        let pending = entity.pending_meta();
        if pending.is_empty() {
            return Ok(());
        }
        for (key, value) in &pending {
            self.backend.meta_upsert(
                &self.meta_table,
                self.schema.meta_owner_column(),
                entity.id(),
                key,
                value,
            )?;
        }
        entity.clear_meta_changes();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::attribute_fixture;

    #[test]
    fn reformat_renames_from_original_values_and_strips_empties() {
        let fx = attribute_fixture();
        let mut entity = fx.attribute_tax.store.new_entity();
        entity.set("label", "Size").unwrap();
        entity.set("name", "size").unwrap();
        entity.set("public", 1i64).unwrap();

        let args = fx.attribute_tax.store.reformat(&entity);
        assert_eq!(args.get("name"), Some(&Value::from("Size")));
        assert_eq!(args.get("slug"), Some(&Value::from("size")));
        assert_eq!(args.get("public"), Some(&Value::Int(1)));
        assert!(!args.contains_key("label"));
        // orderby/type keep their defaults; nothing holds an empty string.
        assert!(args.values().all(|v| !v.is_empty_string()));
    }

    #[test]
    fn reformat_on_a_fresh_entity_has_no_empty_string_args() {
        let fx = attribute_fixture();
        let entity = fx.attribute_tax.store.new_entity();
        let args = fx.attribute_tax.store.reformat(&entity);
        // label and name default to "" and must be filtered out.
        assert!(!args.contains_key("name"));
        assert!(!args.contains_key("slug"));
        assert_eq!(args.get("id"), Some(&Value::Int(0)));
    }

    #[test]
    fn is_unique_prefixes_bare_property_names() {
        let fx = attribute_fixture();
        let mut entity = fx.attribute_tax.store.new_entity();
        entity.set("label", "Color").unwrap();
        entity.set("name", "color").unwrap();
        fx.attribute_tax.store.create(&mut entity).unwrap();

        let taken = Value::from("color");
        assert!(!fx.attribute_tax.store.is_unique("name", &taken, 0));
        assert!(!fx.attribute_tax.store.is_unique("attribute_name", &taken, 0));
        // The row itself is excluded when updating in place.
        assert!(fx.attribute_tax.store.is_unique("name", &taken, entity.id()));
        assert!(fx
            .attribute_tax
            .store
            .is_unique("name", &Value::from("material"), 0));
    }
}
