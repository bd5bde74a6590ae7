//! Factory: heterogeneous identifier resolution and instance production.
//!
//! Callers hold ids, names, registry value objects or existing entities;
//! [`DataFactory::resolve_id`] collapses any of those to the canonical
//! numeric id, and [`DataFactory::get_instance`] produces a hydrated
//! [`Entity`]. Instances are memoized per id through the shared
//! [`InstanceCache`], which the data store invalidates on every write.

use crate::api::RegistryEntry;
use crate::cache::InstanceCache;
use crate::entity::Entity;
use crate::error::DataError;
use crate::query::DataQuery;
use crate::store::DataStore;
use std::sync::Arc;

/// An identifier of unknown shape.
///
/// Object forms (an existing entity, the registry's value object) collapse
/// to their id at conversion time; strings are resolved at lookup time with
/// a fixed precedence.
#[derive(Debug, Clone, PartialEq)]
pub enum EntityRef {
    Id(i64),
    Name(String),
}

impl From<i64> for EntityRef {
    fn from(id: i64) -> Self {
        EntityRef::Id(id)
    }
}

impl From<i32> for EntityRef {
    fn from(id: i32) -> Self {
        EntityRef::Id(i64::from(id))
    }
}

impl From<&str> for EntityRef {
    fn from(name: &str) -> Self {
        EntityRef::Name(name.to_owned())
    }
}

impl From<String> for EntityRef {
    fn from(name: String) -> Self {
        EntityRef::Name(name)
    }
}

impl From<&Entity> for EntityRef {
    fn from(entity: &Entity) -> Self {
        EntityRef::Id(entity.id())
    }
}

impl From<&RegistryEntry> for EntityRef {
    fn from(entry: &RegistryEntry) -> Self {
        EntityRef::Id(entry.id)
    }
}

/// Produces entities for one data type.
pub struct DataFactory {
    store: Arc<DataStore>,
    instances: Arc<InstanceCache>,
}

impl DataFactory {
    pub fn new(store: Arc<DataStore>, instances: Arc<InstanceCache>) -> Self {
        Self { store, instances }
    }

    #[must_use]
    pub fn store(&self) -> &Arc<DataStore> {
        &self.store
    }

    /// Resolve an identifier to a canonical id.
    ///
    /// Strings are looked up by exact external-registry name first and only
    /// then by the `label` property; names are expected unique, labels are
    /// a convenience path. Unresolvable identifiers yield `None`.
    #[must_use]
    pub fn resolve_id(&self, ident: impl Into<EntityRef>) -> Option<i64> {
        match ident.into() {
            EntityRef::Id(id) => Some(id),
            EntityRef::Name(name) => match self.id_by_string(&name) {
                0 => None,
                id => Some(id),
            },
        }
    }

    /// Hydrated entity for an existing id; [`DataError::NotFound`] when no
    /// row exists.
    pub fn get_instance(&self, id: i64) -> Result<Entity, DataError> {
        if id <= 0 {
            return Err(DataError::NotFound {
                data_type: self.store.schema().data_type().to_owned(),
                id,
            });
        }
        let mut entity = self.store.new_entity();
        entity.set_id(id);
        self.store.read(&mut entity)?;
        Ok(entity)
    }

    /// Resolve and hydrate in one step; `None` on any failure. Hydrated
    /// instances are memoized until the store invalidates them.
    #[must_use]
    pub fn get(&self, ident: impl Into<EntityRef>) -> Option<Entity> {
        let id = self.resolve_id(ident)?;
        if let Some(cached) = self.instances.get(id) {
            return Some(cached);
        }
        match self.get_instance(id) {
            Ok(entity) => {
                self.instances.put(&entity);
                Some(entity)
            }
            Err(_) => None,
        }
    }

    /// Registry name lookup first, label query fallback second. `0` when
    /// both miss.
    fn id_by_string(&self, ident: &str) -> i64 {
        let id = self.store.registry().id_by_name(ident);
        if id > 0 {
            return id;
        }
        DataQuery::new(&self.store)
            .filter("label", ident)
            .per_page(1)
            .ids()
            .ok()
            .and_then(|ids| ids.first().copied())
            .unwrap_or(0)
    }
}
