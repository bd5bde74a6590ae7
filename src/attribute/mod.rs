//! The attribute taxonomy: the concrete classification entity shipped with
//! the framework.
//!
//! Attribute taxonomies live partly in a dedicated typed table
//! (`{{prefix}}attribute_taxonomies`, columns prefixed `attribute_`), partly
//! in a key/value metadata table, and are mirrored into the host platform's
//! own attribute registry, which speaks a different vocabulary (`label`
//! becomes its `name` argument, `name` becomes its `slug`). Everything here
//! is expressed through the generic descriptor machinery; other entity
//! types follow the same pattern.

pub mod hooks;

use crate::api::{RegistryApi, RegistryEntry};
use crate::backend::RelationalBackend;
use crate::cache::{EntityCache, InstanceCache};
use crate::config::DataConfig;
use crate::entity::{Context, Entity};
use crate::error::DataError;
use crate::events::EventBus;
use crate::factory::{DataFactory, EntityRef};
use crate::migration::MetaTableMigration;
use crate::options::OptionStore;
use crate::schema::{Schema, SchemaRegistry};
use crate::store::{DataStore, ReformatTable, SaveAction};
use crate::value::{PropertyType, Value};
use crate::{entity_int_accessor, entity_string_accessor};
use once_cell::sync::Lazy;
use serde_json::Value as JsonValue;
use std::sync::Arc;

/// Data-type name under which the schema is registered.
pub const DATA_TYPE: &str = "attribute_tax";

/// Namespace prefix the host platform prepends to attribute taxonomy names.
pub const TAXONOMY_PREFIX: &str = "pa_";

/// Event the host registry fires after creating an attribute.
pub const ATTRIBUTE_ADDED_EVENT: &str = "attribute_added";

/// Argument-name mapping to the host registry's vocabulary.
static REFORMAT: Lazy<ReformatTable> =
    Lazy::new(|| ReformatTable::new(&[("label", "name"), ("name", "slug")]));

/// Schema descriptor for the attribute taxonomy.
pub fn schema() -> Result<Schema, DataError> {
    Schema::builder(DATA_TYPE)
        .table("{{prefix}}attribute_taxonomies")
        .id_field("attribute_id")
        .column("label", PropertyType::String)
        .column("name", PropertyType::String)
        .column_with_default("orderby", PropertyType::String, "menu_order")
        .column("public", PropertyType::Int)
        .column_with_default("type", PropertyType::String, "select")
        .column_prefix("attribute_")
        .meta_table("{{prefix}}attribute_taxonomymeta")
        .meta_owner_column("attribute_taxonomy_id")
        .unique_key("name")
        .order_by("name")
        .build()
}

/// The taxonomy name backing an attribute name (`color` → `pa_color`).
#[must_use]
pub fn taxonomy_name(name: &str) -> String {
    format!("{TAXONOMY_PREFIX}{name}")
}

/// One attribute taxonomy, bound to its data store.
#[derive(Clone)]
pub struct AttributeTax {
    entity: Entity,
    store: Arc<DataStore>,
}

impl AttributeTax {
    /// Fresh transient attribute.
    #[must_use]
    pub fn new(store: Arc<DataStore>) -> Self {
        Self {
            entity: store.new_entity(),
            store,
        }
    }

    pub(crate) fn from_entity(entity: Entity, store: Arc<DataStore>) -> Self {
        Self { entity, store }
    }

    #[must_use]
    pub fn entity(&self) -> &Entity {
        &self.entity
    }

    pub fn entity_mut(&mut self) -> &mut Entity {
        &mut self.entity
    }

    #[must_use]
    pub fn id(&self) -> i64 {
        self.entity.id()
    }

    // Accessor surface synthesized from the schema vocabulary.
    entity_string_accessor!("label", get_label, set_label);
    entity_string_accessor!("name", get_name, set_name);
    entity_string_accessor!("orderby", get_orderby, set_orderby);
    entity_int_accessor!("public", get_public, set_public);
    entity_string_accessor!("type", get_type, set_type);

    /// Backport for the id getter under its prefixed legacy name.
    #[must_use]
    pub fn get_attribute_id(&self) -> i64 {
        self.id()
    }

    /// Backport for the id setter under its prefixed legacy name.
    pub fn set_attribute_id(&mut self, id: i64) {
        self.entity.set_id(id);
    }

    /// All core data in the requested context (physical keys in `Db`).
    #[must_use]
    pub fn get_core_data(&self, context: Context) -> Vec<(String, Value)> {
        self.entity.get_core_data(context)
    }

    #[must_use]
    pub fn get_meta(&self, key: &str) -> Option<&JsonValue> {
        self.entity.get_meta(key)
    }

    pub fn set_meta(&mut self, key: &str, value: JsonValue) {
        self.entity.set_meta(key, value);
    }

    /// Persist: create when transient, update when dirty, no-op otherwise.
    pub fn save(&mut self) -> Result<SaveAction, DataError> {
        self.store.save(&mut self.entity)
    }

    /// Delete the registry entry and all metadata for this attribute.
    pub fn delete(&mut self) -> Result<(), DataError> {
        self.store.delete(&mut self.entity)
    }

    /// The backing taxonomy name (`pa_{name}`).
    #[must_use]
    pub fn taxonomy_name(&self) -> String {
        taxonomy_name(&self.get_name(Context::View))
    }

    /// The registry's value object for this attribute, keyed by the
    /// namespaced taxonomy name.
    #[must_use]
    pub fn to_registry_entry(&self) -> RegistryEntry {
        RegistryEntry {
            id: self.id(),
            name: self.taxonomy_name(),
        }
    }

    /// Get an attribute by label, creating it when absent.
    ///
    /// The freshly created attribute is re-read so registry-derived values
    /// (the generated slug in particular) land in core data.
    pub fn from_label(factory: &DataFactory, label: &str) -> Result<Self, DataError> {
        if let Some(entity) = factory.get(label) {
            return Ok(Self::from_entity(entity, Arc::clone(factory.store())));
        }

        let store = Arc::clone(factory.store());
        let mut att = Self::new(Arc::clone(&store));
        att.set_label(label)?;
        att.save()?;
        store.read(&mut att.entity)?;
        Ok(att)
    }
}

/// The registered attribute-taxonomy data type: its store and factory
/// pairing, produced by [`register`].
pub struct AttributeTaxType {
    pub store: Arc<DataStore>,
    pub factory: DataFactory,
}

impl AttributeTaxType {
    /// Resolve any identifier form and return the wrapped attribute, `None`
    /// on failure.
    #[must_use]
    pub fn get(&self, ident: impl Into<EntityRef>) -> Option<AttributeTax> {
        let entity = self.factory.get(ident)?;
        Some(AttributeTax::from_entity(entity, Arc::clone(&self.store)))
    }

    /// Hydrated attribute for an existing id; `NotFound` when absent.
    pub fn instance(&self, id: i64) -> Result<AttributeTax, DataError> {
        let entity = self.factory.get_instance(id)?;
        Ok(AttributeTax::from_entity(entity, Arc::clone(&self.store)))
    }

    /// Fresh transient attribute bound to this store.
    #[must_use]
    pub fn new_attribute(&self) -> AttributeTax {
        AttributeTax::new(Arc::clone(&self.store))
    }
}

/// Register the attribute-taxonomy data type at startup.
///
/// Validates and registers the schema, runs the metadata-table migration
/// bootstrap, attaches the taxonomy-registration event hook, and returns
/// the store/factory pairing.
pub fn register(
    registry: &mut SchemaRegistry,
    config: &DataConfig,
    backend: Arc<dyn RelationalBackend>,
    api: Arc<dyn RegistryApi>,
    flags: Arc<dyn OptionStore>,
    bus: &dyn EventBus,
) -> Result<AttributeTaxType, DataError> {
    let schema = registry.register(schema()?)?;

    MetaTableMigration::for_schema(&schema, config, Arc::clone(&backend), flags).bootstrap()?;

    hooks::attach(bus, Arc::clone(&api));

    let instances = Arc::new(InstanceCache::new());
    let store = Arc::new(
        DataStore::new(
            schema,
            config,
            backend,
            api,
            Arc::clone(&instances) as Arc<dyn EntityCache>,
        )
        .with_reformat(REFORMAT.clone())
        .with_namespace_prefix(TAXONOMY_PREFIX),
    );
    let factory = DataFactory::new(Arc::clone(&store), instances);

    Ok(AttributeTaxType { store, factory })
}
