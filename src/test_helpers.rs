//! Shared test fixtures: an in-memory rendition of the host platform.
//!
//! [`StubRegistry`] plays the external registry: it owns the core row the
//! way the real one does, writing through the same [`MemoryBackend`] the
//! store reads from, speaking the registry argument vocabulary (`name`,
//! `slug`, ...) and firing the post-creation event. [`attribute_fixture`]
//! wires a complete attribute-taxonomy stack around it.

use crate::api::{ApiArgs, ApiError, RegistryApi};
use crate::attribute::{self, AttributeTaxType, ATTRIBUTE_ADDED_EVENT, TAXONOMY_PREFIX};
use crate::backend::{MemoryBackend, RelationalBackend, Row};
use crate::config::DataConfig;
use crate::events::{EventPayload, SyncEventBus};
use crate::options::MemoryOptionStore;
use crate::schema::SchemaRegistry;
use crate::value::Value;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// In-memory stand-in for the host platform's attribute registry.
///
/// Shares the relational backend with the store under test so that rows the
/// "registry" writes are immediately visible to store reads, mirroring the
/// production arrangement where both sides hit the same table.
pub struct StubRegistry {
    backend: Arc<MemoryBackend>,
    table: String,
    id_field: String,
    bus: Mutex<Option<Arc<SyncEventBus>>>,
    creates: AtomicUsize,
    updates: AtomicUsize,
    deletes: AtomicUsize,
    pub fail_creates: AtomicBool,
    pub fail_updates: AtomicBool,
    taxonomies: Mutex<Vec<(String, String)>>,
}

impl StubRegistry {
    #[must_use]
    pub fn new(backend: Arc<MemoryBackend>, config: &DataConfig) -> Self {
        Self {
            backend,
            table: format!("{}attribute_taxonomies", config.table_prefix),
            id_field: "attribute_id".to_owned(),
            bus: Mutex::new(None),
            creates: AtomicUsize::new(0),
            updates: AtomicUsize::new(0),
            deletes: AtomicUsize::new(0),
            fail_creates: AtomicBool::new(false),
            fail_updates: AtomicBool::new(false),
            taxonomies: Mutex::new(Vec::new()),
        }
    }

    /// Bus to fire the post-creation event on.
    pub fn attach_bus(&self, bus: Arc<SyncEventBus>) {
        *self.bus.lock().unwrap() = Some(bus);
    }

    #[must_use]
    pub fn creates(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn updates(&self) -> usize {
        self.updates.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn deletes(&self) -> usize {
        self.deletes.load(Ordering::SeqCst)
    }

    /// Names of the taxonomies registered through [`RegistryApi::register_taxonomy`].
    #[must_use]
    pub fn registered_taxonomies(&self) -> Vec<String> {
        self.taxonomies
            .lock()
            .unwrap()
            .iter()
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Registry argument name to physical column. The registry's `name` is
    /// the display label; its `slug` is the attribute name.
    fn column_for(arg: &str) -> Option<String> {
        match arg {
            "id" => None,
            "name" => Some("attribute_label".to_owned()),
            "slug" => Some("attribute_name".to_owned()),
            other => Some(format!("attribute_{other}")),
        }
    }

    fn row_for(args: &ApiArgs) -> Row {
        args.iter()
            .filter_map(|(arg, value)| Self::column_for(arg).map(|col| (col, value.clone())))
            .collect()
    }

    /// The slug the registry generates when none is supplied: lowercased,
    /// whitespace collapsed to dashes.
    fn derive_slug(label: &str) -> String {
        label
            .to_lowercase()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join("-")
    }
}

impl RegistryApi for StubRegistry {
    fn create(&self, args: &ApiArgs) -> Result<i64, ApiError> {
        self.creates.fetch_add(1, Ordering::SeqCst);
        if self.fail_creates.load(Ordering::SeqCst) {
            return Err(ApiError::new("create disabled"));
        }

        let mut row = Self::row_for(args);
        let label = args
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_owned();
        if !row.contains_key("attribute_name") {
            row.insert(
                "attribute_name".to_owned(),
                Value::from(Self::derive_slug(&label)),
            );
        }
        let slug = row
            .get("attribute_name")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_owned();

        let id = self
            .backend
            .insert_row(&self.table, &self.id_field, row)
            .map_err(|e| ApiError::new(e.to_string()))?;

        if let Some(bus) = self.bus.lock().unwrap().as_ref() {
            use crate::events::EventBus;
            let payload = EventPayload::new(id)
                .with_field("attribute_name", slug)
                .with_field("attribute_label", label);
            bus.emit(ATTRIBUTE_ADDED_EVENT, &payload);
        }
        Ok(id)
    }

    fn update(&self, id: i64, args: &ApiArgs) -> Result<bool, ApiError> {
        self.updates.fetch_add(1, Ordering::SeqCst);
        if self.fail_updates.load(Ordering::SeqCst) {
            return Ok(false);
        }
        self.backend
            .update_row(&self.table, &self.id_field, id, Self::row_for(args))
            .map_err(|e| ApiError::new(e.to_string()))?;
        Ok(true)
    }

    fn delete(&self, id: i64) -> bool {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        match self.backend.get_row(&self.table, &self.id_field, id) {
            Ok(Some(_)) => self
                .backend
                .delete_row(&self.table, &self.id_field, id)
                .is_ok(),
            _ => false,
        }
    }

    fn id_by_name(&self, name: &str) -> i64 {
        let name = name.strip_prefix(TAXONOMY_PREFIX).unwrap_or(name);
        self.backend
            .select_ids(
                &self.table,
                &self.id_field,
                &[("attribute_name".to_owned(), Value::from(name))],
                &self.id_field,
                Some(1),
                0,
            )
            .ok()
            .and_then(|ids| ids.first().copied())
            .unwrap_or(0)
    }

    fn taxonomy_exists(&self, taxonomy: &str) -> bool {
        self.taxonomies
            .lock()
            .unwrap()
            .iter()
            .any(|(name, _)| name == taxonomy)
    }

    fn register_taxonomy(
        &self,
        taxonomy: &str,
        label: &str,
        _hierarchical: bool,
    ) -> Result<(), ApiError> {
        self.taxonomies
            .lock()
            .unwrap()
            .push((taxonomy.to_owned(), label.to_owned()));
        Ok(())
    }
}

/// One fully wired attribute-taxonomy stack over in-memory collaborators.
pub struct Fixture {
    pub backend: Arc<MemoryBackend>,
    pub api: Arc<StubRegistry>,
    pub bus: Arc<SyncEventBus>,
    pub flags: Arc<MemoryOptionStore>,
    pub attribute_tax: AttributeTaxType,
}

/// Build the standard fixture: memory backend, stub registry sharing it,
/// event bus, flag store, and the registered attribute-taxonomy type.
#[must_use]
pub fn attribute_fixture() -> Fixture {
    let config = DataConfig::with_prefix("xt_");
    let backend = Arc::new(MemoryBackend::new());
    let bus = Arc::new(SyncEventBus::new());
    let api = Arc::new(StubRegistry::new(Arc::clone(&backend), &config));
    api.attach_bus(Arc::clone(&bus));
    let flags = Arc::new(MemoryOptionStore::new());

    let mut registry = SchemaRegistry::new();
    let attribute_tax = attribute::register(
        &mut registry,
        &config,
        Arc::clone(&backend) as Arc<dyn RelationalBackend>,
        Arc::clone(&api) as Arc<dyn RegistryApi>,
        Arc::clone(&flags) as Arc<dyn crate::options::OptionStore>,
        bus.as_ref(),
    )
    .expect("fixture registration");

    Fixture {
        backend,
        api,
        bus,
        flags,
        attribute_tax,
    }
}

/// Create an attribute through the store, returning its assigned id.
pub fn seed_attribute(fx: &Fixture, label: &str, name: &str) -> i64 {
    let mut entity = fx.attribute_tax.store.new_entity();
    entity.set("label", label).expect("seed label");
    entity.set("name", name).expect("seed name");
    fx.attribute_tax.store.create(&mut entity).expect("seed create");
    entity.id()
}
