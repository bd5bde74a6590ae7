//! In-memory entity with context-sensitive accessors and change tracking.
//!
//! An [`Entity`] holds three buckets: *core data* (values for the columns its
//! [`Schema`](crate::schema::Schema) declares), *metadata* (open-ended
//! key/value pairs destined for the auxiliary meta table), and *changes* (the
//! core properties mutated since load or last save). The change set is what
//! lets the store skip redundant writes and redundant external-registry
//! calls.

use crate::backend::Row;
use crate::error::DataError;
use crate::schema::Schema;
use crate::value::Value;
use serde_json::Value as JsonValue;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

/// Accessor context.
///
/// `View` and `Edit` both return the logical value (view is where a concrete
/// entity type applies display transforms); `Db` is used when building a
/// write and keys core data by physical column name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Context {
    View,
    Edit,
    Db,
}

enum Slot<'a> {
    Core(&'a str),
    Meta(&'a str),
}

/// One in-memory row of the entity table plus its metadata.
///
/// Identity is the numeric id; `0` means transient (never persisted).
#[derive(Debug, Clone)]
pub struct Entity {
    schema: Arc<Schema>,
    id: i64,
    data: HashMap<String, Value>,
    changes: HashMap<String, Value>,
    meta: BTreeMap<String, JsonValue>,
    meta_changes: BTreeSet<String>,
}

impl Entity {
    /// Create a transient entity with every declared column at its initial
    /// value.
    #[must_use]
    pub fn new(schema: Arc<Schema>) -> Self {
        let data = schema
            .columns()
            .iter()
            .map(|c| (c.name.clone(), c.initial_value()))
            .collect();
        Self {
            schema,
            id: 0,
            data,
            changes: HashMap::new(),
            meta: BTreeMap::new(),
            meta_changes: BTreeSet::new(),
        }
    }

    #[must_use]
    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    #[must_use]
    pub fn id(&self) -> i64 {
        self.id
    }

    pub fn set_id(&mut self, id: i64) {
        self.id = id;
    }

    /// Resolve a caller-supplied property name to its bucket.
    ///
    /// Declared columns match by logical name or by prefixed physical name
    /// (the legacy accessor vocabulary some collaborators still use).
    /// The id field and empty names are reserved; anything else is metadata.
    fn resolve<'a>(&self, property: &'a str) -> Result<Slot<'a>, DataError> {
        if property.is_empty() || property == self.schema.id_field() || property == "id" {
            return Err(DataError::InvalidProperty(property.to_owned()));
        }
        if self.schema.has_column(property) {
            return Ok(Slot::Core(property));
        }
        if let Some(logical) = self.schema.logical_property(property) {
            return Ok(Slot::Core(logical));
        }
        Ok(Slot::Meta(property))
    }

    /// Current value of a core property, reading uncommitted changes first.
    fn core_value(&self, logical: &str) -> Value {
        self.changes
            .get(logical)
            .or_else(|| self.data.get(logical))
            .cloned()
            .unwrap_or(Value::Null)
    }

    /// Get a property value in the requested context.
    ///
    /// Unknown properties fall through to the metadata bucket; a property
    /// present in neither is an [`DataError::InvalidProperty`].
    pub fn get(&self, property: &str, _context: Context) -> Result<Value, DataError> {
        match self.resolve(property)? {
            Slot::Core(logical) => Ok(self.core_value(logical)),
            Slot::Meta(key) => self
                .meta
                .get(key)
                .map(json_to_value)
                .ok_or_else(|| DataError::InvalidProperty(property.to_owned())),
        }
    }

    /// Set a property, recording it in the change set when it differs from
    /// the last-persisted value. Non-column properties are buffered as
    /// metadata.
    pub fn set(&mut self, property: &str, value: impl Into<Value>) -> Result<(), DataError> {
        let value = value.into();
        match self.resolve(property)? {
            Slot::Core(logical) => {
                let logical = logical.to_owned();
                let ty = self
                    .schema
                    .column(&logical)
                    .map(|c| c.ty)
                    .ok_or_else(|| DataError::InvalidProperty(property.to_owned()))?;
                let value = value.coerce(ty);
                if self.changes.contains_key(&logical)
                    || self.data.get(&logical) != Some(&value)
                {
                    self.changes.insert(logical, value);
                }
                Ok(())
            }
            Slot::Meta(key) => {
                let key = key.to_owned();
                self.set_meta(&key, value.into_json());
                Ok(())
            }
        }
    }

    /// All core-data values in schema order.
    ///
    /// In `Db` context the keys are the physical (prefixed) column names,
    /// the exact payload shape written to the entity table.
    #[must_use]
    pub fn get_core_data(&self, context: Context) -> Vec<(String, Value)> {
        self.schema
            .columns()
            .iter()
            .map(|col| {
                let key = match context {
                    Context::Db => self.schema.physical_column(&col.name),
                    Context::View | Context::Edit => col.name.clone(),
                };
                (key, self.core_value(&col.name))
            })
            .collect()
    }

    /// Core properties mutated since load or last save.
    #[must_use]
    pub fn changes(&self) -> &HashMap<String, Value> {
        &self.changes
    }

    /// Whether a save would have anything to write.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        !self.changes.is_empty() || !self.meta_changes.is_empty()
    }

    /// Fold uncommitted core changes into committed data and clear the
    /// change set. Called by the store after a successful create/update.
    pub fn apply_changes(&mut self) {
        for (prop, value) in self.changes.drain() {
            self.data.insert(prop, value);
        }
    }

    /// Read a metadata value.
    #[must_use]
    pub fn get_meta(&self, key: &str) -> Option<&JsonValue> {
        self.meta.get(key)
    }

    /// Buffer a metadata write; committed to the meta table on save.
    pub fn set_meta(&mut self, key: &str, value: JsonValue) {
        if self.meta.get(key) != Some(&value) {
            self.meta.insert(key.to_owned(), value);
            self.meta_changes.insert(key.to_owned());
        }
    }

    /// All metadata pairs.
    #[must_use]
    pub fn meta(&self) -> &BTreeMap<String, JsonValue> {
        &self.meta
    }

    /// Buffered metadata writes awaiting commit.
    pub(crate) fn pending_meta(&self) -> Vec<(String, JsonValue)> {
        self.meta_changes
            .iter()
            .filter_map(|key| self.meta.get(key).map(|v| (key.clone(), v.clone())))
            .collect()
    }

    pub(crate) fn clear_meta_changes(&mut self) {
        self.meta_changes.clear();
    }

    /// Populate core data from a physical row, resetting the change set.
    pub(crate) fn hydrate_row(&mut self, row: &Row) {
        for col in self.schema.columns().iter() {
            let physical = self.schema.physical_column(&col.name);
            let value = row
                .get(&physical)
                .cloned()
                .map(|v| v.coerce(col.ty))
                .unwrap_or_else(|| col.initial_value());
            self.data.insert(col.name.clone(), value);
        }
        self.changes.clear();
    }

    /// Populate metadata from the meta table, resetting pending writes.
    pub(crate) fn hydrate_meta(&mut self, rows: Vec<(String, JsonValue)>) {
        self.meta = rows.into_iter().collect();
        self.meta_changes.clear();
    }
}

fn json_to_value(json: &JsonValue) -> Value {
    match json {
        JsonValue::Null => Value::Null,
        JsonValue::Bool(b) => Value::Bool(*b),
        JsonValue::Number(n) => Value::Int(n.as_i64().unwrap_or(0)),
        JsonValue::String(s) => Value::Str(s.clone()),
        // Structured metadata reads back as its JSON text.
        other => Value::Str(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::PropertyType;

    fn schema() -> Arc<Schema> {
        Arc::new(
            Schema::builder("attribute_tax")
                .table("{{prefix}}attribute_taxonomies")
                .id_field("attribute_id")
                .column("label", PropertyType::String)
                .column("name", PropertyType::String)
                .column_with_default("orderby", PropertyType::String, "menu_order")
                .column("public", PropertyType::Int)
                .column_with_default("type", PropertyType::String, "select")
                .column_prefix("attribute_")
                .unique_key("name")
                .build()
                .unwrap(),
        )
    }

    #[test]
    fn new_entity_starts_with_defaults_and_id_zero() {
        let entity = Entity::new(schema());
        assert_eq!(entity.id(), 0);
        assert_eq!(
            entity.get("orderby", Context::View).unwrap(),
            Value::from("menu_order")
        );
        assert_eq!(entity.get("type", Context::View).unwrap(), Value::from("select"));
        assert_eq!(entity.get("public", Context::View).unwrap(), Value::Int(0));
        assert!(!entity.is_dirty());
    }

    #[test]
    fn set_tracks_changes_and_skips_no_ops() {
        let mut entity = Entity::new(schema());
        entity.set("label", "Color").unwrap();
        assert!(entity.changes().contains_key("label"));

        // Setting the default back is not a change.
        let mut fresh = Entity::new(schema());
        fresh.set("orderby", "menu_order").unwrap();
        assert!(fresh.changes().is_empty());

        entity.apply_changes();
        assert!(entity.changes().is_empty());
        assert_eq!(
            entity.get("label", Context::Edit).unwrap(),
            Value::from("Color")
        );
    }

    #[test]
    fn prefixed_property_names_route_to_the_logical_column() {
        let mut entity = Entity::new(schema());
        entity.set("attribute_label", "Size").unwrap();
        assert_eq!(
            entity.get("label", Context::Edit).unwrap(),
            Value::from("Size")
        );
        assert_eq!(
            entity.get("attribute_label", Context::Edit).unwrap(),
            Value::from("Size")
        );
    }

    #[test]
    fn reserved_and_empty_names_are_invalid() {
        let mut entity = Entity::new(schema());
        assert!(matches!(
            entity.set("attribute_id", 5i64),
            Err(DataError::InvalidProperty(_))
        ));
        assert!(matches!(
            entity.set("", "x"),
            Err(DataError::InvalidProperty(_))
        ));
        assert!(matches!(
            entity.get("nope", Context::View),
            Err(DataError::InvalidProperty(_))
        ));
    }

    #[test]
    fn undeclared_properties_are_buffered_as_metadata() {
        let mut entity = Entity::new(schema());
        entity.set("swatch_color", "#ff0000").unwrap();
        assert_eq!(
            entity.get_meta("swatch_color"),
            Some(&JsonValue::from("#ff0000"))
        );
        assert_eq!(
            entity.get("swatch_color", Context::View).unwrap(),
            Value::from("#ff0000")
        );
        assert!(entity.is_dirty());
        assert_eq!(entity.pending_meta().len(), 1);
    }

    #[test]
    fn db_context_core_data_uses_prefixed_keys_with_identical_values() {
        let mut entity = Entity::new(schema());
        entity.set("label", "Color").unwrap();
        entity.set("name", "color").unwrap();

        let view = entity.get_core_data(Context::View);
        let db = entity.get_core_data(Context::Db);
        assert_eq!(view.len(), db.len());
        for ((vk, vv), (dk, dv)) in view.iter().zip(db.iter()) {
            assert_eq!(dk, &format!("attribute_{vk}"));
            assert_eq!(vv, dv);
        }
    }

    #[test]
    fn int_columns_coerce_on_set() {
        let mut entity = Entity::new(schema());
        entity.set("public", "1").unwrap();
        assert_eq!(entity.get("public", Context::Edit).unwrap(), Value::Int(1));
    }
}
