//! Declarative schema descriptors and the startup registry.
//!
//! A [`Schema`] is pure data: it names the physical table, the id column,
//! the ordered typed columns with their prefix, the metadata table, and the
//! unique keys. It is built once through [`SchemaBuilder`], validated at
//! build time, and never mutated afterwards. The [`SchemaRegistry`] is the
//! explicit startup-built map from data-type name to descriptor that the
//! data store and factory constructors consume.

use crate::error::DataError;
use crate::value::{PropertyType, Value};
use std::collections::HashMap;
use std::sync::Arc;

/// Placeholder in physical table names resolved to the active database
/// prefix at store construction time.
pub const TABLE_PREFIX_PLACEHOLDER: &str = "{{prefix}}";

/// One declared core column.
#[derive(Debug, Clone)]
pub struct ColumnDef {
    /// Logical property name (unprefixed).
    pub name: String,
    /// Primitive column type.
    pub ty: PropertyType,
    /// Declared default, if any. Columns without one start at the type's
    /// zero value.
    pub default: Option<Value>,
}

impl ColumnDef {
    /// The initial value for a fresh entity.
    #[must_use]
    pub fn initial_value(&self) -> Value {
        self.default
            .clone()
            .unwrap_or_else(|| self.ty.default_value())
    }
}

/// Immutable descriptor for one entity type.
#[derive(Debug, Clone)]
pub struct Schema {
    data_type: String,
    table: String,
    id_field: String,
    columns: Vec<ColumnDef>,
    column_prefix: String,
    meta_table: String,
    meta_owner_column: String,
    unique_keys: Vec<String>,
    order_by: Option<String>,
}

impl Schema {
    /// Start building a descriptor for the named data type.
    #[must_use]
    pub fn builder(data_type: impl Into<String>) -> SchemaBuilder {
        SchemaBuilder::new(data_type)
    }

    #[must_use]
    pub fn data_type(&self) -> &str {
        &self.data_type
    }

    #[must_use]
    pub fn id_field(&self) -> &str {
        &self.id_field
    }

    #[must_use]
    pub fn columns(&self) -> &[ColumnDef] {
        &self.columns
    }

    #[must_use]
    pub fn column_prefix(&self) -> &str {
        &self.column_prefix
    }

    #[must_use]
    pub fn meta_owner_column(&self) -> &str {
        &self.meta_owner_column
    }

    #[must_use]
    pub fn unique_keys(&self) -> &[String] {
        &self.unique_keys
    }

    /// Look up a declared column by logical name.
    #[must_use]
    pub fn column(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.name == name)
    }

    #[must_use]
    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    /// Physical column name for a logical property.
    #[must_use]
    pub fn physical_column(&self, logical: &str) -> String {
        format!("{}{}", self.column_prefix, logical)
    }

    /// Strip the column prefix from a physical name, returning the logical
    /// property when the result is a declared column.
    #[must_use]
    pub fn logical_property<'a>(&self, physical: &'a str) -> Option<&'a str> {
        physical
            .strip_prefix(self.column_prefix.as_str())
            .filter(|stripped| self.has_column(stripped))
    }

    /// Physical table name with the `{{prefix}}` placeholder resolved.
    #[must_use]
    pub fn resolved_table(&self, prefix: &str) -> String {
        self.table.replace(TABLE_PREFIX_PLACEHOLDER, prefix)
    }

    /// Metadata table name with the `{{prefix}}` placeholder resolved.
    #[must_use]
    pub fn resolved_meta_table(&self, prefix: &str) -> String {
        self.meta_table.replace(TABLE_PREFIX_PLACEHOLDER, prefix)
    }

    /// Physical column queries order by when the caller does not override
    /// it: the declared ordering column, or the id field.
    #[must_use]
    pub fn default_order_column(&self) -> String {
        match &self.order_by {
            Some(logical) if self.has_column(logical) => self.physical_column(logical),
            Some(physical) => physical.clone(),
            None => self.id_field.clone(),
        }
    }
}

/// Builder for [`Schema`], validated on [`build`](SchemaBuilder::build).
#[derive(Debug, Default)]
pub struct SchemaBuilder {
    data_type: String,
    table: Option<String>,
    id_field: Option<String>,
    columns: Vec<ColumnDef>,
    column_prefix: String,
    meta_table: Option<String>,
    meta_owner_column: Option<String>,
    unique_keys: Vec<String>,
    order_by: Option<String>,
}

impl SchemaBuilder {
    fn new(data_type: impl Into<String>) -> Self {
        Self {
            data_type: data_type.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    #[must_use]
    pub fn id_field(mut self, id_field: impl Into<String>) -> Self {
        self.id_field = Some(id_field.into());
        self
    }

    /// Declare a column with no default.
    #[must_use]
    pub fn column(mut self, name: impl Into<String>, ty: PropertyType) -> Self {
        self.columns.push(ColumnDef {
            name: name.into(),
            ty,
            default: None,
        });
        self
    }

    /// Declare a column with a default value.
    #[must_use]
    pub fn column_with_default(
        mut self,
        name: impl Into<String>,
        ty: PropertyType,
        default: impl Into<Value>,
    ) -> Self {
        self.columns.push(ColumnDef {
            name: name.into(),
            ty,
            default: Some(default.into()),
        });
        self
    }

    #[must_use]
    pub fn column_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.column_prefix = prefix.into();
        self
    }

    #[must_use]
    pub fn meta_table(mut self, table: impl Into<String>) -> Self {
        self.meta_table = Some(table.into());
        self
    }

    #[must_use]
    pub fn meta_owner_column(mut self, column: impl Into<String>) -> Self {
        self.meta_owner_column = Some(column.into());
        self
    }

    /// Mark a declared column as unique across all rows.
    #[must_use]
    pub fn unique_key(mut self, name: impl Into<String>) -> Self {
        self.unique_keys.push(name.into());
        self
    }

    /// Default ordering column for queries (logical name).
    #[must_use]
    pub fn order_by(mut self, column: impl Into<String>) -> Self {
        self.order_by = Some(column.into());
        self
    }

    /// Validate and freeze the descriptor.
    pub fn build(self) -> Result<Schema, DataError> {
        let table = self
            .table
            .filter(|t| !t.is_empty())
            .ok_or_else(|| DataError::Schema(format!("{}: missing table", self.data_type)))?;
        let id_field = self
            .id_field
            .filter(|f| !f.is_empty())
            .ok_or_else(|| DataError::Schema(format!("{}: missing id_field", self.data_type)))?;

        for key in &self.unique_keys {
            if !self.columns.iter().any(|c| &c.name == key) {
                return Err(DataError::Schema(format!(
                    "{}: unique key {key} is not a declared column",
                    self.data_type
                )));
            }
        }

        let meta_table = self.meta_table.unwrap_or_else(|| format!("{table}meta"));
        let meta_owner_column = self
            .meta_owner_column
            .unwrap_or_else(|| format!("{}_id", self.data_type));

        Ok(Schema {
            data_type: self.data_type,
            table,
            id_field,
            columns: self.columns,
            column_prefix: self.column_prefix,
            meta_table,
            meta_owner_column,
            unique_keys: self.unique_keys,
            order_by: self.order_by,
        })
    }
}

/// Explicit registry of entity-type descriptors, built once at startup and
/// handed to the store/factory constructors.
#[derive(Debug, Default)]
pub struct SchemaRegistry {
    types: HashMap<String, Arc<Schema>>,
}

impl SchemaRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a descriptor under its data-type name. Re-registering a
    /// name is rejected: descriptors are singletons per type.
    pub fn register(&mut self, schema: Schema) -> Result<Arc<Schema>, DataError> {
        let name = schema.data_type().to_owned();
        if self.types.contains_key(&name) {
            return Err(DataError::Schema(format!(
                "data type {name} is already registered"
            )));
        }
        let schema = Arc::new(schema);
        self.types.insert(name, Arc::clone(&schema));
        Ok(schema)
    }

    #[must_use]
    pub fn get(&self, data_type: &str) -> Option<Arc<Schema>> {
        self.types.get(data_type).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Schema {
        Schema::builder("thing")
            .table("{{prefix}}things")
            .id_field("thing_id")
            .column("label", PropertyType::String)
            .column_with_default("kind", PropertyType::String, "plain")
            .column("rank", PropertyType::Int)
            .column_prefix("thing_")
            .meta_table("{{prefix}}thingmeta")
            .meta_owner_column("thing_id")
            .unique_key("label")
            .build()
            .unwrap()
    }

    #[test]
    fn build_rejects_missing_table_and_id_field() {
        let err = Schema::builder("thing").id_field("id").build().unwrap_err();
        assert!(matches!(err, DataError::Schema(ref m) if m.contains("table")));

        let err = Schema::builder("thing").table("t").build().unwrap_err();
        assert!(matches!(err, DataError::Schema(ref m) if m.contains("id_field")));
    }

    #[test]
    fn build_rejects_undeclared_unique_key() {
        let err = Schema::builder("thing")
            .table("t")
            .id_field("id")
            .unique_key("nope")
            .build()
            .unwrap_err();
        assert!(matches!(err, DataError::Schema(_)));
    }

    #[test]
    fn prefix_mapping_round_trips() {
        let schema = sample();
        assert_eq!(schema.physical_column("label"), "thing_label");
        assert_eq!(schema.logical_property("thing_label"), Some("label"));
        // Prefixed but undeclared names do not resolve.
        assert_eq!(schema.logical_property("thing_bogus"), None);
        assert_eq!(schema.logical_property("label"), None);
    }

    #[test]
    fn table_prefix_placeholder_resolves() {
        let schema = sample();
        assert_eq!(schema.resolved_table("wp_"), "wp_things");
        assert_eq!(schema.resolved_meta_table("wp_"), "wp_thingmeta");
    }

    #[test]
    fn default_order_column_falls_back_to_id() {
        let schema = sample();
        assert_eq!(schema.default_order_column(), "thing_id");

        let ordered = Schema::builder("thing")
            .table("t")
            .id_field("thing_id")
            .column("label", PropertyType::String)
            .column_prefix("thing_")
            .order_by("label")
            .build()
            .unwrap();
        assert_eq!(ordered.default_order_column(), "thing_label");
    }

    #[test]
    fn registry_rejects_duplicates() {
        let mut registry = SchemaRegistry::new();
        registry.register(sample()).unwrap();
        assert!(registry.get("thing").is_some());
        assert!(registry.register(sample()).is_err());
    }
}
