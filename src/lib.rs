//! extdata: declarative entity persistence with metadata tables and
//! external-registry synchronization.
//!
//! The framework persists entity types that live in three places at once: a
//! dedicated typed table, an open-ended key/value metadata table, and a
//! pre-existing external registry that remains the system of record for the
//! core row. A [`schema::Schema`] describes the type declaratively; the
//! [`entity::Entity`] tracks changes in memory; the [`store::DataStore`]
//! reconciles writes with the registry through the [`api::RegistryApi`] seam
//! and owns the metadata table; [`factory::DataFactory`] and
//! [`query::DataQuery`] produce instances. The [`attribute`] module is the
//! concrete attribute-taxonomy type built on all of it.
//!
//! Collaborators are trait seams ([`backend::RelationalBackend`],
//! [`api::RegistryApi`], [`options::OptionStore`], [`events::EventBus`],
//! [`cache::EntityCache`]) with in-memory implementations for embedding and
//! testing.
//!
//! ```
//! use extdata::test_helpers::attribute_fixture;
//! use extdata::entity::Context;
//!
//! let fx = attribute_fixture();
//! let mut att = fx.attribute_tax.new_attribute();
//! att.set_label("Color").unwrap();
//! att.set_name("color").unwrap();
//! att.save().unwrap();
//!
//! let again = fx.attribute_tax.get("color").unwrap();
//! assert_eq!(again.get_label(Context::View), "Color");
//! ```

pub mod api;
pub mod attribute;
pub mod backend;
pub mod cache;
pub mod config;
pub mod entity;
pub mod error;
pub mod events;
pub mod factory;
#[macro_use]
pub mod macros;
pub mod migration;
pub mod options;
pub mod query;
pub mod schema;
pub mod store;
pub mod test_helpers;
pub mod value;

pub use api::{ApiArgs, ApiError, RegistryApi, RegistryEntry};
pub use backend::{BackendError, MemoryBackend, RelationalBackend, Row};
pub use cache::{EntityCache, InstanceCache, NoopCache};
pub use self::config::DataConfig;
pub use entity::{Context, Entity};
pub use error::DataError;
pub use events::{EventBus, EventPayload, SyncEventBus};
pub use factory::{DataFactory, EntityRef};
pub use migration::{MetaTableMigration, MigrationError, MigrationState};
pub use options::{MemoryOptionStore, OptionStore};
pub use query::{DataQuery, Fields, QueryResults};
pub use schema::{ColumnDef, Schema, SchemaBuilder, SchemaRegistry};
pub use store::{DataStore, ReformatTable, SaveAction};
pub use value::{PropertyType, Value};
