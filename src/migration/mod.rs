//! Metadata-table migration.
//!
//! Entity metadata lives in an auxiliary table the host platform does not
//! create; this module brings it into existence idempotently on bootstrap.
//! The pass is gated by a persisted flag (read through the injected
//! [`OptionStore`](crate::options::OptionStore)) so a verified deployment
//! pays no DDL cost on subsequent starts, and self-heals after a partial
//! failure: the flag flips only once a verification pass finds nothing left
//! to create.

pub mod error;
pub mod meta_table;
pub mod state;

pub use error::MigrationError;
pub use meta_table::{meta_table_ddl, MetaTableMigration, RequiredTable};
pub use state::MigrationState;
