//! Backend over a read-only SQLite database.
//!
//! Schema conventions:
//!
//! - `tbl_models` and `tbl_model_fields` hold model metadata
//! - `tbl_<model>` holds system columns, non-localized fields and
//!   `<relation>_id` foreign keys
//! - `tbl_<model>_translations` holds localized fields keyed by `(id, locale)`
//! - `tbl_relations` holds relation links

pub mod compiler;
pub mod connection;
pub mod content;
pub mod executor;
pub mod relation;

pub use connection::SqliteSource;
pub use content::SqliteContentManager;
pub use executor::SqliteQueryExecutor;
pub use relation::SqliteRelationManager;
