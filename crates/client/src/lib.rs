//! Storage backends for quire.
//!
//! This crate provides the two interchangeable query backends and the
//! loader that wires one of them to the shared cache:
//! - JSON directory backend (`json`)
//! - Read-only SQLite backend with a SQL compiler (`sqlite`)
//! - Include resolution shared by both (`relation`)

pub mod json;
pub mod loader;
pub mod relation;
pub mod sqlite;

#[cfg(test)]
pub(crate) mod testutil;

pub use json::{ContentReader, FsReader, JsonContentManager, JsonQueryExecutor, JsonRelationManager};
pub use loader::{ContentLoader, LoaderOptions};
pub use relation::{RelationResolver, ResolvedRelation, resolve_includes};
pub use sqlite::{SqliteContentManager, SqliteQueryExecutor, SqliteRelationManager, SqliteSource};
