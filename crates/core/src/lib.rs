//! Core types and shared functionality for quire.
//!
//! This crate provides:
//! - Record and model descriptor types
//! - Filter operators and sort comparison
//! - Bounded in-process cache
//! - Query declaration, builder and executor trait
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod error;
pub mod model;
pub mod operator;
pub mod query;

pub use cache::{BoundedCache, CacheConfig, CacheStats, CachedValue, ContentCache};
pub use config::{AppConfig, BackendKind, ConfigError};
pub use error::{Error, ErrorKind};
pub use model::{validate_identifier, FieldDescriptor, ModelDescriptor, Record, RelationKind, RelationSpec, Status};
pub use operator::Operator;
pub use query::{
    Filter, Include, PageInfo, Pagination, Query, QueryBuilder, QueryExecutor, QueryResult, Related, ResolvedRecord,
    Sort, SortDirection,
};
