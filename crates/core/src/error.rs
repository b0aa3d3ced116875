//! Unified error types for quire.
//!
//! Every failure carries an [`ErrorKind`] so callers can branch on what
//! happened without matching individual variants.

use std::path::PathBuf;

use rmcp::model::{ErrorCode, ErrorData as McpError};
use tokio_rusqlite::rusqlite;

use crate::config::ConfigError;

/// Coarse error categories callers branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Validation,
    Relation,
    Database,
    Cache,
    FileSystem,
    Translation,
    Config,
}

/// Unified error type for content queries.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Model, metadata file or relation target is missing.
    #[error("NOT_FOUND: {0}")]
    NotFound(String),

    /// Malformed query declaration (bad operator, missing locale, ...).
    #[error("VALIDATION_ERROR: {0}")]
    Validation(String),

    /// Dangling foreign key, missing relation link or unknown include.
    #[error("RELATION_ERROR: {0}")]
    Relation(String),

    /// SQLite connection, setup or statement failure.
    #[error("DATABASE_ERROR: {0}")]
    Database(tokio_rusqlite::Error),

    /// Serialization or storage failure inside the cache.
    #[error("CACHE_ERROR: {0}")]
    Cache(String),

    /// Content file could not be read.
    #[error("FILESYSTEM_ERROR: {}: {source}", path.display())]
    FileSystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Content file exists but is not valid content JSON.
    #[error("FILESYSTEM_ERROR: malformed content in {}: {source}", path.display())]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Translation table could not be read.
    #[error("TRANSLATION_ERROR: {0}")]
    Translation(String),

    /// Configuration failed to load or validate.
    #[error("CONFIG_ERROR: {0}")]
    Config(#[from] ConfigError),

    /// Any of the above, annotated with the operation that failed.
    #[error("{context}: {source}")]
    Context {
        context: String,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// The category of this error, looking through any context wrapping.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::NotFound(_) => ErrorKind::NotFound,
            Error::Validation(_) => ErrorKind::Validation,
            Error::Relation(_) => ErrorKind::Relation,
            Error::Database(_) => ErrorKind::Database,
            Error::Cache(_) => ErrorKind::Cache,
            Error::FileSystem { .. } | Error::Malformed { .. } => ErrorKind::FileSystem,
            Error::Translation(_) => ErrorKind::Translation,
            Error::Config(_) => ErrorKind::Config,
            Error::Context { source, .. } => source.kind(),
        }
    }

    /// Wrap this error with operation context (model, field, locale).
    pub fn context(self, context: impl Into<String>) -> Self {
        Error::Context { context: context.into(), source: Box::new(self) }
    }

    /// Read a file-system error, mapping "not found" to [`Error::NotFound`].
    pub fn from_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        if source.kind() == std::io::ErrorKind::NotFound {
            Error::NotFound(format!("{} does not exist", path.display()))
        } else {
            Error::FileSystem { path, source }
        }
    }
}

impl From<tokio_rusqlite::Error<Error>> for Error {
    fn from(err: tokio_rusqlite::Error<Error>) -> Self {
        match err {
            tokio_rusqlite::Error::Error(e) => e,
            tokio_rusqlite::Error::ConnectionClosed => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
            tokio_rusqlite::Error::Close(c) => Error::Database(tokio_rusqlite::Error::Close(c)),
            _ => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
        }
    }
}

impl From<tokio_rusqlite::Error<rusqlite::Error>> for Error {
    fn from(err: tokio_rusqlite::Error<rusqlite::Error>) -> Self {
        Error::Database(err)
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Database(tokio_rusqlite::Error::Error(err))
    }
}

impl From<Error> for McpError {
    fn from(err: Error) -> Self {
        let code = match err.kind() {
            ErrorKind::Validation => -32602,
            ErrorKind::NotFound => -32001,
            ErrorKind::Relation => -32002,
            ErrorKind::Database => -32003,
            ErrorKind::Cache => -32004,
            ErrorKind::FileSystem => -32005,
            ErrorKind::Translation => -32006,
            ErrorKind::Config => -32007,
        };

        McpError { code: ErrorCode(code), message: err.to_string().into(), data: None }
    }
}
