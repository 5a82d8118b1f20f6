//! Error types for SQLite adapter operations.
//!
//! Provides a unified error type covering engine access, argument
//! validation, schema consistency, formatting, hooks and configuration
//! failures.

use localsql_core::ValidationError;
use rusqlite::ErrorCode;
use thiserror::Error;

/// Errors that can occur during adapter operations.
#[derive(Debug, Error)]
pub enum SqliteError {
    /// SQLite engine failure, including busy/locked contention.
    #[error("database error: {0}")]
    DatabaseError(#[from] rusqlite::Error),

    /// Argument failed validation before reaching the engine.
    #[error("validation error: {0}")]
    ValidationError(#[from] ValidationError),

    /// Schema state that makes the operation impossible.
    #[error("schema error: {0}")]
    SchemaError(#[from] SchemaError),

    /// Operation the SQLite dialect cannot express.
    #[error("unsupported: {0}")]
    UnsupportedError(String),

    /// A result cell could not be read as the expected type.
    #[error("conversion error: {0}")]
    ConversionError(String),

    /// JSON parsing or serialization failure.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// File I/O failure.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// YAML parsing or serialization failure.
    #[error("YAML error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    /// A lifecycle hook rejected the operation.
    #[error("hook rejected operation: {0}")]
    HookError(String),
}

impl SqliteError {
    /// Returns `true` for busy/locked errors, the only class worth retrying.
    pub fn is_contention(&self) -> bool {
        match self {
            Self::DatabaseError(err) => matches!(
                err.sqlite_error_code(),
                Some(ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked)
            ),
            _ => false,
        }
    }
}

/// Schema states that abort a migration or a query.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    /// A JSON composition was projected without an alias or field name.
    #[error("JSON attribute name cannot be determined for {0}")]
    AmbiguousJsonAttribute(String),

    /// A rebuilt table shares no column with its previous version.
    #[error("table migration of '{0}' cannot be completed because the collection of fields is empty")]
    EmptyColumnIntersection(String),

    /// A table status code outside the known outcomes.
    #[error("invalid table status: {0}")]
    InvalidTableStatus(i32),
}

/// Convenience alias for results with [`SqliteError`].
pub type Result<T> = std::result::Result<T, SqliteError>;
