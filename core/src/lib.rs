//! Dialect-neutral data model for LocalSQL.
//!
//! This crate defines the types shared by every engine adapter:
//!
//! - [`LogicalType`] and [`FieldDescriptor`]: what a column should be.
//! - [`MigrationSpec`]: a versioned set of add/change/remove directives and
//!   indexes for one table, loadable from JSON or YAML.
//! - [`ColumnDescriptor`] and [`MigrationRecord`]: what the live catalog
//!   reports back.
//! - [`Value`] and [`Row`]: parameters and results.
//! - [`query`]: the expression tree a dialect formatter renders to SQL.
//!
//! Validation ([`validate_migration`], [`validate_identifier`]) catches
//! argument-shape errors before anything reaches the engine, and
//! [`compare_versions`] orders migration versions segment-wise.
//!
//! # Example
//!
//! ```
//! use localsql_core::*;
//!
//! let spec = MigrationSpec::new("test", "1.0")
//!     .with_field(FieldDescriptor::new("id", LogicalType::Counter).primary())
//!     .with_field(FieldDescriptor::new("name", LogicalType::Text).size(120))
//!     .with_field(FieldDescriptor::new("age", LogicalType::Integer));
//!
//! assert!(validate_migration(&spec).is_empty());
//! assert!(is_applied("1.10", "1.9"));
//! ```

pub mod query;
mod types;
mod validate;
mod value;
mod version;

pub use types::*;
pub use validate::{ValidationError, validate_fields, validate_identifier, validate_migration};
pub use value::{Row, Value};
pub use version::{compare_versions, is_applied, max_version};
