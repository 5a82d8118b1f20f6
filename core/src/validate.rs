//! Migration and identifier validation.
//!
//! Catches argument-shape problems such as empty names, empty field lists
//! and identifiers that cannot be quoted safely before any statement
//! reaches the engine.
//!
//! # Examples
//!
//! ```
//! use localsql_core::*;
//!
//! let spec = MigrationSpec::new("user", "1.0")
//!     .with_field(FieldDescriptor::new("id", LogicalType::Counter).primary());
//! assert!(validate_migration(&spec).is_empty());
//!
//! // Invalid: nothing to create
//! let empty = MigrationSpec::new("user", "1.0");
//! assert!(!validate_migration(&empty).is_empty());
//! ```

use std::collections::HashSet;

use thiserror::Error;

use crate::{FieldDescriptor, IndexSpec, MigrationSpec};

/// Argument validation errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A table, column or index name is empty or whitespace-only.
    #[error("{0} name cannot be empty")]
    EmptyName(&'static str),
    /// A name contains a quote or control character.
    #[error("invalid identifier: {0:?}")]
    InvalidIdentifier(String),
    /// The migration version string is empty.
    #[error("migration version cannot be empty")]
    EmptyVersion,
    /// An operation needs at least one field.
    #[error("expected at least one field for {0}")]
    EmptyFieldList(String),
    /// Two fields in the same list share a name.
    #[error("duplicate field: {0}")]
    DuplicateField(String),
    /// An index lists no columns.
    #[error("index {0} must cover at least one column")]
    EmptyIndex(String),
    /// A function received fewer arguments than it needs.
    #[error("{function} expects at least {expected} arguments")]
    TooFewArguments {
        function: &'static str,
        expected: usize,
    },
    /// A JSON path is not of the form `collection.attribute.member`.
    #[error("invalid JSON path: {0}")]
    InvalidJsonPath(String),
}

/// Checks that `name` can be used as a quoted identifier.
///
/// # Examples
///
/// ```
/// use localsql_core::validate_identifier;
///
/// assert!(validate_identifier("order_line").is_ok());
/// assert!(validate_identifier("").is_err());
/// assert!(validate_identifier("bad\"name").is_err());
/// ```
pub fn validate_identifier(name: &str) -> Result<(), ValidationError> {
    if name.trim().is_empty() {
        return Err(ValidationError::EmptyName("identifier"));
    }
    if name
        .chars()
        .any(|c| c.is_control() || c == '"' || c == '\'' || c == '`')
    {
        return Err(ValidationError::InvalidIdentifier(name.to_string()));
    }
    Ok(())
}

/// Validates a list of field descriptors used to create `context`.
///
/// Empty lists, invalid names and duplicates are reported.
pub fn validate_fields(context: &str, fields: &[FieldDescriptor]) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if fields.is_empty() {
        errors.push(ValidationError::EmptyFieldList(context.to_string()));
        return errors;
    }

    let mut seen: HashSet<&str> = HashSet::new();
    for field in fields {
        if let Err(err) = validate_identifier(&field.name) {
            errors.push(err);
            continue;
        }
        if !seen.insert(field.name.as_str()) {
            errors.push(ValidationError::DuplicateField(field.name.clone()));
        }
    }

    errors
}

fn validate_index(index: &IndexSpec) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    if let Err(err) = validate_identifier(&index.name) {
        errors.push(err);
        return errors;
    }
    if index.columns.is_empty() {
        errors.push(ValidationError::EmptyIndex(index.name.clone()));
    }
    for column in &index.columns {
        if let Err(err) = validate_identifier(column) {
            errors.push(err);
        }
    }
    errors
}

/// Validates a migration spec before it is applied.
///
/// Checks the target name, the version, the full add list, the change and
/// remove directives and every index.
///
/// # Examples
///
/// ```
/// use localsql_core::*;
///
/// let spec = MigrationSpec::new("", "1.0");
/// let errors = validate_migration(&spec);
/// assert_eq!(errors, vec![ValidationError::EmptyName("table")]);
/// ```
pub fn validate_migration(spec: &MigrationSpec) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if spec.applies_to.trim().is_empty() {
        errors.push(ValidationError::EmptyName("table"));
        return errors;
    }
    if let Err(err) = validate_identifier(&spec.applies_to) {
        errors.push(err);
        return errors;
    }
    if spec.version.trim().is_empty() {
        errors.push(ValidationError::EmptyVersion);
        return errors;
    }

    errors.extend(validate_fields(&spec.applies_to, &spec.add));
    for field in spec.change.iter().chain(&spec.remove) {
        if let Err(err) = validate_identifier(&field.name) {
            errors.push(err);
        }
    }
    for index in &spec.indexes {
        errors.extend(validate_index(index));
    }

    errors
}
