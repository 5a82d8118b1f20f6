//! Schema type definitions for migration modeling.
//!
//! This module defines the declarative data model a migration file is made
//! of: logical field types, field descriptors, index specs and the migration
//! spec itself, plus the column and record types read back from a live
//! database. The declarative types are designed for serialization with
//! [`serde`] and round-trip through JSON and YAML migration files.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Name of the reserved table holding one row per applied migration.
pub const MIGRATIONS_TABLE: &str = "migrations";

/// Version reported for a table that has no recorded migration.
pub const INITIAL_VERSION: &str = "0.0";

/// Engine-independent column type.
///
/// Migration files name these as plain strings (`"Counter"`, `"Text"`).
/// Names that are not recognized are kept verbatim in
/// [`Other`](LogicalType::Other) so a file never fails to load because of
/// a type the dialect does not know.
///
/// # Examples
///
/// ```
/// use localsql_core::LogicalType;
///
/// assert_eq!("Counter".parse::<LogicalType>().unwrap(), LogicalType::Counter);
/// assert_eq!(
///     "Geometry".parse::<LogicalType>().unwrap(),
///     LogicalType::Other("Geometry".to_string())
/// );
/// assert_eq!(LogicalType::Guid.to_string(), "Guid");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum LogicalType {
    Boolean,
    Byte,
    Number,
    Float,
    /// Auto-incrementing integer key.
    Counter,
    Currency,
    Decimal,
    Date,
    DateTime,
    Time,
    Long,
    Duration,
    Integer,
    /// Written `URL`; `Url` is accepted when reading.
    Url,
    Text,
    /// Long free text.
    Note,
    Image,
    Binary,
    Guid,
    Short,
    /// Structured value stored as JSON text.
    Json,
    /// Any type name not listed above.
    Other(String),
}

impl LogicalType {
    /// Returns the name used in migration files.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Boolean => "Boolean",
            Self::Byte => "Byte",
            Self::Number => "Number",
            Self::Float => "Float",
            Self::Counter => "Counter",
            Self::Currency => "Currency",
            Self::Decimal => "Decimal",
            Self::Date => "Date",
            Self::DateTime => "DateTime",
            Self::Time => "Time",
            Self::Long => "Long",
            Self::Duration => "Duration",
            Self::Integer => "Integer",
            Self::Url => "URL",
            Self::Text => "Text",
            Self::Note => "Note",
            Self::Image => "Image",
            Self::Binary => "Binary",
            Self::Guid => "Guid",
            Self::Short => "Short",
            Self::Json => "Json",
            Self::Other(name) => name,
        }
    }
}

impl FromStr for LogicalType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "Boolean" => Self::Boolean,
            "Byte" => Self::Byte,
            "Number" => Self::Number,
            "Float" => Self::Float,
            "Counter" => Self::Counter,
            "Currency" => Self::Currency,
            "Decimal" => Self::Decimal,
            "Date" => Self::Date,
            "DateTime" => Self::DateTime,
            "Time" => Self::Time,
            "Long" => Self::Long,
            "Duration" => Self::Duration,
            "Integer" => Self::Integer,
            "URL" | "Url" => Self::Url,
            "Text" => Self::Text,
            "Note" => Self::Note,
            "Image" => Self::Image,
            "Binary" => Self::Binary,
            "Guid" => Self::Guid,
            "Short" => Self::Short,
            "Json" => Self::Json,
            other => Self::Other(other.to_string()),
        })
    }
}

impl From<String> for LogicalType {
    fn from(value: String) -> Self {
        match value.parse() {
            Ok(parsed) => parsed,
            Err(never) => match never {},
        }
    }
}

impl From<LogicalType> for String {
    fn from(value: LogicalType) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for LogicalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Declarative description of one column.
///
/// A field descriptor is what a migration asks for. It is never mutated by
/// the engine; pruning happens on the lists that hold descriptors.
///
/// # Examples
///
/// ```
/// use localsql_core::{FieldDescriptor, LogicalType};
///
/// let id = FieldDescriptor::new("id", LogicalType::Counter).primary();
/// let name = FieldDescriptor::new("name", LogicalType::Text)
///     .size(120)
///     .nullable(false);
///
/// assert!(id.primary);
/// assert_eq!(name.size, Some(120));
/// assert_eq!(name.nullable, Some(false));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    /// Column name.
    pub name: String,
    /// Logical type, mapped to a native type by the dialect.
    #[serde(rename = "type")]
    pub ty: LogicalType,
    /// Length or precision.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u32>,
    /// Scale for decimal types.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<u32>,
    /// Explicit nullability. `None` means nullable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nullable: Option<bool>,
    /// Part of the primary key.
    #[serde(default)]
    pub primary: bool,
}

impl FieldDescriptor {
    /// Creates a nullable, non-primary field.
    pub fn new(name: &str, ty: LogicalType) -> Self {
        Self {
            name: name.to_string(),
            ty,
            size: None,
            scale: None,
            nullable: None,
            primary: false,
        }
    }

    /// Marks the field as part of the primary key.
    pub fn primary(mut self) -> Self {
        self.primary = true;
        self
    }

    /// Sets explicit nullability.
    pub fn nullable(mut self, nullable: bool) -> Self {
        self.nullable = Some(nullable);
        self
    }

    /// Sets the length or precision.
    pub fn size(mut self, size: u32) -> Self {
        self.size = Some(size);
        self
    }

    /// Sets the decimal scale.
    pub fn scale(mut self, scale: u32) -> Self {
        self.scale = Some(scale);
        self
    }

    /// Returns `true` unless nullability was explicitly disabled.
    pub fn is_nullable(&self) -> bool {
        self.nullable != Some(false)
    }
}

/// A column as reported by the live database catalog.
///
/// Only the catalog reader constructs these; fields are public for reading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnDescriptor {
    pub name: String,
    /// Zero-based position in the table.
    pub ordinal: u32,
    /// Declared type exactly as the catalog reports it, e.g. `TEXT(120,0)`.
    pub type_text: String,
    pub nullable: bool,
    pub primary: bool,
    pub size: Option<u32>,
    pub scale: Option<u32>,
}

/// A named secondary index over an ordered list of columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexSpec {
    pub name: String,
    pub columns: Vec<String>,
}

impl IndexSpec {
    /// Creates an index spec.
    ///
    /// # Examples
    ///
    /// ```
    /// use localsql_core::IndexSpec;
    ///
    /// let index = IndexSpec::new("idx_user_email", &["email"]);
    /// assert_eq!(index.columns, vec!["email".to_string()]);
    /// ```
    pub fn new(name: &str, columns: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
        }
    }
}

/// One schema migration for one table.
///
/// The engine mutates the directive lists in place while it plans: removals
/// of missing or primary columns are dropped, changes targeting a missing
/// column move to [`add`](Self::add), and adds that already match the live
/// column are pruned. [`updated`](Self::updated) is set when the table was
/// already up to date and no DDL was issued.
///
/// Migration files use camelCase `appliesTo`; `applies_to` is accepted too.
///
/// # Examples
///
/// ```
/// use localsql_core::{FieldDescriptor, LogicalType, MigrationSpec};
///
/// let spec = MigrationSpec::new("user", "1.0")
///     .with_field(FieldDescriptor::new("id", LogicalType::Counter).primary())
///     .with_field(FieldDescriptor::new("email", LogicalType::Text).size(255));
///
/// assert_eq!(spec.applies_to, "user");
/// assert_eq!(spec.add.len(), 2);
/// assert!(!spec.updated);
///
/// let parsed: MigrationSpec = serde_json::from_str(
///     r#"{"appliesTo":"user","version":"1.0","add":[{"name":"id","type":"Counter","primary":true}]}"#,
/// ).unwrap();
/// assert_eq!(parsed.add[0].ty, LogicalType::Counter);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationSpec {
    /// Target table name.
    #[serde(alias = "applies_to")]
    pub applies_to: String,
    /// Optional model name recorded alongside the migration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Version string, compared segment-wise against the stored version.
    pub version: String,
    /// Full list of fields the table should have.
    #[serde(default)]
    pub add: Vec<FieldDescriptor>,
    /// Fields whose type or nullability should change.
    #[serde(default)]
    pub change: Vec<FieldDescriptor>,
    /// Fields to drop.
    #[serde(default)]
    pub remove: Vec<FieldDescriptor>,
    #[serde(default)]
    pub indexes: Vec<IndexSpec>,
    /// Set by the engine when no DDL was needed.
    #[serde(skip)]
    pub updated: bool,
}

impl MigrationSpec {
    /// Creates an empty migration for `applies_to` at `version`.
    pub fn new(applies_to: &str, version: &str) -> Self {
        Self {
            applies_to: applies_to.to_string(),
            model: None,
            description: None,
            version: version.to_string(),
            add: Vec::new(),
            change: Vec::new(),
            remove: Vec::new(),
            indexes: Vec::new(),
            updated: false,
        }
    }

    /// Appends a field to the add list.
    pub fn with_field(mut self, field: FieldDescriptor) -> Self {
        self.add.push(field);
        self
    }

    /// Appends a change directive.
    pub fn with_change(mut self, field: FieldDescriptor) -> Self {
        self.change.push(field);
        self
    }

    /// Appends a remove directive.
    pub fn with_removal(mut self, field: FieldDescriptor) -> Self {
        self.remove.push(field);
        self
    }

    /// Appends an index.
    pub fn with_index(mut self, index: IndexSpec) -> Self {
        self.indexes.push(index);
        self
    }

    /// Sets the model name.
    pub fn with_model(mut self, model: &str) -> Self {
        self.model = Some(model.to_string());
        self
    }

    /// Sets the description.
    pub fn with_description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }
}

/// A row of the reserved [`MIGRATIONS_TABLE`]. Rows are append-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationRecord {
    pub id: i64,
    pub applies_to: String,
    pub model: Option<String>,
    pub description: Option<String>,
    pub version: String,
}
