//! Logical-to-native column type mapping.
//!
//! All functions here are pure; the migration differ compares their output
//! against what the catalog reports.

use std::sync::LazyLock;

use localsql_core::{ColumnDescriptor, FieldDescriptor, LogicalType};
use regex::Regex;

use crate::formatter::quote_identifier;

/// Renders the native type clause for a field, including key and
/// nullability constraints.
///
/// # Examples
///
/// ```
/// use localsql_core::{FieldDescriptor, LogicalType};
/// use localsql_sqlite::typemap::format_type;
///
/// let id = FieldDescriptor::new("id", LogicalType::Counter).primary();
/// assert_eq!(format_type(&id), "INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL");
///
/// let name = FieldDescriptor::new("name", LogicalType::Text).size(120);
/// assert_eq!(format_type(&name), "TEXT(120,0) NULL");
/// ```
pub fn format_type(field: &FieldDescriptor) -> String {
    let size = field.size.filter(|s| *s > 0);
    let base = match &field.ty {
        LogicalType::Boolean | LogicalType::Byte => "INTEGER(1,0)".to_string(),
        LogicalType::Number | LogicalType::Float => "REAL".to_string(),
        LogicalType::Counter => return "INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL".to_string(),
        LogicalType::Currency => format!("NUMERIC({},4)", size.unwrap_or(19)),
        LogicalType::Decimal => match (field.size, field.scale) {
            (Some(size), Some(scale)) => format!("NUMERIC({size},{scale})"),
            _ => "NUMERIC".to_string(),
        },
        LogicalType::Date | LogicalType::DateTime | LogicalType::Long => "NUMERIC".to_string(),
        LogicalType::Time => sized_text(size, "TEXT"),
        LogicalType::Duration => sized_text(size, "TEXT(48,0)"),
        LogicalType::Integer => match size {
            Some(size) => format!("INTEGER({size},0)"),
            None => "INTEGER".to_string(),
        },
        LogicalType::Url | LogicalType::Text | LogicalType::Note => sized_text(size, "TEXT"),
        LogicalType::Image | LogicalType::Binary => "BLOB".to_string(),
        LogicalType::Guid => "TEXT(36,0)".to_string(),
        LogicalType::Short => "INTEGER(2,0)".to_string(),
        LogicalType::Json => "JSON HIDDEN".to_string(),
        LogicalType::Other(_) => "INTEGER".to_string(),
    };

    if field.primary {
        format!("{base} PRIMARY KEY NOT NULL")
    } else if field.is_nullable() {
        format!("{base} NULL")
    } else {
        format!("{base} NOT NULL")
    }
}

fn sized_text(size: Option<u32>, fallback: &str) -> String {
    match size {
        Some(size) => format!("TEXT({size},0)"),
        None => fallback.to_string(),
    }
}

/// Renders a full column definition: quoted name followed by its type.
pub fn format_column(field: &FieldDescriptor) -> String {
    format!("{} {}", quote_identifier(&field.name), format_type(field))
}

static TRAILING_SCALE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(NUMERIC|TEXT|INTEGER)\((\d+),0\)").expect("static regex must compile")
});

static SIZE_SCALE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\w+\((\d+),(\d+)\)").expect("static regex must compile"));

/// Normalizes a type clause for comparison.
///
/// Upper-cases, collapses whitespace and drops a zero scale from
/// `NUMERIC`, `TEXT` and `INTEGER`, so `text(120,0) null` and
/// `TEXT(120) NULL` compare equal.
///
/// # Examples
///
/// ```
/// use localsql_sqlite::typemap::normalize_type;
///
/// assert_eq!(normalize_type("text(120,0)  null"), "TEXT(120) NULL");
/// assert_eq!(normalize_type("NUMERIC(19,4) NULL"), "NUMERIC(19,4) NULL");
/// ```
pub fn normalize_type(text: &str) -> String {
    let upper = text.split_whitespace().collect::<Vec<_>>().join(" ").to_uppercase();
    TRAILING_SCALE.replace(&upper, "$1($2)").into_owned()
}

/// Type clause of a live column in the same shape [`format_type`] produces
/// for a non-primary field.
pub fn column_type_clause(column: &ColumnDescriptor) -> String {
    let nullability = if column.nullable { "NULL" } else { "NOT NULL" };
    format!("{} {nullability}", column.type_text)
}

/// Returns `true` when `field` already matches the live `column`.
pub fn same_type(field: &FieldDescriptor, column: &ColumnDescriptor) -> bool {
    normalize_type(&format_type(field)) == normalize_type(&column_type_clause(column))
}

/// Extracts size and scale from a declared type like `NUMERIC(19,4)`.
pub(crate) fn parse_size_scale(type_text: &str) -> (Option<u32>, Option<u32>) {
    match SIZE_SCALE.captures(type_text) {
        Some(caps) => (
            caps.get(1).and_then(|m| m.as_str().parse().ok()),
            caps.get(2).and_then(|m| m.as_str().parse().ok()),
        ),
        None => (None, None),
    }
}

/// Returns `true` for declared types whose text holds JSON.
pub(crate) fn is_json_type(decl_type: &str) -> bool {
    decl_type
        .trim_start()
        .get(..4)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("JSON"))
}
