//! Conversion between [`Value`] and SQLite values.
//!
//! Parameters are bound through the [`SqlParam`] wrapper. Result cells are
//! read back by [`from_sql`], which recognizes the date text layout written
//! by the formatter and parses cells of JSON-typed columns.

use std::sync::LazyLock;

use chrono::DateTime;
use localsql_core::Value;
use regex::Regex;
use rusqlite::types::{ToSql, ToSqlOutput, Value as SqlValue, ValueRef};

use crate::error::{Result, SqliteError};
use crate::formatter::format_date;

static DATE_TEXT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\d{4}-\d{2}-\d{2}\s\d{2}:\d{2}:\d{2}\.\d+[+-][0-1][0-9]:[0-5][0-9]$")
        .expect("static regex must compile")
});

/// Borrowing wrapper that binds a [`Value`] as a statement parameter.
#[derive(Debug)]
pub(crate) struct SqlParam<'a>(pub &'a Value);

impl ToSql for SqlParam<'_> {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self.0 {
            Value::Null => ToSqlOutput::Owned(SqlValue::Null),
            Value::Bool(b) => ToSqlOutput::Owned(SqlValue::Integer(i64::from(*b))),
            Value::Integer(i) => ToSqlOutput::Owned(SqlValue::Integer(*i)),
            Value::Real(f) => ToSqlOutput::Owned(SqlValue::Real(*f)),
            Value::Text(text) => ToSqlOutput::Borrowed(ValueRef::Text(text.as_bytes())),
            Value::Blob(bytes) => ToSqlOutput::Borrowed(ValueRef::Blob(bytes)),
            Value::DateTime(dt) => ToSqlOutput::Owned(SqlValue::Text(format_date(dt))),
            Value::Json(json) => ToSqlOutput::Owned(SqlValue::Text(json.to_string())),
            Value::Array(_) => ToSqlOutput::Owned(SqlValue::Text(self.0.to_json().to_string())),
        })
    }
}

/// Converts one result cell.
///
/// `json_column` is set when the column's declared type is JSON; such text
/// and numbers become [`Value::Json`]. Other text matching the date layout
/// becomes [`Value::DateTime`].
pub(crate) fn from_sql(cell: ValueRef<'_>, json_column: bool) -> Result<Value> {
    Ok(match cell {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) if json_column => Value::Json(i.into()),
        ValueRef::Integer(i) => Value::Integer(i),
        // NUMERIC affinity stores JSON number text as a number.
        ValueRef::Real(f) if json_column => serde_json::Number::from_f64(f)
            .map_or(Value::Real(f), |n| Value::Json(serde_json::Value::Number(n))),
        ValueRef::Real(f) => Value::Real(f),
        ValueRef::Blob(bytes) => Value::Blob(bytes.to_vec()),
        ValueRef::Text(bytes) => {
            let text = std::str::from_utf8(bytes)
                .map_err(|e| SqliteError::ConversionError(format!("invalid UTF-8 text: {e}")))?;
            if json_column {
                match serde_json::from_str(text) {
                    Ok(json) => Value::Json(json),
                    Err(_) => Value::Text(text.to_string()),
                }
            } else {
                parse_date(text).unwrap_or_else(|| Value::Text(text.to_string()))
            }
        }
    })
}

fn parse_date(text: &str) -> Option<Value> {
    if !DATE_TEXT.is_match(text) {
        return None;
    }
    let normalized = text.replacen(|c: char| c.is_whitespace(), " ", 1);
    DateTime::parse_from_str(&normalized, "%Y-%m-%d %H:%M:%S%.f%:z")
        .ok()
        .map(Value::DateTime)
}
