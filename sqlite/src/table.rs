//! Table, view and index accessors.
//!
//! Thin wrappers over catalog queries and DDL. Each call is one or more
//! discrete [`Adapter::execute`] calls, so hooks and retry apply to them.

use localsql_core::{
    ColumnDescriptor, FieldDescriptor, INITIAL_VERSION, IndexSpec, MIGRATIONS_TABLE,
    MigrationRecord, Value, max_version, validate_fields, validate_identifier,
};
use tracing::debug;

use crate::adapter::Adapter;
use crate::error::{Result, SqliteError};
use crate::executor::Statement;
use crate::formatter::quote_identifier;
use crate::typemap::{format_column, parse_size_scale};

fn first_error(errors: Vec<localsql_core::ValidationError>) -> Result<()> {
    match errors.into_iter().next() {
        Some(err) => Err(err.into()),
        None => Ok(()),
    }
}

async fn catalog_contains(adapter: &Adapter, name: &str, kind: &str) -> Result<bool> {
    let rows = adapter
        .execute(
            "SELECT COUNT(*) AS count FROM sqlite_master WHERE name = ? AND type = ?",
            &[Value::from(name), Value::from(kind)],
        )
        .await?;
    Ok(rows.first().and_then(|row| row.get_i64("count")).unwrap_or(0) > 0)
}

/// Accessor for one table.
#[derive(Debug, Clone)]
pub struct Table<'a> {
    adapter: &'a Adapter,
    name: String,
}

impl<'a> Table<'a> {
    pub(crate) fn new(adapter: &'a Adapter, name: &str) -> Self {
        Self {
            adapter,
            name: name.to_string(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns `true` when the table exists.
    pub async fn exists(&self) -> Result<bool> {
        catalog_contains(self.adapter, &self.name, "table").await
    }

    /// Migrations recorded for this table, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`DatabaseError`](SqliteError::DatabaseError) when the
    /// migrations table does not exist.
    pub async fn migrations(&self) -> Result<Vec<MigrationRecord>> {
        let sql = format!(
            "SELECT id, appliesTo, model, description, version FROM {} WHERE appliesTo = ? ORDER BY id",
            quote_identifier(MIGRATIONS_TABLE)
        );
        let rows = self.adapter.execute(sql, &[Value::from(self.name.as_str())]).await?;
        rows.iter()
            .map(|row| {
                let text = |column: &str| row.get_str(column).map(str::to_string);
                Ok(MigrationRecord {
                    id: row
                        .get_i64("id")
                        .ok_or_else(|| SqliteError::ConversionError("migration without id".to_string()))?,
                    applies_to: text("appliesTo").unwrap_or_else(|| self.name.clone()),
                    model: text("model"),
                    description: text("description"),
                    version: text("version").unwrap_or_else(|| INITIAL_VERSION.to_string()),
                })
            })
            .collect()
    }

    /// Highest migration version recorded for this table, `"0.0"` if none.
    ///
    /// Versions are compared segment-wise, so `1.10` beats `1.9`.
    ///
    /// # Errors
    ///
    /// Returns [`DatabaseError`](SqliteError::DatabaseError) when the
    /// migrations table does not exist.
    pub async fn version(&self) -> Result<String> {
        let records = self.migrations().await?;
        let version = max_version(records.iter().map(|record| record.version.as_str()))
            .unwrap_or(INITIAL_VERSION)
            .to_string();
        Ok(version)
    }

    /// Live columns in ordinal order.
    pub async fn columns(&self) -> Result<Vec<ColumnDescriptor>> {
        let rows = self
            .adapter
            .execute(
                "SELECT cid, name, type, \"notnull\", pk FROM pragma_table_info(?) ORDER BY cid",
                &[Value::from(self.name.as_str())],
            )
            .await?;

        let mut columns = Vec::with_capacity(rows.len());
        for row in rows {
            let name = row
                .get_str("name")
                .ok_or_else(|| SqliteError::ConversionError("column without a name".to_string()))?
                .to_string();
            let type_text = row.get_str("type").unwrap_or_default().to_string();
            let (size, scale) = parse_size_scale(&type_text);
            columns.push(ColumnDescriptor {
                name,
                ordinal: u32::try_from(row.get_i64("cid").unwrap_or(0)).unwrap_or(0),
                nullable: row.get_i64("notnull").unwrap_or(0) == 0,
                primary: row.get_i64("pk").unwrap_or(0) > 0,
                type_text,
                size,
                scale,
            });
        }
        Ok(columns)
    }

    /// Creates the table from `fields`.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`](SqliteError::ValidationError) for an
    /// empty or malformed field list.
    pub async fn create(&self, fields: &[FieldDescriptor]) -> Result<()> {
        validate_identifier(&self.name)?;
        first_error(validate_fields(&self.name, fields))?;
        let columns = fields.iter().map(format_column).collect::<Vec<_>>();
        let sql = format!(
            "CREATE TABLE {} ({})",
            quote_identifier(&self.name),
            columns.join(", ")
        );
        self.adapter.execute(sql, &[]).await?;
        debug!(table = %self.name, columns = fields.len(), "Created table");
        Ok(())
    }

    /// Adds columns one `ALTER TABLE` at a time; the first failure stops
    /// the remainder.
    pub async fn add(&self, fields: &[FieldDescriptor]) -> Result<()> {
        first_error(validate_fields(&self.name, fields))?;
        for field in fields {
            let sql = format!(
                "ALTER TABLE {} ADD COLUMN {}",
                quote_identifier(&self.name),
                format_column(field)
            );
            self.adapter.execute(sql, &[]).await?;
        }
        Ok(())
    }

    /// Changing columns in place is not supported by SQLite; migrations
    /// rebuild the table instead.
    pub async fn change(&self, fields: &[FieldDescriptor]) -> Result<()> {
        first_error(validate_fields(&self.name, fields))?;
        Err(SqliteError::UnsupportedError(
            "full table migration is not yet implemented".to_string(),
        ))
    }

    /// Drops the table if it exists.
    pub async fn drop(&self) -> Result<()> {
        let sql = format!("DROP TABLE IF EXISTS {}", quote_identifier(&self.name));
        self.adapter.execute(sql, &[]).await?;
        Ok(())
    }
}

/// Accessor for one view.
#[derive(Debug, Clone)]
pub struct View<'a> {
    adapter: &'a Adapter,
    name: String,
}

impl<'a> View<'a> {
    pub(crate) fn new(adapter: &'a Adapter, name: &str) -> Self {
        Self {
            adapter,
            name: name.to_string(),
        }
    }

    pub async fn exists(&self) -> Result<bool> {
        catalog_contains(self.adapter, &self.name, "view").await
    }

    /// Replaces the view with one defined by `query`, atomically.
    pub async fn create(&self, query: impl Into<Statement>) -> Result<()> {
        validate_identifier(&self.name)?;
        let body = match query.into() {
            Statement::Sql(sql) => sql,
            Statement::Query(query) => self.adapter.formatter().format(&query)?,
        };
        let name = quote_identifier(&self.name);
        self.adapter
            .execute_in_transaction(|tx| async move {
                tx.execute(format!("DROP VIEW IF EXISTS {name}"), &[]).await?;
                tx.execute(format!("CREATE VIEW {name} AS {body}"), &[]).await?;
                Ok(())
            })
            .await
    }

    /// Drops the view if it exists.
    pub async fn drop(&self) -> Result<()> {
        let sql = format!("DROP VIEW IF EXISTS {}", quote_identifier(&self.name));
        self.adapter.execute(sql, &[]).await?;
        Ok(())
    }
}

/// Accessor for the secondary indexes of one table.
#[derive(Debug, Clone)]
pub struct Indexes<'a> {
    adapter: &'a Adapter,
    table: String,
}

impl<'a> Indexes<'a> {
    pub(crate) fn new(adapter: &'a Adapter, table: &str) -> Self {
        Self {
            adapter,
            table: table.to_string(),
        }
    }

    /// Indexes created with `CREATE INDEX`, with their columns in key order.
    ///
    /// Indexes SQLite creates implicitly for keys and constraints are not
    /// listed.
    pub async fn list(&self) -> Result<Vec<IndexSpec>> {
        let rows = self
            .adapter
            .execute(
                "SELECT name FROM pragma_index_list(?) WHERE origin = 'c' ORDER BY seq",
                &[Value::from(self.table.as_str())],
            )
            .await?;

        let mut indexes = Vec::with_capacity(rows.len());
        for row in rows {
            let Some(name) = row.get_str("name") else {
                continue;
            };
            let columns = self
                .adapter
                .execute(
                    "SELECT name FROM pragma_index_info(?) ORDER BY seqno",
                    &[Value::from(name)],
                )
                .await?
                .iter()
                .filter_map(|column| column.get_str("name").map(String::from))
                .collect();
            indexes.push(IndexSpec {
                name: name.to_string(),
                columns,
            });
        }
        Ok(indexes)
    }

    /// Creates index `name` over `columns`.
    ///
    /// An existing index with the same name and columns is left alone; one
    /// with different columns is dropped and recreated.
    pub async fn create(&self, name: &str, columns: &[String]) -> Result<()> {
        validate_identifier(name)?;
        if columns.is_empty() {
            return Err(localsql_core::ValidationError::EmptyIndex(name.to_string()).into());
        }
        let existing = self.list().await?.into_iter().find(|index| index.name == name);
        match existing {
            Some(index) if index.columns == columns => return Ok(()),
            Some(_) => {
                debug!(table = %self.table, index = name, "Recreating index with new columns");
                self.drop(name).await?;
            }
            None => {}
        }
        let columns = columns.iter().map(|c| quote_identifier(c)).collect::<Vec<_>>();
        let sql = format!(
            "CREATE INDEX {} ON {} ({})",
            quote_identifier(name),
            quote_identifier(&self.table),
            columns.join(", ")
        );
        self.adapter.execute(sql, &[]).await?;
        Ok(())
    }

    /// Drops index `name`; a missing index is not an error.
    pub async fn drop(&self, name: &str) -> Result<()> {
        let sql = format!("DROP INDEX IF EXISTS {}", quote_identifier(name));
        self.adapter.execute(sql, &[]).await?;
        Ok(())
    }
}
