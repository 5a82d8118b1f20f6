//! Full table rebuild for changes SQLite cannot make with `ALTER TABLE`.
//!
//! The live table is renamed to a timestamped backup, the new definition
//! is created under the original name and the shared columns are copied
//! across. The backup is left in place. Steps are separate statements with
//! no enclosing transaction, so a failure part-way leaves the renamed
//! state for inspection.

use std::time::{SystemTime, UNIX_EPOCH};

use localsql_core::FieldDescriptor;
use tracing::{debug, info};

use crate::adapter::Adapter;
use crate::error::{Result, SchemaError};
use crate::formatter::quote_identifier;

/// Result of a completed rebuild.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Rebuilt {
    /// Name the previous table now lives under.
    pub(crate) backup_table: String,
    /// DDL and copy statements issued.
    pub(crate) statements: usize,
}

/// Name of the backup table for `table` rebuilt at `millis` since the epoch.
///
/// # Examples
///
/// ```
/// use localsql_sqlite::backup_table_name;
///
/// assert_eq!(backup_table_name("user", 1_700_000_000_000), "__user_1700000000000__");
/// ```
pub fn backup_table_name(table: &str, millis: u128) -> String {
    format!("__{table}_{millis}__")
}

fn epoch_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis())
        .unwrap_or_default()
}

/// Rebuilds `table` with exactly `fields`, keeping the data of every column
/// both definitions share.
///
/// # Errors
///
/// Returns [`SchemaError::EmptyColumnIntersection`] when the old and new
/// definitions share no column; the table has already been renamed at that
/// point. Engine failures from any step are returned as-is.
pub(crate) async fn rebuild_table(
    adapter: &Adapter,
    table: &str,
    fields: &[FieldDescriptor],
) -> Result<Rebuilt> {
    let accessor = adapter.table(table);
    let previous = accessor.columns().await?;
    let mut statements = 0;

    let indexes = adapter.indexes(table);
    for index in indexes.list().await? {
        indexes.drop(&index.name).await?;
        statements += 1;
    }

    let backup_table = backup_table_name(table, epoch_millis());
    let rename = format!(
        "ALTER TABLE {} RENAME TO {}",
        quote_identifier(table),
        quote_identifier(&backup_table)
    );
    adapter.execute(rename, &[]).await?;
    statements += 1;
    debug!(table, backup = %backup_table, "Renamed table for rebuild");

    accessor.create(fields).await?;
    statements += 1;

    let shared = fields
        .iter()
        .filter(|field| previous.iter().any(|column| column.name == field.name))
        .map(|field| quote_identifier(&field.name))
        .collect::<Vec<_>>();
    if shared.is_empty() {
        return Err(SchemaError::EmptyColumnIntersection(table.to_string()).into());
    }

    let columns = shared.join(", ");
    let copy = format!(
        "INSERT INTO {} ({columns}) SELECT {columns} FROM {}",
        quote_identifier(table),
        quote_identifier(&backup_table)
    );
    adapter.execute(copy, &[]).await?;
    statements += 1;

    info!(table, backup = %backup_table, columns = shared.len(), "Rebuilt table");
    Ok(Rebuilt {
        backup_table,
        statements,
    })
}
