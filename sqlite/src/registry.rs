//! Shared native handles, one per logical database name.
//!
//! The first adapter to open a name constructs its [`Handle`]; later
//! adapters with the same name reuse it, whatever database path they were
//! configured with.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use localsql_core::{Row, Value};
use parking_lot::Mutex;
use rusqlite::{Connection, params_from_iter};
use tracing::debug;

use crate::config::AdapterOptions;
use crate::convert::{SqlParam, from_sql};
use crate::error::Result;
use crate::functions;
use crate::typemap::is_json_type;

/// One open SQLite connection plus its transaction bookkeeping.
///
/// The connection lock is held for the synchronous duration of a single
/// statement only.
#[derive(Debug)]
pub(crate) struct Handle {
    name: String,
    connection: Mutex<Connection>,
    in_transaction: AtomicBool,
}

impl Handle {
    fn open(options: &AdapterOptions) -> Result<Self> {
        let connection = match &options.database {
            Some(path) => Connection::open(path)?,
            None => Connection::open_in_memory()?,
        };
        // Contention must reach the executor's retry loop instead of
        // blocking inside SQLite.
        connection.busy_timeout(Duration::ZERO)?;
        functions::register(&connection)?;
        debug!(name = %options.name, database = ?options.database, "Opened database handle");
        Ok(Self {
            name: options.name.clone(),
            connection: Mutex::new(connection),
            in_transaction: AtomicBool::new(false),
        })
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn in_transaction(&self) -> bool {
        self.in_transaction.load(Ordering::SeqCst)
    }

    pub(crate) fn set_in_transaction(&self, value: bool) {
        self.in_transaction.store(value, Ordering::SeqCst);
    }

    /// Runs one statement with positional parameters and maps its rows.
    pub(crate) fn run(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
        let connection = self.connection.lock();
        let mut stmt = connection.prepare(sql)?;
        let names: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let json_columns: Vec<bool> = stmt
            .columns()
            .iter()
            .map(|column| column.decl_type().is_some_and(is_json_type))
            .collect();
        let bound = params_from_iter(params.iter().map(SqlParam));

        if names.is_empty() {
            stmt.execute(bound)?;
            return Ok(Vec::new());
        }

        let mut rows = stmt.query(bound)?;
        let mut mapped = Vec::new();
        while let Some(row) = rows.next()? {
            let mut record = Row::with_capacity(names.len());
            for (index, name) in names.iter().enumerate() {
                record.push(name, from_sql(row.get_ref(index)?, json_columns[index])?);
            }
            mapped.push(record);
        }
        Ok(mapped)
    }

    pub(crate) fn last_insert_rowid(&self) -> i64 {
        self.connection.lock().last_insert_rowid()
    }
}

/// Registry of open handles keyed by logical name.
///
/// Cloning a registry shares the same handles. [`Registry::global`] is the
/// process-wide default; tests and embedders can create their own with
/// [`Registry::new`].
///
/// # Examples
///
/// ```
/// use localsql_sqlite::Registry;
///
/// let registry = Registry::new();
/// assert!(!registry.contains("local"));
/// assert!(!registry.close("local"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct Registry {
    handles: Arc<Mutex<HashMap<String, Arc<Handle>>>>,
    opening: Arc<tokio::sync::Mutex<()>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide registry.
    pub fn global() -> &'static Registry {
        static GLOBAL: OnceLock<Registry> = OnceLock::new();
        GLOBAL.get_or_init(Registry::new)
    }

    /// Returns `true` when a handle is open under `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.handles.lock().contains_key(name)
    }

    /// Removes the handle registered under `name`.
    ///
    /// The connection closes once every adapter holding it is dropped or
    /// closed. Returns `false` when nothing was registered.
    pub fn close(&self, name: &str) -> bool {
        let removed = self.handles.lock().remove(name).is_some();
        if removed {
            debug!(name, "Closed database handle");
        }
        removed
    }

    pub(crate) fn get(&self, name: &str) -> Option<Arc<Handle>> {
        self.handles.lock().get(name).cloned()
    }

    /// Serializes handle construction across adapters. Held across the
    /// load hooks so only the constructing adapter fires them.
    pub(crate) async fn lock_opening(&self) -> tokio::sync::MutexGuard<'_, ()> {
        self.opening.lock().await
    }

    /// Returns the handle for `options.name`, opening it if absent.
    pub(crate) fn open(&self, options: &AdapterOptions) -> Result<Arc<Handle>> {
        let mut handles = self.handles.lock();
        if let Some(handle) = handles.get(&options.name) {
            return Ok(Arc::clone(handle));
        }
        let handle = Arc::new(Handle::open(options)?);
        handles.insert(options.name.clone(), Arc::clone(&handle));
        Ok(handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_name_shares_handle() {
        let registry = Registry::new();
        let first = registry.open(&AdapterOptions::new("shared")).unwrap();
        let second = registry.open(&AdapterOptions::new("shared")).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.name(), "shared");
    }

    #[test]
    fn test_close_forgets_handle() {
        let registry = Registry::new();
        let first = registry.open(&AdapterOptions::new("a")).unwrap();
        assert!(registry.close("a"));
        assert!(!registry.contains("a"));
        let second = registry.open(&AdapterOptions::new("a")).unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_run_maps_rows_and_binds_params() {
        let registry = Registry::new();
        let handle = registry.open(&AdapterOptions::default()).unwrap();
        handle
            .run("CREATE TABLE t (id INTEGER, doc JSON HIDDEN NULL)", &[])
            .unwrap();
        let inserted = handle
            .run(
                "INSERT INTO t (id, doc) VALUES (?, ?)",
                &[Value::from(1), Value::Json(serde_json::json!({"k": "v"}))],
            )
            .unwrap();
        assert!(inserted.is_empty());

        let rows = handle.run("SELECT id, doc FROM t WHERE id = ?", &[Value::from(1)]).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get_i64("id"), Some(1));
        assert_eq!(
            rows[0].get("doc"),
            Some(&Value::Json(serde_json::json!({"k": "v"})))
        );
    }
}
