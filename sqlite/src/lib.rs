//! SQLite adapter for LocalSQL.
//!
//! This crate runs declarative schema migrations and queries against an
//! embedded SQLite database. Statements may be raw SQL with positional
//! parameters or [`Query`](localsql_core::query::Query) trees rendered by
//! the SQLite [`Formatter`].
//!
//! # Architecture
//!
//! - **`registry`**: one shared native handle per logical database name
//! - **`executor`**: statement execution, contention retry, transactions
//! - **`hooks`**: async lifecycle hooks around execution and loading
//! - **`formatter`**: query tree to SQLite SQL, including JSON composition
//! - **`typemap`**: logical column types to native type clauses
//! - **`migration`**: schema diff and the migration state machine
//! - **`rebuild`**: rename-and-copy rebuild for changes `ALTER TABLE` cannot make
//! - **`identity`**: per-attribute identity counters
//! - **`table`**: table, view and index accessors
//!
//! # Quick start
//!
//! ```no_run
//! use localsql_core::{FieldDescriptor, LogicalType, MigrationSpec, Value};
//! use localsql_core::query::{Expr, Select};
//! use localsql_sqlite::{Adapter, AdapterOptions};
//!
//! # async fn run() -> localsql_sqlite::Result<()> {
//! let adapter = Adapter::new(AdapterOptions::new("app").with_database("app.db"));
//!
//! let mut spec = MigrationSpec::new("test", "1.0")
//!     .with_field(FieldDescriptor::new("id", LogicalType::Counter).primary())
//!     .with_field(FieldDescriptor::new("name", LogicalType::Text).size(120))
//!     .with_field(FieldDescriptor::new("age", LogicalType::Integer));
//! adapter.migrate(&mut spec).await?;
//!
//! adapter
//!     .execute("INSERT INTO test (name, age) VALUES (?, ?)", &[Value::from("Ada"), Value::from(36)])
//!     .await?;
//! let rows = adapter
//!     .execute(Select::from("test").filter(Expr::field("age").gt(30)), &[])
//!     .await?;
//! println!("{} rows", rows.len());
//! # Ok(())
//! # }
//! ```

mod adapter;
mod config;
mod convert;
mod error;
mod executor;
pub mod formatter;
pub mod functions;
mod hooks;
mod identity;
mod migration;
mod rebuild;
mod registry;
mod table;
pub mod typemap;

pub use adapter::Adapter;
pub use config::{AdapterOptions, DEFAULT_NAME, DEFAULT_RETRY_INTERVAL_MS};
pub use error::{Result, SchemaError, SqliteError};
pub use executor::{RetryState, Statement};
pub use formatter::Formatter;
pub use hooks::{ExecuteEvent, ExecutedEvent, Hook, LoadEvent};
pub use identity::IDENTITY_TABLE;
pub use migration::{MigrationReport, TableStatus};
pub use rebuild::backup_table_name;
pub use registry::Registry;
pub use table::{Indexes, Table, View};
