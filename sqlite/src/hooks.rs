//! Lifecycle hooks.
//!
//! A [`Hook`] observes statement execution and handle loading. Subscribers
//! run in registration order and are awaited one at a time; the first
//! `Err` aborts the operation and is returned to the caller.
//!
//! # Example
//!
//! ```no_run
//! use async_trait::async_trait;
//! use localsql_sqlite::{Adapter, ExecuteEvent, Hook, Result, SqliteError};
//!
//! struct ReadOnly;
//!
//! #[async_trait]
//! impl Hook for ReadOnly {
//!     async fn executing(&self, event: &ExecuteEvent<'_>) -> Result<()> {
//!         if event.statement.is_select() {
//!             Ok(())
//!         } else {
//!             Err(SqliteError::HookError("read-only adapter".into()))
//!         }
//!     }
//! }
//!
//! let adapter = Adapter::default();
//! adapter.subscribe(ReadOnly);
//! ```

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use localsql_core::query::Query;
use localsql_core::{Row, Value};
use parking_lot::RwLock;

use crate::error::Result;
use crate::executor::Statement;

/// Emitted before a statement runs.
#[derive(Debug)]
pub struct ExecuteEvent<'a> {
    pub statement: &'a Statement,
    pub params: &'a [Value],
}

/// Emitted after a statement ran. Subscribers may rewrite `rows`.
#[derive(Debug)]
pub struct ExecutedEvent<'a> {
    pub statement: &'a Statement,
    pub params: &'a [Value],
    pub rows: &'a mut Vec<Row>,
}

/// Emitted around the construction of a new native handle.
#[derive(Debug, Clone, Copy)]
pub struct LoadEvent<'a> {
    pub name: &'a str,
    pub database: Option<&'a Path>,
}

/// Observer of adapter lifecycle events. Every method defaults to a no-op.
#[async_trait]
pub trait Hook: Send + Sync {
    async fn executing(&self, _event: &ExecuteEvent<'_>) -> Result<()> {
        Ok(())
    }

    async fn executed(&self, _event: &mut ExecutedEvent<'_>) -> Result<()> {
        Ok(())
    }

    async fn loading(&self, _event: &LoadEvent<'_>) -> Result<()> {
        Ok(())
    }

    async fn loaded(&self, _event: &LoadEvent<'_>) -> Result<()> {
        Ok(())
    }
}

/// Ordered subscriber list.
#[derive(Clone, Default)]
pub(crate) struct Hooks {
    subscribers: Arc<RwLock<Vec<Arc<dyn Hook>>>>,
}

impl Hooks {
    pub(crate) fn subscribe(&self, hook: Arc<dyn Hook>) {
        self.subscribers.write().push(hook);
    }

    fn snapshot(&self) -> Vec<Arc<dyn Hook>> {
        self.subscribers.read().clone()
    }

    pub(crate) async fn executing(&self, event: &ExecuteEvent<'_>) -> Result<()> {
        for hook in self.snapshot() {
            hook.executing(event).await?;
        }
        Ok(())
    }

    pub(crate) async fn executed(&self, event: &mut ExecutedEvent<'_>) -> Result<()> {
        for hook in self.snapshot() {
            hook.executed(event).await?;
        }
        Ok(())
    }

    pub(crate) async fn loading(&self, event: &LoadEvent<'_>) -> Result<()> {
        for hook in self.snapshot() {
            hook.loading(event).await?;
        }
        Ok(())
    }

    pub(crate) async fn loaded(&self, event: &LoadEvent<'_>) -> Result<()> {
        for hook in self.snapshot() {
            hook.loaded(event).await?;
        }
        Ok(())
    }
}

/// Reparses JSON-composed columns of select results into [`Value::Json`].
///
/// Registered first on every adapter.
pub(crate) struct JsonResults;

#[async_trait]
impl Hook for JsonResults {
    async fn executed(&self, event: &mut ExecutedEvent<'_>) -> Result<()> {
        let Statement::Query(Query::Select(select)) = event.statement else {
            return Ok(());
        };
        let attributes = select.json_attributes();
        if attributes.is_empty() {
            return Ok(());
        }
        for row in event.rows.iter_mut() {
            for attribute in &attributes {
                let Some(cell) = row.get_mut(attribute) else {
                    continue;
                };
                let parsed = match cell {
                    Value::Text(text) => serde_json::from_str(text)?,
                    _ => continue,
                };
                *cell = Value::Json(parsed);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use localsql_core::query::{Expr, Select};
    use serde_json::json;

    use super::*;
    use crate::SqliteError;

    type Log = Arc<parking_lot::Mutex<Vec<usize>>>;

    /// Appends its id to a shared log, then optionally rejects.
    struct Recording {
        id: usize,
        log: Log,
        reject: bool,
    }

    #[async_trait]
    impl Hook for Recording {
        async fn executing(&self, _event: &ExecuteEvent<'_>) -> Result<()> {
            self.log.lock().push(self.id);
            if self.reject {
                return Err(SqliteError::HookError(format!("hook {} rejected", self.id)));
            }
            Ok(())
        }
    }

    fn recording(hooks: &Hooks, log: &Log, id: usize, reject: bool) {
        hooks.subscribe(Arc::new(Recording {
            id,
            log: Arc::clone(log),
            reject,
        }));
    }

    #[tokio::test]
    async fn test_subscribers_run_in_order() {
        let hooks = Hooks::default();
        let log = Log::default();
        for id in 1..=3 {
            recording(&hooks, &log, id, false);
        }

        let statement = Statement::from("SELECT 1");
        let event = ExecuteEvent {
            statement: &statement,
            params: &[],
        };
        hooks.executing(&event).await.unwrap();
        assert_eq!(*log.lock(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_rejecting_subscriber_stops_later_ones() {
        let hooks = Hooks::default();
        let log = Log::default();
        recording(&hooks, &log, 1, true);
        recording(&hooks, &log, 2, false);

        let statement = Statement::from("DELETE FROM t");
        let event = ExecuteEvent {
            statement: &statement,
            params: &[],
        };
        let err = hooks.executing(&event).await.unwrap_err();
        assert!(matches!(err, SqliteError::HookError(ref m) if m == "hook 1 rejected"));
        assert_eq!(*log.lock(), vec![1]);
    }

    #[tokio::test]
    async fn test_json_results_reparses_composed_columns() {
        let statement = Statement::from(
            Select::fixed()
                .field(Expr::json_object(["a"]).as_("doc"))
                .field(Expr::field("plain")),
        );
        let mut row = Row::new();
        row.push("doc", r#"{"a":1}"#);
        row.push("plain", r#"{"a":1}"#);
        let mut rows = vec![row];

        let mut event = ExecutedEvent {
            statement: &statement,
            params: &[],
            rows: &mut rows,
        };
        JsonResults.executed(&mut event).await.unwrap();

        assert_eq!(rows[0].get("doc"), Some(&Value::Json(json!({"a": 1}))));
        assert_eq!(rows[0].get_str("plain"), Some(r#"{"a":1}"#));
    }
}
