//! Statement execution, contention retry and transactions.
//!
//! Every statement goes through [`Adapter::execute`]: hooks fire, a
//! [`Query`] is rendered by the formatter, parameters are bound natively and
//! busy/locked failures are retried on a growing, bounded schedule.
//!
//! # Example
//!
//! ```no_run
//! use localsql_core::Value;
//! use localsql_sqlite::{Adapter, AdapterOptions};
//!
//! # async fn run() -> localsql_sqlite::Result<()> {
//! let adapter = Adapter::new(AdapterOptions::new("app").with_database("app.db"));
//! let id = adapter
//!     .execute_in_transaction(|tx| async move {
//!         tx.execute("INSERT INTO user (name) VALUES (?)", &[Value::from("Ada")]).await?;
//!         tx.last_identity().await
//!     })
//!     .await?;
//! println!("inserted user {id}");
//! # Ok(())
//! # }
//! ```

use std::borrow::Cow;
use std::future::Future;
use std::time::Duration;

use localsql_core::query::{Delete, Insert, Query, Select, Update};
use localsql_core::{Row, Value};
use tracing::{debug, warn};

use crate::adapter::Adapter;
use crate::error::Result;
use crate::hooks::{ExecuteEvent, ExecutedEvent};
use crate::registry::Handle;

/// What [`Adapter::execute`] runs: raw SQL text or a query tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Sql(String),
    Query(Query),
}

impl Statement {
    /// Returns `true` for a [`Select`] query tree.
    pub fn is_select(&self) -> bool {
        matches!(self, Self::Query(Query::Select(_)))
    }
}

impl From<&str> for Statement {
    fn from(value: &str) -> Self {
        Self::Sql(value.to_string())
    }
}

impl From<String> for Statement {
    fn from(value: String) -> Self {
        Self::Sql(value)
    }
}

impl From<Query> for Statement {
    fn from(value: Query) -> Self {
        Self::Query(value)
    }
}

impl From<Select> for Statement {
    fn from(value: Select) -> Self {
        Self::Query(Query::Select(value))
    }
}

impl From<Insert> for Statement {
    fn from(value: Insert) -> Self {
        Self::Query(Query::Insert(value))
    }
}

impl From<Update> for Statement {
    fn from(value: Update) -> Self {
        Self::Query(Query::Update(value))
    }
}

impl From<Delete> for Statement {
    fn from(value: Delete) -> Self {
        Self::Query(Query::Delete(value))
    }
}

/// Bounded, growing retry schedule for one execution.
///
/// Each contention failure waits `interval` longer than the previous one.
/// Once the accumulated delay reaches `retry × interval` no further
/// attempt is made.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use localsql_sqlite::RetryState;
///
/// let mut retry = RetryState::new(3, Duration::from_millis(100));
/// assert_eq!(retry.next_delay(), Some(Duration::from_millis(100)));
/// assert_eq!(retry.next_delay(), Some(Duration::from_millis(200)));
/// assert_eq!(retry.next_delay(), Some(Duration::from_millis(300)));
/// assert_eq!(retry.next_delay(), None);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryState {
    interval: Duration,
    budget: Duration,
    delay: Duration,
}

impl RetryState {
    pub fn new(retry: u32, interval: Duration) -> Self {
        Self {
            interval,
            budget: interval.saturating_mul(retry),
            delay: Duration::ZERO,
        }
    }

    /// Delay before the next attempt, or `None` once the budget is spent.
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.interval.is_zero() || self.delay >= self.budget {
            return None;
        }
        self.delay += self.interval;
        Some(self.delay)
    }
}

impl Adapter {
    /// Executes one statement and returns its rows.
    ///
    /// `params` bind positional `?` placeholders. Statements that produce
    /// no result columns return an empty vector.
    ///
    /// # Errors
    ///
    /// Returns the formatter's error for an unrenderable query, a hook's
    /// error, or the engine error once retries (if enabled) are exhausted.
    /// Only busy/locked errors are retried.
    pub async fn execute(&self, statement: impl Into<Statement>, params: &[Value]) -> Result<Vec<Row>> {
        let statement = statement.into();
        let handle = self.handle().await?;

        self.hooks()
            .executing(&ExecuteEvent {
                statement: &statement,
                params,
            })
            .await?;

        let sql: Cow<'_, str> = match &statement {
            Statement::Sql(sql) => Cow::Borrowed(sql.as_str()),
            Statement::Query(query) => Cow::Owned(self.formatter().format(query)?),
        };

        let mut rows = self.run_retrying(&handle, &sql, params).await?;

        self.hooks()
            .executed(&mut ExecutedEvent {
                statement: &statement,
                params,
                rows: &mut rows,
            })
            .await?;
        Ok(rows)
    }

    /// Runs `work` inside a transaction on this adapter's handle.
    ///
    /// A handle carries at most one transaction: when one is already open,
    /// `work` joins it and commit/rollback is left to the outer call.
    /// Otherwise the transaction begins here, commits when `work` succeeds
    /// and rolls back when it fails. A failed rollback is logged; the
    /// error from `work` is what the caller sees.
    ///
    /// # Errors
    ///
    /// Returns the `BEGIN` failure, the error from `work`, or the `COMMIT`
    /// failure. `BEGIN` and `COMMIT` are retried like any statement; a
    /// commit that still fails is rolled back before returning.
    pub async fn execute_in_transaction<F, Fut, T>(&self, work: F) -> Result<T>
    where
        F: FnOnce(Adapter) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let handle = self.handle().await?;
        if handle.in_transaction() {
            debug!(name = handle.name(), "Joining open transaction");
            return work(self.clone()).await;
        }

        self.run_retrying(&handle, "BEGIN TRANSACTION", &[]).await?;
        handle.set_in_transaction(true);
        debug!(name = handle.name(), "Began transaction");

        let outcome = match work(self.clone()).await {
            Ok(value) => match self.run_retrying(&handle, "COMMIT", &[]).await {
                Ok(_) => {
                    debug!(name = handle.name(), "Committed transaction");
                    Ok(value)
                }
                Err(err) => {
                    self.rollback(&handle).await;
                    debug!(name = handle.name(), error = %err, "Commit failed, rolled back");
                    Err(err)
                }
            },
            Err(err) => {
                self.rollback(&handle).await;
                debug!(name = handle.name(), error = %err, "Rolled back transaction");
                Err(err)
            }
        };
        handle.set_in_transaction(false);
        outcome
    }

    /// Rolls back the open transaction. Failures are logged only.
    async fn rollback(&self, handle: &Handle) {
        if let Err(err) = self.run_retrying(handle, "ROLLBACK", &[]).await {
            warn!(name = handle.name(), error = %err, "Rollback failed");
        }
    }

    /// Runs `sql` on `handle`, retrying busy/locked failures on the
    /// configured schedule.
    async fn run_retrying(&self, handle: &Handle, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
        let mut retry = RetryState::new(self.options().retry, self.options().retry_interval());
        loop {
            debug!(name = handle.name(), sql = %sql, params = params.len(), "Executing statement");
            match handle.run(sql, params) {
                Ok(rows) => return Ok(rows),
                Err(err) if err.is_contention() => match retry.next_delay() {
                    Some(delay) => {
                        warn!(name = handle.name(), error = %err, delay_ms = delay.as_millis() as u64, "Database busy, retrying");
                        tokio::time::sleep(delay).await;
                    }
                    None => return Err(err),
                },
                Err(err) => return Err(err),
            }
        }
    }

    /// Row id of the most recent successful insert on this handle.
    pub async fn last_identity(&self) -> Result<i64> {
        let handle = self.handle().await?;
        Ok(handle.last_insert_rowid())
    }
}
