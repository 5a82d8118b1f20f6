//! Integration tests for the localsql-sqlite crate.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, TimeZone};
use localsql_core::query::{Expr, Insert, JsonObject, Select};
use localsql_core::{FieldDescriptor, IndexSpec, LogicalType, MigrationSpec, Value};
use localsql_sqlite::{
    Adapter, AdapterOptions, ExecuteEvent, Formatter, Hook, LoadEvent, Registry, Result,
    SqliteError, TableStatus,
};
use serde_json::json;
use tempfile::TempDir;

fn memory_adapter(name: &str) -> Adapter {
    Adapter::with_registry(AdapterOptions::new(name), Registry::new())
}

fn test_table_spec(version: &str) -> MigrationSpec {
    MigrationSpec::new("test", version)
        .with_field(FieldDescriptor::new("id", LogicalType::Counter).primary())
        .with_field(FieldDescriptor::new("name", LogicalType::Text))
        .with_field(FieldDescriptor::new("age", LogicalType::Integer))
}

async fn column_names(adapter: &Adapter, table: &str) -> Vec<String> {
    adapter
        .table(table)
        .columns()
        .await
        .unwrap()
        .into_iter()
        .map(|column| column.name)
        .collect()
}

// =============================================================================
// Migrations
// =============================================================================

#[tokio::test]
async fn test_scenario_table_visible_through_second_adapter() {
    let dir = TempDir::new().unwrap();
    let registry = Registry::new();
    let options = AdapterOptions::new("scenario").with_database(dir.path().join("local.db"));
    let first = Adapter::with_registry(options.clone(), registry.clone());

    assert!(!first.table("test").exists().await.unwrap());
    let report = first.migrate(&mut test_table_spec("1.0")).await.unwrap();
    assert_eq!(report.outcome, TableStatus::Created);
    assert!(first.table("test").exists().await.unwrap());

    let second = Adapter::with_registry(AdapterOptions::new("scenario"), registry.clone());
    assert!(second.table("test").exists().await.unwrap());
    assert_eq!(second.table("test").version().await.unwrap(), "1.0");
}

#[tokio::test]
async fn test_migration_is_idempotent() {
    let db = memory_adapter("idempotent");
    db.migrate(&mut test_table_spec("1.0")).await.unwrap();
    let before = db.table("test").columns().await.unwrap();

    let mut again = test_table_spec("1.0");
    let report = db.migrate(&mut again).await.unwrap();
    assert_eq!(report.outcome, TableStatus::AlreadyApplied);
    assert_eq!(report.statements, 0);
    assert!(again.updated);
    assert_eq!(db.table("test").columns().await.unwrap(), before);

    let records = db
        .execute("SELECT COUNT(*) AS n FROM migrations WHERE appliesTo = ?", &[Value::from("test")])
        .await
        .unwrap();
    assert_eq!(records[0].get_i64("n"), Some(1));
}

#[tokio::test]
async fn test_migration_adds_nullable_column_in_place() {
    let db = memory_adapter("alter");
    db.migrate(&mut test_table_spec("1.0")).await.unwrap();

    let mut spec = test_table_spec("1.1").with_field(FieldDescriptor::new("email", LogicalType::Text).size(255));
    let report = db.migrate(&mut spec).await.unwrap();
    assert_eq!(report.outcome, TableStatus::Altered);
    assert!(report.rebuilt.is_none());
    assert_eq!(spec.add.len(), 1);
    assert_eq!(column_names(&db, "test").await, vec!["id", "name", "age", "email"]);
}

#[tokio::test]
async fn test_rebuild_preserves_shared_columns() {
    let db = memory_adapter("rebuild");
    let mut v1 = MigrationSpec::new("item", "1.0")
        .with_field(FieldDescriptor::new("id", LogicalType::Counter).primary())
        .with_field(FieldDescriptor::new("a", LogicalType::Text))
        .with_field(FieldDescriptor::new("b", LogicalType::Integer))
        .with_field(FieldDescriptor::new("c", LogicalType::Text))
        .with_index(IndexSpec::new("idx_item_a", &["a"]));
    db.migrate(&mut v1).await.unwrap();
    db.execute(
        Insert::into("item").value("a", "alpha").value("b", 2).value("c", "doomed"),
        &[],
    )
    .await
    .unwrap();

    let mut v2 = MigrationSpec::new("item", "2.0")
        .with_field(FieldDescriptor::new("id", LogicalType::Counter).primary())
        .with_field(FieldDescriptor::new("a", LogicalType::Text))
        .with_field(FieldDescriptor::new("b", LogicalType::Integer))
        .with_field(FieldDescriptor::new("d", LogicalType::Text))
        .with_removal(FieldDescriptor::new("c", LogicalType::Text))
        .with_index(IndexSpec::new("idx_item_a", &["a"]));
    let report = db.migrate(&mut v2).await.unwrap();
    assert_eq!(report.outcome, TableStatus::Altered);
    let backup = report.rebuilt.expect("rebuild should leave a backup table");
    assert!(db.table(&backup).exists().await.unwrap());

    assert_eq!(column_names(&db, "item").await, vec!["id", "a", "b", "d"]);
    let rows = db.execute("SELECT * FROM item", &[]).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get_i64("id"), Some(1));
    assert_eq!(rows[0].get_str("a"), Some("alpha"));
    assert_eq!(rows[0].get_i64("b"), Some(2));
    assert_eq!(rows[0].get("d"), Some(&Value::Null));
    assert!(rows[0].get("c").is_none());
    assert_eq!(
        db.indexes("item").list().await.unwrap(),
        vec![IndexSpec::new("idx_item_a", &["a"])]
    );
    assert_eq!(db.table("item").version().await.unwrap(), "2.0");
}

// =============================================================================
// Values and identity
// =============================================================================

#[tokio::test]
async fn test_json_column_round_trip() {
    let db = memory_adapter("json");
    let mut spec = MigrationSpec::new("document", "1.0")
        .with_field(FieldDescriptor::new("id", LogicalType::Counter).primary())
        .with_field(FieldDescriptor::new("body", LogicalType::Json));
    db.migrate(&mut spec).await.unwrap();

    let body = json!({"title": "notes", "tags": ["a", "b"], "meta": {"pages": 3}});
    db.execute("INSERT INTO document (body) VALUES (?)", &[Value::from(body.clone())])
        .await
        .unwrap();
    db.execute(Insert::into("document").value("body", Value::from(body.clone())), &[])
        .await
        .unwrap();

    let rows = db.execute(Select::from("document").select(["body"]), &[]).await.unwrap();
    assert_eq!(rows.len(), 2);
    for row in rows {
        assert_eq!(row.get("body"), Some(&Value::Json(body.clone())));
    }

    db.execute("DELETE FROM document", &[]).await.unwrap();
    let bodies = [json!(5), json!(1.5), json!("plain"), json!(true), json!([1, "two", null])];
    for body in &bodies {
        db.execute("INSERT INTO document (body) VALUES (?)", &[Value::Json(body.clone())])
            .await
            .unwrap();
    }
    let rows = db
        .execute(Select::from("document").select(["body"]).order_by(Expr::field("id")), &[])
        .await
        .unwrap();
    let back: Vec<_> = rows.iter().map(|row| row.get("body").cloned()).collect();
    let expected: Vec<_> = bodies.iter().map(|body| Some(Value::Json(body.clone()))).collect();
    assert_eq!(back, expected);
}

#[tokio::test]
async fn test_date_values_round_trip() {
    let db = memory_adapter("dates");
    db.execute("CREATE TABLE event (at NUMERIC)", &[]).await.unwrap();
    let at: DateTime<FixedOffset> = FixedOffset::east_opt(2 * 3600)
        .unwrap()
        .with_ymd_and_hms(2024, 5, 17, 8, 30, 15)
        .unwrap();
    db.execute(Insert::into("event").value("at", Value::from(at)), &[])
        .await
        .unwrap();

    let rows = db.execute("SELECT at FROM event", &[]).await.unwrap();
    match rows[0].get("at") {
        Some(Value::DateTime(read)) => assert_eq!(read, &at),
        other => panic!("expected a date, got {other:?}"),
    }
}

#[tokio::test]
async fn test_identity_is_monotonic() {
    let db = memory_adapter("identity");
    db.execute("CREATE TABLE invoice (number INTEGER)", &[]).await.unwrap();
    db.execute("INSERT INTO invoice (number) VALUES (?), (?)", &[Value::from(7), Value::from(19)])
        .await
        .unwrap();

    let mut allocated = Vec::new();
    for _ in 0..5 {
        allocated.push(db.select_identity("invoice", "number").await.unwrap());
    }
    assert_eq!(allocated, vec![20, 21, 22, 23, 24]);
    assert!(db.select_identity("invoice", "other").await.is_err());
}

// =============================================================================
// Executor
// =============================================================================

#[tokio::test]
async fn test_contention_retry_is_bounded() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("busy.db");

    let holder = Adapter::with_registry(AdapterOptions::new("busy").with_database(&path), Registry::new());
    holder.execute("CREATE TABLE t (v INTEGER)", &[]).await.unwrap();
    holder.execute("BEGIN EXCLUSIVE", &[]).await.unwrap();

    let waiter = Adapter::with_registry(
        AdapterOptions::new("busy")
            .with_database(&path)
            .with_retry(2, Duration::from_millis(10)),
        Registry::new(),
    );
    let started = Instant::now();
    let err = waiter.execute("SELECT v FROM t", &[]).await.unwrap_err();
    assert!(err.is_contention(), "unexpected error: {err}");
    assert!(started.elapsed() >= Duration::from_millis(30));

    holder.execute("COMMIT", &[]).await.unwrap();
    assert!(waiter.execute("SELECT v FROM t", &[]).await.unwrap().is_empty());
}

/// Opens `path` under its own registry and holds a read transaction on it.
async fn hold_read_lock(path: &std::path::Path) -> Adapter {
    let reader = Adapter::with_registry(AdapterOptions::new("reader").with_database(path), Registry::new());
    reader.execute("CREATE TABLE IF NOT EXISTS t (v INTEGER)", &[]).await.unwrap();
    reader.execute("BEGIN", &[]).await.unwrap();
    reader.execute("SELECT v FROM t", &[]).await.unwrap();
    reader
}

fn insert_in_transaction(db: &Adapter, v: i64) -> impl std::future::Future<Output = Result<()>> + '_ {
    db.execute_in_transaction(move |tx| async move {
        tx.execute("INSERT INTO t (v) VALUES (?)", &[Value::from(v)]).await?;
        Ok(())
    })
}

#[tokio::test]
async fn test_busy_commit_is_retried() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("commit.db");
    let reader = hold_read_lock(&path).await;
    let writer = Adapter::with_registry(
        AdapterOptions::new("writer")
            .with_database(&path)
            .with_retry(10, Duration::from_millis(10)),
        Registry::new(),
    );

    let (written, released) = tokio::join!(insert_in_transaction(&writer, 1), async {
        tokio::time::sleep(Duration::from_millis(30)).await;
        reader.execute("COMMIT", &[]).await
    });
    released.unwrap();
    written.unwrap();

    let rows = reader.execute("SELECT COUNT(*) AS n FROM t", &[]).await.unwrap();
    assert_eq!(rows[0].get_i64("n"), Some(1));
}

#[tokio::test]
async fn test_failed_commit_rolls_back_and_frees_handle() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("stuck.db");
    let reader = hold_read_lock(&path).await;
    let writer = Adapter::with_registry(
        AdapterOptions::new("writer")
            .with_database(&path)
            .with_retry(2, Duration::from_millis(10)),
        Registry::new(),
    );

    let err = insert_in_transaction(&writer, 1).await.unwrap_err();
    assert!(err.is_contention(), "unexpected error: {err}");
    reader.execute("COMMIT", &[]).await.unwrap();

    insert_in_transaction(&writer, 2).await.unwrap();
    let rows = reader.execute("SELECT v FROM t ORDER BY v", &[]).await.unwrap();
    let values: Vec<_> = rows.iter().map(|row| row.get_i64("v")).collect();
    assert_eq!(values, vec![Some(2)]);
}

#[tokio::test]
async fn test_non_contention_errors_are_not_retried() {
    let db = Adapter::with_registry(
        AdapterOptions::new("fatal").with_retry(5, Duration::from_millis(200)),
        Registry::new(),
    );
    let started = Instant::now();
    let err = db.execute("SELECT * FROM missing", &[]).await.unwrap_err();
    assert!(matches!(err, SqliteError::DatabaseError(_)));
    assert!(started.elapsed() < Duration::from_millis(200));
}

struct ReadOnly;

#[async_trait]
impl Hook for ReadOnly {
    async fn executing(&self, event: &ExecuteEvent<'_>) -> Result<()> {
        if event.statement.is_select() {
            Ok(())
        } else {
            Err(SqliteError::HookError("read-only adapter".into()))
        }
    }
}

struct CountLoads(Arc<AtomicUsize>);

#[async_trait]
impl Hook for CountLoads {
    async fn loaded(&self, _event: &LoadEvent<'_>) -> Result<()> {
        self.0.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[tokio::test]
async fn test_hooks_can_reject_statements() {
    let db = memory_adapter("hooks");
    db.execute("CREATE TABLE t (v INTEGER)", &[]).await.unwrap();
    db.subscribe(ReadOnly);

    let err = db.execute("INSERT INTO t (v) VALUES (1)", &[]).await.unwrap_err();
    assert!(matches!(err, SqliteError::HookError(_)));
    assert!(db.execute(Select::from("t"), &[]).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_load_hooks_fire_once_per_handle() {
    let registry = Registry::new();
    let loads = Arc::new(AtomicUsize::new(0));

    let first = Adapter::with_registry(AdapterOptions::new("loads"), registry.clone());
    first.subscribe(CountLoads(Arc::clone(&loads)));
    first.open().await.unwrap();

    let second = Adapter::with_registry(AdapterOptions::new("loads"), registry.clone());
    second.subscribe(CountLoads(Arc::clone(&loads)));
    second.open().await.unwrap();

    assert_eq!(loads.load(Ordering::SeqCst), 1);
    assert!(registry.close("loads"));
}

struct SlowLoads(Arc<AtomicUsize>);

#[async_trait]
impl Hook for SlowLoads {
    async fn loading(&self, _event: &LoadEvent<'_>) -> Result<()> {
        tokio::time::sleep(Duration::from_millis(20)).await;
        Ok(())
    }

    async fn loaded(&self, _event: &LoadEvent<'_>) -> Result<()> {
        self.0.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[tokio::test]
async fn test_concurrent_open_fires_load_hooks_once() {
    let registry = Registry::new();
    let loads = Arc::new(AtomicUsize::new(0));

    let first = Adapter::with_registry(AdapterOptions::new("racing"), registry.clone());
    first.subscribe(SlowLoads(Arc::clone(&loads)));
    let second = Adapter::with_registry(AdapterOptions::new("racing"), registry.clone());
    second.subscribe(SlowLoads(Arc::clone(&loads)));

    let (a, b) = tokio::join!(first.open(), second.open());
    a.unwrap();
    b.unwrap();
    assert_eq!(loads.load(Ordering::SeqCst), 1);
}

// =============================================================================
// Queries, views and indexes
// =============================================================================

async fn seed_customers(db: &Adapter) {
    db.execute("CREATE TABLE customer (id INTEGER PRIMARY KEY, name TEXT)", &[])
        .await
        .unwrap();
    db.execute("CREATE TABLE purchase (id INTEGER PRIMARY KEY, customer INTEGER, amount INTEGER)", &[])
        .await
        .unwrap();
    db.execute("INSERT INTO customer (id, name) VALUES (1, 'Ada'), (2, 'Grace')", &[])
        .await
        .unwrap();
    db.execute(
        "INSERT INTO purchase (customer, amount) VALUES (1, 10), (1, 5), (2, 7)",
        &[],
    )
    .await
    .unwrap();
}

#[tokio::test]
async fn test_json_array_subquery_is_reparsed() {
    let db = memory_adapter("compose");
    seed_customers(&db).await;

    let purchases = Select::from("purchase")
        .select(["amount"])
        .filter(Expr::field("purchase.customer").eq(Expr::field("customer.id")));
    let query = Select::from("customer")
        .field("name")
        .field(Expr::json_array_of(purchases).as_("purchases"))
        .order_by(Expr::field("id"));

    let rows = db.execute(query, &[]).await.unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].get_str("name"), Some("Ada"));
    assert_eq!(
        rows[0].get("purchases"),
        Some(&Value::Json(json!([{"amount": 10}, {"amount": 5}])))
    );
    assert_eq!(
        rows[1].get("purchases"),
        Some(&Value::Json(json!([{"amount": 7}])))
    );
}

#[tokio::test]
async fn test_json_group_array_per_group() {
    let db = memory_adapter("group");
    seed_customers(&db).await;

    let query = Select::from("purchase")
        .field("customer")
        .field(Expr::json_group_array(JsonObject::new(["amount"])).as_("items"))
        .field(Expr::field("amount").sum().as_("total"))
        .group_by(Expr::field("customer"))
        .order_by(Expr::field("customer"));
    let rows = db.execute(query, &[]).await.unwrap();
    assert_eq!(rows[0].get_i64("total"), Some(15));
    assert_eq!(rows[1].get("items"), Some(&Value::Json(json!([{"amount": 7}]))));
}

#[test]
fn test_formatter_is_pure() {
    let query = Select::from("customer")
        .field("name")
        .field(Expr::json_array_of(Select::from("purchase").select(["amount"])).as_("purchases"))
        .filter(Expr::field("name").starts_with("A"))
        .take(10);
    let snapshot = query.clone();
    let formatter = Formatter::new();

    let first = formatter.format_select(&query).unwrap();
    let second = formatter.format_select(&query).unwrap();
    assert_eq!(first, second);
    assert_eq!(query, snapshot);
}

#[tokio::test]
async fn test_view_and_index_accessors() {
    let db = memory_adapter("catalog");
    seed_customers(&db).await;

    let view = db.view("big_purchase");
    assert!(!view.exists().await.unwrap());
    view.create(Select::from("purchase").filter(Expr::field("amount").ge(7)))
        .await
        .unwrap();
    assert!(view.exists().await.unwrap());
    let rows = db.execute("SELECT amount FROM big_purchase ORDER BY amount", &[]).await.unwrap();
    assert_eq!(rows.iter().filter_map(|r| r.get_i64("amount")).collect::<Vec<_>>(), vec![7, 10]);

    let indexes = db.indexes("purchase");
    indexes
        .create("idx_purchase_customer", &["customer".to_string()])
        .await
        .unwrap();
    assert_eq!(
        indexes.list().await.unwrap(),
        vec![IndexSpec::new("idx_purchase_customer", &["customer"])]
    );
    indexes.drop("idx_purchase_customer").await.unwrap();
    assert!(indexes.list().await.unwrap().is_empty());
    view.drop().await.unwrap();
    assert!(!view.exists().await.unwrap());
}

#[tokio::test]
async fn test_custom_functions_are_registered() {
    let db = memory_adapter("functions");
    let rows = db
        .execute(
            Select::fixed()
                .field(Expr::uuid().as_("random"))
                .field(Expr::value("abc").to_guid().as_("stable")),
            &[],
        )
        .await
        .unwrap();
    let random = rows[0].get_str("random").unwrap();
    assert_eq!(random.len(), 36);

    let again = db
        .execute(Select::fixed().field(Expr::value("abc").to_guid().as_("stable")), &[])
        .await
        .unwrap();
    assert_eq!(rows[0].get_str("stable"), again[0].get_str("stable"));
}
