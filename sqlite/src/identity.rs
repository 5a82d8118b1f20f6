//! Per-attribute identity counters kept in the reserved `increment_id` table.

use localsql_core::query::{Expr, Insert, Select, Update};
use localsql_core::{FieldDescriptor, LogicalType, MigrationSpec, validate_identifier};
use tracing::debug;

use crate::adapter::Adapter;
use crate::error::{Result, SqliteError};

/// Reserved table holding one counter per entity attribute.
pub const IDENTITY_TABLE: &str = "increment_id";

fn identity_migration() -> MigrationSpec {
    MigrationSpec::new(IDENTITY_TABLE, "1.0")
        .with_model("increments")
        .with_description("Increments migration (version 1.0)")
        .with_field(FieldDescriptor::new("id", LogicalType::Counter).primary())
        .with_field(FieldDescriptor::new("entity", LogicalType::Text).size(120))
        .with_field(FieldDescriptor::new("attribute", LogicalType::Text).size(120))
        .with_field(FieldDescriptor::new("value", LogicalType::Integer))
}

impl Adapter {
    /// Allocates the next identity value for `entity.attribute`.
    ///
    /// The first allocation for a pair seeds the counter from the largest
    /// value already stored in the entity table, so it never hands out an
    /// existing key. Allocation runs in a transaction on this handle but is
    /// not guarded against other processes sharing the file.
    ///
    /// # Errors
    ///
    /// Returns [`DatabaseError`](SqliteError::DatabaseError) when the entity
    /// table or attribute does not exist on first use.
    pub async fn select_identity(&self, entity: &str, attribute: &str) -> Result<i64> {
        validate_identifier(entity)?;
        validate_identifier(attribute)?;
        self.migrate(&mut identity_migration()).await?;

        let entity = entity.to_string();
        let attribute = attribute.to_string();
        self.execute_in_transaction(|tx| async move {
            let lookup = Select::from(IDENTITY_TABLE).select(["id", "value"]).filter(
                Expr::field("entity")
                    .eq(entity.as_str())
                    .and(Expr::field("attribute").eq(attribute.as_str())),
            );
            let rows = tx.execute(lookup, &[]).await?;

            let Some(counter) = rows.first() else {
                let seed = Select::from(entity.as_str())
                    .field(Expr::field(&attribute).max().as_("value"));
                let rows = tx.execute(seed, &[]).await?;
                let next = rows.first().and_then(|row| row.get_i64("value")).unwrap_or(0) + 1;
                let insert = Insert::into(IDENTITY_TABLE)
                    .value("entity", entity.as_str())
                    .value("attribute", attribute.as_str())
                    .value("value", next);
                tx.execute(insert, &[]).await?;
                debug!(entity = %entity, attribute = %attribute, value = next, "Seeded identity counter");
                return Ok(next);
            };

            let id = counter
                .get_i64("id")
                .ok_or_else(|| SqliteError::ConversionError("identity counter without id".to_string()))?;
            let next = counter.get_i64("value").unwrap_or(0) + 1;
            let update = Update::table(IDENTITY_TABLE)
                .set("value", next)
                .filter(Expr::field("id").eq(id));
            tx.execute(update, &[]).await?;
            Ok(next)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use localsql_core::Value;

    use super::*;
    use crate::{AdapterOptions, Registry};

    fn adapter() -> Adapter {
        Adapter::with_registry(AdapterOptions::default(), Registry::new())
    }

    #[tokio::test]
    async fn test_identity_starts_at_one_for_empty_table() {
        let db = adapter();
        db.execute("CREATE TABLE orders (id INTEGER)", &[]).await.unwrap();
        assert_eq!(db.select_identity("orders", "id").await.unwrap(), 1);
        assert_eq!(db.select_identity("orders", "id").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_identity_seeds_from_existing_maximum() {
        let db = adapter();
        db.execute("CREATE TABLE orders (id INTEGER)", &[]).await.unwrap();
        for id in [3, 41, 7] {
            db.execute("INSERT INTO orders (id) VALUES (?)", &[Value::from(id)])
                .await
                .unwrap();
        }
        assert_eq!(db.select_identity("orders", "id").await.unwrap(), 42);
        assert_eq!(db.select_identity("orders", "id").await.unwrap(), 43);
        assert!(db.table(IDENTITY_TABLE).exists().await.unwrap());
    }

    #[tokio::test]
    async fn test_identity_for_missing_entity_fails() {
        let err = adapter().select_identity("nowhere", "id").await.unwrap_err();
        assert!(matches!(err, SqliteError::DatabaseError(_)));
    }
}
