//! Declarative schema migration.
//!
//! [`Adapter::migrate`] brings one table in line with a [`MigrationSpec`]:
//! it creates the table when absent, otherwise diffs the live columns
//! against the spec and either adds the new columns in place or rebuilds
//! the table. Indexes are then applied and the migration is recorded in the
//! reserved `migrations` table. A spec whose version is not newer than the
//! stored one is skipped entirely.
//!
//! # Example
//!
//! ```no_run
//! use localsql_core::{FieldDescriptor, LogicalType, MigrationSpec};
//! use localsql_sqlite::{Adapter, AdapterOptions, TableStatus};
//!
//! # async fn run() -> localsql_sqlite::Result<()> {
//! let adapter = Adapter::new(AdapterOptions::new("app").with_database("app.db"));
//! let mut spec = MigrationSpec::new("user", "1.0")
//!     .with_field(FieldDescriptor::new("id", LogicalType::Counter).primary())
//!     .with_field(FieldDescriptor::new("email", LogicalType::Text).size(255));
//!
//! let report = adapter.migrate(&mut spec).await?;
//! assert_eq!(report.outcome, TableStatus::Created);
//!
//! // Same version again: nothing to do.
//! let report = adapter.migrate(&mut spec).await?;
//! assert_eq!(report.outcome, TableStatus::AlreadyApplied);
//! assert!(spec.updated);
//! # Ok(())
//! # }
//! ```

use localsql_core::query::Insert;
use localsql_core::{
    ColumnDescriptor, FieldDescriptor, LogicalType, MIGRATIONS_TABLE, MigrationSpec, Value,
    is_applied, validate_migration,
};
use serde::Serialize;
use tracing::{debug, info};

use crate::adapter::Adapter;
use crate::error::{Result, SchemaError};
use crate::rebuild::rebuild_table;
use crate::typemap::same_type;

const MIGRATIONS_DDL: &str = "CREATE TABLE \"migrations\" (\
    \"id\" INTEGER PRIMARY KEY AUTOINCREMENT, \
    \"appliesTo\" TEXT NOT NULL, \
    \"model\" TEXT NULL, \
    \"description\" TEXT, \
    \"version\" TEXT NOT NULL)";

/// What a migration did to its table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TableStatus {
    /// The stored version already covers the requested one.
    AlreadyApplied,
    Created,
    /// Columns were added or the table was rebuilt.
    Altered,
    /// The table already matched; only indexes and the record were written.
    Unchanged,
}

impl TableStatus {
    /// Numeric outcome code: -1, 0, 1 or 2.
    pub fn code(self) -> i32 {
        match self {
            Self::AlreadyApplied => -1,
            Self::Created => 0,
            Self::Altered => 1,
            Self::Unchanged => 2,
        }
    }

    /// Parses an outcome code.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::InvalidTableStatus`] for any other code.
    ///
    /// # Examples
    ///
    /// ```
    /// use localsql_sqlite::TableStatus;
    ///
    /// assert_eq!(TableStatus::from_code(1).unwrap(), TableStatus::Altered);
    /// assert!(TableStatus::from_code(7).is_err());
    /// ```
    pub fn from_code(code: i32) -> Result<Self> {
        match code {
            -1 => Ok(Self::AlreadyApplied),
            0 => Ok(Self::Created),
            1 => Ok(Self::Altered),
            2 => Ok(Self::Unchanged),
            other => Err(SchemaError::InvalidTableStatus(other).into()),
        }
    }
}

impl std::fmt::Display for TableStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::AlreadyApplied => "already applied",
            Self::Created => "created",
            Self::Altered => "altered",
            Self::Unchanged => "unchanged",
        };
        f.write_str(label)
    }
}

/// Summary of one [`Adapter::migrate`] call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationReport {
    pub table: String,
    pub outcome: TableStatus,
    /// Backup table left behind by a rebuild.
    pub rebuilt: Option<String>,
    /// Schema statements issued, bookkeeping included.
    pub statements: usize,
}

/// How an existing table has to change.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum TablePlan {
    /// Recreate the table with exactly these fields.
    Rebuild(Vec<FieldDescriptor>),
    /// Add these columns in place.
    Alter(Vec<FieldDescriptor>),
    Unchanged,
}

fn upsert(fields: &mut Vec<FieldDescriptor>, field: FieldDescriptor) {
    match fields.iter_mut().find(|existing| existing.name == field.name) {
        Some(existing) => *existing = field,
        None => fields.push(field),
    }
}

/// `ALTER TABLE ADD COLUMN` cannot add keys or NOT NULL columns without a
/// default.
fn needs_rebuild_to_add(field: &FieldDescriptor) -> bool {
    field.primary || field.ty == LogicalType::Counter || field.nullable == Some(false)
}

/// Diffs `spec` against the live `columns` and prunes its directive lists.
///
/// Removals of missing or primary columns are dropped. Changes to missing
/// columns become adds, changes to primary columns are dropped. Adds that
/// already match their live column are pruned, so afterwards `spec.add`
/// holds only columns that do not exist yet.
pub(crate) fn plan_changes(spec: &mut MigrationSpec, columns: &[ColumnDescriptor]) -> TablePlan {
    let live = |name: &str| columns.iter().find(|column| column.name == name);
    let mut target = spec.add.clone();
    let mut rebuild = false;

    spec.remove
        .retain(|field| live(&field.name).is_some_and(|column| !column.primary));
    if !spec.remove.is_empty() {
        debug!(table = %spec.applies_to, removed = spec.remove.len(), "Removal requires rebuild");
        rebuild = true;
    }

    let mut reclassified = Vec::new();
    spec.change.retain(|field| match live(&field.name) {
        Some(column) if column.primary => false,
        Some(column) => {
            if !same_type(field, column) {
                rebuild = true;
            }
            true
        }
        None => {
            reclassified.push(field.clone());
            false
        }
    });
    for field in &spec.change {
        upsert(&mut target, field.clone());
    }
    for field in reclassified {
        upsert(&mut target, field.clone());
        upsert(&mut spec.add, field);
    }
    target.retain(|field| !spec.remove.iter().any(|removed| removed.name == field.name));

    if columns
        .iter()
        .any(|column| !target.iter().any(|field| field.name == column.name))
    {
        rebuild = true;
    }

    spec.add.retain(|field| match live(&field.name) {
        Some(column) if column.primary => false,
        Some(column) if same_type(field, column) => false,
        Some(_) => {
            rebuild = true;
            true
        }
        None => {
            if needs_rebuild_to_add(field) {
                rebuild = true;
            }
            true
        }
    });

    if rebuild {
        TablePlan::Rebuild(target)
    } else if spec.add.is_empty() {
        TablePlan::Unchanged
    } else {
        TablePlan::Alter(spec.add.clone())
    }
}

#[derive(Debug)]
enum MigrationState {
    CheckMigrationsTable,
    CreateMigrationsTable,
    CheckVersion,
    CheckTarget,
    CreateTable,
    DiffColumns,
    ApplyIndexes(TableStatus),
    RecordMigration(TableStatus),
    Done(TableStatus),
}

impl Adapter {
    /// Applies `spec` to its table.
    ///
    /// `spec` is pruned in place while planning (see
    /// [`MigrationSpec`]) and `spec.updated` is set when no column DDL was
    /// needed.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`](crate::SqliteError::ValidationError) for
    /// a malformed spec before anything runs. Engine failures abort the
    /// migration where they happen; statements already run are not undone.
    pub async fn migrate(&self, spec: &mut MigrationSpec) -> Result<MigrationReport> {
        if let Some(err) = validate_migration(spec).into_iter().next() {
            return Err(err.into());
        }

        let name = spec.applies_to.clone();
        let table = self.table(&name);
        let mut report = MigrationReport {
            table: name.clone(),
            outcome: TableStatus::Unchanged,
            rebuilt: None,
            statements: 0,
        };

        let mut state = MigrationState::CheckMigrationsTable;
        loop {
            debug!(table = %name, state = ?state, "Migration step");
            state = match state {
                MigrationState::CheckMigrationsTable => {
                    if self.table(MIGRATIONS_TABLE).exists().await? {
                        MigrationState::CheckVersion
                    } else {
                        MigrationState::CreateMigrationsTable
                    }
                }
                MigrationState::CreateMigrationsTable => {
                    self.execute(MIGRATIONS_DDL, &[]).await?;
                    report.statements += 1;
                    MigrationState::CheckVersion
                }
                MigrationState::CheckVersion => {
                    let stored = table.version().await?;
                    if is_applied(&stored, &spec.version) {
                        debug!(table = %name, stored = %stored, requested = %spec.version, "Version already applied");
                        spec.updated = true;
                        MigrationState::Done(TableStatus::AlreadyApplied)
                    } else {
                        MigrationState::CheckTarget
                    }
                }
                MigrationState::CheckTarget => {
                    if table.exists().await? {
                        MigrationState::DiffColumns
                    } else {
                        MigrationState::CreateTable
                    }
                }
                MigrationState::CreateTable => {
                    table.create(&spec.add).await?;
                    report.statements += 1;
                    MigrationState::ApplyIndexes(TableStatus::Created)
                }
                MigrationState::DiffColumns => {
                    let columns = table.columns().await?;
                    match plan_changes(spec, &columns) {
                        TablePlan::Rebuild(fields) => {
                            let rebuilt = rebuild_table(self, &name, &fields).await?;
                            report.statements += rebuilt.statements;
                            report.rebuilt = Some(rebuilt.backup_table);
                            MigrationState::ApplyIndexes(TableStatus::Altered)
                        }
                        TablePlan::Alter(fields) => {
                            table.add(&fields).await?;
                            report.statements += fields.len();
                            MigrationState::ApplyIndexes(TableStatus::Altered)
                        }
                        TablePlan::Unchanged => MigrationState::ApplyIndexes(TableStatus::Unchanged),
                    }
                }
                MigrationState::ApplyIndexes(status) => {
                    let indexes = self.indexes(&name);
                    for index in &spec.indexes {
                        indexes.create(&index.name, &index.columns).await?;
                    }
                    MigrationState::RecordMigration(status)
                }
                MigrationState::RecordMigration(status) => {
                    let record = Insert::into(MIGRATIONS_TABLE)
                        .value("appliesTo", name.as_str())
                        .value("model", Value::from(spec.model.clone()))
                        .value("description", Value::from(spec.description.clone()))
                        .value("version", spec.version.as_str());
                    self.execute(record, &[]).await?;
                    report.statements += 1;
                    if status == TableStatus::Unchanged {
                        spec.updated = true;
                    }
                    MigrationState::Done(status)
                }
                MigrationState::Done(status) => {
                    report.outcome = status;
                    break;
                }
            };
        }

        if report.outcome != TableStatus::AlreadyApplied {
            info!(
                table = %name,
                version = %spec.version,
                outcome = %report.outcome,
                statements = report.statements,
                "Applied migration"
            );
        }
        Ok(report)
    }
}
