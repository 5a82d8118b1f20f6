use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use localsql_core::{
    ColumnDescriptor, INITIAL_VERSION, MIGRATIONS_TABLE, MigrationRecord, MigrationSpec,
    max_version, validate_migration,
};
use localsql_sqlite::{Adapter, AdapterOptions, MigrationReport};
use serde::{Deserialize, Serialize};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// CLI-specific output format enum with clap argument parsing support.
#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum CliOutputFormat {
    Json,
    Text,
}

#[derive(Debug, Parser)]
#[command(name = "localsql")]
#[command(about = "Declarative SQLite schema migrations")]
#[command(version)]
struct Cli {
    /// Adapter options YAML (name, retry, retry_interval_ms).
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Log debug output to stderr. `RUST_LOG` takes precedence.
    #[arg(long, short, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Apply migration spec files (JSON or YAML) in order.
    Migrate(MigrateArgs),
    /// Show existence, version and columns of a table.
    Status(StatusArgs),
    /// Allocate the next identity value for an entity attribute.
    Identity(IdentityArgs),
}

#[derive(Debug, Args)]
struct MigrateArgs {
    /// SQLite database file (created if missing).
    #[arg(long)]
    db: PathBuf,
    /// Migration spec files, each holding one spec or a list of specs.
    #[arg(required = true)]
    specs: Vec<PathBuf>,
    /// Output format.
    #[arg(long, default_value = "text")]
    format: CliOutputFormat,
}

#[derive(Debug, Args)]
struct StatusArgs {
    /// SQLite database file.
    #[arg(long)]
    db: PathBuf,
    /// Table to inspect.
    #[arg(long)]
    table: String,
    /// Output format.
    #[arg(long, default_value = "text")]
    format: CliOutputFormat,
}

#[derive(Debug, Args)]
struct IdentityArgs {
    /// SQLite database file.
    #[arg(long)]
    db: PathBuf,
    /// Table the identity belongs to.
    #[arg(long)]
    entity: String,
    /// Column the identity is allocated for.
    #[arg(long)]
    attribute: String,
}

/// A spec file holds either one migration or a list of them.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SpecFile {
    Many(Vec<MigrationSpec>),
    One(MigrationSpec),
}

#[derive(Debug, Serialize)]
struct TableStatusOutput {
    table: String,
    exists: bool,
    version: Option<String>,
    columns: Vec<ColumnDescriptor>,
    migrations: Vec<MigrationRecord>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(if cli.verbose { "debug" } else { "warn" })
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let result = match cli.command {
        Command::Migrate(args) => run_migrate(cli.config.as_deref(), args).await,
        Command::Status(args) => run_status(cli.config.as_deref(), args).await,
        Command::Identity(args) => run_identity(cli.config.as_deref(), args).await,
    };

    if let Err(err) = result {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn open_adapter(config: Option<&Path>, db: &Path) -> Result<Adapter, String> {
    let options = match config {
        Some(path) => AdapterOptions::load(path)
            .map_err(|e| format!("Failed to load config '{}': {e}", path.display()))?,
        None => AdapterOptions::default(),
    };
    Ok(Adapter::new(options.with_database(db)))
}

fn load_specs(path: &Path) -> Result<Vec<MigrationSpec>, String> {
    let file = File::open(path).map_err(|e| format!("Failed to open '{}': {e}", path.display()))?;
    let reader = BufReader::new(file);
    let is_yaml = matches!(
        path.extension().and_then(|ext| ext.to_str()),
        Some("yaml" | "yml")
    );
    let parsed: SpecFile = if is_yaml {
        serde_yaml::from_reader(reader).map_err(|e| format!("Invalid spec '{}': {e}", path.display()))?
    } else {
        serde_json::from_reader(reader).map_err(|e| format!("Invalid spec '{}': {e}", path.display()))?
    };
    Ok(match parsed {
        SpecFile::Many(specs) => specs,
        SpecFile::One(spec) => vec![spec],
    })
}

async fn run_migrate(config: Option<&Path>, args: MigrateArgs) -> Result<(), String> {
    let mut specs = Vec::new();
    for path in &args.specs {
        for spec in load_specs(path)? {
            let errors = validate_migration(&spec);
            if !errors.is_empty() {
                let messages: Vec<String> = errors.iter().map(ToString::to_string).collect();
                return Err(format!(
                    "Invalid migration for '{}' in '{}': {}",
                    spec.applies_to,
                    path.display(),
                    messages.join("; ")
                ));
            }
            specs.push(spec);
        }
    }

    info!(specs = specs.len(), db = %args.db.display(), "Applying migrations");
    let adapter = open_adapter(config, &args.db)?;
    let mut reports: Vec<MigrationReport> = Vec::with_capacity(specs.len());
    for mut spec in specs {
        let report = adapter
            .migrate(&mut spec)
            .await
            .map_err(|e| format!("Migration of '{}' failed: {e}", spec.applies_to))?;
        reports.push(report);
    }

    match args.format {
        CliOutputFormat::Json => {
            let json = serde_json::to_string_pretty(&reports)
                .map_err(|e| format!("Failed to serialize report: {e}"))?;
            println!("{json}");
        }
        CliOutputFormat::Text => {
            for report in &reports {
                match &report.rebuilt {
                    Some(backup) => println!("{}: {} (backup: {backup})", report.table, report.outcome),
                    None => println!("{}: {}", report.table, report.outcome),
                }
            }
        }
    }
    Ok(())
}

async fn run_status(config: Option<&Path>, args: StatusArgs) -> Result<(), String> {
    let adapter = open_adapter(config, &args.db)?;
    let table = adapter.table(&args.table);
    let exists = table
        .exists()
        .await
        .map_err(|e| format!("Failed to inspect '{}': {e}", args.table))?;
    let (migrations, columns) = if exists {
        let migrations = if adapter
            .table(MIGRATIONS_TABLE)
            .exists()
            .await
            .map_err(|e| format!("Failed to inspect migrations: {e}"))?
        {
            Some(
                table
                    .migrations()
                    .await
                    .map_err(|e| format!("Failed to read migrations: {e}"))?,
            )
        } else {
            None
        };
        let columns = table
            .columns()
            .await
            .map_err(|e| format!("Failed to read columns: {e}"))?;
        (migrations, columns)
    } else {
        (None, Vec::new())
    };
    let version = migrations.as_ref().map(|records| {
        max_version(records.iter().map(|record| record.version.as_str()))
            .unwrap_or(INITIAL_VERSION)
            .to_string()
    });

    let status = TableStatusOutput {
        table: args.table,
        exists,
        version,
        columns,
        migrations: migrations.unwrap_or_default(),
    };
    match args.format {
        CliOutputFormat::Json => {
            let json = serde_json::to_string_pretty(&status)
                .map_err(|e| format!("Failed to serialize status: {e}"))?;
            println!("{json}");
        }
        CliOutputFormat::Text => {
            println!("Table: {}", status.table);
            println!("  Exists: {}", if status.exists { "yes" } else { "no" });
            if let Some(version) = &status.version {
                println!("  Version: {version}");
            }
            for column in &status.columns {
                println!(
                    "  {} {}{}{}",
                    column.name,
                    column.type_text,
                    if column.nullable { "" } else { " NOT NULL" },
                    if column.primary { " PRIMARY KEY" } else { "" }
                );
            }
            if !status.migrations.is_empty() {
                println!("  Migrations:");
                for record in &status.migrations {
                    match &record.description {
                        Some(description) => println!("    {} {description}", record.version),
                        None => println!("    {}", record.version),
                    }
                }
            }
        }
    }
    Ok(())
}

async fn run_identity(config: Option<&Path>, args: IdentityArgs) -> Result<(), String> {
    let adapter = open_adapter(config, &args.db)?;
    let value = adapter
        .select_identity(&args.entity, &args.attribute)
        .await
        .map_err(|e| format!("Identity allocation failed: {e}"))?;
    println!("{value}");
    Ok(())
}
