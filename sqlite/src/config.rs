//! Adapter configuration.
//!
//! Defines the YAML-serializable options that select the database file and
//! control contention retries.
//!
//! # Example YAML
//!
//! ```yaml
//! name: inventory
//! database: ./data/inventory.db
//! retry: 5
//! retry_interval_ms: 200
//! ```

use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Logical name used when none is configured.
pub const DEFAULT_NAME: &str = "local";

/// Retry interval used when none (or zero) is configured.
pub const DEFAULT_RETRY_INTERVAL_MS: u64 = 1000;

/// Options for one logical database.
///
/// Adapters created with the same [`name`](Self::name) share one native
/// handle through the registry; the first opener's `database` wins.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use localsql_sqlite::AdapterOptions;
///
/// let options = AdapterOptions::new("cache").with_retry(3, Duration::from_millis(50));
/// assert_eq!(options.retry, 3);
/// assert_eq!(options.retry_interval(), Duration::from_millis(50));
/// assert!(options.database.is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdapterOptions {
    /// Logical database name, the registry key.
    pub name: String,
    /// Database file. `None` opens an in-memory database.
    pub database: Option<PathBuf>,
    /// Maximum number of retries after a busy/locked error. `0` disables retry.
    pub retry: u32,
    /// Base retry interval in milliseconds.
    pub retry_interval_ms: u64,
}

impl Default for AdapterOptions {
    fn default() -> Self {
        Self {
            name: DEFAULT_NAME.to_string(),
            database: None,
            retry: 0,
            retry_interval_ms: DEFAULT_RETRY_INTERVAL_MS,
        }
    }
}

impl AdapterOptions {
    /// Creates in-memory options under `name`.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }

    /// Sets the database file.
    pub fn with_database(mut self, path: impl Into<PathBuf>) -> Self {
        self.database = Some(path.into());
        self
    }

    /// Enables contention retry.
    pub fn with_retry(mut self, retry: u32, interval: Duration) -> Self {
        self.retry = retry;
        self.retry_interval_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Base retry interval, falling back to the default when unset.
    pub fn retry_interval(&self) -> Duration {
        match self.retry_interval_ms {
            0 => Duration::from_millis(DEFAULT_RETRY_INTERVAL_MS),
            ms => Duration::from_millis(ms),
        }
    }

    /// Loads options from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns [`IoError`](crate::SqliteError::IoError) if the file cannot
    /// be read, or [`YamlError`](crate::SqliteError::YamlError) if parsing
    /// fails.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        let reader = BufReader::new(file);
        let options = serde_yaml::from_reader(reader)?;
        Ok(options)
    }

    /// Saves the options as YAML.
    ///
    /// # Errors
    ///
    /// Returns [`IoError`](crate::SqliteError::IoError) if the file cannot
    /// be written, or [`YamlError`](crate::SqliteError::YamlError) if
    /// serialization fails.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = std::fs::File::create(path)?;
        let writer = BufWriter::new(file);
        serde_yaml::to_writer(writer, self)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_partial_uses_defaults() {
        let options: AdapterOptions = serde_yaml::from_str("retry: 4\n").unwrap();
        assert_eq!(options.name, "local");
        assert_eq!(options.retry, 4);
        assert_eq!(options.retry_interval(), Duration::from_millis(1000));
        assert!(options.database.is_none());
    }

    #[test]
    fn test_zero_interval_falls_back_to_default() {
        let options = AdapterOptions {
            retry_interval_ms: 0,
            ..AdapterOptions::default()
        };
        assert_eq!(options.retry_interval(), Duration::from_millis(1000));
    }

    #[test]
    fn test_load_save_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("adapter.yml");

        let original = AdapterOptions::new("inventory")
            .with_database(dir.path().join("inventory.db"))
            .with_retry(5, Duration::from_millis(200));
        original.save(&path).unwrap();

        let loaded = AdapterOptions::load(&path).unwrap();
        assert_eq!(loaded, original);
    }
}
