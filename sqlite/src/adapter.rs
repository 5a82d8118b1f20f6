//! The adapter: one logical database seen through a shared handle.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::config::AdapterOptions;
use crate::error::Result;
use crate::formatter::Formatter;
use crate::hooks::{Hook, Hooks, JsonResults, LoadEvent};
use crate::registry::{Handle, Registry};
use crate::table::{Indexes, Table, View};

/// Entry point for executing statements and migrating schemas.
///
/// Cloning an adapter is cheap and yields the same adapter: same options,
/// hooks and handle. Adapters created separately under the same logical
/// name share one native handle through their [`Registry`].
///
/// The handle is opened lazily by the first operation, or explicitly with
/// [`open`](Self::open).
///
/// # Examples
///
/// ```no_run
/// use localsql_sqlite::{Adapter, AdapterOptions};
///
/// # async fn run() -> localsql_sqlite::Result<()> {
/// let adapter = Adapter::new(AdapterOptions::new("app").with_database("app.db"));
/// let rows = adapter.execute("SELECT 1 AS one", &[]).await?;
/// assert_eq!(rows[0].get_i64("one"), Some(1));
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Adapter {
    inner: Arc<Inner>,
}

struct Inner {
    options: AdapterOptions,
    registry: Registry,
    hooks: Hooks,
    handle: Mutex<Option<Arc<Handle>>>,
}

impl Default for Adapter {
    fn default() -> Self {
        Self::new(AdapterOptions::default())
    }
}

impl Adapter {
    /// Creates an adapter backed by the process-wide registry.
    pub fn new(options: AdapterOptions) -> Self {
        Self::with_registry(options, Registry::global().clone())
    }

    /// Creates an adapter backed by `registry`.
    pub fn with_registry(options: AdapterOptions, registry: Registry) -> Self {
        let hooks = Hooks::default();
        hooks.subscribe(Arc::new(JsonResults));
        Self {
            inner: Arc::new(Inner {
                options,
                registry,
                hooks,
                handle: Mutex::new(None),
            }),
        }
    }

    pub fn options(&self) -> &AdapterOptions {
        &self.inner.options
    }

    /// Logical database name.
    pub fn name(&self) -> &str {
        &self.inner.options.name
    }

    pub fn registry(&self) -> &Registry {
        &self.inner.registry
    }

    /// The dialect formatter used for [`Query`](localsql_core::query::Query)
    /// statements.
    pub fn formatter(&self) -> Formatter {
        Formatter::new()
    }

    /// Appends a lifecycle hook after every hook registered so far.
    pub fn subscribe(&self, hook: impl Hook + 'static) {
        self.inner.hooks.subscribe(Arc::new(hook));
    }

    pub(crate) fn hooks(&self) -> &Hooks {
        &self.inner.hooks
    }

    /// Opens (or joins) the shared handle for this adapter's name.
    ///
    /// `loading`/`loaded` hooks fire only when this call constructs the
    /// handle.
    ///
    /// # Errors
    ///
    /// Returns [`DatabaseError`](crate::SqliteError::DatabaseError) if the
    /// database cannot be opened, or a hook's error.
    pub async fn open(&self) -> Result<()> {
        self.handle().await.map(|_| ())
    }

    /// Returns `true` when this adapter is attached to a handle.
    pub fn is_open(&self) -> bool {
        self.inner.handle.lock().is_some()
    }

    /// Detaches this adapter from its handle.
    ///
    /// The shared handle stays registered for other adapters; use
    /// [`Registry::close`] to drop it. The next operation reattaches.
    pub fn close(&self) {
        self.inner.handle.lock().take();
    }

    pub(crate) async fn handle(&self) -> Result<Arc<Handle>> {
        let attached = self.inner.handle.lock().clone();
        if let Some(handle) = attached {
            return Ok(handle);
        }

        let options = &self.inner.options;
        let registry = &self.inner.registry;
        let handle = match registry.get(&options.name) {
            Some(handle) => handle,
            None => {
                let _opening = registry.lock_opening().await;
                match registry.get(&options.name) {
                    Some(handle) => handle,
                    None => {
                        let event = LoadEvent {
                            name: &options.name,
                            database: options.database.as_deref(),
                        };
                        self.inner.hooks.loading(&event).await?;
                        let handle = registry.open(options)?;
                        self.inner.hooks.loaded(&event).await?;
                        handle
                    }
                }
            }
        };
        debug!(name = %options.name, "Attached adapter to handle");
        *self.inner.handle.lock() = Some(Arc::clone(&handle));
        Ok(handle)
    }

    /// Accessor for table `name`.
    pub fn table(&self, name: &str) -> Table<'_> {
        Table::new(self, name)
    }

    /// Accessor for view `name`.
    pub fn view(&self, name: &str) -> View<'_> {
        View::new(self, name)
    }

    /// Accessor for the secondary indexes of table `table`.
    pub fn indexes(&self, table: &str) -> Indexes<'_> {
        Indexes::new(self, table)
    }
}

impl std::fmt::Debug for Adapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Adapter")
            .field("options", &self.inner.options)
            .field("open", &self.is_open())
            .finish()
    }
}
