//! Engine configuration.

use crate::schema::StoreSchema;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Where the transactional store lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionalLocation {
    /// A redb database file.
    File(PathBuf),
    /// A private in-memory database.
    InMemory,
}

/// Where the flat slot space lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlatLocation {
    /// One file per slot inside this directory.
    Directory(PathBuf),
    /// A private in-memory slot space.
    InMemory,
}

/// Configuration for a [`StorageEngine`](crate::StorageEngine).
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Base URL of the relational endpoint. `None` makes the probe fail fast.
    pub server_url: Option<String>,

    /// Upper bound on the relational probe (health plus table setup).
    pub probe_timeout: Duration,

    /// Location of the transactional store.
    pub transactional: TransactionalLocation,

    /// Location of the flat slot space.
    pub flat: FlatLocation,

    /// Prefix put in front of every collection's slot name.
    pub slot_prefix: String,

    /// Collection declarations.
    pub schema: StoreSchema,

    /// Whether to insert the starter rooms into an empty store.
    pub seed_defaults: bool,

    /// Connectivity at construction time.
    pub online: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            server_url: None,
            probe_timeout: Duration::from_secs(3),
            transactional: TransactionalLocation::InMemory,
            flat: FlatLocation::InMemory,
            slot_prefix: String::new(),
            schema: StoreSchema::property_management(),
            seed_defaults: true,
            online: true,
        }
    }
}

impl EngineConfig {
    /// Creates a configuration with default values: no relational endpoint
    /// and in-memory local stores.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a configuration that keeps both local stores under `dir`:
    /// `dir/store.redb` for the transactional store and `dir/slots/` for
    /// the flat slot space.
    #[must_use]
    pub fn persistent(dir: &Path) -> Self {
        Self::default()
            .transactional(TransactionalLocation::File(dir.join("store.redb")))
            .flat(FlatLocation::Directory(dir.join("slots")))
    }

    /// Sets the relational endpoint.
    #[must_use]
    pub fn server_url(mut self, url: impl Into<String>) -> Self {
        self.server_url = Some(url.into());
        self
    }

    /// Sets the probe timeout.
    #[must_use]
    pub const fn probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    /// Sets the transactional store location.
    #[must_use]
    pub fn transactional(mut self, location: TransactionalLocation) -> Self {
        self.transactional = location;
        self
    }

    /// Sets the flat slot space location.
    #[must_use]
    pub fn flat(mut self, location: FlatLocation) -> Self {
        self.flat = location;
        self
    }

    /// Sets the slot name prefix.
    #[must_use]
    pub fn slot_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.slot_prefix = prefix.into();
        self
    }

    /// Sets the collection declarations.
    #[must_use]
    pub fn schema(mut self, schema: StoreSchema) -> Self {
        self.schema = schema;
        self
    }

    /// Enables or disables default-data seeding.
    #[must_use]
    pub const fn seed_defaults(mut self, value: bool) -> Self {
        self.seed_defaults = value;
        self
    }

    /// Sets the initial connectivity.
    #[must_use]
    pub const fn online(mut self, value: bool) -> Self {
        self.online = value;
        self
    }
}
