//! The storage engine: backend selection, readiness and the CRUD contract.
//!
//! Construction spawns backend selection in the background. The selection
//! is a single shared future; every operation awaits it before snapshotting
//! the active adapter, so calls issued before readiness queue behind it
//! instead of starting a second selection.
//!
//! Selection order is relational (probe under `probe_timeout`), then the
//! transactional store, then the flat store. Connectivity transitions
//! re-run part of the chain; records are never migrated between backends.

use crate::backend::{BackendKind, FlatAdapter, RelationalAdapter, StoreAdapter, TransactionalAdapter};
use crate::config::{EngineConfig, FlatLocation};
use crate::error::{AdapterError, AdapterResult, StoreError, StoreResult};
use crate::query::Query;
use crate::record::{Record, RecordId};
use crate::schema::CollectionSchema;
use crate::seed;
use crate::snapshot::Snapshot;
use futures::future::{BoxFuture, FutureExt, Shared};
use innkeep_slots::{FileSlots, InMemorySlots, SlotStore};
use innkeep_wire::{ClientConfig, HttpQueryClient, QueryClient, WireError};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Where backend selection currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnginePhase {
    /// Selection has not started.
    Uninitialized,
    /// Probing the relational endpoint.
    ProbingPrimary,
    /// Opening the transactional store.
    FallbackTransactional,
    /// Opening the flat store.
    FallbackFlat,
    /// A backend is active.
    Ready(BackendKind),
    /// Every backend failed to open.
    Unavailable,
}

impl fmt::Display for EnginePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EnginePhase::Uninitialized => f.write_str("uninitialized"),
            EnginePhase::ProbingPrimary => f.write_str("probing primary"),
            EnginePhase::FallbackTransactional => f.write_str("fallback: transactional"),
            EnginePhase::FallbackFlat => f.write_str("fallback: flat"),
            EnginePhase::Ready(kind) => write!(f, "ready ({kind})"),
            EnginePhase::Unavailable => f.write_str("unavailable"),
        }
    }
}

/// Diagnostic snapshot of the engine descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EngineStatus {
    /// The active backend, if any.
    pub backend: Option<BackendKind>,
    /// Whether the active backend answered its last open or probe.
    pub connected: bool,
    /// Last known connectivity.
    pub online: bool,
    /// Whether a backend has been activated.
    pub ready: bool,
}

/// Record counts per data collection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CollectionStats {
    /// Records per collection.
    pub counts: BTreeMap<String, usize>,
    /// Sum of all counts.
    pub total: usize,
}

/// Which part of the selection chain to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SelectionMode {
    /// Relational, then transactional, then flat.
    Full,
    /// Relational only; keep the current backend if the probe fails.
    PrimaryOnly,
    /// Transactional, then flat.
    LocalOnly,
}

type Selection = Shared<BoxFuture<'static, Option<BackendKind>>>;

struct Descriptor {
    phase: EnginePhase,
    active: Option<Arc<dyn StoreAdapter>>,
    online: bool,
    connected: bool,
}

struct EngineInner {
    config: EngineConfig,
    client: Option<Arc<dyn QueryClient>>,
    state: RwLock<Descriptor>,
    selection: Mutex<Option<Selection>>,
    // redb holds an exclusive lock on its file, so local adapters are opened
    // once and reused across re-selections.
    transactional: Mutex<Option<Arc<TransactionalAdapter>>>,
    flat: Mutex<Option<Arc<FlatAdapter>>>,
}

/// Handle to the storage engine. Cloning is cheap and shares all state.
#[derive(Clone)]
pub struct StorageEngine {
    inner: Arc<EngineInner>,
}

impl fmt::Debug for StorageEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageEngine")
            .field("phase", &self.phase())
            .field("status", &self.status())
            .finish()
    }
}

impl StorageEngine {
    /// Creates the engine and starts backend selection.
    ///
    /// The relational client is built from `config.server_url`; without a
    /// URL the probe fails fast. Must be called from within a Tokio runtime.
    pub fn start(config: EngineConfig) -> StoreResult<Self> {
        let client: Option<Arc<dyn QueryClient>> = match &config.server_url {
            Some(url) => {
                let client = HttpQueryClient::new(ClientConfig::new(url.as_str())).map_err(|e| {
                    StoreError::BackendCallFailed {
                        backend: BackendKind::Relational,
                        source: e.into(),
                    }
                })?;
                Some(Arc::new(client))
            }
            None => None,
        };
        Ok(Self::launch(config, client))
    }

    /// Creates the engine with an explicit relational client.
    ///
    /// `config.server_url` is ignored. Must be called from within a Tokio
    /// runtime.
    pub fn with_client(config: EngineConfig, client: Arc<dyn QueryClient>) -> Self {
        Self::launch(config, Some(client))
    }

    fn launch(config: EngineConfig, client: Option<Arc<dyn QueryClient>>) -> Self {
        let online = config.online;
        let engine = Self {
            inner: Arc::new(EngineInner {
                config,
                client,
                state: RwLock::new(Descriptor {
                    phase: EnginePhase::Uninitialized,
                    active: None,
                    online,
                    connected: false,
                }),
                selection: Mutex::new(None),
                transactional: Mutex::new(None),
                flat: Mutex::new(None),
            }),
        };
        // The selection runs on its own task; later calls await the shared handle.
        let _selection = engine.begin_selection(SelectionMode::Full);
        engine
    }

    /// Returns the engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    /// Returns the current selection phase.
    pub fn phase(&self) -> EnginePhase {
        self.inner.state.read().phase
    }

    /// Returns the descriptor without waiting.
    pub fn status(&self) -> EngineStatus {
        let state = self.inner.state.read();
        EngineStatus {
            backend: state.active.as_ref().map(|a| a.kind()),
            connected: state.connected,
            online: state.online,
            ready: state.active.is_some(),
        }
    }

    /// Waits for the in-flight selection and returns the active backend.
    pub async fn ready(&self) -> StoreResult<BackendKind> {
        Ok(self.adapter().await?.kind())
    }

    /// Like [`ready`](Self::ready), but gives up after `timeout`.
    pub async fn wait_ready(&self, timeout: Duration) -> StoreResult<EngineStatus> {
        match tokio::time::timeout(timeout, self.ready()).await {
            Ok(result) => result.map(|_| self.status()),
            Err(_) => Err(StoreError::NotReady { waited: timeout }),
        }
    }

    /// Starts a selection unless one is already running, and returns it.
    fn begin_selection(&self, mode: SelectionMode) -> Selection {
        let mut slot = self.inner.selection.lock();
        if let Some(running) = slot.as_ref().filter(|s| s.peek().is_none()) {
            debug!(?mode, "reusing in-flight backend selection");
            return running.clone();
        }

        let inner = Arc::clone(&self.inner);
        let selection = select_backend(inner, mode).boxed().shared();
        tokio::spawn(selection.clone());
        *slot = Some(selection.clone());
        selection
    }

    async fn adapter(&self) -> StoreResult<Arc<dyn StoreAdapter>> {
        let pending = self.inner.selection.lock().clone();
        if let Some(selection) = pending {
            selection.await;
        }
        self.inner
            .state
            .read()
            .active
            .clone()
            .ok_or(StoreError::BackendUnavailable)
    }

    fn collection(&self, name: &str) -> StoreResult<&CollectionSchema> {
        self.inner
            .config
            .schema
            .collection(name)
            .ok_or_else(|| StoreError::UnknownCollection(name.to_string()))
    }

    /// Inserts a record and returns its identifier.
    ///
    /// A caller-keyed collection gets a generated identifier when the record
    /// carries none; auto-increment collections leave that to the backend.
    pub async fn insert(&self, collection: &str, mut record: Record) -> StoreResult<RecordId> {
        let schema = self.collection(collection)?;
        let adapter = self.adapter().await?;
        if !schema.auto_increment && record.id(&schema.key_field)?.is_none() {
            record.set(schema.key_field.clone(), RecordId::generate().to_value());
        }
        debug!(backend = %adapter.kind(), collection, "insert");
        adapter
            .insert(schema, record)
            .await
            .map_err(|e| StoreError::from_adapter(adapter.kind(), collection, None, e))
    }

    /// Returns the records of `collection` matching `query`.
    pub async fn select(&self, collection: &str, query: &Query) -> StoreResult<Vec<Record>> {
        let schema = self.collection(collection)?;
        let adapter = self.adapter().await?;
        debug!(backend = %adapter.kind(), collection, "select");
        adapter
            .select(schema, query)
            .await
            .map_err(|e| StoreError::from_adapter(adapter.kind(), collection, None, e))
    }

    /// Returns every record of `collection`.
    pub async fn select_all(&self, collection: &str) -> StoreResult<Vec<Record>> {
        self.select(collection, &Query::all()).await
    }

    /// Merges `patch` into the record `id`. The key field cannot be patched.
    pub async fn update(&self, collection: &str, id: &RecordId, mut patch: Record) -> StoreResult<()> {
        let schema = self.collection(collection)?;
        let adapter = self.adapter().await?;
        patch.remove(&schema.key_field);
        debug!(backend = %adapter.kind(), collection, %id, "update");
        adapter
            .update(schema, id, patch)
            .await
            .map_err(|e| StoreError::from_adapter(adapter.kind(), collection, Some(id), e))
    }

    /// Deletes the record `id`. Deleting a missing record succeeds.
    pub async fn delete(&self, collection: &str, id: &RecordId) -> StoreResult<()> {
        let schema = self.collection(collection)?;
        let adapter = self.adapter().await?;
        debug!(backend = %adapter.kind(), collection, %id, "delete");
        adapter
            .delete(schema, id)
            .await
            .map_err(|e| StoreError::from_adapter(adapter.kind(), collection, Some(id), e))
    }

    /// Reads every declared collection into a snapshot.
    pub async fn export_all(&self) -> StoreResult<Snapshot> {
        let kind = self.ready().await?;
        let schema = &self.inner.config.schema;
        let mut snapshot = Snapshot::new(Some(kind.to_string()), Some(schema.version));
        for name in schema.names() {
            let records = self.select_all(name).await?;
            snapshot.data.insert(name.to_string(), records);
        }
        info!(backend = %kind, records = snapshot.record_count(), "exported snapshot");
        Ok(snapshot)
    }

    /// Replaces every collection present in `snapshot` and returns how many
    /// records were inserted.
    ///
    /// Each collection is emptied, then refilled. Identifiers are dropped for
    /// auto-increment collections and kept otherwise. Nothing is rolled back
    /// on failure, so an error can leave a collection partially replaced.
    pub async fn import_all(&self, snapshot: &Snapshot) -> StoreResult<usize> {
        let kind = self.ready().await?;
        let mut inserted = 0;
        for (name, records) in &snapshot.data {
            let Ok(schema) = self.collection(name) else {
                warn!(collection = %name, "snapshot names an unknown collection, skipping");
                continue;
            };

            self.delete_all(schema).await?;
            for record in records {
                let mut record = record.clone();
                if schema.auto_increment {
                    record.remove(&schema.key_field);
                }
                self.insert(name, record).await?;
                inserted += 1;
            }
            debug!(collection = %name, records = records.len(), "imported collection");
        }
        info!(backend = %kind, inserted, "imported snapshot");
        Ok(inserted)
    }

    /// Parses a JSON document and imports it.
    pub async fn import_json(&self, json: serde_json::Value) -> StoreResult<usize> {
        let snapshot = Snapshot::from_json(json)?;
        self.import_all(&snapshot).await
    }

    /// Deletes every record in every data collection and returns how many
    /// were deleted. The preserved collection is left alone.
    pub async fn clear_all(&self) -> StoreResult<usize> {
        let kind = self.ready().await?;
        let mut deleted = 0;
        for schema in self.inner.config.schema.data_collections() {
            deleted += self.delete_all(schema).await?;
        }
        info!(backend = %kind, deleted, "cleared data collections");
        Ok(deleted)
    }

    async fn delete_all(&self, schema: &CollectionSchema) -> StoreResult<usize> {
        let existing = self.select_all(&schema.name).await?;
        let mut deleted = 0;
        for record in existing {
            if let Some(id) = record.id(&schema.key_field)? {
                self.delete(&schema.name, &id).await?;
                deleted += 1;
            }
        }
        Ok(deleted)
    }

    /// Counts the records of every data collection.
    pub async fn collection_stats(&self) -> StoreResult<CollectionStats> {
        let mut stats = CollectionStats::default();
        for schema in self.inner.config.schema.data_collections() {
            let count = self.select_all(&schema.name).await?.len();
            stats.total += count;
            stats.counts.insert(schema.name.clone(), count);
        }
        Ok(stats)
    }

    /// Renders `collection` as CSV.
    ///
    /// The header is taken from the first record's fields; later records
    /// contribute only those columns.
    pub async fn export_csv(&self, collection: &str) -> StoreResult<String> {
        let records = self.select_all(collection).await?;
        let Some(first) = records.first() else {
            return Err(StoreError::EmptyCollection(collection.to_string()));
        };
        let header: Vec<String> = first.iter().map(|(k, _)| k.clone()).collect();

        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(&header)?;
        for record in &records {
            writer.write_record(
                header
                    .iter()
                    .map(|field| record.get(field).map(|v| v.to_cell()).unwrap_or_default()),
            )?;
        }
        let bytes = writer.into_inner().map_err(|e| e.into_error())?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Marks the engine offline. If the relational backend is active, a
    /// local backend is selected in its place.
    pub async fn handle_offline(&self) -> EngineStatus {
        let relational_active = {
            let mut state = self.inner.state.write();
            state.online = false;
            state
                .active
                .as_ref()
                .is_some_and(|a| a.kind() == BackendKind::Relational)
        };
        if relational_active {
            info!("connectivity lost, switching to local storage");
            self.begin_selection(SelectionMode::LocalOnly).await;
        }
        self.status()
    }

    /// Marks the engine online and tries to switch to the relational backend.
    ///
    /// Records written to a local backend stay there.
    pub async fn handle_online(&self) -> EngineStatus {
        self.inner.state.write().online = true;
        self.check_connection().await
    }

    /// Re-probes the relational endpoint when online.
    ///
    /// A successful probe makes the relational backend active; a failed
    /// probe keeps the current backend, unless that is the relational one,
    /// in which case a local backend takes over.
    pub async fn check_connection(&self) -> EngineStatus {
        let pending = self.inner.selection.lock().clone();
        if let Some(selection) = pending {
            selection.await;
        }
        if self.inner.state.read().online {
            self.begin_selection(SelectionMode::PrimaryOnly).await;
        }
        self.status()
    }

    /// Feeds connectivity transitions from `signal` into
    /// [`handle_online`](Self::handle_online) and
    /// [`handle_offline`](Self::handle_offline).
    ///
    /// The task ends when the sender is dropped.
    pub fn watch_connectivity(&self, mut signal: watch::Receiver<bool>) -> JoinHandle<()> {
        let engine = self.clone();
        tokio::spawn(async move {
            while signal.changed().await.is_ok() {
                let online = *signal.borrow_and_update();
                let status = if online {
                    engine.handle_online().await
                } else {
                    engine.handle_offline().await
                };
                debug!(online, backend = ?status.backend, "connectivity change handled");
            }
        })
    }
}

fn set_phase(inner: &EngineInner, phase: EnginePhase) {
    inner.state.write().phase = phase;
}

async fn select_backend(inner: Arc<EngineInner>, mode: SelectionMode) -> Option<BackendKind> {
    if mode != SelectionMode::LocalOnly {
        let previous = inner.state.read().phase;
        set_phase(&inner, EnginePhase::ProbingPrimary);
        match probe_relational(&inner).await {
            Ok(adapter) if inner.state.read().online => {
                info!("relational backend reachable");
                return Some(activate(&inner, Arc::new(adapter)).await);
            }
            Ok(_) => warn!("went offline during the relational probe"),
            Err(e) => warn!(error = %e, "relational backend unavailable"),
        }

        if mode == SelectionMode::PrimaryOnly {
            let mut state = inner.state.write();
            let current = state.active.as_ref().map(|a| a.kind());
            match current {
                Some(BackendKind::Relational) => {
                    state.connected = false;
                    drop(state);
                    warn!("relational backend stopped answering, switching to local storage");
                }
                Some(kind) => {
                    state.phase = previous;
                    return Some(kind);
                }
                None => {}
            }
        }
    }

    set_phase(&inner, EnginePhase::FallbackTransactional);
    match open_transactional(&inner).await {
        Ok(adapter) => return Some(activate(&inner, adapter).await),
        Err(e) => warn!(error = %e, "transactional store unavailable, falling back to flat"),
    }

    set_phase(&inner, EnginePhase::FallbackFlat);
    match open_flat(&inner).await {
        Ok(adapter) => Some(activate(&inner, adapter).await),
        Err(e) => {
            warn!(error = %e, "flat store unavailable");
            let mut state = inner.state.write();
            state.phase = EnginePhase::Unavailable;
            state.active = None;
            state.connected = false;
            None
        }
    }
}

async fn probe_relational(inner: &EngineInner) -> AdapterResult<RelationalAdapter> {
    if !inner.state.read().online {
        return Err(WireError::Unavailable.into());
    }
    let Some(client) = inner.client.clone() else {
        return Err(WireError::InvalidUrl("no relational endpoint configured".into()).into());
    };
    let timeout = inner.config.probe_timeout;
    tokio::time::timeout(timeout, RelationalAdapter::probe(client, &inner.config.schema))
        .await
        .map_err(|_| AdapterError::Wire(WireError::Timeout))?
}

async fn open_transactional(inner: &EngineInner) -> AdapterResult<Arc<dyn StoreAdapter>> {
    let cached = inner.transactional.lock().clone();
    if let Some(adapter) = cached {
        return Ok(adapter);
    }
    let adapter =
        Arc::new(TransactionalAdapter::open(&inner.config.transactional, &inner.config.schema).await?);
    *inner.transactional.lock() = Some(Arc::clone(&adapter));
    Ok(adapter)
}

async fn open_flat(inner: &EngineInner) -> AdapterResult<Arc<dyn StoreAdapter>> {
    let cached = inner.flat.lock().clone();
    if let Some(adapter) = cached {
        return Ok(adapter);
    }
    let location = inner.config.flat.clone();
    let prefix = inner.config.slot_prefix.clone();
    let schema = inner.config.schema.clone();
    let adapter = tokio::task::spawn_blocking(move || {
        let slots: Arc<dyn SlotStore> = match location {
            FlatLocation::Directory(dir) => Arc::new(FileSlots::open(&dir)?),
            FlatLocation::InMemory => Arc::new(InMemorySlots::new()),
        };
        FlatAdapter::open(slots, prefix, &schema)
    })
    .await??;
    let adapter = Arc::new(adapter);
    *inner.flat.lock() = Some(Arc::clone(&adapter));
    Ok(adapter)
}

/// Seeds if configured, then makes `adapter` the active backend.
async fn activate(inner: &EngineInner, adapter: Arc<dyn StoreAdapter>) -> BackendKind {
    let kind = adapter.kind();
    if inner.config.seed_defaults {
        if let Err(e) = seed::seed_defaults(adapter.as_ref(), &inner.config.schema).await {
            warn!(backend = %kind, error = %e, "seeding default rooms failed");
        }
    }

    let mut state = inner.state.write();
    let previous = state.active.as_ref().map(|a| a.kind());
    state.active = Some(adapter);
    state.phase = EnginePhase::Ready(kind);
    state.connected = true;
    drop(state);

    match previous {
        Some(previous) if previous != kind => info!(from = %previous, to = %kind, "backend switched"),
        Some(_) => debug!(backend = %kind, "backend re-selected"),
        None => info!(backend = %kind, "storage engine ready"),
    }
    kind
}
