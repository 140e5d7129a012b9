//! Test fixtures and engine helpers.
//!
//! Every [`TestStore`] constructor waits until the engine has settled on
//! the requested backend, and panics otherwise.

use innkeep_core::{
    BackendKind, EngineConfig, FlatLocation, Record, StorageEngine, TransactionalLocation,
};
use innkeep_wire::{LoopbackClient, MemorySqlServer, QueryClient};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// A reachable in-process relational endpoint.
pub fn online_endpoint() -> (Arc<MemorySqlServer>, Arc<dyn QueryClient>) {
    let server = Arc::new(MemorySqlServer::new());
    let client: Arc<dyn QueryClient> = Arc::new(LoopbackClient::new(Arc::clone(&server)));
    (server, client)
}

/// An endpoint whose health probe fails.
pub fn offline_endpoint() -> (Arc<MemorySqlServer>, Arc<dyn QueryClient>) {
    let (server, client) = online_endpoint();
    server.set_available(false);
    (server, client)
}

/// An endpoint that answers only after `latency`.
pub fn slow_endpoint(latency: Duration) -> (Arc<MemorySqlServer>, Arc<dyn QueryClient>) {
    let server = Arc::new(MemorySqlServer::new());
    let client: Arc<dyn QueryClient> =
        Arc::new(LoopbackClient::new(Arc::clone(&server)).with_latency(latency));
    (server, client)
}

/// Configuration whose transactional store cannot open, which forces the
/// flat fallback. The flat slots live under `dir/slots`.
pub fn broken_transactional_config(dir: &Path) -> EngineConfig {
    EngineConfig::new()
        .transactional(TransactionalLocation::File(dir.to_path_buf()))
        .flat(FlatLocation::Directory(dir.join("slots")))
}

/// An engine pinned to one backend, with automatic cleanup.
pub struct TestStore {
    /// The engine.
    pub engine: StorageEngine,
    /// The relational endpoint, for relational stores.
    pub server: Option<Arc<MemorySqlServer>>,
    /// The temporary directory (kept alive to prevent cleanup).
    _temp_dir: Option<TempDir>,
}

impl TestStore {
    /// Creates an unseeded store on `kind`.
    pub async fn on(kind: BackendKind) -> Self {
        Self::with_config(kind, EngineConfig::new().seed_defaults(false)).await
    }

    /// Creates a store on `kind` from `config`.
    ///
    /// Location settings in `config` are overridden where the backend
    /// needs it.
    pub async fn with_config(kind: BackendKind, config: EngineConfig) -> Self {
        let store = match kind {
            BackendKind::Relational => {
                let (server, client) = online_endpoint();
                Self {
                    engine: StorageEngine::with_client(config, client),
                    server: Some(server),
                    _temp_dir: None,
                }
            }
            BackendKind::Transactional => Self {
                engine: StorageEngine::start(local(config))
                    .expect("Failed to start engine"),
                server: None,
                _temp_dir: None,
            },
            BackendKind::Flat => {
                let temp_dir = TempDir::new().expect("Failed to create temp directory");
                let base = broken_transactional_config(temp_dir.path());
                let config = local(config)
                    .transactional(base.transactional)
                    .flat(base.flat);
                Self {
                    engine: StorageEngine::start(config).expect("Failed to start engine"),
                    server: None,
                    _temp_dir: Some(temp_dir),
                }
            }
        };

        let active = store.engine.ready().await.expect("Engine never became ready");
        assert_eq!(active, kind, "engine settled on the wrong backend");
        store
    }

    /// Creates an unseeded relational store.
    pub async fn relational() -> Self {
        Self::on(BackendKind::Relational).await
    }

    /// Creates an unseeded in-memory transactional store.
    pub async fn transactional() -> Self {
        Self::on(BackendKind::Transactional).await
    }

    /// Creates an unseeded flat store.
    pub async fn flat() -> Self {
        Self::on(BackendKind::Flat).await
    }

    /// Returns the temporary directory, if the store has one.
    pub fn dir(&self) -> Option<&Path> {
        self._temp_dir.as_ref().map(TempDir::path)
    }
}

impl std::ops::Deref for TestStore {
    type Target = StorageEngine;

    fn deref(&self) -> &Self::Target {
        &self.engine
    }
}

/// Removes any relational URL so only the local chain runs.
fn local(mut config: EngineConfig) -> EngineConfig {
    config.server_url = None;
    config
}

/// Test scenario helpers.
pub mod scenarios {
    use super::*;

    /// Bookings with distinct `bookingDate`s, oldest first.
    pub fn bookings(count: usize) -> Vec<Record> {
        (0..count)
            .map(|i| {
                Record::new()
                    .with("guestId", format!("G{:03}", i % 7))
                    .with("bookingDate", format!("2024-01-{:02}", i % 28 + 1))
                    .with("status", if i % 3 == 0 { "pending" } else { "confirmed" })
                    .with("total", 150_000 * (i as i64 + 1))
            })
            .collect()
    }

    /// Creates a store on `kind` holding `count` bookings.
    pub async fn with_bookings(kind: BackendKind, count: usize) -> TestStore {
        let store = TestStore::on(kind).await;
        for booking in bookings(count) {
            store
                .insert("bookings", booking)
                .await
                .expect("Failed to insert booking");
        }
        store
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stores_settle_on_their_backend() {
        for kind in [
            BackendKind::Relational,
            BackendKind::Transactional,
            BackendKind::Flat,
        ] {
            let store = TestStore::on(kind).await;
            assert_eq!(store.status().backend, Some(kind));
            assert_eq!(store.dir().is_some(), kind == BackendKind::Flat);
        }
    }

    #[tokio::test]
    async fn scenario_bookings_are_inserted() {
        let store = scenarios::with_bookings(BackendKind::Flat, 10).await;
        assert_eq!(store.select_all("bookings").await.unwrap().len(), 10);
    }

    #[test]
    fn booking_dates_are_distinct_below_a_month() {
        let bookings = scenarios::bookings(28);
        let mut dates: Vec<_> = bookings.iter().map(|b| b.get("bookingDate").cloned()).collect();
        dates.sort_by(|a, b| format!("{a:?}").cmp(&format!("{b:?}")));
        dates.dedup();
        assert_eq!(dates.len(), 28);
    }
}
