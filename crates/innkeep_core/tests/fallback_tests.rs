//! Backend selection, readiness and connectivity switching.

use innkeep_core::{
    BackendKind, EngineConfig, EnginePhase, FlatLocation, Query, Record, StorageEngine,
    StoreError, TransactionalLocation,
};
use innkeep_wire::{LoopbackClient, MemorySqlServer};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::TempDir;
use tokio::sync::watch;

fn endpoint() -> (Arc<MemorySqlServer>, Arc<LoopbackClient<Arc<MemorySqlServer>>>) {
    let server = Arc::new(MemorySqlServer::new());
    let client = Arc::new(LoopbackClient::new(Arc::clone(&server)));
    (server, client)
}

async fn eventually<F: Fn() -> bool>(check: F) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !check() {
        assert!(Instant::now() < deadline, "condition not reached in time");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

#[tokio::test]
async fn slow_probe_falls_back_within_the_timeout() {
    let server = Arc::new(MemorySqlServer::new());
    let client = Arc::new(LoopbackClient::new(server).with_latency(Duration::from_secs(30)));
    let config = EngineConfig::new().probe_timeout(Duration::from_millis(200));

    let started = Instant::now();
    let engine = StorageEngine::with_client(config, client);
    let status = engine.wait_ready(Duration::from_secs(10)).await.unwrap();

    assert_eq!(status.backend, Some(BackendKind::Transactional));
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn broken_transactional_store_falls_back_to_flat() {
    let dir = TempDir::new().unwrap();
    let config = EngineConfig::new()
        .transactional(TransactionalLocation::File(dir.path().to_path_buf()))
        .flat(FlatLocation::Directory(dir.path().join("slots")));
    let engine = StorageEngine::start(config).unwrap();

    assert_eq!(engine.ready().await.unwrap(), BackendKind::Flat);
    assert_eq!(engine.phase(), EnginePhase::Ready(BackendKind::Flat));
    assert!(dir.path().join("slots").join("rooms.slot").exists());
}

#[tokio::test]
async fn no_backend_at_all_is_unavailable() {
    let dir = TempDir::new().unwrap();
    let blocker = dir.path().join("not-a-dir");
    std::fs::write(&blocker, b"x").unwrap();

    let config = EngineConfig::new()
        .transactional(TransactionalLocation::File(dir.path().to_path_buf()))
        .flat(FlatLocation::Directory(blocker));
    let engine = StorageEngine::start(config).unwrap();

    assert!(matches!(
        engine.ready().await,
        Err(StoreError::BackendUnavailable)
    ));
    assert_eq!(engine.phase(), EnginePhase::Unavailable);
    assert!(matches!(
        engine.select_all("rooms").await,
        Err(StoreError::BackendUnavailable)
    ));
    assert!(!engine.status().ready);
}

#[tokio::test]
async fn seeding_runs_once_per_fresh_store() {
    let dir = TempDir::new().unwrap();
    let config = EngineConfig::persistent(dir.path());

    {
        let engine = StorageEngine::start(config.clone()).unwrap();
        assert_eq!(engine.ready().await.unwrap(), BackendKind::Transactional);
        let rooms = engine.select_all("rooms").await.unwrap();
        assert_eq!(rooms.len(), 4);
        let first = rooms[0].id("id").unwrap().unwrap();
        engine.delete("rooms", &first).await.unwrap();
    }

    let engine = StorageEngine::start(config).unwrap();
    engine.ready().await.unwrap();
    assert_eq!(engine.select_all("rooms").await.unwrap().len(), 3);
}

#[tokio::test]
async fn relational_seeding_targets_the_endpoint() {
    let (server, client) = endpoint();
    let engine = StorageEngine::with_client(EngineConfig::new(), client);
    assert_eq!(engine.ready().await.unwrap(), BackendKind::Relational);
    assert_eq!(server.row_count("rooms"), Some(4));
    assert_eq!(server.table_names().len(), 8);

    let villas = engine
        .select("rooms", &Query::all().filter("type", "villa"))
        .await
        .unwrap();
    assert_eq!(villas.len(), 1);
}

#[tokio::test]
async fn going_offline_strands_relational_records() {
    let (server, client) = endpoint();
    let engine = StorageEngine::with_client(EngineConfig::new().seed_defaults(false), client);
    assert_eq!(engine.ready().await.unwrap(), BackendKind::Relational);
    engine
        .insert("guests", Record::new().with("id", "G1").with("name", "Budi"))
        .await
        .unwrap();

    let status = engine.handle_offline().await;
    assert_eq!(status.backend, Some(BackendKind::Transactional));
    assert!(!status.online);
    assert!(engine.select_all("guests").await.unwrap().is_empty());

    engine
        .insert("guests", Record::new().with("id", "G2").with("name", "Wati"))
        .await
        .unwrap();

    let status = engine.handle_online().await;
    assert_eq!(status.backend, Some(BackendKind::Relational));
    let guests = engine.select_all("guests").await.unwrap();
    assert_eq!(guests.len(), 1);
    assert_eq!(server.row_count("guests"), Some(1));
}

#[tokio::test]
async fn offline_on_a_local_backend_changes_nothing() {
    let engine = StorageEngine::start(EngineConfig::new().seed_defaults(false)).unwrap();
    engine.ready().await.unwrap();
    let status = engine.handle_offline().await;
    assert_eq!(status.backend, Some(BackendKind::Transactional));
    assert!(!status.online);
}

#[tokio::test]
async fn check_connection_follows_the_endpoint() {
    let (server, client) = endpoint();
    server.set_available(false);
    let engine = StorageEngine::with_client(EngineConfig::new(), client);
    assert_eq!(engine.ready().await.unwrap(), BackendKind::Transactional);

    assert_eq!(
        engine.check_connection().await.backend,
        Some(BackendKind::Transactional)
    );

    server.set_available(true);
    let status = engine.check_connection().await;
    assert_eq!(status.backend, Some(BackendKind::Relational));
    assert!(status.connected);

    server.set_available(false);
    let status = engine.check_connection().await;
    assert_eq!(status.backend, Some(BackendKind::Transactional));
    assert!(status.connected);
}

#[tokio::test]
async fn check_connection_while_offline_does_not_probe() {
    let (server, client) = endpoint();
    let engine = StorageEngine::with_client(EngineConfig::new().online(false), client);
    assert_eq!(engine.ready().await.unwrap(), BackendKind::Transactional);

    let status = engine.check_connection().await;
    assert_eq!(status.backend, Some(BackendKind::Transactional));
    assert_eq!(server.statement_count(), 0);
}

#[tokio::test]
async fn connectivity_signal_drives_switching() {
    let (_server, client) = endpoint();
    let engine = StorageEngine::with_client(EngineConfig::new().seed_defaults(false), client);
    assert_eq!(engine.ready().await.unwrap(), BackendKind::Relational);

    let (tx, rx) = watch::channel(true);
    let watcher = engine.watch_connectivity(rx);

    tx.send(false).unwrap();
    eventually(|| engine.status().backend == Some(BackendKind::Transactional)).await;
    assert!(!engine.status().online);

    tx.send(true).unwrap();
    eventually(|| engine.status().backend == Some(BackendKind::Relational)).await;

    drop(tx);
    watcher.await.unwrap();
}
