//! Behaviour of the CRUD contract, checked against every backend.

use innkeep_core::{
    BackendKind, EngineConfig, FlatLocation, OrderBy, Query, Record, RecordId, StorageEngine,
    StoreError, TransactionalLocation, Value,
};
use innkeep_wire::{LoopbackClient, MemorySqlServer};
use std::sync::Arc;
use tempfile::TempDir;

struct Harness {
    engine: StorageEngine,
    _dir: Option<TempDir>,
}

/// Builds an engine that settles on `kind`.
async fn engine_on(kind: BackendKind, config: EngineConfig) -> Harness {
    let harness = match kind {
        BackendKind::Relational => {
            let client = Arc::new(LoopbackClient::new(Arc::new(MemorySqlServer::new())));
            Harness {
                engine: StorageEngine::with_client(config, client),
                _dir: None,
            }
        }
        BackendKind::Transactional => Harness {
            engine: StorageEngine::start(config).unwrap(),
            _dir: None,
        },
        BackendKind::Flat => {
            // A directory cannot be opened as a redb file.
            let dir = TempDir::new().unwrap();
            let config = config
                .transactional(TransactionalLocation::File(dir.path().to_path_buf()))
                .flat(FlatLocation::Directory(dir.path().join("slots")));
            Harness {
                engine: StorageEngine::start(config).unwrap(),
                _dir: Some(dir),
            }
        }
    };
    assert_eq!(harness.engine.ready().await.unwrap(), kind);
    harness
}

const ALL: [BackendKind; 3] = [
    BackendKind::Relational,
    BackendKind::Transactional,
    BackendKind::Flat,
];

fn unseeded() -> EngineConfig {
    EngineConfig::new().seed_defaults(false)
}

fn sorted_json(records: &[Record]) -> Vec<String> {
    let mut out: Vec<String> = records.iter().map(|r| r.to_json().to_string()).collect();
    out.sort();
    out
}

#[tokio::test]
async fn insert_then_select_by_id() {
    for kind in ALL {
        let h = engine_on(kind, unseeded()).await;
        let record = Record::new()
            .with("guestId", "G7")
            .with("total", 300_000)
            .with("paid", false);
        let id = h.engine.insert("bookings", record.clone()).await.unwrap();

        let rows = h
            .engine
            .select("bookings", &Query::all().filter("id", id.to_value()))
            .await
            .unwrap();
        assert_eq!(rows.len(), 1, "{kind}");
        assert_eq!(rows[0], record.with("id", id.to_value()), "{kind}");
    }
}

#[tokio::test]
async fn update_merges_fields() {
    for kind in ALL {
        let h = engine_on(kind, unseeded()).await;
        let id = h
            .engine
            .insert("payments", Record::new().with("a", 1).with("b", 2))
            .await
            .unwrap();
        h.engine
            .update("payments", &id, Record::new().with("b", 3))
            .await
            .unwrap();

        let rows = h
            .engine
            .select("payments", &Query::all().filter("id", id.to_value()))
            .await
            .unwrap();
        assert_eq!(rows.len(), 1, "{kind}");
        assert_eq!(rows[0].get("a"), Some(&Value::Integer(1)), "{kind}");
        assert_eq!(rows[0].get("b"), Some(&Value::Integer(3)), "{kind}");
    }
}

#[tokio::test]
async fn update_of_missing_record_fails() {
    for kind in ALL {
        let h = engine_on(kind, unseeded()).await;
        let result = h
            .engine
            .update("guests", &RecordId::from("nobody"), Record::new().with("x", 1))
            .await;
        assert!(
            matches!(result, Err(StoreError::RecordNotFound { .. })),
            "{kind}: {result:?}"
        );
    }
}

#[tokio::test]
async fn delete_twice_is_fine() {
    for kind in ALL {
        let h = engine_on(kind, unseeded()).await;
        let id = h
            .engine
            .insert("expenses", Record::new().with("category", "air"))
            .await
            .unwrap();
        h.engine.delete("expenses", &id).await.unwrap();
        h.engine.delete("expenses", &id).await.unwrap();
        assert!(h.engine.select_all("expenses").await.unwrap().is_empty(), "{kind}");
    }
}

#[tokio::test]
async fn room_status_scenario() {
    for kind in ALL {
        let h = engine_on(kind, unseeded()).await;
        let id1 = h
            .engine
            .insert(
                "rooms",
                Record::new().with("number", "101").with("status", "available"),
            )
            .await
            .unwrap();
        h.engine
            .update("rooms", &id1, Record::new().with("status", "occupied"))
            .await
            .unwrap();

        let occupied = h
            .engine
            .select("rooms", &Query::all().filter("status", "occupied"))
            .await
            .unwrap();
        assert_eq!(occupied.len(), 1, "{kind}");
        assert_eq!(occupied[0].get("number"), Some(&Value::from("101")), "{kind}");
    }
}

#[tokio::test]
async fn latest_two_bookings() {
    for kind in ALL {
        let h = engine_on(kind, unseeded()).await;
        for date in ["2024-01-03", "2024-01-05", "2024-01-01", "2024-01-04", "2024-01-02"] {
            h.engine
                .insert("bookings", Record::new().with("bookingDate", date))
                .await
                .unwrap();
        }

        let query = Query::all()
            .order_by(OrderBy::parse("bookingDate DESC").unwrap())
            .limit(2);
        let rows = h.engine.select("bookings", &query).await.unwrap();
        let dates: Vec<_> = rows.iter().filter_map(|r| r.get("bookingDate")).collect();
        assert_eq!(
            dates,
            vec![&Value::from("2024-01-05"), &Value::from("2024-01-04")],
            "{kind}"
        );
    }
}

#[tokio::test]
async fn export_then_import_keeps_every_collection() {
    for kind in ALL {
        let h = engine_on(kind, EngineConfig::new()).await;
        let engine = &h.engine;
        engine
            .insert("bookings", Record::new().with("guestId", "G1").with("status", "confirmed"))
            .await
            .unwrap();
        engine
            .insert("bookings", Record::new().with("guestId", "G2").with("status", "pending"))
            .await
            .unwrap();
        engine
            .insert("guests", Record::new().with("id", "G1").with("name", "Sari"))
            .await
            .unwrap();
        engine
            .insert("settings", Record::new().with("key", "currency").with("value", "IDR"))
            .await
            .unwrap();

        let before = engine.export_all().await.unwrap();
        assert_eq!(before.db_type.as_deref(), Some(kind.as_str()));
        let inserted = engine.import_all(&before).await.unwrap();
        assert_eq!(inserted, before.record_count(), "{kind}");
        let after = engine.export_all().await.unwrap();

        let schema = engine.config().schema.clone();
        for collection in &schema.collections {
            let strip = |records: &[Record]| -> Vec<Record> {
                records
                    .iter()
                    .cloned()
                    .map(|mut r| {
                        if collection.auto_increment {
                            r.remove(&collection.key_field);
                        }
                        r
                    })
                    .collect()
            };
            assert_eq!(
                sorted_json(&strip(&before.data[&collection.name])),
                sorted_json(&strip(&after.data[&collection.name])),
                "{kind}: {}",
                collection.name
            );
        }
    }
}

#[tokio::test]
async fn import_accepts_browser_documents() {
    let h = engine_on(BackendKind::Transactional, unseeded()).await;
    let inserted = h
        .engine
        .import_json(serde_json::json!({
            "exportDate": "2024-06-01T10:00:00.000Z",
            "dbType": "localstorage",
            "data": {
                "bookings": [{"id": 17, "guestId": "G1"}, {"id": 18, "guestId": "G2"}],
                "reports": [{"id": 1}],
                "payments": "corrupted"
            }
        }))
        .await
        .unwrap();
    assert_eq!(inserted, 2);

    let bookings = h.engine.select_all("bookings").await.unwrap();
    assert_eq!(bookings.len(), 2);
    assert!(bookings.iter().all(|b| b.contains("guestId")));

    let invalid = h.engine.import_json(serde_json::json!({"rooms": []})).await;
    assert!(matches!(invalid, Err(StoreError::InvalidSnapshot(_))));
}

#[tokio::test]
async fn clear_all_keeps_settings() {
    for kind in ALL {
        let h = engine_on(kind, EngineConfig::new()).await;
        h.engine
            .insert("settings", Record::new().with("key", "theme").with("value", "dark"))
            .await
            .unwrap();
        h.engine
            .insert("tasks", Record::new().with("type", "cleaning"))
            .await
            .unwrap();

        let deleted = h.engine.clear_all().await.unwrap();
        assert_eq!(deleted, 5, "{kind}");
        assert_eq!(h.engine.collection_stats().await.unwrap().total, 0, "{kind}");
        assert_eq!(h.engine.select_all("settings").await.unwrap().len(), 1, "{kind}");
    }
}

#[tokio::test]
async fn duplicate_caller_keys_are_rejected_locally() {
    for kind in [BackendKind::Transactional, BackendKind::Flat] {
        let h = engine_on(kind, EngineConfig::new()).await;
        let result = h
            .engine
            .insert("rooms", Record::new().with("id", "RM001"))
            .await;
        assert!(
            matches!(result, Err(StoreError::BackendCallFailed { backend, .. }) if backend == kind),
            "{kind}: {result:?}"
        );
    }
}

#[tokio::test]
async fn floats_round_trip_exactly() {
    let amount = Value::Float(465_599_393.314_415_16);
    for kind in ALL {
        let h = engine_on(kind, unseeded()).await;
        let id = h
            .engine
            .insert("payments", Record::new().with("amount", amount.clone()))
            .await
            .unwrap();

        let rows = h
            .engine
            .select("payments", &Query::all().filter("amount", amount.clone()))
            .await
            .unwrap();
        assert_eq!(rows.len(), 1, "{kind}");
        assert_eq!(rows[0].id("id").unwrap(), Some(id), "{kind}");
        assert_eq!(rows[0].get("amount"), Some(&amount), "{kind}");

        let snapshot = h.engine.export_all().await.unwrap();
        let reparsed = innkeep_core::Snapshot::parse(&snapshot.to_json_pretty().unwrap()).unwrap();
        assert_eq!(reparsed.data["payments"], snapshot.data["payments"], "{kind}");
    }
}
