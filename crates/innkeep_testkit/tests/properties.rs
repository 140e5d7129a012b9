//! Property tests of the storage contract against every backend.

use innkeep_core::{OrderBy, Query};
use innkeep_testkit::prelude::*;
use proptest::prelude::*;
use std::cmp::Ordering;

const BACKENDS: [BackendKind; 3] = [
    BackendKind::Relational,
    BackendKind::Transactional,
    BackendKind::Flat,
];

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("Failed to build runtime")
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn inserted_records_read_back(record in record_strategy()) {
        runtime().block_on(async {
            for kind in BACKENDS {
                let store = TestStore::on(kind).await;
                let id = store.insert("payments", record.clone()).await.unwrap();
                let rows = store
                    .select("payments", &Query::all().filter("id", id.to_value()))
                    .await
                    .unwrap();
                assert_eq!(rows.len(), 1, "{kind}");
                assert_eq!(rows[0], record.clone().with("id", id.to_value()), "{kind}");
            }
        });
    }

    #[test]
    fn ordered_limited_selects(
        bookings in prop::collection::vec(booking_strategy(), 1..12),
        limit in 1usize..6,
    ) {
        runtime().block_on(async {
            for kind in BACKENDS {
                let store = TestStore::on(kind).await;
                for booking in &bookings {
                    store.insert("bookings", booking.clone()).await.unwrap();
                }
                let query = Query::all()
                    .order_by(OrderBy::desc("bookingDate"))
                    .limit(limit);
                let rows = store.select("bookings", &query).await.unwrap();
                assert_eq!(rows.len(), limit.min(bookings.len()), "{kind}");
                for pair in rows.windows(2) {
                    let a = pair[0].get("bookingDate").unwrap();
                    let b = pair[1].get("bookingDate").unwrap();
                    assert_ne!(a.sort_cmp(b), Ordering::Less, "{kind}");
                }
            }
        });
    }

    #[test]
    fn snapshots_restore_caller_keyed_collections(
        records in prop::collection::vec(record_strategy(), 0..6),
    ) {
        runtime().block_on(async {
            let store = TestStore::transactional().await;
            let mut ids = Vec::new();
            for record in &records {
                ids.push(store.insert("inventory", record.clone()).await.unwrap());
            }
            let snapshot = store.export_all().await.unwrap();
            store.clear_all().await.unwrap();
            assert!(store.select_all("inventory").await.unwrap().is_empty());

            store.import_all(&snapshot).await.unwrap();
            let mut restored: Vec<RecordId> = store
                .select_all("inventory")
                .await
                .unwrap()
                .iter()
                .filter_map(|r| r.id("id").unwrap())
                .collect();
            restored.sort();
            ids.sort();
            assert_eq!(restored, ids);
        });
    }
}
