//! Adapter benchmarks: flat read-modify-write against redb transactions.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use innkeep_core::backend::{FlatAdapter, TransactionalAdapter};
use innkeep_core::{CollectionSchema, Query, Record, StoreAdapter, StoreSchema, TransactionalLocation};
use innkeep_slots::{FileSlots, InMemorySlots, SlotStore};
use std::sync::Arc;
use tempfile::TempDir;
use tokio::runtime::Runtime;

fn runtime() -> Runtime {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .unwrap()
}

fn booking(i: usize) -> Record {
    Record::new()
        .with("guestId", format!("G{:04}", i % 500))
        .with("bookingDate", format!("2024-{:02}-{:02}", i % 12 + 1, i % 28 + 1))
        .with("status", if i % 4 == 0 { "pending" } else { "confirmed" })
        .with("total", (i as i64 + 1) * 50_000)
}

fn bookings_schema(schema: &StoreSchema) -> CollectionSchema {
    schema.collection("bookings").cloned().unwrap()
}

async fn fill(adapter: &dyn StoreAdapter, collection: &CollectionSchema, count: usize) {
    for i in 0..count {
        adapter.insert(collection, booking(i)).await.unwrap();
    }
}

/// Benchmark inserts into a collection that already holds `size` records.
fn bench_insert(c: &mut Criterion) {
    let rt = runtime();
    let schema = StoreSchema::property_management();
    let bookings = bookings_schema(&schema);
    let mut group = c.benchmark_group("insert");

    for size in [10, 100, 1000] {
        group.throughput(Throughput::Elements(1));

        let flat = FlatAdapter::open(Arc::new(InMemorySlots::new()), "", &schema).unwrap();
        rt.block_on(fill(&flat, &bookings, size));
        group.bench_with_input(BenchmarkId::new("flat_memory", size), &size, |b, _| {
            b.to_async(&rt)
                .iter(|| async { black_box(flat.insert(&bookings, booking(7)).await.unwrap()) });
        });

        let transactional = rt
            .block_on(TransactionalAdapter::open(&TransactionalLocation::InMemory, &schema))
            .unwrap();
        rt.block_on(fill(&transactional, &bookings, size));
        group.bench_with_input(BenchmarkId::new("transactional_memory", size), &size, |b, _| {
            b.to_async(&rt).iter(|| async {
                black_box(transactional.insert(&bookings, booking(7)).await.unwrap())
            });
        });
    }

    group.finish();
}

/// Benchmark an exact-match select on an indexed field.
fn bench_select_by_status(c: &mut Criterion) {
    let rt = runtime();
    let schema = StoreSchema::property_management();
    let bookings = bookings_schema(&schema);
    let query = Query::all().filter("status", "pending");
    let mut group = c.benchmark_group("select_by_status");

    for size in [100, 1000] {
        group.throughput(Throughput::Elements(size as u64));

        let flat = FlatAdapter::open(Arc::new(InMemorySlots::new()), "", &schema).unwrap();
        rt.block_on(fill(&flat, &bookings, size));
        group.bench_with_input(BenchmarkId::new("flat_memory", size), &size, |b, _| {
            b.to_async(&rt)
                .iter(|| async { black_box(flat.select(&bookings, &query).await.unwrap()) });
        });

        let transactional = rt
            .block_on(TransactionalAdapter::open(&TransactionalLocation::InMemory, &schema))
            .unwrap();
        rt.block_on(fill(&transactional, &bookings, size));
        group.bench_with_input(BenchmarkId::new("transactional_memory", size), &size, |b, _| {
            b.to_async(&rt).iter(|| async {
                black_box(transactional.select(&bookings, &query).await.unwrap())
            });
        });
    }

    group.finish();
}

/// Benchmark file-backed stores, where every flat write rewrites a slot file.
fn bench_file_insert(c: &mut Criterion) {
    let rt = runtime();
    let schema = StoreSchema::property_management();
    let bookings = bookings_schema(&schema);
    let mut group = c.benchmark_group("file_insert");

    // Use larger sample size for file operations
    group.sample_size(30);

    let temp_dir = TempDir::new().unwrap();
    let slots: Arc<dyn SlotStore> = Arc::new(FileSlots::open(&temp_dir.path().join("slots")).unwrap());
    let flat = FlatAdapter::open(slots, "", &schema).unwrap();
    rt.block_on(fill(&flat, &bookings, 100));
    group.bench_function("flat", |b| {
        b.to_async(&rt)
            .iter(|| async { black_box(flat.insert(&bookings, booking(3)).await.unwrap()) });
    });

    let location = TransactionalLocation::File(temp_dir.path().join("store.redb"));
    let transactional = rt
        .block_on(TransactionalAdapter::open(&location, &schema))
        .unwrap();
    rt.block_on(fill(&transactional, &bookings, 100));
    group.bench_function("transactional", |b| {
        b.to_async(&rt).iter(|| async {
            black_box(transactional.insert(&bookings, booking(3)).await.unwrap())
        });
    });

    group.finish();
}

criterion_group!(benches, bench_insert, bench_select_by_status, bench_file_insert);
criterion_main!(benches);
