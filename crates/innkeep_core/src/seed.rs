//! Starter data for a fresh store.

use crate::backend::StoreAdapter;
use crate::error::AdapterResult;
use crate::query::Query;
use crate::record::Record;
use crate::schema::StoreSchema;
use chrono::Utc;
use tracing::info;

/// The collection that gates seeding.
pub const SEED_COLLECTION: &str = "rooms";

/// Returns the starter room set.
pub fn default_rooms() -> Vec<Record> {
    let created = Utc::now().to_rfc3339();
    let room = |id: &str, kind: &str, number: &str, capacity: i64, price: i64| {
        Record::new()
            .with("id", id)
            .with("type", kind)
            .with("number", number)
            .with("capacity", capacity)
            .with("price", price)
            .with("status", "available")
            .with("createdAt", created.as_str())
    };

    let standard_facilities = "AC, TV, Kamar Mandi Dalam";
    let standard = "Kamar standar dengan fasilitas lengkap";
    vec![
        room("RM001", "kamar", "101", 2, 150_000)
            .with("facilities", standard_facilities)
            .with("description", standard),
        room("RM002", "kamar", "102", 2, 150_000)
            .with("facilities", standard_facilities)
            .with("description", standard),
        room("VL001", "villa", "Villa A", 6, 500_000)
            .with("facilities", "AC, TV, Dapur, Ruang Tamu, 2 Kamar Tidur")
            .with("description", "Villa keluarga dengan fasilitas lengkap"),
        room("CP001", "camping", "Camp Area 1", 4, 50_000)
            .with("facilities", "Area Tenda, Listrik, Kamar Mandi Umum")
            .with("description", "Area camping dengan fasilitas dasar"),
    ]
}

/// Inserts [`default_rooms`] if the rooms collection exists and is empty.
///
/// Returns how many records were inserted.
pub async fn seed_defaults(adapter: &dyn StoreAdapter, schema: &StoreSchema) -> AdapterResult<usize> {
    let Some(rooms) = schema.collection(SEED_COLLECTION) else {
        return Ok(0);
    };
    if !adapter.select(rooms, &Query::all().limit(1)).await?.is_empty() {
        return Ok(0);
    }

    let defaults = default_rooms();
    let count = defaults.len();
    for record in defaults {
        adapter.insert(rooms, record).await?;
    }
    info!(backend = %adapter.kind(), count, "seeded default rooms");
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::FlatAdapter;
    use crate::record::RecordId;
    use crate::schema::CollectionSchema;
    use innkeep_slots::InMemorySlots;
    use std::sync::Arc;

    #[test]
    fn default_room_ids() {
        let ids: Vec<_> = default_rooms()
            .iter()
            .map(|r| r.id("id").unwrap().unwrap())
            .collect();
        assert_eq!(
            ids,
            vec![
                RecordId::from("RM001"),
                RecordId::from("RM002"),
                RecordId::from("VL001"),
                RecordId::from("CP001"),
            ]
        );
        assert!(default_rooms().iter().all(|r| r.contains("createdAt")));
    }

    #[tokio::test]
    async fn seeds_only_empty_rooms() {
        let schema = StoreSchema::property_management();
        let adapter = FlatAdapter::open(Arc::new(InMemorySlots::new()), "", &schema).unwrap();

        assert_eq!(seed_defaults(&adapter, &schema).await.unwrap(), 4);
        assert_eq!(seed_defaults(&adapter, &schema).await.unwrap(), 0);

        let rooms = schema.collection("rooms").unwrap();
        let all = adapter.select(rooms, &Query::all()).await.unwrap();
        assert_eq!(all.len(), 4);
    }

    #[tokio::test]
    async fn schema_without_rooms_is_skipped() {
        let schema = StoreSchema::new(1, vec![CollectionSchema::auto_increment("notes")]);
        let adapter = FlatAdapter::open(Arc::new(InMemorySlots::new()), "", &schema).unwrap();
        assert_eq!(seed_defaults(&adapter, &schema).await.unwrap(), 0);
    }
}
