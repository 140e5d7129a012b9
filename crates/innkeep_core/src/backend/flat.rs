//! Flat adapter: one serialized list per collection in a slot space.
//!
//! Every primitive reads the whole collection, changes it in memory and
//! writes the whole list back. Nothing serializes concurrent callers, so
//! two unawaited inserts into the same collection can compute the same
//! next identifier.

use super::{BackendKind, StoreAdapter};
use crate::error::{AdapterError, AdapterResult};
use crate::query::Query;
use crate::record::{Record, RecordId};
use crate::schema::{CollectionSchema, StoreSchema};
use async_trait::async_trait;
use innkeep_slots::{validate_key, SlotStore};
use std::sync::Arc;
use tracing::{debug, info};

/// Adapter over a flat [`SlotStore`].
pub struct FlatAdapter {
    slots: Arc<dyn SlotStore>,
    prefix: String,
}

impl FlatAdapter {
    /// Opens the adapter, creating an empty list for every missing collection.
    pub fn open(
        slots: Arc<dyn SlotStore>,
        prefix: impl Into<String>,
        schema: &StoreSchema,
    ) -> AdapterResult<Self> {
        let adapter = Self {
            slots,
            prefix: prefix.into(),
        };
        for name in schema.names() {
            let slot = adapter.slot(name)?;
            if !adapter.slots.contains(&slot)? {
                adapter.slots.set(&slot, "[]")?;
            }
        }
        info!(prefix = %adapter.prefix, "flat store opened");
        Ok(adapter)
    }

    fn slot(&self, collection: &str) -> AdapterResult<String> {
        let slot = format!("{}{collection}", self.prefix);
        validate_key(&slot)?;
        Ok(slot)
    }

    async fn run<T, F>(&self, f: F) -> AdapterResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&dyn SlotStore) -> AdapterResult<T> + Send + 'static,
    {
        let slots = Arc::clone(&self.slots);
        tokio::task::spawn_blocking(move || f(slots.as_ref())).await?
    }
}

fn load(slots: &dyn SlotStore, slot: &str) -> AdapterResult<Vec<Record>> {
    match slots.get(slot)? {
        Some(text) => Ok(serde_json::from_str(&text)?),
        None => Ok(Vec::new()),
    }
}

fn store(slots: &dyn SlotStore, slot: &str, records: &[Record]) -> AdapterResult<()> {
    let text = serde_json::to_string(records)?;
    slots.set(slot, &text)?;
    Ok(())
}

fn id_of(record: &Record, key_field: &str) -> Option<RecordId> {
    record.id(key_field).ok().flatten()
}

fn insert_blocking(
    slots: &dyn SlotStore,
    slot: &str,
    collection: &CollectionSchema,
    mut record: Record,
) -> AdapterResult<RecordId> {
    let mut records = load(slots, slot)?;
    let key = &collection.key_field;

    let explicit = record
        .id(key)
        .map_err(|e| AdapterError::InvalidRecord(e.to_string()))?;
    let id = match explicit {
        Some(id) => {
            if records.iter().any(|r| id_of(r, key).as_ref() == Some(&id)) {
                return Err(AdapterError::Constraint(format!(
                    "key {id} already exists in {}",
                    collection.name
                )));
            }
            id
        }
        None if collection.auto_increment => {
            let max = records
                .iter()
                .filter_map(|r| id_of(r, key).and_then(|id| id.as_int()))
                .max();
            let id = RecordId::Int(max.map_or(1, |m| m + 1));
            record.set(key.clone(), id.to_value());
            id
        }
        None => {
            return Err(AdapterError::InvalidRecord(format!(
                "{} records need a {key} field",
                collection.name
            )));
        }
    };

    records.push(record);
    store(slots, slot, &records)?;
    Ok(id)
}

fn update_blocking(
    slots: &dyn SlotStore,
    slot: &str,
    collection: &CollectionSchema,
    id: &RecordId,
    patch: Record,
) -> AdapterResult<()> {
    let mut records = load(slots, slot)?;
    let key = &collection.key_field;
    let target = records
        .iter_mut()
        .find(|r| id_of(r, key).as_ref() == Some(id))
        .ok_or(AdapterError::NotFound)?;
    target.merge(&patch);
    target.set(key.clone(), id.to_value());
    store(slots, slot, &records)
}

fn delete_blocking(
    slots: &dyn SlotStore,
    slot: &str,
    collection: &CollectionSchema,
    id: &RecordId,
) -> AdapterResult<()> {
    let mut records = load(slots, slot)?;
    let before = records.len();
    records.retain(|r| id_of(r, &collection.key_field).as_ref() != Some(id));
    if records.len() != before {
        store(slots, slot, &records)?;
    }
    Ok(())
}

#[async_trait]
impl StoreAdapter for FlatAdapter {
    fn kind(&self) -> BackendKind {
        BackendKind::Flat
    }

    async fn insert(
        &self,
        collection: &CollectionSchema,
        record: Record,
    ) -> AdapterResult<RecordId> {
        let slot = self.slot(&collection.name)?;
        let collection = collection.clone();
        self.run(move |slots| insert_blocking(slots, &slot, &collection, record))
            .await
    }

    async fn select(
        &self,
        collection: &CollectionSchema,
        query: &Query,
    ) -> AdapterResult<Vec<Record>> {
        let slot = self.slot(&collection.name)?;
        debug!(%slot, "flat select");
        let query = query.clone();
        self.run(move |slots| Ok(query.apply(load(slots, &slot)?)))
            .await
    }

    async fn update(
        &self,
        collection: &CollectionSchema,
        id: &RecordId,
        patch: Record,
    ) -> AdapterResult<()> {
        let slot = self.slot(&collection.name)?;
        let collection = collection.clone();
        let id = id.clone();
        self.run(move |slots| update_blocking(slots, &slot, &collection, &id, patch))
            .await
    }

    async fn delete(&self, collection: &CollectionSchema, id: &RecordId) -> AdapterResult<()> {
        let slot = self.slot(&collection.name)?;
        let collection = collection.clone();
        let id = id.clone();
        self.run(move |slots| delete_blocking(slots, &slot, &collection, &id))
            .await
    }
}
