//! Transactional adapter: a versioned local store on redb.
//!
//! Layout inside one redb database:
//!
//! - `__schema`: the schema version, one declaration per collection
//!   (`store:<name>`) and each collection's key generator (`seq:<name>`)
//! - `data:<name>`: encoded record id -> CBOR record
//! - `idx:<name>:<index>`: `[len u32][value][record id]` -> empty
//!
//! Declarations are written only when the store is opened at a higher
//! version than the one it records. Each primitive is a single redb
//! transaction and runs on the blocking pool.

use super::{BackendKind, StoreAdapter};
use crate::config::TransactionalLocation;
use crate::error::{AdapterError, AdapterResult};
use crate::query::Query;
use crate::record::{Record, RecordId};
use crate::schema::{CollectionSchema, IndexSpec, StoreSchema};
use crate::value::Value;
use async_trait::async_trait;
use redb::{Database, ReadableTable, TableDefinition, WriteTransaction};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

const META: TableDefinition<&str, &[u8]> = TableDefinition::new("__schema");
const VERSION_KEY: &str = "version";

const TAG_INT: u8 = 0x01;
const TAG_TEXT: u8 = 0x02;
const TAG_FLOAT: u8 = 0x03;
const TAG_BOOL: u8 = 0x04;

fn data_table(collection: &str) -> String {
    format!("data:{collection}")
}

fn index_table(collection: &str, index: &str) -> String {
    format!("idx:{collection}:{index}")
}

fn encode_int(n: i64) -> [u8; 8] {
    // Sign flip keeps byte order equal to numeric order.
    ((n as u64) ^ (1 << 63)).to_be_bytes()
}

/// Encodes a record id so that byte order follows id order.
fn encode_id(id: &RecordId) -> Vec<u8> {
    match id {
        RecordId::Int(n) => {
            let mut out = Vec::with_capacity(9);
            out.push(TAG_INT);
            out.extend_from_slice(&encode_int(*n));
            out
        }
        RecordId::Text(s) => {
            let mut out = Vec::with_capacity(1 + s.len());
            out.push(TAG_TEXT);
            out.extend_from_slice(s.as_bytes());
            out
        }
    }
}

/// Encodes an index value; `None` for values that are not indexed.
///
/// Integral numbers share one encoding whatever their variant, so a
/// predicate on `2` finds records holding `2.0`.
fn encode_index_value(value: &Value) -> Option<Vec<u8>> {
    let mut out = Vec::new();
    match value {
        Value::Text(s) => {
            out.push(TAG_TEXT);
            out.extend_from_slice(s.as_bytes());
        }
        Value::Bool(b) => {
            out.push(TAG_BOOL);
            out.push(u8::from(*b));
        }
        Value::Integer(_) | Value::Float(_) => match value.as_i64() {
            Some(n) => {
                out.push(TAG_INT);
                out.extend_from_slice(&encode_int(n));
            }
            None => {
                out.push(TAG_FLOAT);
                out.extend_from_slice(&value.as_f64()?.to_bits().to_be_bytes());
            }
        },
        Value::Null | Value::List(_) | Value::Object(_) => return None,
    }
    Some(out)
}

fn index_prefix(value_bytes: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(4 + value_bytes.len());
    out.extend_from_slice(&(value_bytes.len() as u32).to_be_bytes());
    out.extend_from_slice(value_bytes);
    out
}

fn encode_record(record: &Record) -> AdapterResult<Vec<u8>> {
    let mut bytes = Vec::new();
    ciborium::into_writer(record, &mut bytes).map_err(AdapterError::serialization)?;
    Ok(bytes)
}

fn decode_record(bytes: &[u8]) -> AdapterResult<Record> {
    ciborium::from_reader(bytes).map_err(AdapterError::serialization)
}

fn decode_version(bytes: &[u8]) -> AdapterResult<u32> {
    let raw: [u8; 4] = bytes
        .try_into()
        .map_err(|_| AdapterError::serialization("malformed schema version"))?;
    Ok(u32::from_be_bytes(raw))
}

/// Adapter for the local transactional store.
pub struct TransactionalAdapter {
    db: Arc<Database>,
    declared: Arc<BTreeMap<String, CollectionSchema>>,
    version: u32,
}

impl TransactionalAdapter {
    /// Opens (creating or upgrading as needed) the store at `location`.
    pub async fn open(location: &TransactionalLocation, schema: &StoreSchema) -> AdapterResult<Self> {
        let location = location.clone();
        let schema = schema.clone();
        tokio::task::spawn_blocking(move || Self::open_blocking(&location, &schema)).await?
    }

    /// Synchronous variant of [`open`](Self::open).
    pub fn open_blocking(
        location: &TransactionalLocation,
        schema: &StoreSchema,
    ) -> AdapterResult<Self> {
        let db = match location {
            TransactionalLocation::File(path) => {
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    std::fs::create_dir_all(parent)?;
                }
                Database::create(path)?
            }
            TransactionalLocation::InMemory => Database::builder()
                .create_with_backend(redb::backends::InMemoryBackend::new())?,
        };

        let txn = db.begin_write()?;
        let declared = Self::prepare(&txn, schema)?;
        txn.commit()?;

        info!(
            version = schema.version,
            collections = declared.len(),
            "transactional store opened"
        );
        Ok(Self {
            db: Arc::new(db),
            declared: Arc::new(declared),
            version: schema.version,
        })
    }

    /// Checks the stored version, upgrades if needed, and loads declarations.
    fn prepare(
        txn: &WriteTransaction,
        schema: &StoreSchema,
    ) -> AdapterResult<BTreeMap<String, CollectionSchema>> {
        let mut meta = txn.open_table(META)?;
        let stored = meta
            .get(VERSION_KEY)?
            .map(|g| decode_version(g.value()))
            .transpose()?;

        match stored {
            Some(stored) if stored > schema.version => {
                return Err(AdapterError::VersionDowngrade {
                    stored,
                    requested: schema.version,
                });
            }
            Some(stored) if stored == schema.version => {}
            _ => {
                info!(from = ?stored, to = schema.version, "upgrading transactional store");
                for collection in &schema.collections {
                    let key = format!("store:{}", collection.name);
                    if meta.get(key.as_str())?.is_some() {
                        continue;
                    }
                    let declaration =
                        serde_json::to_vec(collection).map_err(AdapterError::serialization)?;
                    meta.insert(key.as_str(), declaration.as_slice())?;
                    let seq = format!("seq:{}", collection.name);
                    meta.insert(seq.as_str(), 1i64.to_be_bytes().as_slice())?;

                    let name = data_table(&collection.name);
                    txn.open_table(TableDefinition::<&[u8], &[u8]>::new(&name))?;
                    for index in &collection.indexes {
                        let name = index_table(&collection.name, &index.name);
                        txn.open_table(TableDefinition::<&[u8], &[u8]>::new(&name))?;
                    }
                }
                meta.insert(VERSION_KEY, schema.version.to_be_bytes().as_slice())?;
            }
        }

        let mut declared = BTreeMap::new();
        for entry in meta.range("store:".."store;")? {
            let (_, value) = entry?;
            let collection: CollectionSchema =
                serde_json::from_slice(value.value()).map_err(AdapterError::serialization)?;
            declared.insert(collection.name.clone(), collection);
        }
        Ok(declared)
    }

    /// Returns the schema version the store was opened at.
    pub fn version(&self) -> u32 {
        self.version
    }

    /// Returns the declared collection names.
    pub fn collections(&self) -> Vec<String> {
        self.declared.keys().cloned().collect()
    }

    fn declaration(&self, name: &str) -> AdapterResult<CollectionSchema> {
        self.declared
            .get(name)
            .cloned()
            .ok_or_else(|| AdapterError::UnknownCollection(name.to_string()))
    }

    async fn run<T, F>(&self, f: F) -> AdapterResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&Database) -> AdapterResult<T> + Send + 'static,
    {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || f(db.as_ref())).await?
    }
}

fn next_sequence(txn: &WriteTransaction, collection: &str, explicit: Option<i64>) -> AdapterResult<i64> {
    let mut meta = txn.open_table(META)?;
    let key = format!("seq:{collection}");
    let current = match meta.get(key.as_str())? {
        Some(guard) => {
            let raw: [u8; 8] = guard
                .value()
                .try_into()
                .map_err(|_| AdapterError::serialization("malformed key generator"))?;
            i64::from_be_bytes(raw)
        }
        None => 1,
    };
    let (assigned, next) = match explicit {
        Some(n) => (n, current.max(n.saturating_add(1))),
        None => {
            let next = current.checked_add(1).ok_or_else(|| {
                AdapterError::Constraint(format!("key space of {collection} exhausted"))
            })?;
            (current, next)
        }
    };
    meta.insert(key.as_str(), next.to_be_bytes().as_slice())?;
    Ok(assigned)
}

fn add_index_entries(
    txn: &WriteTransaction,
    collection: &CollectionSchema,
    record: &Record,
    id_bytes: &[u8],
) -> AdapterResult<()> {
    for index in &collection.indexes {
        let Some(value) = record.get(&index.field).and_then(encode_index_value) else {
            continue;
        };
        let name = index_table(&collection.name, &index.name);
        let mut table = txn.open_table(TableDefinition::<&[u8], &[u8]>::new(&name))?;
        let prefix = index_prefix(&value);
        if index.unique {
            check_unique(&table, index, &prefix, id_bytes)?;
        }
        let mut key = prefix;
        key.extend_from_slice(id_bytes);
        table.insert(key.as_slice(), [].as_slice())?;
    }
    Ok(())
}

fn check_unique(
    table: &impl ReadableTable<&'static [u8], &'static [u8]>,
    index: &IndexSpec,
    prefix: &[u8],
    id_bytes: &[u8],
) -> AdapterResult<()> {
    for entry in table.range::<&[u8]>(prefix..)? {
        let (key, _) = entry?;
        let key = key.value();
        if !key.starts_with(prefix) {
            break;
        }
        if &key[prefix.len()..] != id_bytes {
            return Err(AdapterError::Constraint(format!(
                "unique index {} already holds this value",
                index.name
            )));
        }
    }
    Ok(())
}

fn remove_index_entries(
    txn: &WriteTransaction,
    collection: &CollectionSchema,
    record: &Record,
    id_bytes: &[u8],
) -> AdapterResult<()> {
    for index in &collection.indexes {
        let Some(value) = record.get(&index.field).and_then(encode_index_value) else {
            continue;
        };
        let name = index_table(&collection.name, &index.name);
        let mut table = txn.open_table(TableDefinition::<&[u8], &[u8]>::new(&name))?;
        let mut key = index_prefix(&value);
        key.extend_from_slice(id_bytes);
        table.remove(key.as_slice())?;
    }
    Ok(())
}

fn insert_blocking(
    db: &Database,
    collection: &CollectionSchema,
    mut record: Record,
) -> AdapterResult<RecordId> {
    let explicit = record
        .id(&collection.key_field)
        .map_err(|e| AdapterError::InvalidRecord(e.to_string()))?;

    let txn = db.begin_write()?;
    let id = match explicit {
        Some(id) => {
            if collection.auto_increment {
                if let Some(n) = id.as_int() {
                    next_sequence(&txn, &collection.name, Some(n))?;
                }
            }
            id
        }
        None if collection.auto_increment => {
            let id = RecordId::Int(next_sequence(&txn, &collection.name, None)?);
            record.set(collection.key_field.clone(), id.to_value());
            id
        }
        None => {
            return Err(AdapterError::InvalidRecord(format!(
                "{} records need a {} field",
                collection.name, collection.key_field
            )));
        }
    };

    let id_bytes = encode_id(&id);
    {
        let name = data_table(&collection.name);
        let mut data = txn.open_table(TableDefinition::<&[u8], &[u8]>::new(&name))?;
        if data.get(id_bytes.as_slice())?.is_some() {
            return Err(AdapterError::Constraint(format!(
                "key {id} already exists in {}",
                collection.name
            )));
        }
        data.insert(id_bytes.as_slice(), encode_record(&record)?.as_slice())?;
    }
    add_index_entries(&txn, collection, &record, &id_bytes)?;
    txn.commit()?;
    Ok(id)
}

fn select_blocking(
    db: &Database,
    collection: &CollectionSchema,
    query: &Query,
) -> AdapterResult<Vec<Record>> {
    let txn = db.begin_read()?;
    let name = data_table(&collection.name);
    let data = txn.open_table(TableDefinition::<&[u8], &[u8]>::new(&name))?;

    let indexed = query.filter.iter().find_map(|(field, value)| {
        let index = collection.index_for(field)?;
        Some((index, encode_index_value(value)?))
    });

    let mut records = Vec::new();
    match indexed {
        Some((index, value)) => {
            debug!(collection = %collection.name, index = %index.name, "index lookup");
            let name = index_table(&collection.name, &index.name);
            let table = txn.open_table(TableDefinition::<&[u8], &[u8]>::new(&name))?;
            let prefix = index_prefix(&value);
            for entry in table.range::<&[u8]>(prefix.as_slice()..)? {
                let (key, _) = entry?;
                let key = key.value();
                if !key.starts_with(&prefix) {
                    break;
                }
                if let Some(bytes) = data.get(&key[prefix.len()..])? {
                    records.push(decode_record(bytes.value())?);
                }
            }
        }
        None => {
            for entry in data.iter()? {
                let (_, bytes) = entry?;
                records.push(decode_record(bytes.value())?);
            }
        }
    }

    Ok(query.apply(records))
}

fn update_blocking(
    db: &Database,
    collection: &CollectionSchema,
    id: &RecordId,
    patch: Record,
) -> AdapterResult<()> {
    let id_bytes = encode_id(id);
    let txn = db.begin_write()?;
    let name = data_table(&collection.name);

    let existing = {
        let data = txn.open_table(TableDefinition::<&[u8], &[u8]>::new(&name))?;
        let bytes = data.get(id_bytes.as_slice())?.map(|g| g.value().to_vec());
        match bytes {
            Some(bytes) => decode_record(&bytes)?,
            None => return Err(AdapterError::NotFound),
        }
    };

    let mut updated = existing.clone();
    updated.merge(&patch);
    updated.set(collection.key_field.clone(), id.to_value());

    remove_index_entries(&txn, collection, &existing, &id_bytes)?;
    add_index_entries(&txn, collection, &updated, &id_bytes)?;
    {
        let mut data = txn.open_table(TableDefinition::<&[u8], &[u8]>::new(&name))?;
        data.insert(id_bytes.as_slice(), encode_record(&updated)?.as_slice())?;
    }
    txn.commit()?;
    Ok(())
}

fn delete_blocking(db: &Database, collection: &CollectionSchema, id: &RecordId) -> AdapterResult<()> {
    let id_bytes = encode_id(id);
    let txn = db.begin_write()?;
    let name = data_table(&collection.name);

    let removed = {
        let mut data = txn.open_table(TableDefinition::<&[u8], &[u8]>::new(&name))?;
        let removed = data.remove(id_bytes.as_slice())?;
        removed.map(|g| g.value().to_vec())
    };
    if let Some(bytes) = removed {
        let record = decode_record(&bytes)?;
        remove_index_entries(&txn, collection, &record, &id_bytes)?;
    }
    txn.commit()?;
    Ok(())
}

#[async_trait]
impl StoreAdapter for TransactionalAdapter {
    fn kind(&self) -> BackendKind {
        BackendKind::Transactional
    }

    async fn insert(
        &self,
        collection: &CollectionSchema,
        record: Record,
    ) -> AdapterResult<RecordId> {
        let collection = self.declaration(&collection.name)?;
        self.run(move |db| insert_blocking(db, &collection, record))
            .await
    }

    async fn select(
        &self,
        collection: &CollectionSchema,
        query: &Query,
    ) -> AdapterResult<Vec<Record>> {
        let collection = self.declaration(&collection.name)?;
        let query = query.clone();
        self.run(move |db| select_blocking(db, &collection, &query))
            .await
    }

    async fn update(
        &self,
        collection: &CollectionSchema,
        id: &RecordId,
        patch: Record,
    ) -> AdapterResult<()> {
        let collection = self.declaration(&collection.name)?;
        let id = id.clone();
        self.run(move |db| update_blocking(db, &collection, &id, patch))
            .await
    }

    async fn delete(&self, collection: &CollectionSchema, id: &RecordId) -> AdapterResult<()> {
        let collection = self.declaration(&collection.name)?;
        let id = id.clone();
        self.run(move |db| delete_blocking(db, &collection, &id))
            .await
    }
}
