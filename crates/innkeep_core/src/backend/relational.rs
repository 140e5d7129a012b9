//! Relational adapter: statements over the wire to a remote endpoint.

use super::{BackendKind, StoreAdapter};
use crate::error::{AdapterError, AdapterResult};
use crate::query::Query;
use crate::record::{Record, RecordId};
use crate::schema::{CollectionSchema, StoreSchema};
use crate::value::Value;
use async_trait::async_trait;
use innkeep_wire::{QueryClient, QueryRequest, QueryResponse};
use std::sync::Arc;
use tracing::debug;

/// Checks that `name` is a plain identifier (`[A-Za-z_][A-Za-z0-9_]*`).
///
/// Collection and field names are spliced into statement text, so nothing
/// else is allowed through.
pub fn validate_identifier(name: &str) -> AdapterResult<&str> {
    let mut chars = name.chars();
    let valid = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(name)
    } else {
        Err(AdapterError::InvalidName(name.to_string()))
    }
}

/// Adapter for a relational endpoint reached through a [`QueryClient`].
pub struct RelationalAdapter {
    client: Arc<dyn QueryClient>,
}

impl RelationalAdapter {
    /// Wraps a client without probing it.
    pub fn new(client: Arc<dyn QueryClient>) -> Self {
        Self { client }
    }

    /// Probes the endpoint and prepares every declared table.
    ///
    /// Issues the health probe, then `CREATE TABLE IF NOT EXISTS` for each
    /// collection. The caller bounds the whole probe with a timeout.
    pub async fn probe(client: Arc<dyn QueryClient>, schema: &StoreSchema) -> AdapterResult<Self> {
        client.health().await?;
        let adapter = Self::new(client);
        for collection in &schema.collections {
            adapter.execute(create_table_sql(collection)?, Vec::new()).await?;
        }
        Ok(adapter)
    }

    /// Issues only the health probe.
    pub async fn ping(&self) -> AdapterResult<()> {
        Ok(self.client.health().await?)
    }

    async fn execute(
        &self,
        query: String,
        params: Vec<serde_json::Value>,
    ) -> AdapterResult<QueryResponse> {
        debug!(%query, params = params.len(), "relational statement");
        let request = QueryRequest::with_params(query, params);
        Ok(self.client.execute(&request).await?)
    }
}

/// Builds the table declaration for a collection.
///
/// Only the key column and indexed columns are declared; other fields are
/// stored in whatever columns the endpoint makes available.
pub fn create_table_sql(collection: &CollectionSchema) -> AdapterResult<String> {
    let table = validate_identifier(&collection.name)?;
    let key = validate_identifier(&collection.key_field)?;

    let mut columns = vec![if collection.auto_increment {
        format!("{key} INTEGER PRIMARY KEY AUTOINCREMENT")
    } else {
        format!("{key} TEXT PRIMARY KEY")
    }];
    for index in &collection.indexes {
        let field = validate_identifier(&index.field)?;
        if field == key {
            continue;
        }
        columns.push(if index.unique {
            format!("{field} UNIQUE")
        } else {
            field.to_string()
        });
    }

    Ok(format!(
        "CREATE TABLE IF NOT EXISTS {table} ({})",
        columns.join(", ")
    ))
}

fn param(value: &Value) -> serde_json::Value {
    serde_json::Value::from(value.clone())
}

fn where_clause(filter: &Record, params: &mut Vec<serde_json::Value>) -> AdapterResult<String> {
    if filter.is_empty() {
        return Ok(String::new());
    }
    let mut terms = Vec::with_capacity(filter.len());
    for (field, value) in filter.iter() {
        terms.push(format!("{} = ?", validate_identifier(field)?));
        params.push(param(value));
    }
    Ok(format!(" WHERE {}", terms.join(" AND ")))
}

fn row_to_record(row: innkeep_wire::Row) -> Record {
    row.into_iter().map(|(k, v)| (k, Value::from(v))).collect()
}

#[async_trait]
impl StoreAdapter for RelationalAdapter {
    fn kind(&self) -> BackendKind {
        BackendKind::Relational
    }

    async fn insert(
        &self,
        collection: &CollectionSchema,
        mut record: Record,
    ) -> AdapterResult<RecordId> {
        let table = validate_identifier(&collection.name)?;
        let explicit = record
            .id(&collection.key_field)
            .map_err(|e| AdapterError::InvalidRecord(e.to_string()))?;
        if record.is_empty() {
            // A NULL key asks the endpoint for a fresh row id.
            record.set(collection.key_field.clone(), Value::Null);
        }

        let mut columns = Vec::with_capacity(record.len());
        let mut params = Vec::with_capacity(record.len());
        for (field, value) in record.iter() {
            columns.push(validate_identifier(field)?);
            params.push(param(value));
        }
        let placeholders = vec!["?"; columns.len()].join(", ");
        let query = format!(
            "INSERT INTO {table} ({}) VALUES ({placeholders})",
            columns.join(", ")
        );

        let response = self.execute(query, params).await?;
        if let Some(id) = explicit {
            return Ok(id);
        }
        let inserted = response
            .inserted_id()
            .ok_or_else(|| AdapterError::Protocol("insert returned no row id".into()))?;
        RecordId::from_value(&Value::from(inserted.clone()))
            .map_err(|e| AdapterError::Protocol(e.to_string()))
    }

    async fn select(
        &self,
        collection: &CollectionSchema,
        query: &Query,
    ) -> AdapterResult<Vec<Record>> {
        let table = validate_identifier(&collection.name)?;
        let mut params = Vec::new();
        let mut text = format!("SELECT * FROM {table}");
        text.push_str(&where_clause(&query.filter, &mut params)?);
        if let Some(order) = &query.order {
            validate_identifier(&order.field)?;
            text.push_str(&format!(" ORDER BY {order}"));
        }
        if let Some(limit) = query.limit {
            text.push_str(&format!(" LIMIT {limit}"));
        }

        let response = self.execute(text, params).await?;
        Ok(response.into_rows().into_iter().map(row_to_record).collect())
    }

    async fn update(
        &self,
        collection: &CollectionSchema,
        id: &RecordId,
        patch: Record,
    ) -> AdapterResult<()> {
        let table = validate_identifier(&collection.name)?;
        let key = validate_identifier(&collection.key_field)?;

        if patch.is_empty() {
            let existing = self
                .select(
                    collection,
                    &Query::all().filter(key, id.to_value()).limit(1),
                )
                .await?;
            return if existing.is_empty() {
                Err(AdapterError::NotFound)
            } else {
                Ok(())
            };
        }

        let mut assignments = Vec::with_capacity(patch.len());
        let mut params = Vec::with_capacity(patch.len() + 1);
        for (field, value) in patch.iter() {
            assignments.push(format!("{} = ?", validate_identifier(field)?));
            params.push(param(value));
        }
        params.push(param(&id.to_value()));
        let query = format!(
            "UPDATE {table} SET {} WHERE {key} = ?",
            assignments.join(", ")
        );

        let response = self.execute(query, params).await?;
        match response.changes {
            Some(0) => Err(AdapterError::NotFound),
            _ => Ok(()),
        }
    }

    async fn delete(&self, collection: &CollectionSchema, id: &RecordId) -> AdapterResult<()> {
        let table = validate_identifier(&collection.name)?;
        let key = validate_identifier(&collection.key_field)?;
        let query = format!("DELETE FROM {table} WHERE {key} = ?");
        self.execute(query, vec![param(&id.to_value())]).await?;
        Ok(())
    }
}
