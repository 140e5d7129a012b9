//! Record-level commands: select, insert, update, delete.

use super::{open, CommandResult, StoreOptions};
use innkeep_core::{OrderBy, Query, Record, RecordId, StoreSchema, Value};

/// Parses a `field=value` predicate.
///
/// The value is read as JSON when it parses (`3`, `true`, `"x"`), and as a
/// plain string otherwise.
pub fn parse_filter(text: &str) -> CommandResult<(String, Value)> {
    let (field, raw) = text
        .split_once('=')
        .ok_or_else(|| format!("expected field=value, got {text:?}"))?;
    let field = field.trim();
    if field.is_empty() {
        return Err(format!("missing field name in {text:?}").into());
    }
    let value = serde_json::from_str::<serde_json::Value>(raw)
        .map(Value::from)
        .unwrap_or_else(|_| Value::from(raw));
    Ok((field.to_string(), value))
}

/// Builds a query from CLI arguments.
pub fn build_query(
    filters: &[String],
    order_by: Option<&str>,
    limit: Option<usize>,
) -> CommandResult<Query> {
    let mut query = Query::all();
    for filter in filters {
        let (field, value) = parse_filter(filter)?;
        query = query.filter(field, value);
    }
    if let Some(order) = order_by {
        query = query.order_by(OrderBy::parse(order)?);
    }
    if let Some(limit) = limit {
        query = query.limit(limit);
    }
    Ok(query)
}

/// Reads an identifier the way `collection` stores it.
///
/// Caller-keyed collections use text keys, so `101` stays `"101"` there.
pub fn parse_id(schema: &StoreSchema, collection: &str, id: &str) -> RecordId {
    match schema.collection(collection) {
        Some(c) if !c.auto_increment => RecordId::from(id),
        _ => RecordId::parse(id),
    }
}

fn parse_record(json: &str) -> CommandResult<Record> {
    Ok(Record::from_json(serde_json::from_str(json)?)?)
}

/// Runs the select command.
pub async fn select(
    options: &StoreOptions,
    collection: &str,
    filters: &[String],
    order_by: Option<&str>,
    limit: Option<usize>,
) -> CommandResult {
    let query = build_query(filters, order_by, limit)?;
    let engine = open(options).await?;
    let rows = engine.select(collection, &query).await?;
    println!("{}", serde_json::to_string_pretty(&rows)?);
    Ok(())
}

/// Runs the insert command.
pub async fn insert(options: &StoreOptions, collection: &str, json: &str) -> CommandResult {
    let record = parse_record(json)?;
    let engine = open(options).await?;
    let id = engine.insert(collection, record).await?;
    println!("{id}");
    Ok(())
}

/// Runs the update command.
pub async fn update(options: &StoreOptions, collection: &str, id: &str, json: &str) -> CommandResult {
    let patch = parse_record(json)?;
    let engine = open(options).await?;
    let id = parse_id(&engine.config().schema, collection, id);
    engine.update(collection, &id, patch).await?;
    Ok(())
}

/// Runs the delete command.
pub async fn delete(options: &StoreOptions, collection: &str, id: &str) -> CommandResult {
    let engine = open(options).await?;
    let id = parse_id(&engine.config().schema, collection, id);
    engine.delete(collection, &id).await?;
    Ok(())
}
