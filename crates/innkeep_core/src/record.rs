//! Records and record identifiers.

use crate::error::{StoreError, StoreResult};
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Identifier of a record within its collection.
///
/// Auto-increment collections use integers; caller-keyed collections use
/// human-readable text such as `RM001`, or a generated UUID.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordId {
    /// Numeric identifier.
    Int(i64),
    /// Text identifier.
    Text(String),
}

impl RecordId {
    /// Converts a field value into an identifier.
    ///
    /// Integral floats become [`RecordId::Int`]. Null, booleans, fractional
    /// numbers and nested values are rejected.
    pub fn from_value(value: &Value) -> StoreResult<Self> {
        match value {
            Value::Text(s) => Ok(RecordId::Text(s.clone())),
            other => other.as_i64().map(RecordId::Int).ok_or_else(|| {
                StoreError::InvalidRecord(format!("{other} cannot be used as an identifier"))
            }),
        }
    }

    /// Generates a fresh text identifier from a v4 UUID.
    pub fn generate() -> Self {
        RecordId::Text(uuid::Uuid::new_v4().simple().to_string())
    }

    /// Parses a command-line identifier: digits become integers.
    pub fn parse(text: &str) -> Self {
        text.parse::<i64>()
            .map_or_else(|_| RecordId::Text(text.to_string()), RecordId::Int)
    }

    /// Returns the numeric identifier, if any.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            RecordId::Int(n) => Some(*n),
            RecordId::Text(_) => None,
        }
    }

    /// Converts the identifier into a field value.
    pub fn to_value(&self) -> Value {
        match self {
            RecordId::Int(n) => Value::Integer(*n),
            RecordId::Text(s) => Value::Text(s.clone()),
        }
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordId::Int(n) => write!(f, "{n}"),
            RecordId::Text(s) => write!(f, "{s}"),
        }
    }
}

impl From<i64> for RecordId {
    fn from(n: i64) -> Self {
        RecordId::Int(n)
    }
}

impl From<&str> for RecordId {
    fn from(s: &str) -> Self {
        RecordId::Text(s.to_string())
    }
}

impl From<String> for RecordId {
    fn from(s: String) -> Self {
        RecordId::Text(s)
    }
}

/// A stored entity: an open map of named fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record {
    fields: BTreeMap<String, Value>,
}

impl Record {
    /// Creates an empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style field setter.
    #[must_use]
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(field, value);
        self
    }

    /// Returns a field.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Sets a field, returning the previous value.
    pub fn set(&mut self, field: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.fields.insert(field.into(), value.into())
    }

    /// Removes a field.
    pub fn remove(&mut self, field: &str) -> Option<Value> {
        self.fields.remove(field)
    }

    /// Returns true if the field is present.
    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns true if the record has no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Iterates fields in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.fields.iter()
    }

    /// Returns the identifier stored under `key_field`.
    ///
    /// A missing or null key yields `Ok(None)`; a present key that cannot
    /// be an identifier is an error.
    pub fn id(&self, key_field: &str) -> StoreResult<Option<RecordId>> {
        match self.fields.get(key_field) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => RecordId::from_value(value).map(Some),
        }
    }

    /// Merges `patch` into this record; fields in `patch` win.
    pub fn merge(&mut self, patch: &Record) {
        for (k, v) in &patch.fields {
            self.fields.insert(k.clone(), v.clone());
        }
    }

    /// Returns true if every field of `filter` exact-matches this record.
    pub fn matches(&self, filter: &Record) -> bool {
        filter
            .fields
            .iter()
            .all(|(k, expected)| self.fields.get(k).is_some_and(|v| v.matches(expected)))
    }

    /// Converts a JSON object into a record.
    pub fn from_json(json: serde_json::Value) -> StoreResult<Self> {
        match Value::from(json) {
            Value::Object(fields) => Ok(Self { fields }),
            other => Err(StoreError::InvalidRecord(format!(
                "expected an object, got {other}"
            ))),
        }
    }

    /// Converts the record into a JSON object.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::from(Value::Object(self.fields.clone()))
    }
}

impl From<BTreeMap<String, Value>> for Record {
    fn from(fields: BTreeMap<String, Value>) -> Self {
        Self { fields }
    }
}

impl From<Record> for BTreeMap<String, Value> {
    fn from(record: Record) -> Self {
        record.fields
    }
}

impl FromIterator<(String, Value)> for Record {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for Record {
    type Item = (String, Value);
    type IntoIter = std::collections::btree_map::IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn id_conversion() {
        assert_eq!(
            RecordId::from_value(&Value::Float(3.0)).unwrap(),
            RecordId::Int(3)
        );
        assert_eq!(
            RecordId::from_value(&Value::from("RM001")).unwrap(),
            RecordId::from("RM001")
        );
        assert!(matches!(
            RecordId::from_value(&Value::Float(3.5)),
            Err(StoreError::InvalidRecord(_))
        ));
        assert!(RecordId::from_value(&Value::Bool(true)).is_err());
    }

    #[test]
    fn generated_ids_are_simple_uuids() {
        let RecordId::Text(id) = RecordId::generate() else {
            panic!("expected text id");
        };
        assert_eq!(id.len(), 32);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn parse_cli_ids() {
        assert_eq!(RecordId::parse("42"), RecordId::Int(42));
        assert_eq!(RecordId::parse("VL001"), RecordId::from("VL001"));
    }

    #[test]
    fn record_id_lookup() {
        let record = Record::new().with("id", 7).with("name", "Sari");
        assert_eq!(record.id("id").unwrap(), Some(RecordId::Int(7)));
        assert_eq!(record.id("key").unwrap(), None);
        assert_eq!(Record::new().with("id", Value::Null).id("id").unwrap(), None);
    }

    #[test]
    fn merge_overwrites_per_field() {
        let mut record = Record::new().with("a", 1).with("b", 2);
        record.merge(&Record::new().with("b", 3).with("c", "x"));
        assert_eq!(
            record,
            Record::new().with("a", 1).with("b", 3).with("c", "x")
        );
    }

    #[test]
    fn filter_matching() {
        let record = Record::new().with("status", "available").with("price", 150_000);
        assert!(record.matches(&Record::new()));
        assert!(record.matches(&Record::new().with("price", 150_000.0)));
        assert!(!record.matches(&Record::new().with("status", "occupied")));
        assert!(!record.matches(&Record::new().with("missing", Value::Null)));
    }

    #[test]
    fn json_conversion() {
        let record = Record::from_json(json!({"id": "RM001", "capacity": 2})).unwrap();
        assert_eq!(record.get("capacity"), Some(&Value::Integer(2)));
        assert_eq!(record.to_json(), json!({"id": "RM001", "capacity": 2}));
        assert!(Record::from_json(json!([1, 2])).is_err());
    }

    #[test]
    fn serializes_as_plain_object() {
        let record = Record::new().with("id", 1).with("status", "paid");
        assert_eq!(
            serde_json::to_string(&record).unwrap(),
            r#"{"id":1,"status":"paid"}"#
        );
    }
}
