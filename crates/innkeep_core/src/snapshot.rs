//! The export/import document.

use crate::error::{StoreError, StoreResult};
use crate::record::Record;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::warn;

/// A full export of every collection.
///
/// Serialized as
/// `{"exportDate": "...", "dbType": "...", "version": 2, "data": {"rooms": [..], ..}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    /// When the export was taken.
    pub export_date: DateTime<Utc>,

    /// Backend that served the export. Older documents use `sqlite`,
    /// `indexeddb` or `localstorage`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub db_type: Option<String>,

    /// Schema version of the exporting store.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<u32>,

    /// Records per collection.
    pub data: BTreeMap<String, Vec<Record>>,
}

impl Snapshot {
    /// Creates an empty snapshot stamped with the current time.
    pub fn new(db_type: Option<String>, version: Option<u32>) -> Self {
        Self {
            export_date: Utc::now(),
            db_type,
            version,
            data: BTreeMap::new(),
        }
    }

    /// Returns the total number of records.
    pub fn record_count(&self) -> usize {
        self.data.values().map(Vec::len).sum()
    }

    /// Parses a snapshot document.
    ///
    /// Only `data` is structurally required. A missing or malformed
    /// `exportDate` is replaced by the current time. Collections whose value
    /// is not an array are dropped with a warning.
    pub fn from_json(json: serde_json::Value) -> StoreResult<Self> {
        let serde_json::Value::Object(mut doc) = json else {
            return Err(StoreError::InvalidSnapshot(
                "document is not an object".to_string(),
            ));
        };

        let data = match doc.remove("data") {
            Some(serde_json::Value::Object(data)) => data,
            Some(_) => {
                return Err(StoreError::InvalidSnapshot(
                    "`data` is not an object".to_string(),
                ))
            }
            None => return Err(StoreError::InvalidSnapshot("missing `data`".to_string())),
        };

        let export_date = doc
            .get("exportDate")
            .and_then(serde_json::Value::as_str)
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map_or_else(Utc::now, |d| d.with_timezone(&Utc));
        let db_type = doc
            .get("dbType")
            .and_then(serde_json::Value::as_str)
            .map(str::to_string);
        let version = doc
            .get("version")
            .and_then(serde_json::Value::as_u64)
            .and_then(|v| u32::try_from(v).ok());

        let mut collections = BTreeMap::new();
        for (name, records) in data {
            let serde_json::Value::Array(items) = records else {
                warn!(collection = %name, "snapshot collection is not a list, skipping");
                continue;
            };
            let records = items
                .into_iter()
                .map(Record::from_json)
                .collect::<StoreResult<Vec<_>>>()
                .map_err(|e| StoreError::InvalidSnapshot(format!("{name}: {e}")))?;
            collections.insert(name, records);
        }

        Ok(Self {
            export_date,
            db_type,
            version,
            data: collections,
        })
    }

    /// Parses a snapshot from JSON text.
    pub fn parse(text: &str) -> StoreResult<Self> {
        let json: serde_json::Value = serde_json::from_str(text)
            .map_err(|e| StoreError::InvalidSnapshot(e.to_string()))?;
        Self::from_json(json)
    }

    /// Renders the snapshot as pretty-printed JSON.
    pub fn to_json_pretty(&self) -> StoreResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;
    use serde_json::json;

    #[test]
    fn parses_browser_export() {
        let snapshot = Snapshot::from_json(json!({
            "exportDate": "2024-03-01T08:30:00.000Z",
            "dbType": "indexeddb",
            "data": {
                "rooms": [{"id": "RM001", "number": "101"}],
                "bookings": []
            }
        }))
        .unwrap();

        assert_eq!(snapshot.db_type.as_deref(), Some("indexeddb"));
        assert_eq!(snapshot.export_date.to_rfc3339(), "2024-03-01T08:30:00+00:00");
        assert_eq!(snapshot.record_count(), 1);
        assert_eq!(
            snapshot.data["rooms"][0].get("number"),
            Some(&Value::from("101"))
        );
    }

    #[test]
    fn rejects_missing_data() {
        assert!(matches!(
            Snapshot::from_json(json!({"exportDate": "2024-03-01T08:30:00Z"})),
            Err(StoreError::InvalidSnapshot(_))
        ));
        assert!(matches!(
            Snapshot::from_json(json!({"data": [1, 2]})),
            Err(StoreError::InvalidSnapshot(_))
        ));
        assert!(matches!(
            Snapshot::from_json(json!("nope")),
            Err(StoreError::InvalidSnapshot(_))
        ));
        assert!(matches!(
            Snapshot::parse("{not json"),
            Err(StoreError::InvalidSnapshot(_))
        ));
    }

    #[test]
    fn non_list_collections_are_dropped() {
        let snapshot = Snapshot::from_json(json!({
            "data": {"rooms": {"id": "RM001"}, "guests": [{"id": "G1"}]}
        }))
        .unwrap();
        assert!(!snapshot.data.contains_key("rooms"));
        assert_eq!(snapshot.data["guests"].len(), 1);
    }

    #[test]
    fn non_object_records_are_invalid() {
        let result = Snapshot::from_json(json!({"data": {"rooms": [1]}}));
        assert!(matches!(result, Err(StoreError::InvalidSnapshot(_))));
    }

    #[test]
    fn serializes_camel_case() {
        let mut snapshot = Snapshot::new(Some("flat".into()), Some(2));
        snapshot
            .data
            .insert("tasks".into(), vec![Record::new().with("id", "T1")]);
        let text = snapshot.to_json_pretty().unwrap();
        assert!(text.contains("\"exportDate\""));
        assert!(text.contains("\"dbType\": \"flat\""));

        let back = Snapshot::parse(&text).unwrap();
        assert_eq!(back, snapshot);
    }

    #[test]
    fn pretty_json_keeps_float_digits() {
        let mut snapshot = Snapshot::new(Some("flat".into()), Some(2));
        snapshot.data.insert(
            "payments".into(),
            vec![Record::new().with("amount", 465_599_393.314_415_16)],
        );

        let back = Snapshot::parse(&snapshot.to_json_pretty().unwrap()).unwrap();
        assert_eq!(back.data, snapshot.data);
    }
}
