//! Request and response messages of the relational endpoint.
//!
//! Both directions are JSON. A query carries its text plus positional
//! parameters bound to `?` placeholders; the answer carries whichever of
//! an inserted row id, an affected-row count, or a row list applies.

use crate::error::{WireError, WireResult};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Path of the reachability probe.
pub const HEALTH_PATH: &str = "/api/health";

/// Path of the query endpoint.
pub const QUERY_PATH: &str = "/api/query";

/// A row as returned by the endpoint: column name to JSON value.
pub type Row = Map<String, Value>;

/// A textual query plus its positional parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryRequest {
    /// Statement text with `?` placeholders.
    pub query: String,
    /// Values bound to the placeholders, in order.
    #[serde(default)]
    pub params: Vec<Value>,
}

impl QueryRequest {
    /// Creates a request without parameters.
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            params: Vec::new(),
        }
    }

    /// Creates a request with positional parameters.
    pub fn with_params(query: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            query: query.into(),
            params,
        }
    }

    /// Encodes the request body.
    pub fn encode(&self) -> WireResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Decodes a request body.
    pub fn decode(bytes: &[u8]) -> WireResult<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// The endpoint's answer to a [`QueryRequest`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResponse {
    /// Row id assigned by an insert.
    #[serde(rename = "lastInsertRowid", default, skip_serializing_if = "Option::is_none")]
    pub last_insert_rowid: Option<Value>,
    /// Alternate spelling some endpoints use for the inserted id.
    #[serde(rename = "insertId", default, skip_serializing_if = "Option::is_none")]
    pub insert_id: Option<Value>,
    /// Number of rows changed by an update or delete.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub changes: Option<u64>,
    /// Rows produced by a select.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rows: Option<Vec<Row>>,
}

impl QueryResponse {
    /// A response reporting an inserted row id.
    pub fn inserted(id: Value) -> Self {
        Self {
            last_insert_rowid: Some(id),
            changes: Some(1),
            ..Self::default()
        }
    }

    /// A response reporting a number of changed rows.
    pub fn changed(changes: u64) -> Self {
        Self {
            changes: Some(changes),
            ..Self::default()
        }
    }

    /// A response carrying rows.
    pub fn with_rows(rows: Vec<Row>) -> Self {
        Self {
            rows: Some(rows),
            ..Self::default()
        }
    }

    /// Returns the inserted id, preferring `lastInsertRowid` over `insertId`.
    pub fn inserted_id(&self) -> Option<&Value> {
        self.last_insert_rowid
            .as_ref()
            .filter(|v| !v.is_null())
            .or_else(|| self.insert_id.as_ref().filter(|v| !v.is_null()))
    }

    /// Consumes the response and returns its rows, or an empty list.
    pub fn into_rows(self) -> Vec<Row> {
        self.rows.unwrap_or_default()
    }

    /// Encodes the response body.
    pub fn encode(&self) -> WireResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Decodes a response body.
    ///
    /// Endpoints answer a select either with `{"rows": [...]}` or with a
    /// bare JSON array of rows; both shapes are accepted.
    pub fn decode(bytes: &[u8]) -> WireResult<Self> {
        let value: Value = serde_json::from_slice(bytes)?;
        match value {
            Value::Array(items) => {
                let rows = items
                    .into_iter()
                    .map(|item| match item {
                        Value::Object(row) => Ok(row),
                        other => Err(WireError::Protocol(format!(
                            "expected row object, got {other}"
                        ))),
                    })
                    .collect::<WireResult<Vec<_>>>()?;
                Ok(Self::with_rows(rows))
            }
            Value::Object(_) => Ok(serde_json::from_value(value)?),
            other => Err(WireError::Protocol(format!(
                "expected object or array, got {other}"
            ))),
        }
    }
}

/// Body of an error answer from the endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Human-readable error.
    pub error: String,
}
