//! In-process relational endpoint.
//!
//! [`MemorySqlServer`] executes the statement subset understood by
//! [`Statement::parse`] against in-memory tables. Tables are column-open:
//! a row may carry any column, declared or not. It backs the CLI's local
//! endpoint and every test of the relational path.

use crate::loopback::QueryServer;
use crate::messages::{QueryRequest, QueryResponse, Row};
use crate::sql::{Assignment, ColumnDef, Operand, SqlError, Statement};
use parking_lot::RwLock;
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering as AtomicOrdering};
use tracing::debug;

#[derive(Debug, Default)]
struct Table {
    key_column: Option<String>,
    autoincrement: bool,
    unique_columns: Vec<String>,
    next_rowid: i64,
    rows: Vec<Row>,
}

impl Table {
    fn from_columns(columns: &[ColumnDef]) -> Self {
        let key = columns.iter().find(|c| c.primary_key);
        Self {
            key_column: key.map(|c| c.name.clone()),
            autoincrement: key.is_some_and(|c| c.autoincrement),
            unique_columns: columns
                .iter()
                .filter(|c| c.unique || c.primary_key)
                .map(|c| c.name.clone())
                .collect(),
            next_rowid: 1,
            rows: Vec::new(),
        }
    }

    fn check_unique(&self, row: &Row, skip: Option<usize>) -> Result<(), String> {
        for column in &self.unique_columns {
            let Some(value) = row.get(column).filter(|v| !v.is_null()) else {
                continue;
            };
            let clash = self.rows.iter().enumerate().any(|(i, other)| {
                Some(i) != skip && other.get(column).is_some_and(|o| same_value(o, value))
            });
            if clash {
                return Err(format!("UNIQUE constraint failed: {column}"));
            }
        }
        Ok(())
    }
}

/// An in-memory relational endpoint.
#[derive(Debug)]
pub struct MemorySqlServer {
    tables: RwLock<BTreeMap<String, Table>>,
    available: AtomicBool,
    statements: AtomicU64,
}

impl Default for MemorySqlServer {
    fn default() -> Self {
        Self::new()
    }
}

impl MemorySqlServer {
    /// Creates an empty, available endpoint.
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(BTreeMap::new()),
            available: AtomicBool::new(true),
            statements: AtomicU64::new(0),
        }
    }

    /// Marks the endpoint reachable or unreachable.
    ///
    /// While unavailable, health probes and queries fail.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, AtomicOrdering::SeqCst);
    }

    /// Returns whether the endpoint is reachable.
    pub fn is_available(&self) -> bool {
        self.available.load(AtomicOrdering::SeqCst)
    }

    /// Returns the number of statements executed so far.
    pub fn statement_count(&self) -> u64 {
        self.statements.load(AtomicOrdering::SeqCst)
    }

    /// Returns the names of existing tables.
    pub fn table_names(&self) -> Vec<String> {
        self.tables.read().keys().cloned().collect()
    }

    /// Returns the number of rows in `table`, if it exists.
    pub fn row_count(&self, table: &str) -> Option<usize> {
        self.tables.read().get(table).map(|t| t.rows.len())
    }

    /// Parses and executes one statement.
    pub fn execute(&self, query: &str, params: &[Value]) -> Result<QueryResponse, String> {
        let statement =
            Statement::parse_with_params(query, params).map_err(|e| e.to_string())?;
        self.statements.fetch_add(1, AtomicOrdering::SeqCst);
        debug!(table = statement.table(), "executing statement");

        match statement {
            Statement::CreateTable {
                table,
                if_not_exists,
                columns,
            } => self.create_table(table, if_not_exists, &columns),
            Statement::Insert {
                table,
                columns,
                values,
            } => self.insert(&table, &columns, &values, params),
            Statement::Select {
                table,
                filter,
                order_by,
                limit,
            } => self.select(&table, &filter, order_by, limit, params),
            Statement::Update {
                table,
                assignments,
                filter,
            } => self.update(&table, &assignments, &filter, params),
            Statement::Delete { table, filter } => self.delete(&table, &filter, params),
        }
    }

    fn create_table(
        &self,
        table: String,
        if_not_exists: bool,
        columns: &[ColumnDef],
    ) -> Result<QueryResponse, String> {
        let mut tables = self.tables.write();
        if tables.contains_key(&table) {
            if if_not_exists {
                return Ok(QueryResponse::changed(0));
            }
            return Err(format!("table {table} already exists"));
        }
        tables.insert(table, Table::from_columns(columns));
        Ok(QueryResponse::changed(0))
    }

    fn insert(
        &self,
        table: &str,
        columns: &[String],
        values: &[Operand],
        params: &[Value],
    ) -> Result<QueryResponse, String> {
        let mut tables = self.tables.write();
        let t = tables
            .get_mut(table)
            .ok_or_else(|| format!("no such table: {table}"))?;

        let mut row = Row::new();
        for (column, operand) in columns.iter().zip(values) {
            row.insert(column.clone(), bind(operand, params)?.clone());
        }

        let key_column = t.key_column.clone();
        let rowid = match &key_column {
            Some(key) => match row.get(key).filter(|v| !v.is_null()) {
                Some(Value::Number(n)) => {
                    let explicit = n.as_i64();
                    if let Some(id) = explicit {
                        t.next_rowid = t.next_rowid.max(id.saturating_add(1));
                    }
                    Value::Number(n.clone())
                }
                Some(other) => other.clone(),
                None if t.autoincrement => {
                    let id = t.next_rowid;
                    t.next_rowid = id
                        .checked_add(1)
                        .ok_or_else(|| format!("database or disk is full: {table}"))?;
                    row.insert(key.clone(), Value::from(id));
                    Value::from(id)
                }
                None => return Err(format!("NOT NULL constraint failed: {table}.{key}")),
            },
            None => {
                let id = t.next_rowid;
                t.next_rowid += 1;
                Value::from(id)
            }
        };

        t.check_unique(&row, None)?;
        t.rows.push(row);
        Ok(QueryResponse::inserted(rowid))
    }

    fn select(
        &self,
        table: &str,
        filter: &[Assignment],
        order_by: Option<(String, bool)>,
        limit: Option<Operand>,
        params: &[Value],
    ) -> Result<QueryResponse, String> {
        let tables = self.tables.read();
        let t = tables
            .get(table)
            .ok_or_else(|| format!("no such table: {table}"))?;

        let filter = bind_all(filter, params)?;
        let mut rows: Vec<Row> = t
            .rows
            .iter()
            .filter(|row| matches(row, &filter))
            .cloned()
            .collect();

        if let Some((field, descending)) = order_by {
            rows.sort_by(|a, b| {
                let ordering = compare(a.get(&field), b.get(&field));
                if descending {
                    ordering.reverse()
                } else {
                    ordering
                }
            });
        }

        if let Some(limit) = limit {
            let n = bind(&limit, params)?
                .as_u64()
                .ok_or_else(|| "LIMIT must be a non-negative integer".to_string())?;
            rows.truncate(usize::try_from(n).unwrap_or(usize::MAX));
        }

        Ok(QueryResponse::with_rows(rows))
    }

    fn update(
        &self,
        table: &str,
        assignments: &[Assignment],
        filter: &[Assignment],
        params: &[Value],
    ) -> Result<QueryResponse, String> {
        let mut tables = self.tables.write();
        let t = tables
            .get_mut(table)
            .ok_or_else(|| format!("no such table: {table}"))?;

        let assignments = bind_all(assignments, params)?;
        let filter = bind_all(filter, params)?;

        let targets: Vec<usize> = t
            .rows
            .iter()
            .enumerate()
            .filter(|(_, row)| matches(row, &filter))
            .map(|(i, _)| i)
            .collect();

        for &i in &targets {
            let mut row = t.rows[i].clone();
            for (column, value) in &assignments {
                row.insert(column.clone(), value.clone());
            }
            t.check_unique(&row, Some(i))?;
            t.rows[i] = row;
        }

        Ok(QueryResponse::changed(targets.len() as u64))
    }

    fn delete(
        &self,
        table: &str,
        filter: &[Assignment],
        params: &[Value],
    ) -> Result<QueryResponse, String> {
        let mut tables = self.tables.write();
        let t = tables
            .get_mut(table)
            .ok_or_else(|| format!("no such table: {table}"))?;

        let filter = bind_all(filter, params)?;
        let before = t.rows.len();
        t.rows.retain(|row| !matches(row, &filter));
        Ok(QueryResponse::changed((before - t.rows.len()) as u64))
    }
}

impl QueryServer for MemorySqlServer {
    fn health(&self) -> Result<(), String> {
        if self.is_available() {
            Ok(())
        } else {
            Err("endpoint is offline".into())
        }
    }

    fn handle_query(&self, request: &QueryRequest) -> Result<QueryResponse, String> {
        if !self.is_available() {
            return Err("endpoint is offline".into());
        }
        self.execute(&request.query, &request.params)
    }
}

fn bind<'a>(operand: &'a Operand, params: &'a [Value]) -> Result<&'a Value, String> {
    operand.bind(params).map_err(|e: SqlError| e.to_string())
}

fn bind_all(pairs: &[Assignment], params: &[Value]) -> Result<Vec<(String, Value)>, String> {
    pairs
        .iter()
        .map(|(field, operand)| Ok((field.clone(), bind(operand, params)?.clone())))
        .collect()
}

fn matches(row: &Row, filter: &[(String, Value)]) -> bool {
    filter
        .iter()
        .all(|(field, expected)| row.get(field).is_some_and(|actual| same_value(actual, expected)))
}

/// Equality with numbers compared by value, so `1` matches `1.0`.
fn same_value(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

fn compare(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        // NULLs sort first, as in SQLite.
        (None | Some(Value::Null), Some(v)) if !v.is_null() => Ordering::Less,
        (Some(v), None | Some(Value::Null)) if !v.is_null() => Ordering::Greater,
        _ => Ordering::Equal,
    }
}
