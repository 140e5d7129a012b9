//! Select queries: exact-match predicate, ordering and limit.

use crate::error::{StoreError, StoreResult};
use crate::record::Record;
use crate::value::Value;
use std::fmt;

/// Sort field and direction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    /// Field to sort on.
    pub field: String,
    /// Whether to sort descending.
    pub descending: bool,
}

impl OrderBy {
    /// Ascending order on `field`.
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            descending: false,
        }
    }

    /// Descending order on `field`.
    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            descending: true,
        }
    }

    /// Parses `"field"`, `"field ASC"` or `"field DESC"`.
    pub fn parse(text: &str) -> StoreResult<Self> {
        let mut parts = text.split_whitespace();
        let field = parts
            .next()
            .ok_or_else(|| StoreError::InvalidName(text.to_string()))?;
        let descending = match parts.next() {
            None => false,
            Some(dir) if dir.eq_ignore_ascii_case("ASC") => false,
            Some(dir) if dir.eq_ignore_ascii_case("DESC") => true,
            Some(_) => return Err(StoreError::InvalidName(text.to_string())),
        };
        if parts.next().is_some() {
            return Err(StoreError::InvalidName(text.to_string()));
        }
        Ok(Self {
            field: field.to_string(),
            descending,
        })
    }
}

impl fmt::Display for OrderBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dir = if self.descending { "DESC" } else { "ASC" };
        write!(f, "{} {dir}", self.field)
    }
}

/// A select: conjunction of exact matches, optional order, optional limit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    /// Fields that must all match.
    pub filter: Record,
    /// Sort applied before the limit.
    pub order: Option<OrderBy>,
    /// Maximum number of records returned.
    pub limit: Option<usize>,
}

impl Query {
    /// Selects everything.
    pub fn all() -> Self {
        Self::default()
    }

    /// Adds an exact-match condition.
    #[must_use]
    pub fn filter(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter.set(field, value);
        self
    }

    /// Replaces the whole predicate.
    #[must_use]
    pub fn matching(mut self, filter: Record) -> Self {
        self.filter = filter;
        self
    }

    /// Sets the ordering.
    #[must_use]
    pub fn order_by(mut self, order: OrderBy) -> Self {
        self.order = Some(order);
        self
    }

    /// Sets the limit.
    #[must_use]
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Applies the query to an already loaded record list.
    ///
    /// Used by backends without native query support. The sort is stable,
    /// so ties keep backend order.
    pub fn apply(&self, records: impl IntoIterator<Item = Record>) -> Vec<Record> {
        let mut out: Vec<Record> = records
            .into_iter()
            .filter(|r| r.matches(&self.filter))
            .collect();

        if let Some(order) = &self.order {
            out.sort_by(|a, b| {
                let ordering = match (a.get(&order.field), b.get(&order.field)) {
                    (Some(x), Some(y)) => x.sort_cmp(y),
                    _ => std::cmp::Ordering::Equal,
                };
                if order.descending {
                    ordering.reverse()
                } else {
                    ordering
                }
            });
        }

        if let Some(limit) = self.limit {
            out.truncate(limit);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bookings() -> Vec<Record> {
        ["2024-01-03", "2024-01-01", "2024-01-05", "2024-01-02", "2024-01-04"]
            .iter()
            .enumerate()
            .map(|(i, date)| {
                Record::new()
                    .with("id", i as i64 + 1)
                    .with("bookingDate", *date)
                    .with("status", if i % 2 == 0 { "pending" } else { "paid" })
            })
            .collect()
    }

    #[test]
    fn parse_order_by() {
        assert_eq!(OrderBy::parse("bookingDate").unwrap(), OrderBy::asc("bookingDate"));
        assert_eq!(
            OrderBy::parse("bookingDate DESC").unwrap(),
            OrderBy::desc("bookingDate")
        );
        assert_eq!(OrderBy::parse("price asc").unwrap(), OrderBy::asc("price"));
        assert!(OrderBy::parse("").is_err());
        assert!(OrderBy::parse("price sideways").is_err());
        assert!(OrderBy::parse("a b c").is_err());
    }

    #[test]
    fn latest_two_bookings() {
        let query = Query::all().order_by(OrderBy::desc("bookingDate")).limit(2);
        let result = query.apply(bookings());
        let dates: Vec<_> = result
            .iter()
            .map(|r| r.get("bookingDate").and_then(Value::as_str).unwrap())
            .collect();
        assert_eq!(dates, vec!["2024-01-05", "2024-01-04"]);
    }

    #[test]
    fn filter_then_order() {
        let query = Query::all()
            .filter("status", "pending")
            .order_by(OrderBy::asc("bookingDate"));
        let result = query.apply(bookings());
        assert_eq!(result.len(), 3);
        assert_eq!(
            result[0].get("bookingDate"),
            Some(&Value::from("2024-01-03"))
        );
    }

    #[test]
    fn records_missing_the_sort_field_keep_their_place() {
        let records = vec![
            Record::new().with("id", 1),
            Record::new().with("id", 2).with("n", 5),
            Record::new().with("id", 3),
        ];
        let result = Query::all().order_by(OrderBy::asc("n")).apply(records);
        let ids: Vec<_> = result.iter().map(|r| r.get("id").cloned()).collect();
        assert_eq!(
            ids,
            vec![
                Some(Value::Integer(1)),
                Some(Value::Integer(2)),
                Some(Value::Integer(3))
            ]
        );
    }
}
