//! Terminal behaviour of a compiled query method.

mod strategy;

pub use strategy::{ExecutionStrategy, QueryShape};

use crate::backend::Row;
use crate::error::{QueryError, QueryResult};
use crate::value::Value;

/// What an invocation produced.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutput {
    Rows(Vec<Row>),
    /// Single-shaped result; `None` when nothing matched.
    Row(Option<Row>),
    Affected(u64),
    Exists(bool),
    Count(u64),
}

impl QueryOutput {
    pub fn rows(rows: Vec<Row>) -> Self {
        Self::Rows(rows)
    }

    pub fn affected(count: u64) -> Self {
        Self::Affected(count)
    }

    /// Reads a count out of a single-column result.
    pub fn into_count(self) -> QueryResult<u64> {
        let row = match self {
            QueryOutput::Count(count) | QueryOutput::Affected(count) => return Ok(count),
            QueryOutput::Row(Some(row)) => row,
            QueryOutput::Rows(mut rows) if rows.len() == 1 => rows.remove(0),
            QueryOutput::Row(None) => return Ok(0),
            other => {
                return Err(QueryError::Execution(format!(
                    "Expected a single count row, got {}",
                    other
                )));
            }
        };

        match row.values().next() {
            Some(Value::Integer(count)) if row.len() == 1 => Ok((*count).max(0) as u64),
            _ => Err(QueryError::Execution(format!(
                "Count query returned a non-numeric row {:?}",
                row
            ))),
        }
    }
}

impl std::fmt::Display for QueryOutput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QueryOutput::Rows(rows) => write!(f, "{} row(s)", rows.len()),
            QueryOutput::Row(Some(_)) => write!(f, "1 row"),
            QueryOutput::Row(None) => write!(f, "no row"),
            QueryOutput::Affected(count) => write!(f, "{} row(s) affected", count),
            QueryOutput::Exists(exists) => write!(f, "exists: {}", exists),
            QueryOutput::Count(count) => write!(f, "count: {}", count),
        }
    }
}

#[cfg(test)]
mod tests;
