//! Seams to the store that actually runs queries.

pub mod memory;

pub use memory::MemoryBackend;

use crate::derive::CriteriaQuery;
use crate::error::{BindError, QueryResult};
use crate::value::Value;
use async_trait::async_trait;
use std::collections::BTreeMap;

/// One result row keyed by (dotted) property name.
pub type Row = BTreeMap<String, Value>;

/// A query handle accepting parameter values before execution.
#[async_trait]
pub trait BoundQuery: Send {
    fn set_named(&mut self, name: &str, value: Value) -> Result<(), BindError>;

    fn set_positional(&mut self, position: usize, value: Value) -> Result<(), BindError>;

    /// Commits into a parameter slot of a criteria query.
    fn set_slot(&mut self, slot: usize, value: Value) -> Result<(), BindError>;

    /// Whether parameters are addressed by slot rather than name or position.
    fn uses_slots(&self) -> bool {
        false
    }

    fn set_first_result(&mut self, offset: usize);

    fn set_max_results(&mut self, max: usize);

    fn first_result(&self) -> usize;

    fn max_results(&self) -> Option<usize>;

    async fn fetch_all(&mut self) -> QueryResult<Vec<Row>>;

    /// At most one row; more than one is an error.
    async fn fetch_one(&mut self) -> QueryResult<Option<Row>>;

    async fn execute_update(&mut self) -> QueryResult<u64>;
}

#[async_trait]
pub trait QueryBackend: Send + Sync {
    fn create_query(&self, text: &str, native: bool) -> QueryResult<Box<dyn BoundQuery>>;

    fn create_criteria_query(&self, query: &CriteriaQuery) -> QueryResult<Box<dyn BoundQuery>>;

    /// Removes `rows` of `entity`, returning how many were removed.
    async fn remove(&self, entity: &str, rows: &[Row]) -> QueryResult<u64>;
}
