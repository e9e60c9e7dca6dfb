use super::QueryOutput;
use crate::backend::{BoundQuery, QueryBackend};
use crate::derive::PartTree;
use crate::error::QueryResult;
use crate::method::MethodSignature;

/// Static facts about a query method that decide how it executes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QueryShape {
    pub modifying: bool,
    pub delete: bool,
    pub exists: bool,
    pub collection: bool,
}

impl QueryShape {
    /// Shape of a method backed by a declared template.
    pub fn declared(signature: &MethodSignature) -> Self {
        Self {
            modifying: signature.modifying,
            delete: false,
            exists: false,
            collection: signature.returns_collection(),
        }
    }

    /// Shape of a method whose query is derived from its name.
    pub fn derived(signature: &MethodSignature, tree: &PartTree) -> Self {
        Self {
            modifying: signature.modifying,
            delete: tree.subject.delete,
            exists: tree.subject.exists,
            collection: signature.returns_collection() && !tree.subject.count,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionStrategy {
    /// Materialize every row.
    Collection,
    /// At most one row.
    Single,
    /// Execute for an affected-row count.
    Modifying,
    /// Materialize, then remove what matched.
    Delete { return_rows: bool },
    Exists,
}

impl ExecutionStrategy {
    pub fn select(shape: QueryShape) -> Self {
        if shape.modifying {
            ExecutionStrategy::Modifying
        } else if shape.delete {
            ExecutionStrategy::Delete {
                return_rows: shape.collection,
            }
        } else if shape.exists {
            ExecutionStrategy::Exists
        } else if shape.collection {
            ExecutionStrategy::Collection
        } else {
            ExecutionStrategy::Single
        }
    }

    pub async fn execute(
        &self,
        query: &mut dyn BoundQuery,
        backend: &dyn QueryBackend,
        entity: &str,
    ) -> QueryResult<QueryOutput> {
        tracing::trace!("Executing {:?} query for {}", self, entity);
        match self {
            ExecutionStrategy::Collection => Ok(QueryOutput::Rows(query.fetch_all().await?)),
            ExecutionStrategy::Single => Ok(QueryOutput::Row(query.fetch_one().await?)),
            ExecutionStrategy::Modifying => Ok(QueryOutput::Affected(query.execute_update().await?)),
            ExecutionStrategy::Delete { return_rows } => {
                let rows = query.fetch_all().await?;
                let removed = backend.remove(entity, &rows).await?;
                tracing::debug!("Removed {} {} row(s)", removed, entity);
                if *return_rows {
                    Ok(QueryOutput::Rows(rows))
                } else {
                    Ok(QueryOutput::Affected(removed))
                }
            }
            ExecutionStrategy::Exists => {
                let rows = query.fetch_all().await?;
                Ok(QueryOutput::Exists(!rows.is_empty()))
            }
        }
    }
}

impl std::fmt::Display for ExecutionStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ExecutionStrategy::Collection => "collection",
            ExecutionStrategy::Single => "single",
            ExecutionStrategy::Modifying => "modifying",
            ExecutionStrategy::Delete { .. } => "delete",
            ExecutionStrategy::Exists => "exists",
        };
        f.write_str(name)
    }
}
