//! Query methods: a compiled query plus how to run it.

use crate::backend::{BoundQuery, QueryBackend};
use crate::bind::{
    apply_paging, ArgumentAccessor, ArgumentExpressionEvaluator, BindContext, ErrorPolicy,
    ExpressionEvaluator, ParameterBinder,
};
use crate::cache::{CacheStats, QueryCache, TemplateSlot};
use crate::config::EngineConfig;
use crate::derive::{parse_method_name, CriteriaQuery, PartTree, PredicateCompiler, Selection};
use crate::error::{CompileError, QueryError, QueryResult};
use crate::execution::{ExecutionStrategy, QueryOutput, QueryShape};
use crate::method::{MethodKey, MethodSignature};
use crate::model::EntityModel;
use crate::paging::Sort;
use crate::template::DeclaredQuery;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Extra inputs of a method backed by a declared template.
#[derive(Debug, Clone, Default)]
pub struct DeclaredOptions {
    pub native: bool,
    /// Replaces the derived count query.
    pub count_query: Option<String>,
    /// Replaces the argument of `count(..)` in the derived count query.
    pub count_projection: Option<String>,
}

enum CompiledQuery {
    Declared {
        slot: TemplateSlot,
        count: DeclaredQuery,
    },
    Derived {
        tree: PartTree,
        criteria: CriteriaQuery,
        model: Arc<dyn EntityModel>,
    },
}

/// A compiled query method, immutable and shared across invocations.
pub struct QueryMethod {
    signature: MethodSignature,
    query: CompiledQuery,
    strategy: ExecutionStrategy,
    config: EngineConfig,
    evaluator: Arc<dyn ExpressionEvaluator>,
}

impl QueryMethod {
    pub fn declared(
        signature: MethodSignature,
        template: &str,
        options: DeclaredOptions,
        config: &EngineConfig,
    ) -> Result<Self, CompileError> {
        let base = DeclaredQuery::compile(template, options.native, Some(&signature.entity))?;
        let count = base.derive_count_query(
            options.count_query.as_deref(),
            options.count_projection.as_deref(),
        )?;
        let strategy = ExecutionStrategy::select(QueryShape::declared(&signature));
        tracing::debug!("Compiled {} as declared {} query", signature, strategy);

        Ok(Self {
            query: CompiledQuery::Declared {
                slot: TemplateSlot::new(base, config.sort_variant_capacity),
                count,
            },
            signature,
            strategy,
            config: config.clone(),
            evaluator: Arc::new(ArgumentExpressionEvaluator),
        })
    }

    pub fn derived(
        signature: MethodSignature,
        model: Arc<dyn EntityModel>,
        config: &EngineConfig,
    ) -> Result<Self, CompileError> {
        let tree = parse_method_name(&signature.name, &signature.entity, model.as_ref())?;
        let criteria =
            PredicateCompiler::new(model.as_ref(), config.escape()).compile(&tree, &signature, None)?;
        let strategy = ExecutionStrategy::select(QueryShape::derived(&signature, &tree));
        tracing::debug!("Compiled {} as '{}' ({})", signature, criteria, strategy);

        Ok(Self {
            query: CompiledQuery::Derived {
                tree,
                criteria,
                model,
            },
            signature,
            strategy,
            config: config.clone(),
            evaluator: Arc::new(ArgumentExpressionEvaluator),
        })
    }

    pub fn with_evaluator(mut self, evaluator: Arc<dyn ExpressionEvaluator>) -> Self {
        self.evaluator = evaluator;
        self
    }

    pub fn signature(&self) -> &MethodSignature {
        &self.signature
    }

    pub fn strategy(&self) -> ExecutionStrategy {
        self.strategy
    }

    /// The template this method was declared with, if any.
    pub fn declared_query(&self) -> Option<&DeclaredQuery> {
        match &self.query {
            CompiledQuery::Declared { slot, .. } => Some(slot.base()),
            CompiledQuery::Derived { .. } => None,
        }
    }

    pub fn criteria_query(&self) -> Option<&CriteriaQuery> {
        match &self.query {
            CompiledQuery::Declared { .. } => None,
            CompiledQuery::Derived { criteria, .. } => Some(criteria),
        }
    }

    fn context(&self, cancellation: CancellationToken) -> BindContext {
        BindContext::new(self.config.escape()).with_cancellation(cancellation)
    }

    fn uses_paging(&self) -> bool {
        matches!(
            self.strategy,
            ExecutionStrategy::Collection | ExecutionStrategy::Single
        )
    }

    /// Runs one invocation end to end.
    pub async fn execute(
        &self,
        backend: &dyn QueryBackend,
        arguments: &dyn ArgumentAccessor,
        cancellation: CancellationToken,
    ) -> QueryResult<QueryOutput> {
        let context = self.context(cancellation);
        match &self.query {
            CompiledQuery::Declared { slot, .. } => {
                let query = slot.derive(&arguments.effective_sort(), self.config.allow_unsafe_sort)?;
                let mut handle = backend.create_query(query.text(), query.is_native())?;
                ParameterBinder::for_declared(&query, Arc::clone(&self.evaluator))
                    .bind(handle.as_mut(), arguments, &context, ErrorPolicy::Strict)
                    .await?;
                if self.uses_paging() {
                    apply_paging(handle.as_mut(), arguments, None, query.uses_paging_expression());
                }
                self.strategy
                    .execute(handle.as_mut(), backend, &self.signature.entity)
                    .await
            }
            CompiledQuery::Derived { tree, criteria, model } => {
                let criteria = self.effective_criteria(tree, criteria, model.as_ref(), arguments)?;
                let mut handle = self.bind_criteria(&criteria, backend, arguments, &context).await?;
                if self.uses_paging() {
                    apply_paging(handle.as_mut(), arguments, tree.subject.max_results, false);
                }
                let output = self
                    .strategy
                    .execute(handle.as_mut(), backend, &self.signature.entity)
                    .await?;
                if tree.subject.count {
                    return Ok(QueryOutput::Count(output.into_count()?));
                }
                Ok(output)
            }
        }
    }

    /// Total number of rows the query matches, ignoring paging.
    pub async fn count(
        &self,
        backend: &dyn QueryBackend,
        arguments: &dyn ArgumentAccessor,
        cancellation: CancellationToken,
    ) -> QueryResult<u64> {
        let context = self.context(cancellation);
        match &self.query {
            CompiledQuery::Declared { count, .. } => {
                let mut handle = backend.create_query(count.text(), count.is_native())?;
                ParameterBinder::for_declared(count, Arc::clone(&self.evaluator))
                    .bind(
                        handle.as_mut(),
                        arguments,
                        &context,
                        self.config.count_binding_policy,
                    )
                    .await?;
                QueryOutput::Row(handle.fetch_one().await?).into_count()
            }
            CompiledQuery::Derived { tree, criteria, model } => {
                let criteria = self.effective_criteria(tree, criteria, model.as_ref(), arguments)?;
                let count = CriteriaQuery {
                    selection: Selection::Count {
                        distinct: criteria.distinct,
                    },
                    distinct: false,
                    order: Sort::unsorted(),
                    max_results: None,
                    ..criteria
                };
                let mut handle = self.bind_criteria(&count, backend, arguments, &context).await?;
                QueryOutput::Row(handle.fetch_one().await?).into_count()
            }
        }
    }

    /// The compiled criteria, recompiled when an argument is null and
    /// extended with the call's dynamic sort.
    fn effective_criteria(
        &self,
        tree: &PartTree,
        criteria: &CriteriaQuery,
        model: &dyn EntityModel,
        arguments: &dyn ArgumentAccessor,
    ) -> Result<CriteriaQuery, CompileError> {
        let criteria = if arguments.has_null_value() {
            tracing::trace!("Recompiling {} for null arguments", self.signature);
            PredicateCompiler::new(model, self.config.escape()).compile(
                tree,
                &self.signature,
                Some(arguments),
            )?
        } else {
            criteria.clone()
        };

        let dynamic = arguments.effective_sort();
        if !dynamic.is_sorted() || tree.subject.delete || tree.subject.count {
            return Ok(criteria);
        }
        let order = criteria.order.and(&dynamic);
        Ok(criteria.with_order(order))
    }

    async fn bind_criteria(
        &self,
        criteria: &CriteriaQuery,
        backend: &dyn QueryBackend,
        arguments: &dyn ArgumentAccessor,
        context: &BindContext,
    ) -> QueryResult<Box<dyn BoundQuery>> {
        let mut handle = backend.create_criteria_query(criteria)?;
        ParameterBinder::for_criteria(criteria, Arc::clone(&self.evaluator))
            .bind(handle.as_mut(), arguments, context, ErrorPolicy::Strict)
            .await?;
        Ok(handle)
    }
}

/// Query methods of one backend, compiled once and cached by method identity.
pub struct Repository {
    backend: Arc<dyn QueryBackend>,
    model: Arc<dyn EntityModel>,
    config: EngineConfig,
    methods: QueryCache<QueryMethod>,
}

impl Repository {
    pub fn new(backend: Arc<dyn QueryBackend>, model: Arc<dyn EntityModel>, config: EngineConfig) -> Self {
        Self {
            methods: QueryCache::new(config.cache_capacity),
            backend,
            model,
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Compiles a method backed by `template`, or returns the cached one.
    pub fn declare(
        &self,
        signature: MethodSignature,
        template: &str,
        options: DeclaredOptions,
    ) -> Result<Arc<QueryMethod>, CompileError> {
        let key = signature.key();
        self.methods.get_or_try_insert_with(&key, || {
            QueryMethod::declared(signature, template, options, &self.config)
        })
    }

    /// Compiles a method whose query is derived from its name.
    pub fn derive(&self, signature: MethodSignature) -> Result<Arc<QueryMethod>, CompileError> {
        let key = signature.key();
        self.methods.get_or_try_insert_with(&key, || {
            QueryMethod::derived(signature, Arc::clone(&self.model), &self.config)
        })
    }

    pub async fn invoke(
        &self,
        key: &MethodKey,
        arguments: &dyn ArgumentAccessor,
        cancellation: CancellationToken,
    ) -> QueryResult<QueryOutput> {
        let method = self
            .methods
            .get(key)
            .ok_or_else(|| QueryError::Execution(format!("No query method registered for {}", key)))?;
        method.execute(self.backend.as_ref(), arguments, cancellation).await
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.methods.stats()
    }
}

#[cfg(test)]
mod tests;
