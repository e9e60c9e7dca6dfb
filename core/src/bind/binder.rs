use super::{ArgumentAccessor, ExpressionEvaluator};
use crate::backend::BoundQuery;
use crate::binding::{EscapeCharacter, ParameterBinding, ParameterOrigin};
use crate::derive::CriteriaQuery;
use crate::error::{BindError, QueryError, QueryResult};
use crate::template::DeclaredQuery;
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// What happens when committing a value fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorPolicy {
    #[default]
    Strict,
    /// Logged and skipped; used for derived count queries.
    Lenient,
}

/// Per-invocation state threaded through binding.
#[derive(Debug, Clone, Default)]
pub struct BindContext {
    pub cancellation: CancellationToken,
    pub escape: EscapeCharacter,
}

impl BindContext {
    pub fn new(escape: EscapeCharacter) -> Self {
        Self {
            cancellation: CancellationToken::new(),
            escape,
        }
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    fn check_cancelled(&self) -> QueryResult<()> {
        if self.cancellation.is_cancelled() {
            Err(QueryError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Resolves and commits the bindings of one compiled query.
#[derive(Clone)]
pub struct ParameterBinder {
    bindings: Arc<[ParameterBinding]>,
    /// Method-argument bindings are looked up by name.
    named: bool,
    evaluator: Arc<dyn ExpressionEvaluator>,
}

impl ParameterBinder {
    pub fn new(
        bindings: Vec<ParameterBinding>,
        named: bool,
        evaluator: Arc<dyn ExpressionEvaluator>,
    ) -> Self {
        Self {
            bindings: bindings.into(),
            named,
            evaluator,
        }
    }

    pub fn for_declared(query: &DeclaredQuery, evaluator: Arc<dyn ExpressionEvaluator>) -> Self {
        Self::new(query.bindings().to_vec(), query.has_named_parameter(), evaluator)
    }

    pub fn for_criteria(query: &CriteriaQuery, evaluator: Arc<dyn ExpressionEvaluator>) -> Self {
        Self::new(query.bindings(), false, evaluator)
    }

    pub fn bindings(&self) -> &[ParameterBinding] {
        &self.bindings
    }

    /// Binds every parameter in declaration order.
    ///
    /// Resolution failures always propagate; commit failures follow `policy`.
    pub async fn bind(
        &self,
        query: &mut dyn BoundQuery,
        arguments: &dyn ArgumentAccessor,
        context: &BindContext,
        policy: ErrorPolicy,
    ) -> QueryResult<()> {
        for binding in self.bindings.iter() {
            context.check_cancelled()?;
            let value = self.resolve(binding, arguments, context).await?;
            let prepared = binding.prepare(value, context.escape).unwrap_optional();

            tracing::trace!("Binding {} = {}", binding.identifier(), prepared);
            if let Err(error) = commit(query, binding, prepared) {
                match policy {
                    ErrorPolicy::Strict => return Err(error.into()),
                    ErrorPolicy::Lenient => {
                        tracing::debug!("Ignoring failed binding of {}: {}", binding, error);
                    }
                }
            }
        }
        Ok(())
    }

    /// Produces the raw value of `binding` for this invocation.
    pub async fn resolve(
        &self,
        binding: &ParameterBinding,
        arguments: &dyn ArgumentAccessor,
        context: &BindContext,
    ) -> QueryResult<Value> {
        match binding.origin() {
            ParameterOrigin::MethodArgument(identifier) => {
                if self.named
                    && let Some(name) = identifier.name()
                {
                    return match arguments.value_by_name(name) {
                        Some(value) => Ok(value.clone()),
                        None if (0..arguments.bindable_count())
                            .all(|i| arguments.parameter_name(i).is_none()) =>
                        {
                            Err(BindError::ParameterNeedsName(name.to_string()).into())
                        }
                        None => Err(BindError::MissingArgument(format!(":{}", name)).into()),
                    };
                }

                let position = identifier
                    .position()
                    .ok_or_else(|| BindError::MissingArgument(identifier.to_string()))?;
                arguments
                    .bindable_value(position - 1)
                    .cloned()
                    .ok_or_else(|| BindError::MissingArgument(format!("?{}", position)).into())
            }
            ParameterOrigin::Expression(expression) => {
                tokio::select! {
                    _ = context.cancellation.cancelled() => Err(QueryError::Cancelled),
                    value = self.evaluator.evaluate(expression, arguments) => Ok(value?),
                }
            }
        }
    }
}

fn commit(query: &mut dyn BoundQuery, binding: &ParameterBinding, value: Value) -> Result<(), BindError> {
    let identifier = binding.identifier();
    if query.uses_slots()
        && let Some(position) = identifier.position()
    {
        return query.set_slot(position, value);
    }

    match (identifier.name(), identifier.position()) {
        (Some(name), _) => query.set_named(name, value),
        (None, Some(position)) => query.set_positional(position, value),
        (None, None) => Err(BindError::MissingArgument(identifier.to_string())),
    }
}

/// Applies the call's paging directive and a static result limit.
///
/// A page starting past a static limit has its offset pulled back by the
/// overshoot so the window still ends at the limit.
pub fn apply_paging(
    query: &mut dyn BoundQuery,
    arguments: &dyn ArgumentAccessor,
    static_limit: Option<usize>,
    uses_paging_expression: bool,
) {
    if !uses_paging_expression {
        let pageable = arguments.pageable();
        if let (Some(offset), Some(size)) = (pageable.offset(), pageable.page_size()) {
            query.set_first_result(offset);
            query.set_max_results(size);
        } else if let Some(max) = arguments.limit().max() {
            query.set_max_results(max);
        }
    }

    if let Some(limit) = static_limit {
        if let Some(max) = query.max_results()
            && max > limit
            && query.first_result() > 0
        {
            let adjusted = query.first_result().saturating_sub(max - limit);
            tracing::trace!("Adjusting first result to {} for limit {}", adjusted, limit);
            query.set_first_result(adjusted);
        }
        query.set_max_results(limit);
    }
}
