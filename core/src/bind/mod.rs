//! Resolving method arguments and expressions into bound query parameters.

mod accessor;
mod binder;
mod evaluator;

pub use accessor::{Argument, ArgumentAccessor, MethodArguments};
pub use binder::{apply_paging, BindContext, ErrorPolicy, ParameterBinder};
pub use evaluator::{ArgumentExpressionEvaluator, ExpressionEvaluator};

#[cfg(test)]
mod tests;
