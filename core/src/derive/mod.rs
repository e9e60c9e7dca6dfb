//! Queries derived from method names.

pub mod compiler;
pub mod metadata;
pub mod method_name;
pub mod part;
pub mod predicate;

pub use compiler::{CriteriaQuery, PredicateCompiler, Selection};
pub use metadata::{ParameterMetadata, ParameterMetadataProvider};
pub use method_name::parse_method_name;
pub use part::{IgnoreCaseMode, OperatorKind, OrPart, Part, PartTree, Subject};
pub use predicate::{ComparisonOp, JunctionOp, Operand, Predicate};

#[cfg(test)]
mod tests;
