//! Query templates: tokenizing, placeholder rewriting and the text-level
//! transformations applied to a declared query.

pub mod count;
mod declared;
pub mod lexer;
mod rewriter;
pub mod scan;
pub mod sort;

pub use count::create_count_query_for;
pub use declared::DeclaredQuery;
pub use rewriter::EXPRESSION_PARAMETER_PREFIX;
pub use sort::apply_sorting;
