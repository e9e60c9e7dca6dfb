use thiserror::Error;

pub type QueryResult<T> = Result<T, QueryError>;

/// Raised while turning a template or method name into a compiled query.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CompileError {
	#[error("Mixing of ? parameters and other forms like ?1 or :name is not supported: {0}")]
	MixedParameterStyles(String),

	#[error("Unsupported keyword {keyword} for property '{property}'")]
	UnsupportedKeyword { keyword: String, property: String },

	#[error("Method '{method}' requires {expected} bindable arguments, found {actual}")]
	ArgumentCount {
		method: String,
		expected: usize,
		actual: usize,
	},

	#[error("Parameter {position} for '{property}' must be of type {expected}")]
	ArgumentType {
		property: String,
		position: usize,
		expected: String,
	},

	#[error("Sort expression '{0}' must only contain property references or be marked unsafe")]
	UnsafeSortExpression(String),

	#[error("No part found in or-group {0}")]
	EmptyConjunction(usize),

	#[error("No property '{property}' found on entity {entity}")]
	UnknownProperty { entity: String, property: String },

	#[error("Property '{0}' is not collection-valued")]
	NotACollection(String),

	#[error("Unable to ignore case of {value_type} property '{property}'")]
	IgnoreCaseNotSupported { property: String, value_type: String },

	#[error("Invalid method name '{name}': {reason}")]
	InvalidMethodName { name: String, reason: String },

	#[error("Invalid placeholder '{0}'; positions start at 1")]
	InvalidPlaceholder(String),

	#[error("Unterminated {0} in query template")]
	Unterminated(&'static str),
}

/// Raised while committing a resolved value into a bound query.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BindError {
	#[error("No parameter named '{0}' in query")]
	UnknownName(String),

	#[error("No parameter at position {0} in query")]
	UnknownPosition(usize),

	#[error("No parameter slot {0} in query")]
	UnknownSlot(usize),

	#[error("Parameter '{0}' is bound by name but the method arguments carry no names")]
	ParameterNeedsName(String),

	#[error("No argument available for {0}")]
	MissingArgument(String),

	#[error("Value {value} rejected for {target}: {reason}")]
	Rejected {
		target: String,
		value: String,
		reason: String,
	},
}

/// Raised while evaluating an embedded expression.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ResolutionError {
	#[error("Failed to parse expression '{expression}': {reason}")]
	Syntax { expression: String, reason: String },

	#[error("Expression '{expression}' references unknown argument {reference}")]
	UnknownReference {
		expression: String,
		reference: String,
	},

	#[error("Expression '{expression}' failed: {reason}")]
	Evaluation { expression: String, reason: String },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum QueryError {
	#[error("Compile error: {0}")]
	Compile(#[from] CompileError),

	#[error("Bind error: {0}")]
	Bind(#[from] BindError),

	#[error("Resolution error: {0}")]
	Resolution(#[from] ResolutionError),

	#[error("Execution error: {0}")]
	Execution(String),

	#[error("Query invocation was cancelled before binding completed")]
	Cancelled,
}
