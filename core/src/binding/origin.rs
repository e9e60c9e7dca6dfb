use super::BindingIdentifier;
use std::fmt;

/// Where the value of a binding comes from at invocation time.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ParameterOrigin {
    /// A caller-supplied argument, located by name or position.
    MethodArgument(BindingIdentifier),
    /// An embedded expression evaluated against the call's arguments.
    Expression(String),
}

impl ParameterOrigin {
    pub fn argument(identifier: BindingIdentifier) -> Self {
        ParameterOrigin::MethodArgument(identifier)
    }

    pub fn expression(expression: impl Into<String>) -> Self {
        ParameterOrigin::Expression(expression.into())
    }

    pub fn is_method_argument(&self) -> bool {
        matches!(self, ParameterOrigin::MethodArgument(_))
    }

    pub fn is_expression(&self) -> bool {
        matches!(self, ParameterOrigin::Expression(_))
    }

    pub fn identifier(&self) -> Option<&BindingIdentifier> {
        match self {
            ParameterOrigin::MethodArgument(identifier) => Some(identifier),
            ParameterOrigin::Expression(_) => None,
        }
    }

    pub fn expression_text(&self) -> Option<&str> {
        match self {
            ParameterOrigin::Expression(expression) => Some(expression),
            ParameterOrigin::MethodArgument(_) => None,
        }
    }
}

impl fmt::Display for ParameterOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParameterOrigin::MethodArgument(identifier) => write!(f, "argument {}", identifier),
            ParameterOrigin::Expression(expression) => write!(f, "#{{{}}}", expression),
        }
    }
}
