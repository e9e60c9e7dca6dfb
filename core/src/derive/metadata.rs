use super::part::{OperatorKind, Part};
use crate::bind::ArgumentAccessor;
use crate::binding::{BindingIdentifier, BindingKind, ParameterBinding, ParameterOrigin};
use crate::error::CompileError;
use crate::method::MethodSignature;
use crate::value::{Value, ValueType};

/// Compile-time facts about one placeholder of a derived query.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterMetadata {
    /// 1-based position among the bindable arguments.
    pub position: usize,
    pub name: Option<String>,
    pub value_type: ValueType,
    pub operator: OperatorKind,
    pub ignore_case: bool,
    /// The target property is a collection; the value is not wildcarded.
    pub no_wildcard: bool,
    /// The argument was absent when an equality part was compiled.
    pub is_null_placeholder: bool,
}

impl ParameterMetadata {
    pub fn identifier(&self) -> BindingIdentifier {
        BindingIdentifier::indexed(self.position)
    }

    /// Binding committing this placeholder's argument.
    pub fn binding(&self) -> ParameterBinding {
        let identifier = self.identifier();
        let origin = ParameterOrigin::argument(identifier.clone());

        let kind = if self.operator.is_membership() {
            BindingKind::In
        } else {
            match self.operator.like_kind() {
                Some(like) if !self.no_wildcard => BindingKind::Like(like),
                _ => BindingKind::Plain,
            }
        };
        ParameterBinding::new(identifier, origin, kind)
    }
}

/// Hands out metadata for the bindable parameters in declaration order.
pub struct ParameterMetadataProvider<'a> {
    signature: &'a MethodSignature,
    arguments: Option<&'a dyn ArgumentAccessor>,
    types: Vec<(Option<String>, ValueType)>,
    expected: usize,
    cursor: usize,
    collected: Vec<ParameterMetadata>,
}

impl<'a> ParameterMetadataProvider<'a> {
    /// `arguments`, when given, lets absent values degrade to null tests.
    pub fn new(
        signature: &'a MethodSignature,
        arguments: Option<&'a dyn ArgumentAccessor>,
        expected: usize,
    ) -> Self {
        let types = signature
            .bindable_parameters()
            .map(|p| (p.name.clone(), p.value_type().unwrap_or(ValueType::Any)))
            .collect();

        Self {
            signature,
            arguments,
            types,
            expected,
            cursor: 0,
            collected: Vec::new(),
        }
    }

    /// Claims the next parameter for `part`, checking it against `expected_type`.
    pub fn next(
        &mut self,
        part: &Part,
        expected_type: ValueType,
        ignore_case: bool,
        no_wildcard: bool,
    ) -> Result<ParameterMetadata, CompileError> {
        let Some((name, declared)) = self.types.get(self.cursor).cloned() else {
            return Err(self.count_error());
        };
        let position = self.cursor + 1;

        if !types_compatible(declared, expected_type) {
            return Err(CompileError::ArgumentType {
                property: part.property.dot_path(),
                position,
                expected: expected_type.to_string(),
            });
        }

        // Only equality degrades to a null test; other operators bind the null.
        let is_null_placeholder = matches!(
            part.operator,
            OperatorKind::SimpleProperty | OperatorKind::NegatingSimpleProperty
        ) && self
            .arguments
            .and_then(|arguments| arguments.bindable_value(self.cursor))
            .is_some_and(|value| matches!(value, Value::Null | Value::Optional(None)));

        let metadata = ParameterMetadata {
            position,
            name,
            value_type: if expected_type == ValueType::Any { declared } else { expected_type },
            operator: part.operator,
            ignore_case,
            no_wildcard,
            is_null_placeholder,
        };
        self.cursor += 1;
        self.collected.push(metadata.clone());
        Ok(metadata)
    }

    /// Fails when the method declares more bindable parameters than were claimed.
    pub fn finish(self) -> Result<Vec<ParameterMetadata>, CompileError> {
        if self.cursor != self.types.len() {
            return Err(self.count_error());
        }
        Ok(self.collected)
    }

    fn count_error(&self) -> CompileError {
        CompileError::ArgumentCount {
            method: self.signature.name.clone(),
            expected: self.expected,
            actual: self.types.len(),
        }
    }
}

fn types_compatible(declared: ValueType, expected: ValueType) -> bool {
    use ValueType::*;
    match (declared, expected) {
        (Any, _) | (_, Any) => true,
        (Integer | Float, Integer | Float) => true,
        (Date | DateTime, Date | DateTime) => true,
        (d, e) => d == e,
    }
}
