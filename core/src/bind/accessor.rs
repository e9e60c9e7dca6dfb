use crate::error::BindError;
use crate::method::{MethodSignature, ParameterKind};
use crate::paging::{Limit, Pageable, Sort};
use crate::value::Value;

/// Read access to the arguments of one invocation.
///
/// Indices are 0-based over the bindable arguments only; paging, sort and
/// limit directives are exposed separately.
pub trait ArgumentAccessor: Send + Sync {
    fn bindable_count(&self) -> usize;

    fn bindable_value(&self, index: usize) -> Option<&Value>;

    fn parameter_name(&self, index: usize) -> Option<&str>;

    fn value_by_name(&self, name: &str) -> Option<&Value> {
        (0..self.bindable_count())
            .find(|&i| self.parameter_name(i) == Some(name))
            .and_then(|i| self.bindable_value(i))
    }

    fn pageable(&self) -> &Pageable;

    fn sort(&self) -> &Sort;

    fn limit(&self) -> Limit;

    /// Whether any bindable argument is null or an empty optional.
    fn has_null_value(&self) -> bool {
        (0..self.bindable_count()).any(|i| {
            self.bindable_value(i)
                .is_none_or(|v| v.is_null() || matches!(v, Value::Optional(None)))
        })
    }

    /// Sort carried by the page request followed by an explicit sort argument.
    fn effective_sort(&self) -> Sort {
        match self.pageable().sort() {
            Some(paged) => paged.and(self.sort()),
            None => self.sort().clone(),
        }
    }
}

/// One caller-supplied argument.
#[derive(Debug, Clone, PartialEq)]
pub enum Argument {
    Value(Value),
    Pageable(Pageable),
    Sort(Sort),
    Limit(Limit),
}

impl From<Value> for Argument {
    fn from(value: Value) -> Self {
        Argument::Value(value)
    }
}

/// Arguments of one invocation, laid out against the method's signature.
#[derive(Debug, Clone, Default)]
pub struct MethodArguments {
    names: Vec<Option<String>>,
    values: Vec<Value>,
    pageable: Pageable,
    sort: Sort,
    limit: Limit,
}

impl MethodArguments {
    /// Matches `arguments` to the signature's parameters in order.
    pub fn bind(signature: &MethodSignature, arguments: Vec<Argument>) -> Result<Self, BindError> {
        if arguments.len() != signature.parameters.len() {
            return Err(BindError::MissingArgument(format!(
                "{} expects {} argument(s), got {}",
                signature,
                signature.parameters.len(),
                arguments.len()
            )));
        }

        let mut bound = Self::default();
        for (parameter, argument) in signature.parameters.iter().zip(arguments) {
            match (parameter.kind, argument) {
                (ParameterKind::Value(_), Argument::Value(value)) => {
                    bound.names.push(parameter.name.clone());
                    bound.values.push(value);
                }
                (ParameterKind::Pageable, Argument::Pageable(pageable)) => bound.pageable = pageable,
                (ParameterKind::Sort, Argument::Sort(sort)) => bound.sort = sort,
                (ParameterKind::Limit, Argument::Limit(limit)) => bound.limit = limit,
                (kind, argument) => {
                    return Err(BindError::Rejected {
                        target: format!("{:?} parameter of {}", kind, signature.name),
                        value: format!("{:?}", argument),
                        reason: "argument kind does not match the parameter".to_string(),
                    });
                }
            }
        }
        Ok(bound)
    }

    /// Unnamed positional values.
    pub fn positional(values: impl IntoIterator<Item = Value>) -> Self {
        let values: Vec<Value> = values.into_iter().collect();
        Self {
            names: vec![None; values.len()],
            values,
            ..Self::default()
        }
    }

    /// Named values, in declaration order.
    pub fn named<'a>(pairs: impl IntoIterator<Item = (&'a str, Value)>) -> Self {
        let (names, values) = pairs
            .into_iter()
            .map(|(name, value)| (Some(name.to_string()), value))
            .unzip();
        Self {
            names,
            values,
            ..Self::default()
        }
    }

    pub fn with_pageable(mut self, pageable: Pageable) -> Self {
        self.pageable = pageable;
        self
    }

    pub fn with_sort(mut self, sort: Sort) -> Self {
        self.sort = sort;
        self
    }

    pub fn with_limit(mut self, limit: Limit) -> Self {
        self.limit = limit;
        self
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }
}

impl ArgumentAccessor for MethodArguments {
    fn bindable_count(&self) -> usize {
        self.values.len()
    }

    fn bindable_value(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    fn parameter_name(&self, index: usize) -> Option<&str> {
        self.names.get(index).and_then(|n| n.as_deref())
    }

    fn pageable(&self) -> &Pageable {
        &self.pageable
    }

    fn sort(&self) -> &Sort {
        &self.sort
    }

    fn limit(&self) -> Limit {
        self.limit
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::method::MethodParameter;
    use crate::paging::Order;
    use crate::value::ValueType;

    #[test]
    fn binds_against_signature() {
        let signature = MethodSignature::new("User", "findByName")
            .param(MethodParameter::value("name", ValueType::Text))
            .param(MethodParameter::pageable());

        let arguments = MethodArguments::bind(
            &signature,
            vec![Value::from("Jo").into(), Argument::Pageable(Pageable::of(1, 5))],
        )
        .unwrap();

        assert_eq!(arguments.bindable_count(), 1);
        assert_eq!(arguments.value_by_name("name"), Some(&Value::from("Jo")));
        assert_eq!(arguments.pageable().offset(), Some(5));
    }

    #[test]
    fn rejects_mismatched_arguments() {
        let signature = MethodSignature::new("User", "findByName")
            .param(MethodParameter::value("name", ValueType::Text));

        assert!(matches!(
            MethodArguments::bind(&signature, vec![Argument::Sort(Sort::unsorted())]),
            Err(BindError::Rejected { .. })
        ));
        assert!(matches!(
            MethodArguments::bind(&signature, vec![]),
            Err(BindError::MissingArgument(_))
        ));
    }

    #[test]
    fn detects_null_values_and_merges_sorts() {
        let arguments = MethodArguments::positional([Value::Integer(1), Value::Optional(None)])
            .with_pageable(Pageable::Paged {
                page: 0,
                size: 10,
                sort: Sort::by([Order::asc("name")]),
            })
            .with_sort(Sort::by([Order::desc("age")]));

        assert!(arguments.has_null_value());
        assert_eq!(
            arguments.effective_sort().orders(),
            &[Order::asc("name"), Order::desc("age")]
        );
    }
}
