//! Declared shape of a query method: its parameters and what it returns.

use crate::value::ValueType;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParameterKind {
    /// Bindable value of the given type.
    Value(ValueType),
    Pageable,
    Sort,
    Limit,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodParameter {
    pub name: Option<String>,
    pub kind: ParameterKind,
}

impl MethodParameter {
    pub fn value(name: &str, value_type: ValueType) -> Self {
        Self {
            name: Some(name.to_string()),
            kind: ParameterKind::Value(value_type),
        }
    }

    pub fn unnamed(value_type: ValueType) -> Self {
        Self {
            name: None,
            kind: ParameterKind::Value(value_type),
        }
    }

    pub fn pageable() -> Self {
        Self {
            name: None,
            kind: ParameterKind::Pageable,
        }
    }

    pub fn sort() -> Self {
        Self {
            name: None,
            kind: ParameterKind::Sort,
        }
    }

    pub fn limit() -> Self {
        Self {
            name: None,
            kind: ParameterKind::Limit,
        }
    }

    pub fn is_bindable(&self) -> bool {
        matches!(self.kind, ParameterKind::Value(_))
    }

    pub fn value_type(&self) -> Option<ValueType> {
        match self.kind {
            ParameterKind::Value(value_type) => Some(value_type),
            _ => None,
        }
    }
}

/// How many results the caller expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ReturnKind {
    #[default]
    Many,
    One,
}

/// Cache key of a query method.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodKey {
    pub entity: String,
    pub method: String,
}

impl fmt::Display for MethodKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.entity, self.method)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodSignature {
    pub name: String,
    pub entity: String,
    pub parameters: Vec<MethodParameter>,
    pub returns: ReturnKind,
    /// Marked as issuing an update/delete statement.
    pub modifying: bool,
}

impl MethodSignature {
    pub fn new(entity: &str, name: &str) -> Self {
        Self {
            name: name.to_string(),
            entity: entity.to_string(),
            parameters: Vec::new(),
            returns: ReturnKind::Many,
            modifying: false,
        }
    }

    pub fn param(mut self, parameter: MethodParameter) -> Self {
        self.parameters.push(parameter);
        self
    }

    pub fn returning(mut self, returns: ReturnKind) -> Self {
        self.returns = returns;
        self
    }

    pub fn modifying(mut self) -> Self {
        self.modifying = true;
        self
    }

    pub fn key(&self) -> MethodKey {
        MethodKey {
            entity: self.entity.clone(),
            method: self.name.clone(),
        }
    }

    pub fn bindable_parameters(&self) -> impl Iterator<Item = &MethodParameter> {
        self.parameters.iter().filter(|p| p.is_bindable())
    }

    pub fn bindable_count(&self) -> usize {
        self.bindable_parameters().count()
    }

    pub fn has_pageable(&self) -> bool {
        self.parameters.iter().any(|p| p.kind == ParameterKind::Pageable)
    }

    pub fn returns_collection(&self) -> bool {
        self.returns == ReturnKind::Many
    }
}

impl fmt::Display for MethodSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parameters: Vec<String> = self
            .parameters
            .iter()
            .map(|p| match (&p.name, p.kind) {
                (Some(name), ParameterKind::Value(t)) => format!("{}: {}", name, t),
                (None, ParameterKind::Value(t)) => t.to_string(),
                (_, kind) => format!("{:?}", kind),
            })
            .collect();
        write!(f, "{}({})", self.name, parameters.join(", "))
    }
}
