//! Parameter bindings: which placeholder gets which value, and how the value is
//! transformed before it is committed.

mod identifier;
mod origin;
pub mod registry;

pub use identifier::BindingIdentifier;
pub use origin::ParameterOrigin;
pub use registry::BindingRegistry;

use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Wildcard placement of a LIKE binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LikeKind {
    StartingWith,
    EndingWith,
    Containing,
    Like,
}

impl LikeKind {
    /// Derives the kind from `%` placement around a template placeholder.
    pub fn from_wildcards(leading: bool, trailing: bool) -> Self {
        match (leading, trailing) {
            (true, true) => LikeKind::Containing,
            (true, false) => LikeKind::EndingWith,
            (false, true) => LikeKind::StartingWith,
            (false, false) => LikeKind::Like,
        }
    }

    pub fn apply(self, text: &str, escape: EscapeCharacter) -> String {
        match self {
            LikeKind::StartingWith => format!("{}%", escape.escape(text)),
            LikeKind::EndingWith => format!("%{}", escape.escape(text)),
            LikeKind::Containing => format!("%{}%", escape.escape(text)),
            LikeKind::Like => text.to_string(),
        }
    }
}

impl fmt::Display for LikeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LikeKind::StartingWith => "STARTING_WITH",
            LikeKind::EndingWith => "ENDING_WITH",
            LikeKind::Containing => "CONTAINING",
            LikeKind::Like => "LIKE",
        };
        f.write_str(name)
    }
}

/// Character used to escape `%` and `_` in LIKE arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EscapeCharacter(pub char);

impl Default for EscapeCharacter {
    fn default() -> Self {
        EscapeCharacter('\\')
    }
}

impl EscapeCharacter {
    pub fn escape(&self, text: &str) -> String {
        let mut escaped = String::with_capacity(text.len());
        for ch in text.chars() {
            if ch == self.0 || ch == '%' || ch == '_' {
                escaped.push(self.0);
            }
            escaped.push(ch);
        }
        escaped
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BindingKind {
    Plain,
    /// Membership test argument.
    In,
    Like(LikeKind),
}

impl fmt::Display for BindingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BindingKind::Plain => write!(f, "plain"),
            BindingKind::In => write!(f, "in"),
            BindingKind::Like(kind) => write!(f, "like {}", kind),
        }
    }
}

/// A placeholder registered during compilation. Never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ParameterBinding {
    identifier: BindingIdentifier,
    origin: ParameterOrigin,
    kind: BindingKind,
}

impl ParameterBinding {
    pub fn new(identifier: BindingIdentifier, origin: ParameterOrigin, kind: BindingKind) -> Self {
        Self {
            identifier,
            origin,
            kind,
        }
    }

    pub fn plain(identifier: BindingIdentifier, origin: ParameterOrigin) -> Self {
        Self::new(identifier, origin, BindingKind::Plain)
    }

    pub fn in_binding(identifier: BindingIdentifier, origin: ParameterOrigin) -> Self {
        Self::new(identifier, origin, BindingKind::In)
    }

    pub fn like(identifier: BindingIdentifier, origin: ParameterOrigin, kind: LikeKind) -> Self {
        Self::new(identifier, origin, BindingKind::Like(kind))
    }

    pub fn identifier(&self) -> &BindingIdentifier {
        &self.identifier
    }

    pub fn origin(&self) -> &ParameterOrigin {
        &self.origin
    }

    pub fn kind(&self) -> BindingKind {
        self.kind
    }

    pub fn name(&self) -> Option<&str> {
        self.identifier.name()
    }

    pub fn position(&self) -> Option<usize> {
        self.identifier.position()
    }

    pub fn with_identifier(&self, identifier: BindingIdentifier) -> Self {
        Self {
            identifier,
            origin: self.origin.clone(),
            kind: self.kind,
        }
    }

    /// Whether this binding addresses the same placeholder as `identifier`.
    pub fn binds_to(&self, identifier: &BindingIdentifier) -> bool {
        match (self.identifier.name(), identifier.name()) {
            (Some(own), Some(other)) => own == other,
            _ => matches!(
                (self.identifier.position(), identifier.position()),
                (Some(own), Some(other)) if own == other
            ),
        }
    }

    /// Two bindings may share one placeholder when they read the same value and
    /// transform it the same way.
    pub fn is_compatible_with(&self, other: &ParameterBinding) -> bool {
        self.kind == other.kind && self.origin == other.origin
    }

    pub fn prepare(&self, value: Value, escape: EscapeCharacter) -> Value {
        match self.kind {
            BindingKind::Plain => value,
            BindingKind::In => match value.unwrap_optional() {
                Value::Array(items) | Value::List(items) => {
                    Value::List(items.into_iter().map(Value::unwrap_optional).collect())
                }
                other => other,
            },
            BindingKind::Like(kind) => match value.unwrap_optional() {
                Value::String(text) => Value::String(kind.apply(&text, escape)),
                other => other,
            },
        }
    }
}

impl fmt::Display for ParameterBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} <- {} [{}]", self.identifier, self.origin, self.kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn arg(position: usize) -> ParameterOrigin {
        ParameterOrigin::argument(BindingIdentifier::indexed(position))
    }

    #[test]
    fn like_bindings_wildcard_and_escape() {
        let escape = EscapeCharacter::default();
        let starting = ParameterBinding::like(BindingIdentifier::indexed(1), arg(1), LikeKind::StartingWith);
        let containing = ParameterBinding::like(BindingIdentifier::indexed(1), arg(1), LikeKind::Containing);
        let ending = ParameterBinding::like(BindingIdentifier::indexed(1), arg(1), LikeKind::EndingWith);
        let like = ParameterBinding::like(BindingIdentifier::indexed(1), arg(1), LikeKind::Like);

        assert_eq!(starting.prepare("ab".into(), escape), Value::from("ab%"));
        assert_eq!(containing.prepare("ab".into(), escape), Value::from("%ab%"));
        assert_eq!(ending.prepare("ab".into(), escape), Value::from("%ab"));
        assert_eq!(like.prepare("a%b".into(), escape), Value::from("a%b"));
        assert_eq!(containing.prepare("5%_".into(), escape), Value::from("%5\\%\\_%"));
        assert_eq!(containing.prepare(Value::Integer(3), escape), Value::Integer(3));
    }

    #[test]
    fn like_bindings_unwrap_optional_arguments() {
        let escape = EscapeCharacter::default();
        let containing = ParameterBinding::like(BindingIdentifier::indexed(1), arg(1), LikeKind::Containing);

        assert_eq!(containing.prepare(Value::from(Some("o")), escape), Value::from("%o%"));
        assert_eq!(containing.prepare(Value::Optional(None), escape), Value::Null);
    }

    #[test]
    fn in_binding_flattens_arrays_and_wrappers() {
        let binding = ParameterBinding::in_binding(BindingIdentifier::named("ids"), arg(1));
        let escape = EscapeCharacter::default();

        let array = Value::Array(vec![Value::Integer(1), Value::from(Some(2i64))]);
        assert_eq!(
            binding.prepare(array, escape),
            Value::List(vec![Value::Integer(1), Value::Integer(2)])
        );
        assert_eq!(
            binding.prepare(Value::from(Some(vec![3i64])), escape),
            Value::List(vec![Value::Integer(3)])
        );
    }

    #[test]
    fn compatibility_requires_same_variant_origin_and_like_kind() {
        let plain = ParameterBinding::plain(BindingIdentifier::indexed(1), arg(1));
        let like = ParameterBinding::like(BindingIdentifier::indexed(1), arg(1), LikeKind::Containing);
        let other_like = ParameterBinding::like(BindingIdentifier::indexed(1), arg(1), LikeKind::StartingWith);

        assert!(plain.is_compatible_with(&plain.clone()));
        assert!(!plain.is_compatible_with(&like));
        assert!(!like.is_compatible_with(&other_like));
        assert!(!plain.is_compatible_with(&ParameterBinding::plain(BindingIdentifier::indexed(1), arg(2))));
    }

    #[test]
    fn binds_to_compares_names_before_positions() {
        let binding = ParameterBinding::plain(BindingIdentifier::of("name", 2), arg(2));
        assert!(binding.binds_to(&BindingIdentifier::named("name")));
        assert!(!binding.binds_to(&BindingIdentifier::of("other", 2)));
        assert!(binding.binds_to(&BindingIdentifier::indexed(2)));
    }
}
