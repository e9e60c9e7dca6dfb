//! Dynamic values flowing from method arguments into bound queries.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Comparable type of a property or parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
	Any,
	Boolean,
	Integer,
	Float,
	Text,
	Date,
	DateTime,
	Collection,
}

impl ValueType {
	pub fn is_textual(&self) -> bool {
		matches!(self, ValueType::Text)
	}

	pub fn parse(name: &str) -> Option<Self> {
		match name.to_ascii_lowercase().as_str() {
			"any" => Some(ValueType::Any),
			"bool" | "boolean" => Some(ValueType::Boolean),
			"int" | "integer" | "long" => Some(ValueType::Integer),
			"float" | "double" | "decimal" => Some(ValueType::Float),
			"text" | "string" => Some(ValueType::Text),
			"date" => Some(ValueType::Date),
			"datetime" | "timestamp" => Some(ValueType::DateTime),
			"list" | "collection" => Some(ValueType::Collection),
			_ => None,
		}
	}
}

impl fmt::Display for ValueType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let name = match self {
			ValueType::Any => "any",
			ValueType::Boolean => "boolean",
			ValueType::Integer => "integer",
			ValueType::Float => "float",
			ValueType::Text => "text",
			ValueType::Date => "date",
			ValueType::DateTime => "datetime",
			ValueType::Collection => "collection",
		};
		f.write_str(name)
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
	Null,
	Boolean(bool),
	Integer(i64),
	Float(f64),
	String(String),
	Date(chrono::NaiveDate),
	DateTime(chrono::NaiveDateTime),
	/// Sequence value; the shape membership tests expect.
	List(Vec<Value>),
	/// Fixed array argument, flattened into a `List` by IN bindings.
	Array(Vec<Value>),
	/// Single-value wrapper, unwrapped before commit.
	Optional(Option<Box<Value>>),
}

impl Value {
	pub fn is_null(&self) -> bool {
		matches!(self, Value::Null | Value::Optional(None))
	}

	pub fn as_str(&self) -> Option<&str> {
		match self {
			Value::String(s) => Some(s),
			_ => None,
		}
	}

	pub fn is_collection(&self) -> bool {
		matches!(self, Value::List(_) | Value::Array(_))
	}

	pub fn value_type(&self) -> ValueType {
		match self {
			Value::Null => ValueType::Any,
			Value::Boolean(_) => ValueType::Boolean,
			Value::Integer(_) => ValueType::Integer,
			Value::Float(_) => ValueType::Float,
			Value::String(_) => ValueType::Text,
			Value::Date(_) => ValueType::Date,
			Value::DateTime(_) => ValueType::DateTime,
			Value::List(_) | Value::Array(_) => ValueType::Collection,
			Value::Optional(Some(inner)) => inner.value_type(),
			Value::Optional(None) => ValueType::Any,
		}
	}

	/// Unwraps `Optional` wrappers, turning an empty one into `Null`.
	pub fn unwrap_optional(self) -> Value {
		match self {
			Value::Optional(Some(inner)) => inner.unwrap_optional(),
			Value::Optional(None) => Value::Null,
			other => other,
		}
	}

	/// Elements of a collection value, or the value itself as a one-element slice.
	pub fn elements(&self) -> &[Value] {
		match self {
			Value::List(items) | Value::Array(items) => items,
			other => std::slice::from_ref(other),
		}
	}

	pub fn to_uppercase(&self) -> Value {
		match self {
			Value::String(s) => Value::String(s.to_uppercase()),
			Value::List(items) => Value::List(items.iter().map(Value::to_uppercase).collect()),
			Value::Array(items) => Value::Array(items.iter().map(Value::to_uppercase).collect()),
			other => other.clone(),
		}
	}

	pub fn to_lowercase(&self) -> Value {
		match self {
			Value::String(s) => Value::String(s.to_lowercase()),
			Value::List(items) => Value::List(items.iter().map(Value::to_lowercase).collect()),
			Value::Array(items) => Value::Array(items.iter().map(Value::to_lowercase).collect()),
			other => other.clone(),
		}
	}

	/// Equality used when evaluating predicates; numeric types compare across kinds.
	pub fn sql_eq(&self, other: &Value) -> bool {
		match (self, other) {
			(Value::Integer(l), Value::Integer(r)) => l == r,
			(Value::Float(l), Value::Float(r)) => l == r,
			(Value::Integer(l), Value::Float(r)) | (Value::Float(r), Value::Integer(l)) => {
				(*l as f64) == *r
			}
			(Value::String(l), Value::String(r)) => l == r,
			(Value::Boolean(l), Value::Boolean(r)) => l == r,
			(Value::Date(l), Value::Date(r)) => l == r,
			(Value::DateTime(l), Value::DateTime(r)) => l == r,
			(Value::Null, Value::Null) => true,
			(Value::List(l) | Value::Array(l), Value::List(r) | Value::Array(r)) => {
				l.len() == r.len() && l.iter().zip(r).all(|(a, b)| a.sql_eq(b))
			}
			_ => false,
		}
	}

	/// Ordering for comparable pairs, `None` when the kinds don't compare.
	pub fn compare(&self, other: &Value) -> Option<Ordering> {
		match (self, other) {
			(Value::Integer(l), Value::Integer(r)) => Some(l.cmp(r)),
			(Value::Float(l), Value::Float(r)) => l.partial_cmp(r),
			(Value::Integer(l), Value::Float(r)) => (*l as f64).partial_cmp(r),
			(Value::Float(l), Value::Integer(r)) => l.partial_cmp(&(*r as f64)),
			(Value::String(l), Value::String(r)) => Some(l.cmp(r)),
			(Value::Boolean(l), Value::Boolean(r)) => Some(l.cmp(r)),
			(Value::Date(l), Value::Date(r)) => Some(l.cmp(r)),
			(Value::DateTime(l), Value::DateTime(r)) => Some(l.cmp(r)),
			_ => None,
		}
	}

	/// Total ordering used for sorting rows; nulls sort first.
	pub fn sort_cmp(&self, other: &Value) -> Ordering {
		match (self.is_null(), other.is_null()) {
			(true, true) => Ordering::Equal,
			(true, false) => Ordering::Less,
			(false, true) => Ordering::Greater,
			(false, false) => self.compare(other).unwrap_or(Ordering::Equal),
		}
	}
}

impl fmt::Display for Value {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Value::Null => write!(f, "null"),
			Value::Boolean(b) => write!(f, "{}", b),
			Value::Integer(i) => write!(f, "{}", i),
			Value::Float(x) => write!(f, "{}", x),
			Value::String(s) => write!(f, "\"{}\"", s),
			Value::Date(d) => write!(f, "{}", d),
			Value::DateTime(dt) => write!(f, "{}", dt),
			Value::List(items) | Value::Array(items) => {
				write!(f, "[")?;
				for (i, item) in items.iter().enumerate() {
					if i > 0 {
						write!(f, ", ")?;
					}
					write!(f, "{}", item)?;
				}
				write!(f, "]")
			}
			Value::Optional(Some(inner)) => write!(f, "Some({})", inner),
			Value::Optional(None) => write!(f, "None"),
		}
	}
}

impl From<bool> for Value {
	fn from(v: bool) -> Self {
		Value::Boolean(v)
	}
}

impl From<i64> for Value {
	fn from(v: i64) -> Self {
		Value::Integer(v)
	}
}

impl From<i32> for Value {
	fn from(v: i32) -> Self {
		Value::Integer(v as i64)
	}
}

impl From<f64> for Value {
	fn from(v: f64) -> Self {
		Value::Float(v)
	}
}

impl From<&str> for Value {
	fn from(v: &str) -> Self {
		Value::String(v.to_string())
	}
}

impl From<String> for Value {
	fn from(v: String) -> Self {
		Value::String(v)
	}
}

impl From<chrono::NaiveDate> for Value {
	fn from(v: chrono::NaiveDate) -> Self {
		Value::Date(v)
	}
}

impl<T: Into<Value>> From<Vec<T>> for Value {
	fn from(v: Vec<T>) -> Self {
		Value::List(v.into_iter().map(Into::into).collect())
	}
}

impl<T: Into<Value>> From<Option<T>> for Value {
	fn from(v: Option<T>) -> Self {
		Value::Optional(v.map(|inner| Box::new(inner.into())))
	}
}

impl From<&Value> for serde_json::Value {
	fn from(value: &Value) -> Self {
		match value {
			Value::Null | Value::Optional(None) => serde_json::Value::Null,
			Value::Boolean(b) => serde_json::Value::Bool(*b),
			Value::Integer(i) => serde_json::Value::from(*i),
			Value::Float(x) => serde_json::Value::from(*x),
			Value::String(s) => serde_json::Value::String(s.clone()),
			Value::Date(d) => serde_json::Value::String(d.to_string()),
			Value::DateTime(dt) => serde_json::Value::String(dt.to_string()),
			Value::List(items) | Value::Array(items) => {
				serde_json::Value::Array(items.iter().map(Into::into).collect())
			}
			Value::Optional(Some(inner)) => inner.as_ref().into(),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn optional_unwraps_recursively() {
		let value = Value::from(Some(Some(5i64)));
		assert_eq!(value.unwrap_optional(), Value::Integer(5));
		assert_eq!(Value::Optional(None).unwrap_optional(), Value::Null);
	}

	#[test]
	fn mixed_numbers_compare() {
		assert!(Value::Integer(2).sql_eq(&Value::Float(2.0)));
		assert_eq!(
			Value::Integer(1).compare(&Value::Float(1.5)),
			Some(Ordering::Less)
		);
		assert_eq!(Value::from("a").compare(&Value::Integer(1)), None);
	}

	#[test]
	fn nulls_sort_first() {
		assert_eq!(Value::Null.sort_cmp(&Value::Integer(0)), Ordering::Less);
	}
}
