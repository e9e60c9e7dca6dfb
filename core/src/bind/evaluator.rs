use super::ArgumentAccessor;
use crate::error::ResolutionError;
use crate::value::Value;
use async_trait::async_trait;

/// Evaluates embedded `#{...}` expressions against an invocation's arguments.
#[async_trait]
pub trait ExpressionEvaluator: Send + Sync {
	async fn evaluate(
		&self,
		expression: &str,
		arguments: &dyn ArgumentAccessor,
	) -> Result<Value, ResolutionError>;
}

/// Understands `[n]`, `#name`, `#pageable.offset`, string and number
/// literals, `+` and `upper(..)` / `lower(..)`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ArgumentExpressionEvaluator;

#[async_trait]
impl ExpressionEvaluator for ArgumentExpressionEvaluator {
	async fn evaluate(
		&self,
		expression: &str,
		arguments: &dyn ArgumentAccessor,
	) -> Result<Value, ResolutionError> {
		let mut parser = ExpressionParser {
			source: expression,
			position: 0,
			arguments,
		};
		let value = parser.parse_sum()?;
		parser.skip_whitespace();
		if parser.position < expression.len() {
			return Err(parser.syntax("unexpected trailing input"));
		}
		tracing::trace!("Evaluated #{{{}}} to {}", expression, value);
		Ok(value)
	}
}

struct ExpressionParser<'a> {
	source: &'a str,
	position: usize,
	arguments: &'a dyn ArgumentAccessor,
}

impl<'a> ExpressionParser<'a> {
	fn current_char(&self) -> Option<char> {
		self.source[self.position..].chars().next()
	}

	fn advance(&mut self) {
		if let Some(ch) = self.current_char() {
			self.position += ch.len_utf8();
		}
	}

	fn skip_whitespace(&mut self) {
		while self.current_char().is_some_and(char::is_whitespace) {
			self.advance();
		}
	}

	fn expect(&mut self, expected: char) -> Result<(), ResolutionError> {
		self.skip_whitespace();
		if self.current_char() == Some(expected) {
			self.advance();
			Ok(())
		} else {
			Err(self.syntax(&format!("expected '{}'", expected)))
		}
	}

	fn read_while(&mut self, predicate: impl Fn(char) -> bool) -> &'a str {
		let start = self.position;
		while self.current_char().is_some_and(&predicate) {
			self.advance();
		}
		&self.source[start..self.position]
	}

	fn parse_sum(&mut self) -> Result<Value, ResolutionError> {
		let mut value = self.parse_term()?;
		loop {
			self.skip_whitespace();
			if self.current_char() != Some('+') {
				return Ok(value);
			}
			self.advance();
			let right = self.parse_term()?;
			value = self.add(value, right)?;
		}
	}

	fn parse_term(&mut self) -> Result<Value, ResolutionError> {
		self.skip_whitespace();
		match self.current_char() {
			Some('[') => {
				self.advance();
				let digits = self.read_while(|c| c.is_ascii_digit());
				let index = digits
					.parse::<usize>()
					.map_err(|_| self.syntax("expected an argument index"))?;
				self.expect(']')?;
				self.arguments
					.bindable_value(index)
					.cloned()
					.ok_or_else(|| self.unknown(&format!("[{}]", index)))
			}
			Some('#') => {
				self.advance();
				let reference = self.read_while(|c| c.is_alphanumeric() || c == '_' || c == '.');
				self.resolve_reference(reference)
			}
			Some('\'') => {
				self.advance();
				let literal = self.read_while(|c| c != '\'');
				let literal = literal.to_string();
				self.expect('\'')?;
				Ok(Value::String(literal))
			}
			Some('(') => {
				self.advance();
				let value = self.parse_sum()?;
				self.expect(')')?;
				Ok(value)
			}
			Some(c) if c.is_ascii_digit() || c == '-' => {
				let start = self.position;
				self.advance();
				self.read_while(|c| c.is_ascii_digit() || c == '.');
				let text = &self.source[start..self.position];
				if let Ok(integer) = text.parse::<i64>() {
					Ok(Value::Integer(integer))
				} else {
					text.parse::<f64>()
						.map(Value::Float)
						.map_err(|_| self.syntax("malformed number"))
				}
			}
			Some(c) if c.is_alphabetic() => {
				let word = self.read_while(|c| c.is_alphanumeric() || c == '_');
				match word {
					"null" => Ok(Value::Null),
					"true" => Ok(Value::Boolean(true)),
					"false" => Ok(Value::Boolean(false)),
					"upper" | "lower" => {
						self.expect('(')?;
						let value = self.parse_sum()?;
						self.expect(')')?;
						Ok(if word == "upper" {
							value.to_uppercase()
						} else {
							value.to_lowercase()
						})
					}
					other => Err(self.syntax(&format!("unknown function or keyword '{}'", other))),
				}
			}
			_ => Err(self.syntax("expected a value")),
		}
	}

	fn resolve_reference(&self, reference: &str) -> Result<Value, ResolutionError> {
		let pageable = self.arguments.pageable();
		let value = match reference {
			"pageable.offset" => pageable
				.offset()
				.map(|o| Value::Integer(i64::try_from(o).unwrap_or(i64::MAX))),
			"pageable.pageSize" => pageable.page_size().map(|s| Value::Integer(s as i64)),
			"pageable.pageNumber" => pageable
				.offset()
				.zip(pageable.page_size())
				.map(|(offset, size)| Value::Integer((offset / size.max(1)) as i64)),
			name => self.arguments.value_by_name(name).cloned(),
		};
		value.ok_or_else(|| self.unknown(&format!("#{}", reference)))
	}

	fn add(&self, left: Value, right: Value) -> Result<Value, ResolutionError> {
		match (left, right) {
			(Value::Integer(l), Value::Integer(r)) => Ok(Value::Integer(l + r)),
			(Value::Integer(l), Value::Float(r)) => Ok(Value::Float(l as f64 + r)),
			(Value::Float(l), Value::Integer(r)) => Ok(Value::Float(l + r as f64)),
			(Value::Float(l), Value::Float(r)) => Ok(Value::Float(l + r)),
			(l @ Value::String(_), r) | (l, r @ Value::String(_)) => {
				Ok(Value::String(format!("{}{}", plain_text(&l), plain_text(&r))))
			}
			(l, r) => Err(ResolutionError::Evaluation {
				expression: self.source.to_string(),
				reason: format!("cannot add {} and {}", l.value_type(), r.value_type()),
			}),
		}
	}

	fn syntax(&self, reason: &str) -> ResolutionError {
		ResolutionError::Syntax {
			expression: self.source.to_string(),
			reason: format!("{} at offset {}", reason, self.position),
		}
	}

	fn unknown(&self, reference: &str) -> ResolutionError {
		ResolutionError::UnknownReference {
			expression: self.source.to_string(),
			reference: reference.to_string(),
		}
	}
}

fn plain_text(value: &Value) -> String {
	match value {
		Value::String(s) => s.clone(),
		other => other.to_string(),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::bind::MethodArguments;
	use crate::paging::Pageable;

	async fn eval(expression: &str, arguments: &MethodArguments) -> Result<Value, ResolutionError> {
		ArgumentExpressionEvaluator.evaluate(expression, arguments).await
	}

	#[tokio::test]
	async fn resolves_indices_and_names() {
		let arguments = MethodArguments::named([("first", Value::from("jo")), ("age", Value::Integer(4))]);

		assert_eq!(eval("[0]", &arguments).await, Ok(Value::from("jo")));
		assert_eq!(eval("#age + 1", &arguments).await, Ok(Value::Integer(5)));
		assert_eq!(
			eval("upper(#first) + '%'", &arguments).await,
			Ok(Value::from("JO%"))
		);
	}

	#[tokio::test]
	async fn resolves_paging_references() {
		let arguments = MethodArguments::positional(Vec::new()).with_pageable(Pageable::of(3, 20));
		assert_eq!(eval("#pageable.offset", &arguments).await, Ok(Value::Integer(60)));
		assert_eq!(eval("#pageable.pageNumber", &arguments).await, Ok(Value::Integer(3)));
	}

	#[tokio::test]
	async fn reports_unknown_references_and_syntax_errors() {
		let arguments = MethodArguments::positional([Value::Integer(1)]);

		assert!(matches!(
			eval("[4]", &arguments).await,
			Err(ResolutionError::UnknownReference { .. })
		));
		assert!(matches!(
			eval("#missing", &arguments).await,
			Err(ResolutionError::UnknownReference { .. })
		));
		assert!(matches!(
			eval("[0] +", &arguments).await,
			Err(ResolutionError::Syntax { .. })
		));
		assert!(matches!(
			eval("true + 1", &arguments).await,
			Err(ResolutionError::Evaluation { .. })
		));
	}
}
