use crate::error::CompileError;
use std::ops::Range;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
	Whitespace,
	Word,
	Number,
	StringLiteral,

	// Placeholders
	Positional, // ? or ?12
	Named,      // :name
	Expression, // :#{...} or ?#{...}

	/// `#{...}` substituted into the template text before parsing.
	TemplateExpression,

	// Symbols
	LeftParen,
	RightParen,
	Comma,
	Dot,
	Percent,
	Star,
	Symbol,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token {
	pub kind: TokenKind,
	pub start: usize,
	pub end: usize,
	/// Parenthesis nesting depth the token sits at.
	pub depth: u32,
}

impl Token {
	pub fn span(&self) -> Range<usize> {
		self.start..self.end
	}

	pub fn text<'a>(&self, source: &'a str) -> &'a str {
		&source[self.span()]
	}

	/// Case-insensitive keyword match on a word token.
	pub fn is_keyword(&self, source: &str, keyword: &str) -> bool {
		self.kind == TokenKind::Word && self.text(source).eq_ignore_ascii_case(keyword)
	}

	pub fn is_significant(&self) -> bool {
		self.kind != TokenKind::Whitespace
	}
}

/// Splits query text into tokens while tracking quote state and paren depth.
pub struct Lexer<'a> {
	input: &'a str,
	position: usize,
	depth: u32,
}

impl<'a> Lexer<'a> {
	pub fn new(input: &'a str) -> Self {
		Self {
			input,
			position: 0,
			depth: 0,
		}
	}

	pub fn tokenize(mut self) -> Result<Vec<Token>, CompileError> {
		let mut tokens = Vec::new();
		while let Some(ch) = self.current_char() {
			let start = self.position;
			let kind = self.next_kind(ch)?;
			let depth = match kind {
				TokenKind::LeftParen => {
					self.depth += 1;
					self.depth - 1
				}
				TokenKind::RightParen => {
					self.depth = self.depth.saturating_sub(1);
					self.depth
				}
				_ => self.depth,
			};
			tokens.push(Token {
				kind,
				start,
				end: self.position,
				depth,
			});
		}
		Ok(tokens)
	}

	fn next_kind(&mut self, ch: char) -> Result<TokenKind, CompileError> {
		match ch {
			c if c.is_whitespace() => {
				self.advance_while(char::is_whitespace);
				Ok(TokenKind::Whitespace)
			}
			'\'' | '"' | '`' => self.read_string(ch),
			'0'..='9' => {
				self.advance_while(|c| c.is_ascii_digit() || c == '.');
				Ok(TokenKind::Number)
			}
			'?' => {
				self.advance();
				if self.starts_with("#{") {
					self.read_braced()?;
					return Ok(TokenKind::Expression);
				}
				self.advance_while(|c| c.is_ascii_digit());
				Ok(TokenKind::Positional)
			}
			':' => {
				self.advance();
				if self.starts_with("#{") {
					self.read_braced()?;
					return Ok(TokenKind::Expression);
				}
				match self.current_char() {
					Some(c) if is_identifier_start(c) => {
						self.advance_while(is_identifier_part);
						Ok(TokenKind::Named)
					}
					Some(':') => {
						// cast operator
						self.advance();
						Ok(TokenKind::Symbol)
					}
					_ => Ok(TokenKind::Symbol),
				}
			}
			'#' if self.starts_with("#{") => {
				self.read_braced()?;
				Ok(TokenKind::TemplateExpression)
			}
			'(' => {
				self.advance();
				Ok(TokenKind::LeftParen)
			}
			')' => {
				self.advance();
				Ok(TokenKind::RightParen)
			}
			',' => {
				self.advance();
				Ok(TokenKind::Comma)
			}
			'.' => {
				self.advance();
				Ok(TokenKind::Dot)
			}
			'%' => {
				self.advance();
				Ok(TokenKind::Percent)
			}
			'*' => {
				self.advance();
				Ok(TokenKind::Star)
			}
			c if is_identifier_start(c) => {
				self.advance_while(is_identifier_part);
				Ok(TokenKind::Word)
			}
			_ => {
				self.advance();
				Ok(TokenKind::Symbol)
			}
		}
	}

	fn current_char(&self) -> Option<char> {
		self.input[self.position..].chars().next()
	}

	fn starts_with(&self, prefix: &str) -> bool {
		self.input[self.position..].starts_with(prefix)
	}

	fn advance(&mut self) {
		if let Some(ch) = self.current_char() {
			self.position += ch.len_utf8();
		}
	}

	fn advance_while(&mut self, predicate: impl Fn(char) -> bool) {
		while let Some(ch) = self.current_char() {
			if predicate(ch) {
				self.advance();
			} else {
				break;
			}
		}
	}

	fn read_string(&mut self, quote: char) -> Result<TokenKind, CompileError> {
		self.advance(); // skip opening quote

		loop {
			match self.current_char() {
				None => return Err(CompileError::Unterminated("string literal")),
				Some(c) if c == quote => {
					self.advance();
					// doubled quote is an escaped quote
					if self.current_char() == Some(quote) {
						self.advance();
						continue;
					}
					return Ok(TokenKind::StringLiteral);
				}
				Some('\\') => {
					self.advance();
					self.advance();
				}
				Some(_) => self.advance(),
			}
		}
	}

	/// Consumes `#{ ... }` with balanced braces.
	fn read_braced(&mut self) -> Result<(), CompileError> {
		self.advance(); // #
		self.advance(); // {
		let mut open = 1usize;

		while let Some(ch) = self.current_char() {
			self.advance();
			match ch {
				'{' => open += 1,
				'}' => {
					open -= 1;
					if open == 0 {
						return Ok(());
					}
				}
				_ => {}
			}
		}

		Err(CompileError::Unterminated("expression"))
	}
}

fn is_identifier_start(c: char) -> bool {
	c.is_alphabetic() || c == '_' || c == '$'
}

fn is_identifier_part(c: char) -> bool {
	c.is_alphanumeric() || c == '_' || c == '$'
}

pub fn tokenize(input: &str) -> Result<Vec<Token>, CompileError> {
	Lexer::new(input).tokenize()
}

/// Inner text of an expression token (`:#{[0]}` -> `[0]`).
pub fn expression_body<'a>(token: &Token, source: &'a str) -> &'a str {
	let text = token.text(source);
	let inner = text
		.trim_start_matches(|c: char| c == ':' || c == '?')
		.trim_start_matches("#{");
	inner.strip_suffix('}').unwrap_or(inner).trim()
}
