use super::lexer::{expression_body, Token, TokenKind};
use super::scan::TokenStream;
use crate::binding::{
    BindingIdentifier, BindingKind, BindingRegistry, LikeKind, ParameterBinding, ParameterOrigin,
};
use crate::error::CompileError;

/// Prefix of synthetic names given to expression placeholders in named style.
pub const EXPRESSION_PARAMETER_PREFIX: &str = "__rx_expr_";

pub struct Rewritten {
    pub text: String,
    pub bindings: Vec<ParameterBinding>,
    pub jdbc_style: bool,
    pub has_named_parameter: bool,
}

/// Placeholder addressing detected before rewriting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Style {
    /// Bare `?`, numbered by occurrence.
    Jdbc,
    Indexed,
    Named,
}

struct Replacement {
    start: usize,
    end: usize,
    text: String,
}

pub struct Rewriter<'a> {
    stream: TokenStream<'a>,
    registry: BindingRegistry,
    style: Style,
    sequence: usize,
    expressions: usize,
}

impl<'a> Rewriter<'a> {
    pub fn new(source: &'a str, tokens: &[Token]) -> Result<Self, CompileError> {
        let stream = TokenStream::new(source, tokens);

        let mut greatest = 0usize;
        let mut bare = false;
        let mut named = false;
        let mut indexed_expression = false;

        for token in &stream.tokens {
            let text = token.text(source);
            match token.kind {
                TokenKind::Positional if text.len() == 1 => bare = true,
                TokenKind::Positional => {
                    let position = text[1..].parse::<usize>().unwrap_or(0);
                    greatest = greatest.max(position);
                }
                TokenKind::Named => named = true,
                TokenKind::Expression if text.starts_with('?') => indexed_expression = true,
                _ => {}
            }
        }

        if bare && (greatest > 0 || named) {
            return Err(CompileError::MixedParameterStyles(source.to_string()));
        }

        let style = if bare {
            Style::Jdbc
        } else if greatest > 0 || indexed_expression {
            Style::Indexed
        } else {
            Style::Named
        };

        Ok(Self {
            stream,
            registry: BindingRegistry::new(greatest),
            style,
            sequence: 0,
            expressions: 0,
        })
    }

    pub fn rewrite(mut self) -> Result<Rewritten, CompileError> {
        let mut replacements = Vec::new();
        let mut has_named_parameter = false;

        for index in 0..self.stream.tokens.len() {
            let token = self.stream.tokens[index];
            if !matches!(
                token.kind,
                TokenKind::Positional | TokenKind::Named | TokenKind::Expression
            ) {
                continue;
            }

            let leading = index > 0 && self.kind_at(index - 1) == Some(TokenKind::Percent);
            let trailing = self.kind_at(index + 1) == Some(TokenKind::Percent);
            let keyword_at = if leading { index.checked_sub(2) } else { index.checked_sub(1) };
            let kind = self.binding_kind(keyword_at, leading, trailing);

            let (identifier, origin) = self.identify(&token)?;
            has_named_parameter |= token.kind == TokenKind::Named;

            let binding = ParameterBinding::new(identifier, origin, kind);
            let registered = if self.style == Style::Jdbc {
                self.registry.register_unique(binding)
            } else {
                self.registry.register(binding)
            };

            let start = if leading { self.stream.tokens[index - 1].start } else { token.start };
            let end = if trailing { self.stream.tokens[index + 1].end } else { token.end };
            replacements.push(Replacement {
                start,
                end,
                text: self.canonical(&registered),
            });
        }

        let text = splice(self.stream.source, &replacements);
        if !replacements.is_empty() {
            tracing::trace!("Rewrote template to {}", text);
        }

        Ok(Rewritten {
            text,
            bindings: self.registry.into_bindings(),
            jdbc_style: self.style == Style::Jdbc,
            has_named_parameter,
        })
    }

    fn kind_at(&self, index: usize) -> Option<TokenKind> {
        self.stream.tokens.get(index).map(|t| t.kind)
    }

    /// Looks back past an optional `(` for a `like` or `in` keyword.
    fn binding_kind(&self, at: Option<usize>, leading: bool, trailing: bool) -> BindingKind {
        if leading || trailing {
            return BindingKind::Like(LikeKind::from_wildcards(leading, trailing));
        }

        let Some(mut at) = at else {
            return BindingKind::Plain;
        };
        if self.stream.is_keyword(at, "like") {
            return BindingKind::Like(LikeKind::Like);
        }
        if self.kind_at(at) == Some(TokenKind::LeftParen) {
            match at.checked_sub(1) {
                Some(previous) => at = previous,
                None => return BindingKind::Plain,
            }
        }
        if self.stream.is_keyword(at, "in") {
            BindingKind::In
        } else {
            BindingKind::Plain
        }
    }

    fn identify(&mut self, token: &Token) -> Result<(BindingIdentifier, ParameterOrigin), CompileError> {
        let text = token.text(self.stream.source);

        let identifier = match token.kind {
            TokenKind::Positional if text.len() == 1 => {
                self.sequence += 1;
                BindingIdentifier::indexed(self.sequence)
            }
            TokenKind::Positional => {
                let position = text[1..]
                    .parse::<usize>()
                    .ok()
                    .filter(|&p| p > 0)
                    .ok_or_else(|| CompileError::InvalidPlaceholder(text.to_string()))?;
                BindingIdentifier::indexed(position)
            }
            TokenKind::Named => BindingIdentifier::named(&text[1..]),
            _ => {
                let expression = expression_body(token, self.stream.source).to_string();
                let identifier = match self.style {
                    Style::Jdbc => {
                        self.sequence += 1;
                        BindingIdentifier::indexed(self.sequence)
                    }
                    Style::Indexed => BindingIdentifier::indexed(self.registry.next_position()),
                    Style::Named => {
                        let name = format!("{}{}", EXPRESSION_PARAMETER_PREFIX, self.expressions);
                        self.expressions += 1;
                        BindingIdentifier::named(name)
                    }
                };
                return Ok((identifier, ParameterOrigin::expression(expression)));
            }
        };

        Ok((identifier.clone(), ParameterOrigin::argument(identifier)))
    }

    fn canonical(&self, identifier: &BindingIdentifier) -> String {
        match identifier.name() {
            Some(name) => format!(":{}", name),
            None if self.style == Style::Jdbc => "?".to_string(),
            None => format!("?{}", identifier.position().unwrap_or_default()),
        }
    }
}

fn splice(source: &str, replacements: &[Replacement]) -> String {
    let mut output = String::with_capacity(source.len());
    let mut cursor = 0;
    for replacement in replacements {
        output.push_str(&source[cursor..replacement.start]);
        output.push_str(&replacement.text);
        cursor = replacement.end;
    }
    output.push_str(&source[cursor..]);
    output
}
