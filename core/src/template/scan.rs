//! Targeted scanners over a tokenized template.
//!
//! Each scanner looks only at top-level tokens (paren depth 0), which masks
//! subqueries without a separate blanking pass.

use super::lexer::{Token, TokenKind};
use std::collections::BTreeSet;

const RESERVED: &[&str] = &[
    "on", "where", "having", "order", "group", "join", "inner", "outer", "left", "right", "full",
    "cross", "natural", "set", "union", "fetch", "limit", "offset", "and", "or", "for", "with",
    "intersect", "except", "window",
];

fn is_reserved(word: &str) -> bool {
    RESERVED.iter().any(|r| r.eq_ignore_ascii_case(word))
}

/// Significant tokens of a template, paired with the source text.
pub struct TokenStream<'a> {
    pub source: &'a str,
    pub tokens: Vec<Token>,
}

impl<'a> TokenStream<'a> {
    pub fn new(source: &'a str, tokens: &[Token]) -> Self {
        Self {
            source,
            tokens: tokens.iter().copied().filter(Token::is_significant).collect(),
        }
    }

    pub fn text(&self, index: usize) -> &'a str {
        self.tokens[index].text(self.source)
    }

    pub fn is_keyword(&self, index: usize, keyword: &str) -> bool {
        self.tokens
            .get(index)
            .is_some_and(|t| t.is_keyword(self.source, keyword))
    }

    fn kind(&self, index: usize) -> Option<TokenKind> {
        self.tokens.get(index).map(|t| t.kind)
    }

    /// First top-level occurrence of `keyword` at or after `from`.
    pub fn find_top_level(&self, keyword: &str, from: usize) -> Option<usize> {
        (from..self.tokens.len())
            .find(|&i| self.tokens[i].depth == 0 && self.is_keyword(i, keyword))
    }

    /// Reads a dotted path starting at `index`; returns the text and the index after it.
    fn read_path(&self, index: usize) -> Option<(&'a str, usize)> {
        if self.kind(index) != Some(TokenKind::Word) {
            return None;
        }
        let start = self.tokens[index].start;
        let mut end = self.tokens[index].end;
        let mut next = index + 1;
        while self.kind(next) == Some(TokenKind::Dot) && self.kind(next + 1) == Some(TokenKind::Word) {
            end = self.tokens[next + 1].end;
            next += 2;
        }
        Some((&self.source[start..end], next))
    }

    /// Reads `[as] alias` at `index`, rejecting reserved words.
    fn read_alias(&self, index: usize) -> Option<&'a str> {
        let index = if self.is_keyword(index, "as") { index + 1 } else { index };
        match self.kind(index) {
            Some(TokenKind::Word) if !is_reserved(self.text(index)) => Some(self.text(index)),
            _ => None,
        }
    }
}

/// Entity and alias of the first top-level `from`/`update` clause.
pub fn entity_and_alias<'a>(stream: &TokenStream<'a>) -> (Option<&'a str>, Option<&'a str>) {
    let clause = (0..stream.tokens.len()).find(|&i| {
        stream.tokens[i].depth == 0 && (stream.is_keyword(i, "from") || stream.is_keyword(i, "update"))
    });

    let Some(clause) = clause else {
        return (None, None);
    };

    match stream.read_path(clause + 1) {
        Some((entity, next)) => (Some(entity), stream.read_alias(next)),
        None => (None, None),
    }
}

pub fn detect_alias(stream: &TokenStream<'_>) -> Option<String> {
    entity_and_alias(stream).1.map(str::to_string)
}

/// Token range of the top-level projection clause, excluding `distinct`.
pub fn projection_range(stream: &TokenStream<'_>) -> Option<(usize, usize, bool)> {
    let select = stream.find_top_level("select", 0)?;
    let mut start = select + 1;
    let distinct = stream.is_keyword(start, "distinct");
    if distinct {
        start += 1;
    }
    let end = stream.find_top_level("from", start).unwrap_or(stream.tokens.len());
    Some((start, end, distinct))
}

pub fn projection(stream: &TokenStream<'_>) -> String {
    match projection_range(stream) {
        Some((start, end, _)) if start < end => stream.source
            [stream.tokens[start].start..stream.tokens[end - 1].end]
            .trim()
            .to_string(),
        _ => String::new(),
    }
}

pub fn has_constructor_expression(stream: &TokenStream<'_>) -> bool {
    match projection_range(stream) {
        Some((start, end, _)) if start < end => {
            stream.is_keyword(start, "new")
                && stream
                    .read_path(start + 1)
                    .is_some_and(|(_, next)| stream.kind(next) == Some(TokenKind::LeftParen))
        }
        _ => false,
    }
}

/// Aliases introduced by `join [fetch] <path> [as] <alias>`.
pub fn join_aliases(stream: &TokenStream<'_>) -> BTreeSet<String> {
    let mut aliases = BTreeSet::new();
    for i in 0..stream.tokens.len() {
        if stream.tokens[i].depth != 0 || !stream.is_keyword(i, "join") {
            continue;
        }
        let path_start = if stream.is_keyword(i + 1, "fetch") { i + 2 } else { i + 1 };
        if let Some((_, next)) = stream.read_path(path_start)
            && let Some(alias) = stream.read_alias(next)
        {
            aliases.insert(alias.to_string());
        }
    }
    aliases
}

/// Aliases declared in the projection with `as`, e.g. `count(u) as total`.
pub fn projection_aliases(stream: &TokenStream<'_>) -> BTreeSet<String> {
    let mut aliases = BTreeSet::new();
    if let Some((start, end, _)) = projection_range(stream) {
        for i in start..end {
            if stream.is_keyword(i, "as") && stream.kind(i + 1) == Some(TokenKind::Word) {
                aliases.insert(stream.text(i + 1).to_string());
            }
        }
    }
    aliases
}

/// Byte offset of the last top-level `order by`.
pub fn top_level_order_by(stream: &TokenStream<'_>) -> Option<usize> {
    (0..stream.tokens.len())
        .rev()
        .find(|&i| {
            stream.tokens[i].depth == 0
                && stream.is_keyword(i, "order")
                && stream.is_keyword(i + 1, "by")
        })
        .map(|i| stream.tokens[i].start)
}

/// Whether the projection tokens form a single dotted path such as `u.name`.
pub fn is_simple_path(stream: &TokenStream<'_>, start: usize, end: usize) -> bool {
    if start >= end || stream.is_keyword(start, "new") {
        return false;
    }
    matches!(stream.read_path(start), Some((_, next)) if next == end)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::lexer::tokenize;

    fn with_stream<R>(source: &str, f: impl FnOnce(&TokenStream<'_>) -> R) -> R {
        let tokens = tokenize(source).unwrap();
        f(&TokenStream::new(source, &tokens))
    }

    #[test]
    fn alias_skips_subqueries_and_reserved_words() {
        let source = "select (select count(o) from Order o) from User u where u.age > 1";
        assert_eq!(with_stream(source, detect_alias), Some("u".to_string()));
        assert_eq!(with_stream("select x from User where x = 1", detect_alias), None);
        assert_eq!(
            with_stream("update User as usr set usr.active = false", detect_alias),
            Some("usr".to_string())
        );
    }

    #[test]
    fn projection_and_constructor() {
        let source = "select distinct new com.acme.Dto(u.id, u.name) from User u";
        assert_eq!(with_stream(source, projection), "new com.acme.Dto(u.id, u.name)");
        assert!(with_stream(source, has_constructor_expression));
        assert!(!with_stream("select u from User u", has_constructor_expression));
    }

    #[test]
    fn collects_join_and_projection_aliases() {
        let source =
            "select u.name as n, count(r) as total from User u left join fetch u.roles r join u.address as a";
        let joins = with_stream(source, join_aliases);
        assert_eq!(joins.into_iter().collect::<Vec<_>>(), vec!["a", "r"]);
        let projected = with_stream(source, projection_aliases);
        assert_eq!(projected.into_iter().collect::<Vec<_>>(), vec!["n", "total"]);
    }

    #[test]
    fn order_by_inside_parentheses_is_ignored() {
        let source = "select row_number() over (order by u.age) from User u order by u.name";
        let offset = with_stream(source, top_level_order_by).unwrap();
        assert_eq!(&source[offset..], "order by u.name");
        assert!(with_stream("select x from (select y from z order by y) x", top_level_order_by).is_none());
    }
}
