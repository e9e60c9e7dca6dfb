use super::lexer::tokenize;
use super::scan::{self, TokenStream};
use crate::error::CompileError;
use crate::paging::{Order, Sort};
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::BTreeSet;

lazy_static! {
    static ref FUNCTION_CALL: Regex = Regex::new(r"^\s*[A-Za-z_][\w.]*\s*\(.*\)\s*$").unwrap();
    static ref PUNCTUATION: Regex = Regex::new(r"[^\w.]").unwrap();
}

struct SortTarget {
    alias: Option<String>,
    known_aliases: BTreeSet<String>,
}

impl SortTarget {
    fn reference(&self, order: &Order, allow_unsafe: bool) -> Result<String, CompileError> {
        let property = order.property.trim();
        let unsafe_allowed = order.unsafe_expression || allow_unsafe;

        let is_function = FUNCTION_CALL.is_match(property);
        if !unsafe_allowed && (is_function || PUNCTUATION.is_match(property)) {
            return Err(CompileError::UnsafeSortExpression(property.to_string()));
        }

        let head = property.split('.').next().unwrap_or(property);
        let verbatim = is_function || (unsafe_allowed && PUNCTUATION.is_match(property));
        let reference = if verbatim || self.known_aliases.contains(head) {
            property.to_string()
        } else {
            match &self.alias {
                Some(alias) if head != alias => format!("{}.{}", alias, property),
                _ => property.to_string(),
            }
        };

        Ok(if order.ignore_case {
            format!("lower({})", reference)
        } else {
            reference
        })
    }
}

/// Appends `sort` to `query`, extending an existing top-level `order by`.
///
/// Keys naming a join or projection alias, and function calls, are used as
/// written; other keys are qualified with the query's alias.
pub fn apply_sorting(query: &str, sort: &Sort, allow_unsafe: bool) -> Result<String, CompileError> {
    if !sort.is_sorted() {
        return Ok(query.to_string());
    }

    let tokens = tokenize(query)?;
    let stream = TokenStream::new(query, &tokens);

    let mut known_aliases = scan::join_aliases(&stream);
    known_aliases.extend(scan::projection_aliases(&stream));
    let target = SortTarget {
        alias: scan::detect_alias(&stream),
        known_aliases,
    };

    let clauses = sort
        .orders()
        .iter()
        .map(|order| {
            target
                .reference(order, allow_unsafe)
                .map(|reference| format!("{} {}", reference, order.direction))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let separator = if scan::top_level_order_by(&stream).is_some() {
        ", "
    } else {
        " order by "
    };
    Ok(format!("{}{}{}", query.trim_end(), separator, clauses.join(", ")))
}
