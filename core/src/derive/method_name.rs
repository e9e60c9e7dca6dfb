//! Parses query method names such as
//! `findDistinctTop3ByLastnameAndAgeGreaterThanOrderByAgeDesc`.

use super::part::{IgnoreCaseMode, OperatorKind, OrPart, Part, PartTree, Subject};
use crate::error::CompileError;
use crate::model::{EntityModel, PropertyKind, PropertyPath};
use crate::paging::{Direction, Order, Sort};
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref PREFIX: Regex =
        Regex::new(r"^(find|read|get|query|search|stream|count|exists|delete|remove)(\p{Lu}.*?)??By(.*)$")
            .unwrap();
    static ref SUBJECT_ONLY: Regex =
        Regex::new(r"^(find|read|get|query|search|stream|count|exists|delete|remove)(\p{Lu}\w*)?$")
            .unwrap();
    static ref LIMITING: Regex = Regex::new(r"(First|Top)(\d*)").unwrap();
    static ref ALL_IGNORE_CASE: Regex = Regex::new(r"AllIgnor(?:ing|e)Case").unwrap();
}

const ORDER_BY: &str = "OrderBy";

struct MethodNameParser<'a> {
    method: &'a str,
    entity: &'a str,
    model: &'a dyn EntityModel,
}

/// Parses `method` into a [`PartTree`] against `entity` in `model`.
pub fn parse_method_name(
    method: &str,
    entity: &str,
    model: &dyn EntityModel,
) -> Result<PartTree, CompileError> {
    if !model.has_entity(entity) {
        return Err(CompileError::UnknownProperty {
            entity: entity.to_string(),
            property: String::new(),
        });
    }

    let parser = MethodNameParser {
        method,
        entity,
        model,
    };
    let tree = parser.parse()?;
    tracing::debug!("Parsed {} into {}", method, tree);
    Ok(tree)
}

impl<'a> MethodNameParser<'a> {
    fn parse(&self) -> Result<PartTree, CompileError> {
        let (verb, subject, predicate) = if let Some(captures) = PREFIX.captures(self.method) {
            (
                captures.get(1).map_or("", |m| m.as_str()),
                captures.get(2).map_or("", |m| m.as_str()),
                captures.get(3).map_or("", |m| m.as_str()),
            )
        } else if let Some(captures) = SUBJECT_ONLY.captures(self.method) {
            (
                captures.get(1).map_or("", |m| m.as_str()),
                captures.get(2).map_or("", |m| m.as_str()),
                "",
            )
        } else {
            return Err(self.invalid("expected a find/count/exists/delete prefix"));
        };

        let subject = self.parse_subject(verb, subject)?;

        let (predicate, order_clause) = match predicate.find(ORDER_BY) {
            Some(index) => (&predicate[..index], Some(&predicate[index + ORDER_BY.len()..])),
            None => (predicate, None),
        };

        let all_ignore_case = ALL_IGNORE_CASE.is_match(predicate);
        let predicate = ALL_IGNORE_CASE.replace_all(predicate, "");

        let mut groups = Vec::new();
        if !predicate.is_empty() {
            for (index, group) in split_keyword(&predicate, "Or").into_iter().enumerate() {
                let parts = split_keyword(group, "And")
                    .into_iter()
                    .filter(|part| !part.is_empty())
                    .map(|part| self.parse_part(part, all_ignore_case))
                    .collect::<Result<Vec<_>, _>>()?;
                if parts.is_empty() {
                    return Err(CompileError::EmptyConjunction(index));
                }
                groups.push(OrPart::new(parts));
            }
        }

        let sort = match order_clause {
            Some(clause) => self.parse_order_by(clause)?,
            None => Sort::unsorted(),
        };

        Ok(PartTree {
            entity: self.entity.to_string(),
            subject,
            groups,
            sort,
        })
    }

    fn parse_subject(&self, verb: &str, subject: &str) -> Result<Subject, CompileError> {
        let max_results = match LIMITING.captures(subject) {
            Some(captures) => {
                let digits = captures.get(2).map_or("", |m| m.as_str());
                if digits.is_empty() {
                    Some(1)
                } else {
                    let max = digits
                        .parse::<usize>()
                        .map_err(|_| self.invalid("result limit out of range"))?;
                    Some(max)
                }
            }
            None => None,
        };

        Ok(Subject {
            distinct: subject.contains("Distinct"),
            count: verb == "count",
            exists: verb == "exists",
            delete: verb == "delete" || verb == "remove",
            max_results,
        })
    }

    fn parse_part(&self, source: &str, all_ignore_case: bool) -> Result<Part, CompileError> {
        let (expression, ignore_case) = match source
            .strip_suffix("IgnoreCase")
            .or_else(|| source.strip_suffix("IgnoringCase"))
        {
            Some(rest) => (rest, IgnoreCaseMode::Always),
            None if all_ignore_case => (source, IgnoreCaseMode::WhenPossible),
            None => (source, IgnoreCaseMode::Never),
        };

        for (operator, property) in OperatorKind::candidates(expression) {
            if let Some(path) = self.resolve_property(property) {
                return Ok(Part::new(path, operator).ignoring_case(ignore_case));
            }
        }

        Err(CompileError::UnknownProperty {
            entity: self.entity.to_string(),
            property: uncapitalize(expression),
        })
    }

    fn parse_order_by(&self, clause: &str) -> Result<Sort, CompileError> {
        if clause.is_empty() {
            return Err(self.invalid("OrderBy must name at least one property"));
        }

        let mut orders = Vec::new();
        for (property, direction) in split_orders(clause) {
            let path = self
                .resolve_property(property)
                .ok_or_else(|| CompileError::UnknownProperty {
                    entity: self.entity.to_string(),
                    property: uncapitalize(property),
                })?;
            orders.push(Order {
                direction,
                ..Order::asc(path.dot_path())
            });
        }
        Ok(Sort::by(orders))
    }

    /// Resolves `LastName`, `AddressCity` (-> `address.city`) or `Address_City`.
    fn resolve_property(&self, source: &str) -> Option<PropertyPath> {
        if source.is_empty() {
            return None;
        }

        if source.contains('_') {
            let path = PropertyPath {
                segments: source
                    .split('_')
                    .filter(|s| !s.is_empty())
                    .map(uncapitalize)
                    .collect(),
            };
            return self.model.property(self.entity, &path).map(|_| path);
        }

        self.resolve_camel_case(PropertyPath::parse(""), source)
    }

    fn resolve_camel_case(&self, prefix: PropertyPath, rest: &str) -> Option<PropertyPath> {
        let mut whole = prefix.clone();
        whole.segments.push(uncapitalize(rest));
        if self.model.property(self.entity, &whole).is_some() {
            return Some(whole);
        }

        // longest head first
        let boundaries: Vec<usize> = rest
            .char_indices()
            .skip(1)
            .filter(|(_, c)| c.is_uppercase())
            .map(|(i, _)| i)
            .collect();

        for &split in boundaries.iter().rev() {
            let mut head = prefix.clone();
            head.segments.push(uncapitalize(&rest[..split]));
            if let Some(PropertyKind::Association(_)) = self.model.property(self.entity, &head)
                && let Some(path) = self.resolve_camel_case(head, &rest[split..])
            {
                return Some(path);
            }
        }

        None
    }

    fn invalid(&self, reason: &str) -> CompileError {
        CompileError::InvalidMethodName {
            name: self.method.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Splits on `keyword` where it starts a new capitalised word.
fn split_keyword<'s>(source: &'s str, keyword: &str) -> Vec<&'s str> {
    let mut pieces = Vec::new();
    let mut start = 0;
    let mut search = 0;

    while let Some(found) = source[search..].find(keyword) {
        let index = search + found;
        let after = index + keyword.len();
        let next_is_upper = source[after..].chars().next().is_some_and(char::is_uppercase);
        if next_is_upper && index > start {
            pieces.push(&source[start..index]);
            start = after;
        }
        search = after;
    }

    pieces.push(&source[start..]);
    pieces
}

fn split_orders(clause: &str) -> Vec<(&str, Direction)> {
    let mut orders = Vec::new();
    let mut start = 0;
    let mut index = 0;

    'scan: while index < clause.len() {
        for (keyword, direction) in [("Desc", Direction::Desc), ("Asc", Direction::Asc)] {
            if index > start && clause[index..].starts_with(keyword) {
                let end = index + keyword.len();
                if clause[end..].chars().next().is_none_or(char::is_uppercase) {
                    orders.push((&clause[start..index], direction));
                    start = end;
                    index = end;
                    continue 'scan;
                }
            }
        }
        index += clause[index..].chars().next().map_or(1, char::len_utf8);
    }

    if start < clause.len() {
        orders.push((&clause[start..], Direction::Asc));
    }
    orders
}

fn uncapitalize(source: &str) -> String {
    let mut chars = source.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}
