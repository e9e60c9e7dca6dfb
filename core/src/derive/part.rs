use crate::binding::LikeKind;
use crate::model::PropertyPath;
use crate::paging::Sort;
use smallvec::SmallVec;
use std::fmt;

/// Predicate keyword of one method-name part.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperatorKind {
    Between,
    IsNotNull,
    IsNull,
    LessThan,
    LessThanEqual,
    GreaterThan,
    GreaterThanEqual,
    Before,
    After,
    NotLike,
    Like,
    StartingWith,
    EndingWith,
    IsNotEmpty,
    IsEmpty,
    NotContaining,
    Containing,
    NotIn,
    In,
    Near,
    Within,
    Regex,
    Exists,
    True,
    False,
    NegatingSimpleProperty,
    SimpleProperty,
}

impl OperatorKind {
    /// Detection order: longer keywords sharing a suffix come first.
    pub const ALL: [OperatorKind; 27] = [
        OperatorKind::IsNotNull,
        OperatorKind::IsNull,
        OperatorKind::Between,
        OperatorKind::LessThanEqual,
        OperatorKind::LessThan,
        OperatorKind::GreaterThanEqual,
        OperatorKind::GreaterThan,
        OperatorKind::Before,
        OperatorKind::After,
        OperatorKind::NotLike,
        OperatorKind::Like,
        OperatorKind::StartingWith,
        OperatorKind::EndingWith,
        OperatorKind::IsNotEmpty,
        OperatorKind::IsEmpty,
        OperatorKind::NotContaining,
        OperatorKind::Containing,
        OperatorKind::NotIn,
        OperatorKind::In,
        OperatorKind::Near,
        OperatorKind::Within,
        OperatorKind::Regex,
        OperatorKind::Exists,
        OperatorKind::True,
        OperatorKind::False,
        OperatorKind::NegatingSimpleProperty,
        OperatorKind::SimpleProperty,
    ];

    pub fn keywords(self) -> &'static [&'static str] {
        match self {
            OperatorKind::Between => &["IsBetween", "Between"],
            OperatorKind::IsNotNull => &["IsNotNull", "NotNull"],
            OperatorKind::IsNull => &["IsNull", "Null"],
            OperatorKind::LessThan => &["IsLessThan", "LessThan"],
            OperatorKind::LessThanEqual => &["IsLessThanEqual", "LessThanEqual"],
            OperatorKind::GreaterThan => &["IsGreaterThan", "GreaterThan"],
            OperatorKind::GreaterThanEqual => &["IsGreaterThanEqual", "GreaterThanEqual"],
            OperatorKind::Before => &["IsBefore", "Before"],
            OperatorKind::After => &["IsAfter", "After"],
            OperatorKind::NotLike => &["IsNotLike", "NotLike"],
            OperatorKind::Like => &["IsLike", "Like"],
            OperatorKind::StartingWith => &["IsStartingWith", "StartingWith", "StartsWith"],
            OperatorKind::EndingWith => &["IsEndingWith", "EndingWith", "EndsWith"],
            OperatorKind::IsNotEmpty => &["IsNotEmpty", "NotEmpty"],
            OperatorKind::IsEmpty => &["IsEmpty", "Empty"],
            OperatorKind::NotContaining => &["IsNotContaining", "NotContaining", "NotContains"],
            OperatorKind::Containing => &["IsContaining", "Containing", "Contains"],
            OperatorKind::NotIn => &["IsNotIn", "NotIn"],
            OperatorKind::In => &["IsIn", "In"],
            OperatorKind::Near => &["IsNear", "Near"],
            OperatorKind::Within => &["IsWithin", "Within"],
            OperatorKind::Regex => &["MatchesRegex", "Matches", "Regex"],
            OperatorKind::Exists => &["Exists"],
            OperatorKind::True => &["IsTrue", "True"],
            OperatorKind::False => &["IsFalse", "False"],
            OperatorKind::NegatingSimpleProperty => &["IsNot", "Not"],
            OperatorKind::SimpleProperty => &["Is", "Equals"],
        }
    }

    /// Number of method arguments the operator consumes.
    pub fn argument_count(self) -> usize {
        match self {
            OperatorKind::Between | OperatorKind::Near => 2,
            OperatorKind::IsNotNull
            | OperatorKind::IsNull
            | OperatorKind::IsNotEmpty
            | OperatorKind::IsEmpty
            | OperatorKind::Exists
            | OperatorKind::True
            | OperatorKind::False => 0,
            _ => 1,
        }
    }

    /// Wildcard placement the operator applies to its text argument.
    pub fn like_kind(self) -> Option<LikeKind> {
        match self {
            OperatorKind::StartingWith => Some(LikeKind::StartingWith),
            OperatorKind::EndingWith => Some(LikeKind::EndingWith),
            OperatorKind::Containing | OperatorKind::NotContaining => Some(LikeKind::Containing),
            OperatorKind::Like | OperatorKind::NotLike => Some(LikeKind::Like),
            _ => None,
        }
    }

    pub fn is_membership(self) -> bool {
        matches!(self, OperatorKind::In | OperatorKind::NotIn)
    }

    /// Strips a trailing keyword of this kind from `expression`.
    pub fn strip<'a>(self, expression: &'a str) -> Option<&'a str> {
        if self == OperatorKind::SimpleProperty {
            return Some(
                self.keywords()
                    .iter()
                    .find_map(|k| expression.strip_suffix(k))
                    .unwrap_or(expression),
            );
        }
        self.keywords()
            .iter()
            .find_map(|keyword| expression.strip_suffix(keyword))
            .filter(|rest| !rest.is_empty())
    }

    /// Candidate operators for `expression` in detection order.
    pub fn candidates(expression: &str) -> impl Iterator<Item = (OperatorKind, &str)> {
        Self::ALL
            .into_iter()
            .filter_map(move |kind| kind.strip(expression).map(|rest| (kind, rest)))
    }
}

impl fmt::Display for OperatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IgnoreCaseMode {
    #[default]
    Never,
    /// Applied to textual properties only; set by `AllIgnoreCase`.
    WhenPossible,
    /// Requested explicitly on the part.
    Always,
}

/// One atomic predicate of a derived query, e.g. `AgeGreaterThan`.
#[derive(Debug, Clone, PartialEq)]
pub struct Part {
    pub property: PropertyPath,
    pub operator: OperatorKind,
    pub ignore_case: IgnoreCaseMode,
}

impl Part {
    pub fn new(property: impl Into<PropertyPath>, operator: OperatorKind) -> Self {
        Self {
            property: property.into(),
            operator,
            ignore_case: IgnoreCaseMode::Never,
        }
    }

    pub fn ignoring_case(mut self, mode: IgnoreCaseMode) -> Self {
        self.ignore_case = mode;
        self
    }

    pub fn argument_count(&self) -> usize {
        self.operator.argument_count()
    }
}

impl fmt::Display for Part {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.property, self.operator)?;
        if self.ignore_case != IgnoreCaseMode::Never {
            write!(f, " ({:?})", self.ignore_case)?;
        }
        Ok(())
    }
}

/// Parts joined with AND.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct OrPart {
    pub parts: SmallVec<[Part; 4]>,
}

impl OrPart {
    pub fn new(parts: impl IntoIterator<Item = Part>) -> Self {
        Self {
            parts: parts.into_iter().collect(),
        }
    }
}

/// Subject flags of a derived query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Subject {
    pub distinct: bool,
    pub count: bool,
    pub exists: bool,
    pub delete: bool,
    pub max_results: Option<usize>,
}

impl Subject {
    pub fn is_limiting(&self) -> bool {
        self.max_results.is_some()
    }
}

/// OR of AND groups plus the subject flags and static sort of a method name.
#[derive(Debug, Clone, PartialEq)]
pub struct PartTree {
    pub entity: String,
    pub subject: Subject,
    pub groups: Vec<OrPart>,
    pub sort: Sort,
}

impl PartTree {
    pub fn parts(&self) -> impl Iterator<Item = &Part> {
        self.groups.iter().flat_map(|group| group.parts.iter())
    }

    pub fn argument_count(&self) -> usize {
        self.parts().map(Part::argument_count).sum()
    }

    pub fn is_distinct(&self) -> bool {
        self.subject.distinct
    }

    pub fn is_count_projection(&self) -> bool {
        self.subject.count
    }

    pub fn is_exists_projection(&self) -> bool {
        self.subject.exists
    }

    pub fn is_delete(&self) -> bool {
        self.subject.delete
    }

    pub fn is_limiting(&self) -> bool {
        self.subject.is_limiting()
    }

    pub fn max_results(&self) -> Option<usize> {
        self.subject.max_results
    }
}

impl fmt::Display for PartTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let groups: Vec<String> = self
            .groups
            .iter()
            .map(|group| {
                group
                    .parts
                    .iter()
                    .map(Part::to_string)
                    .collect::<Vec<_>>()
                    .join(" AND ")
            })
            .collect();
        write!(f, "{}", groups.join(" OR "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn longer_keywords_win() {
        let first = |expr: &str| OperatorKind::candidates(expr).next().map(|(k, rest)| (k, rest.to_string()));

        assert_eq!(first("AgeIsNotNull"), Some((OperatorKind::IsNotNull, "Age".into())));
        assert_eq!(first("AgeLessThanEqual"), Some((OperatorKind::LessThanEqual, "Age".into())));
        assert_eq!(first("NameNotIn"), Some((OperatorKind::NotIn, "Name".into())));
        assert_eq!(first("TagsNotContains"), Some((OperatorKind::NotContaining, "Tags".into())));
        assert_eq!(first("Name"), Some((OperatorKind::SimpleProperty, "Name".into())));
        assert_eq!(first("NameEquals"), Some((OperatorKind::SimpleProperty, "Name".into())));
    }

    #[test]
    fn argument_counts() {
        assert_eq!(OperatorKind::Between.argument_count(), 2);
        assert_eq!(OperatorKind::IsNull.argument_count(), 0);
        assert_eq!(OperatorKind::SimpleProperty.argument_count(), 1);
        assert_eq!(OperatorKind::True.argument_count(), 0);
    }
}
