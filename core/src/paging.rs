//! Sorting, paging and limiting directives carried by an invocation.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

impl Direction {
    pub fn parse(text: &str) -> Option<Self> {
        match text.to_ascii_lowercase().as_str() {
            "asc" => Some(Direction::Asc),
            "desc" => Some(Direction::Desc),
            _ => None,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Asc => write!(f, "asc"),
            Direction::Desc => write!(f, "desc"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Order {
    pub property: String,
    pub direction: Direction,
    #[serde(default)]
    pub ignore_case: bool,
    /// Permits arbitrary expressions as the sort key.
    #[serde(default)]
    pub unsafe_expression: bool,
}

impl Order {
    pub fn asc(property: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            direction: Direction::Asc,
            ignore_case: false,
            unsafe_expression: false,
        }
    }

    pub fn desc(property: impl Into<String>) -> Self {
        Self {
            direction: Direction::Desc,
            ..Self::asc(property)
        }
    }

    pub fn ignoring_case(mut self) -> Self {
        self.ignore_case = true;
        self
    }

    pub fn unsafe_expression(mut self) -> Self {
        self.unsafe_expression = true;
        self
    }
}

impl fmt::Display for Order {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.property, self.direction)?;
        if self.ignore_case {
            write!(f, " (ignore case)")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Sort {
    orders: Vec<Order>,
}

impl Sort {
    pub fn unsorted() -> Self {
        Self::default()
    }

    pub fn by(orders: impl IntoIterator<Item = Order>) -> Self {
        Self {
            orders: orders.into_iter().collect(),
        }
    }

    /// Parses `name desc, age` style key lists; direction defaults to ascending.
    pub fn parse(keys: &str) -> Self {
        let orders = keys
            .split(',')
            .filter_map(|key| {
                let mut parts = key.split_whitespace();
                let property = parts.next()?;
                let direction = parts.next().and_then(Direction::parse).unwrap_or_default();
                Some(Order {
                    direction,
                    ..Order::asc(property)
                })
            })
            .collect();
        Self { orders }
    }

    pub fn is_sorted(&self) -> bool {
        !self.orders.is_empty()
    }

    pub fn orders(&self) -> &[Order] {
        &self.orders
    }

    /// Orders of `self` followed by those of `other`.
    pub fn and(&self, other: &Sort) -> Sort {
        let mut orders = self.orders.clone();
        orders.extend(other.orders.iter().cloned());
        Sort { orders }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Pageable {
    #[default]
    Unpaged,
    Paged {
        page: usize,
        size: usize,
        sort: Sort,
    },
}

impl Pageable {
    pub fn of(page: usize, size: usize) -> Self {
        Pageable::Paged {
            page,
            size,
            sort: Sort::unsorted(),
        }
    }

    pub fn is_paged(&self) -> bool {
        matches!(self, Pageable::Paged { .. })
    }

    /// Saturates rather than overflowing for pages beyond addressable rows.
    pub fn offset(&self) -> Option<usize> {
        match self {
            Pageable::Paged { page, size, .. } => Some(page.saturating_mul(*size)),
            Pageable::Unpaged => None,
        }
    }

    pub fn page_size(&self) -> Option<usize> {
        match self {
            Pageable::Paged { size, .. } => Some(*size),
            Pageable::Unpaged => None,
        }
    }

    pub fn sort(&self) -> Option<&Sort> {
        match self {
            Pageable::Paged { sort, .. } => Some(sort),
            Pageable::Unpaged => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Limit {
    #[default]
    Unlimited,
    Max(usize),
}

impl Limit {
    pub fn max(&self) -> Option<usize> {
        match self {
            Limit::Max(max) => Some(*max),
            Limit::Unlimited => None,
        }
    }
}
