use std::fmt;

/// How a bound parameter is addressed in a query.
///
/// Positions are 1-based and stay stable for the lifetime of a compiled query.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum BindingIdentifier {
    Named(String),
    Indexed(usize),
    NamedAndIndexed { name: String, position: usize },
}

impl BindingIdentifier {
    pub fn named(name: impl Into<String>) -> Self {
        BindingIdentifier::Named(name.into())
    }

    /// # Panics
    ///
    /// Panics if `position` is zero.
    pub fn indexed(position: usize) -> Self {
        assert!(position > 0, "binding positions are 1-based");
        BindingIdentifier::Indexed(position)
    }

    /// # Panics
    ///
    /// Panics if `position` is zero.
    pub fn of(name: impl Into<String>, position: usize) -> Self {
        assert!(position > 0, "binding positions are 1-based");
        BindingIdentifier::NamedAndIndexed {
            name: name.into(),
            position,
        }
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            BindingIdentifier::Named(name) | BindingIdentifier::NamedAndIndexed { name, .. } => {
                Some(name)
            }
            BindingIdentifier::Indexed(_) => None,
        }
    }

    pub fn position(&self) -> Option<usize> {
        match self {
            BindingIdentifier::Indexed(position)
            | BindingIdentifier::NamedAndIndexed { position, .. } => Some(*position),
            BindingIdentifier::Named(_) => None,
        }
    }

    pub fn has_name(&self) -> bool {
        self.name().is_some()
    }

    pub fn has_position(&self) -> bool {
        self.position().is_some()
    }
}

impl fmt::Display for BindingIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BindingIdentifier::Named(name) => write!(f, ":{}", name),
            BindingIdentifier::Indexed(position) => write!(f, "?{}", position),
            BindingIdentifier::NamedAndIndexed { name, position } => {
                write!(f, ":{} (?{})", name, position)
            }
        }
    }
}
