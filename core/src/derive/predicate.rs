use crate::model::PropertyPath;
use std::fmt;

/// Value source inside a predicate.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
	Path(PropertyPath),
	/// 1-based placeholder position.
	Parameter(usize),
	Upper(Box<Operand>),
}

impl Operand {
	pub fn path(path: &PropertyPath) -> Self {
		Operand::Path(path.clone())
	}

	pub fn upper(self) -> Self {
		Operand::Upper(Box::new(self))
	}

	pub fn upper_if(self, condition: bool) -> Self {
		if condition { self.upper() } else { self }
	}
}

impl fmt::Display for Operand {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Operand::Path(path) => write!(f, "{}", path),
			Operand::Parameter(position) => write!(f, "?{}", position),
			Operand::Upper(inner) => write!(f, "upper({})", inner),
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonOp {
	Eq,
	NotEq,
	Lt,
	Gt,
	LtEq,
	GtEq,
}

impl fmt::Display for ComparisonOp {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let symbol = match self {
			ComparisonOp::Eq => "=",
			ComparisonOp::NotEq => "<>",
			ComparisonOp::Lt => "<",
			ComparisonOp::Gt => ">",
			ComparisonOp::LtEq => "<=",
			ComparisonOp::GtEq => ">=",
		};
		f.write_str(symbol)
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JunctionOp {
	And,
	Or,
}

/// Backend-neutral filter of a derived query.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
	Junction {
		op: JunctionOp,
		left: Box<Predicate>,
		right: Box<Predicate>,
	},
	Comparison {
		op: ComparisonOp,
		left: Operand,
		right: Operand,
	},
	Between {
		operand: Operand,
		low: Operand,
		high: Operand,
	},
	IsNull(Operand),
	IsNotNull(Operand),
	In {
		operand: Operand,
		values: Operand,
		negated: bool,
	},
	/// The element is contained in a collection-valued property.
	MemberOf {
		element: Operand,
		collection: Operand,
		negated: bool,
	},
	Like {
		operand: Operand,
		pattern: Operand,
		negated: bool,
		escape: char,
	},
	IsTrue(Operand),
	IsFalse(Operand),
	IsEmpty(Operand),
	IsNotEmpty(Operand),
}

impl Predicate {
	pub fn and(self, other: Predicate) -> Predicate {
		Predicate::Junction {
			op: JunctionOp::And,
			left: Box::new(self),
			right: Box::new(other),
		}
	}

	pub fn or(self, other: Predicate) -> Predicate {
		Predicate::Junction {
			op: JunctionOp::Or,
			left: Box::new(self),
			right: Box::new(other),
		}
	}

	fn is_disjunction(&self) -> bool {
		matches!(
			self,
			Predicate::Junction {
				op: JunctionOp::Or,
				..
			}
		)
	}
}

impl fmt::Display for Predicate {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Predicate::Junction { op: JunctionOp::Or, left, right } => {
				write!(f, "{} or {}", left, right)
			}
			Predicate::Junction { op: JunctionOp::And, left, right } => {
				for (i, side) in [left, right].into_iter().enumerate() {
					if i > 0 {
						write!(f, " and ")?;
					}
					if side.is_disjunction() {
						write!(f, "({})", side)?;
					} else {
						write!(f, "{}", side)?;
					}
				}
				Ok(())
			}
			Predicate::Comparison { op, left, right } => write!(f, "{} {} {}", left, op, right),
			Predicate::Between { operand, low, high } => {
				write!(f, "{} between {} and {}", operand, low, high)
			}
			Predicate::IsNull(operand) => write!(f, "{} is null", operand),
			Predicate::IsNotNull(operand) => write!(f, "{} is not null", operand),
			Predicate::In { operand, values, negated } => {
				let not = if *negated { "not " } else { "" };
				write!(f, "{} {}in {}", operand, not, values)
			}
			Predicate::MemberOf { element, collection, negated } => {
				let not = if *negated { "not " } else { "" };
				write!(f, "{} {}member of {}", element, not, collection)
			}
			Predicate::Like { operand, pattern, negated, .. } => {
				let not = if *negated { "not " } else { "" };
				write!(f, "{} {}like {}", operand, not, pattern)
			}
			Predicate::IsTrue(operand) => write!(f, "{} = true", operand),
			Predicate::IsFalse(operand) => write!(f, "{} = false", operand),
			Predicate::IsEmpty(operand) => write!(f, "{} is empty", operand),
			Predicate::IsNotEmpty(operand) => write!(f, "{} is not empty", operand),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn path(p: &str) -> Operand {
		Operand::Path(PropertyPath::parse(p))
	}

	#[test]
	fn renders_nested_junctions() {
		let age = Predicate::Comparison {
			op: ComparisonOp::Gt,
			left: path("age"),
			right: Operand::Parameter(1),
		};
		let name = Predicate::Like {
			operand: path("name").upper(),
			pattern: Operand::Parameter(2).upper(),
			negated: false,
			escape: '\\',
		};
		let active = Predicate::IsTrue(path("active"));

		assert_eq!(
			age.clone().and(name.clone()).to_string(),
			"age > ?1 and upper(name) like upper(?2)"
		);
		assert_eq!(
			age.clone().or(active.clone()).and(name).to_string(),
			"(age > ?1 or active = true) and upper(name) like upper(?2)"
		);
		assert_eq!(
			Predicate::MemberOf {
				element: Operand::Parameter(1),
				collection: path("tags"),
				negated: true,
			}
			.to_string(),
			"?1 not member of tags"
		);
	}
}
