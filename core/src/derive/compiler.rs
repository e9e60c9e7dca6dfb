use super::metadata::{ParameterMetadata, ParameterMetadataProvider};
use super::part::{IgnoreCaseMode, OperatorKind, Part, PartTree};
use super::predicate::{ComparisonOp, Operand, Predicate};
use crate::bind::ArgumentAccessor;
use crate::binding::{EscapeCharacter, ParameterBinding};
use crate::error::CompileError;
use crate::method::MethodSignature;
use crate::model::{EntityModel, PropertyPath};
use crate::paging::Sort;
use crate::value::ValueType;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum Selection {
    Entity,
    Count { distinct: bool },
    /// Identifier attributes only, for existence checks.
    Identifiers(Vec<PropertyPath>),
}

/// Compiled derived query, ready to hand to a backend.
#[derive(Debug, Clone, PartialEq)]
pub struct CriteriaQuery {
    pub entity: String,
    pub predicate: Option<Predicate>,
    pub selection: Selection,
    pub distinct: bool,
    pub order: Sort,
    pub max_results: Option<usize>,
    pub parameters: Vec<ParameterMetadata>,
}

impl CriteriaQuery {
    /// Bindings for every placeholder the predicate references.
    pub fn bindings(&self) -> Vec<ParameterBinding> {
        self.parameters
            .iter()
            .filter(|p| !p.is_null_placeholder)
            .map(ParameterMetadata::binding)
            .collect()
    }

    pub fn with_order(&self, order: Sort) -> Self {
        Self {
            order,
            ..self.clone()
        }
    }
}

impl fmt::Display for CriteriaQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "select ")?;
        match &self.selection {
            Selection::Entity if self.distinct => write!(f, "distinct {}", self.entity)?,
            Selection::Entity => write!(f, "{}", self.entity)?,
            Selection::Count { distinct: true } => write!(f, "count(distinct {})", self.entity)?,
            Selection::Count { distinct: false } => write!(f, "count({})", self.entity)?,
            Selection::Identifiers(ids) => {
                let ids: Vec<String> = ids.iter().map(PropertyPath::dot_path).collect();
                write!(f, "{}", ids.join(", "))?
            }
        }
        write!(f, " from {}", self.entity)?;
        if let Some(predicate) = &self.predicate {
            write!(f, " where {}", predicate)?;
        }
        if self.order.is_sorted() {
            let orders: Vec<String> = self
                .order
                .orders()
                .iter()
                .map(|o| format!("{} {}", o.property, o.direction))
                .collect();
            write!(f, " order by {}", orders.join(", "))?;
        }
        if let Some(max) = self.max_results {
            write!(f, " limit {}", max)?;
        }
        Ok(())
    }
}

/// Turns a [`PartTree`] into a [`CriteriaQuery`].
pub struct PredicateCompiler<'a> {
    model: &'a dyn EntityModel,
    escape: EscapeCharacter,
}

impl<'a> PredicateCompiler<'a> {
    pub fn new(model: &'a dyn EntityModel, escape: EscapeCharacter) -> Self {
        Self { model, escape }
    }

    /// Compiles `tree`. With `arguments`, absent values compile to null tests.
    pub fn compile(
        &self,
        tree: &PartTree,
        signature: &MethodSignature,
        arguments: Option<&dyn ArgumentAccessor>,
    ) -> Result<CriteriaQuery, CompileError> {
        let mut provider = ParameterMetadataProvider::new(signature, arguments, tree.argument_count());

        let mut predicate: Option<Predicate> = None;
        for (index, group) in tree.groups.iter().enumerate() {
            let mut conjunction: Option<Predicate> = None;
            for part in &group.parts {
                let built = OperatorPredicateBuilder {
                    entity: &tree.entity,
                    model: self.model,
                    escape: self.escape,
                    part,
                }
                .build(&mut provider)?;
                conjunction = Some(match conjunction {
                    Some(existing) => existing.and(built),
                    None => built,
                });
            }

            let conjunction = conjunction.ok_or(CompileError::EmptyConjunction(index))?;
            predicate = Some(match predicate {
                Some(existing) => existing.or(conjunction),
                None => conjunction,
            });
        }
        let parameters = provider.finish()?;

        let subject = tree.subject;
        let (selection, max_results) = if subject.count {
            (Selection::Count { distinct: subject.distinct }, subject.max_results)
        } else if subject.exists {
            (Selection::Identifiers(self.model.id_properties(&tree.entity)), Some(1))
        } else {
            (Selection::Entity, subject.max_results)
        };

        let query = CriteriaQuery {
            entity: tree.entity.clone(),
            predicate,
            selection,
            distinct: subject.distinct,
            order: if subject.delete { Sort::unsorted() } else { tree.sort.clone() },
            max_results,
            parameters,
        };
        tracing::debug!("Compiled {} into {}", signature.name, query);
        Ok(query)
    }
}

struct OperatorPredicateBuilder<'c> {
    entity: &'c str,
    model: &'c dyn EntityModel,
    escape: EscapeCharacter,
    part: &'c Part,
}

impl OperatorPredicateBuilder<'_> {
    fn build(&self, provider: &mut ParameterMetadataProvider<'_>) -> Result<Predicate, CompileError> {
        let part = self.part;
        let property = &part.property;
        let kind = self
            .model
            .property(self.entity, property)
            .ok_or_else(|| CompileError::UnknownProperty {
                entity: self.entity.to_string(),
                property: property.dot_path(),
            })?;
        let value_type = kind.value_type();
        let path = Operand::path(property);

        match part.operator {
            OperatorKind::Between => {
                let ignore_case = self.ignore_case(value_type)?;
                let low = provider.next(part, value_type, ignore_case, false)?;
                let high = provider.next(part, value_type, ignore_case, false)?;
                Ok(Predicate::Between {
                    operand: path.upper_if(ignore_case),
                    low: Operand::Parameter(low.position).upper_if(ignore_case),
                    high: Operand::Parameter(high.position).upper_if(ignore_case),
                })
            }
            OperatorKind::After | OperatorKind::GreaterThan => {
                self.comparison(provider, path, value_type, ComparisonOp::Gt)
            }
            OperatorKind::GreaterThanEqual => {
                self.comparison(provider, path, value_type, ComparisonOp::GtEq)
            }
            OperatorKind::Before | OperatorKind::LessThan => {
                self.comparison(provider, path, value_type, ComparisonOp::Lt)
            }
            OperatorKind::LessThanEqual => {
                self.comparison(provider, path, value_type, ComparisonOp::LtEq)
            }
            OperatorKind::IsNull => Ok(Predicate::IsNull(path)),
            OperatorKind::IsNotNull => Ok(Predicate::IsNotNull(path)),
            OperatorKind::In | OperatorKind::NotIn => {
                let ignore_case = self.ignore_case(value_type)?;
                let parameter = provider.next(part, ValueType::Collection, ignore_case, false)?;
                Ok(Predicate::In {
                    operand: path.upper_if(ignore_case),
                    values: Operand::Parameter(parameter.position).upper_if(ignore_case),
                    negated: part.operator == OperatorKind::NotIn,
                })
            }
            OperatorKind::StartingWith
            | OperatorKind::EndingWith
            | OperatorKind::Containing
            | OperatorKind::NotContaining
                if kind.is_collection() =>
            {
                let parameter = provider.next(part, value_type, false, true)?;
                Ok(Predicate::MemberOf {
                    element: Operand::Parameter(parameter.position),
                    collection: path,
                    negated: part.operator == OperatorKind::NotContaining,
                })
            }
            OperatorKind::StartingWith
            | OperatorKind::EndingWith
            | OperatorKind::Containing
            | OperatorKind::NotContaining
            | OperatorKind::Like
            | OperatorKind::NotLike => {
                let ignore_case = self.ignore_case(value_type)?;
                let parameter = provider.next(part, ValueType::Text, ignore_case, false)?;
                Ok(Predicate::Like {
                    operand: path.upper_if(ignore_case),
                    pattern: Operand::Parameter(parameter.position).upper_if(ignore_case),
                    negated: matches!(
                        part.operator,
                        OperatorKind::NotLike | OperatorKind::NotContaining
                    ),
                    escape: self.escape.0,
                })
            }
            OperatorKind::True => Ok(Predicate::IsTrue(path)),
            OperatorKind::False => Ok(Predicate::IsFalse(path)),
            OperatorKind::SimpleProperty | OperatorKind::NegatingSimpleProperty => {
                let negated = part.operator == OperatorKind::NegatingSimpleProperty;
                let ignore_case = self.ignore_case(value_type)?;
                let parameter = provider.next(part, value_type, ignore_case, false)?;
                if parameter.is_null_placeholder {
                    return Ok(if negated {
                        Predicate::IsNotNull(path)
                    } else {
                        Predicate::IsNull(path)
                    });
                }
                Ok(Predicate::Comparison {
                    op: if negated { ComparisonOp::NotEq } else { ComparisonOp::Eq },
                    left: path.upper_if(ignore_case),
                    right: Operand::Parameter(parameter.position).upper_if(ignore_case),
                })
            }
            OperatorKind::IsEmpty | OperatorKind::IsNotEmpty => {
                if !kind.is_collection() {
                    return Err(CompileError::NotACollection(property.dot_path()));
                }
                Ok(if part.operator == OperatorKind::IsEmpty {
                    Predicate::IsEmpty(path)
                } else {
                    Predicate::IsNotEmpty(path)
                })
            }
            OperatorKind::Near | OperatorKind::Within | OperatorKind::Regex | OperatorKind::Exists => {
                Err(CompileError::UnsupportedKeyword {
                    keyword: part.operator.to_string(),
                    property: property.dot_path(),
                })
            }
        }
    }

    fn comparison(
        &self,
        provider: &mut ParameterMetadataProvider<'_>,
        path: Operand,
        value_type: ValueType,
        op: ComparisonOp,
    ) -> Result<Predicate, CompileError> {
        let parameter = provider.next(self.part, value_type, false, false)?;
        Ok(Predicate::Comparison {
            op,
            left: path,
            right: Operand::Parameter(parameter.position),
        })
    }

    /// Whether to case-fold; an explicit request on a non-text property fails.
    fn ignore_case(&self, value_type: ValueType) -> Result<bool, CompileError> {
        match self.part.ignore_case {
            IgnoreCaseMode::Never => Ok(false),
            IgnoreCaseMode::WhenPossible => Ok(value_type.is_textual()),
            IgnoreCaseMode::Always if value_type.is_textual() || value_type == ValueType::Any => {
                Ok(true)
            }
            IgnoreCaseMode::Always => Err(CompileError::IgnoreCaseNotSupported {
                property: self.part.property.dot_path(),
                value_type: value_type.to_string(),
            }),
        }
    }
}
