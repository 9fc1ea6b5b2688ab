//! Constraints between parameters.
//!
//! [`Constraint`] is a closed sum type; every factory validates its operands
//! when the term is built, so an existing `Constraint` is always well-typed.

use crate::error::ValidationError;

use super::parameter::Parameter;
use super::value::{Value, ValueType};

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareOp {
    Equal,
    NotEqual,
    LessThan,
    LessOrEqual,
    GreaterThan,
    GreaterOrEqual,
}

impl CompareOp {
    /// Symbol used in the model language.
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Equal => "=",
            Self::NotEqual => "<>",
            Self::LessThan => "<",
            Self::LessOrEqual => "<=",
            Self::GreaterThan => ">",
            Self::GreaterOrEqual => ">=",
        }
    }

    /// Ordering operators, as opposed to (in)equality.
    pub fn is_relational(self) -> bool {
        !matches!(self, Self::Equal | Self::NotEqual)
    }
}

/// Reference to a parameter by name, remembering its declared type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ParamRef {
    name: String,
    value_type: Option<ValueType>,
}

impl ParamRef {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value_type(&self) -> Option<ValueType> {
        self.value_type
    }

    fn require_type(&self) -> Result<ValueType, ValidationError> {
        self.value_type
            .ok_or_else(|| ValidationError::EmptyParameter(self.name.clone()))
    }
}

impl From<&Parameter> for ParamRef {
    fn from(parameter: &Parameter) -> Self {
        Self {
            name: parameter.name().to_string(),
            value_type: parameter.value_type(),
        }
    }
}

/// Right-hand side of a comparison.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Parameter(ParamRef),
    Value(Value),
}

impl From<Value> for Operand {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

impl From<&Parameter> for Operand {
    fn from(parameter: &Parameter) -> Self {
        Self::Parameter(parameter.into())
    }
}

/// A predicate over parameter values.
#[derive(Debug, Clone, PartialEq)]
pub enum Constraint {
    Comparison {
        op: CompareOp,
        left: ParamRef,
        right: Operand,
    },
    InSet {
        parameter: ParamRef,
        values: Vec<Value>,
        negated: bool,
    },
    Like {
        parameter: ParamRef,
        pattern: String,
    },
    Not(Box<Constraint>),
    And(Box<Constraint>, Box<Constraint>),
    Or(Box<Constraint>, Box<Constraint>),
    IfThen {
        condition: Box<Constraint>,
        then: Box<Constraint>,
        otherwise: Option<Box<Constraint>>,
    },
}

impl Constraint {
    /// Compare a parameter with another parameter or a value.
    ///
    /// Both sides must have the same declared type, ordering operators need
    /// a string or number type, and a parameter cannot be compared with
    /// itself.
    pub fn comparison(
        left: &Parameter,
        op: CompareOp,
        right: impl Into<Operand>,
    ) -> Result<Self, ValidationError> {
        let left = ParamRef::from(left);
        let right = right.into();
        let left_type = left.require_type()?;

        let right_type = match &right {
            Operand::Parameter(other) => {
                if other.name == left.name {
                    return Err(ValidationError::SelfComparison(left.name));
                }
                other.require_type()?
            }
            Operand::Value(value) => value.value_type(),
        };

        if left_type != right_type {
            return Err(ValidationError::TypeMismatch {
                expected: left_type,
                actual: right_type,
            });
        }
        if op.is_relational() && !left_type.supports_relational() {
            return Err(ValidationError::Unsupported {
                operation: op.symbol().to_string(),
                value_type: left_type,
            });
        }

        Ok(Self::Comparison { op, left, right })
    }

    /// Membership (or non-membership when `negated`) in a non-empty set.
    pub fn in_set(
        parameter: &Parameter,
        values: impl IntoIterator<Item = Value>,
        negated: bool,
    ) -> Result<Self, ValidationError> {
        let parameter = ParamRef::from(parameter);
        let values: Vec<Value> = values.into_iter().collect();
        if values.is_empty() {
            return Err(ValidationError::EmptyValueSet(parameter.name));
        }
        let expected = parameter.require_type()?;
        if let Some(bad) = values.iter().find(|v| v.value_type() != expected) {
            return Err(ValidationError::TypeMismatch {
                expected,
                actual: bad.value_type(),
            });
        }
        Ok(Self::InSet {
            parameter,
            values,
            negated,
        })
    }

    /// Wildcard match (`*` and `?`) on a string parameter.
    pub fn like(
        parameter: &Parameter,
        pattern: impl Into<String>,
    ) -> Result<Self, ValidationError> {
        let parameter = ParamRef::from(parameter);
        let value_type = parameter.require_type()?;
        if value_type != ValueType::String {
            return Err(ValidationError::Unsupported {
                operation: "LIKE".to_string(),
                value_type,
            });
        }
        Ok(Self::Like {
            parameter,
            pattern: pattern.into(),
        })
    }

    /// `(self) AND (other)`
    pub fn and(self, other: Constraint) -> Result<Self, ValidationError> {
        Ok(Self::And(self.operand()?, other.operand()?))
    }

    /// `(self) OR (other)`
    pub fn or(self, other: Constraint) -> Result<Self, ValidationError> {
        Ok(Self::Or(self.operand()?, other.operand()?))
    }

    /// `NOT (self)`
    pub fn negate(self) -> Result<Self, ValidationError> {
        Ok(Self::Not(self.operand()?))
    }

    /// `IF (condition) THEN (then)`
    pub fn if_then(condition: Constraint, then: Constraint) -> Result<Self, ValidationError> {
        Ok(Self::IfThen {
            condition: condition.operand()?,
            then: then.operand()?,
            otherwise: None,
        })
    }

    /// `IF (condition) THEN (then) ELSE (otherwise)`
    pub fn if_then_else(
        condition: Constraint,
        then: Constraint,
        otherwise: Constraint,
    ) -> Result<Self, ValidationError> {
        Ok(Self::IfThen {
            condition: condition.operand()?,
            then: then.operand()?,
            otherwise: Some(otherwise.operand()?),
        })
    }

    /// Box `self` as a sub-term. IF rules only exist at the top level.
    fn operand(self) -> Result<Box<Self>, ValidationError> {
        if self.is_if_then() {
            return Err(ValidationError::NestedRule);
        }
        Ok(Box::new(self))
    }

    pub fn is_if_then(&self) -> bool {
        matches!(self, Self::IfThen { .. })
    }

    /// Names of every parameter this constraint mentions, in visit order.
    pub fn parameter_names(&self) -> Vec<&str> {
        let mut names = Vec::new();
        self.collect_names(&mut names);
        names
    }

    fn collect_names<'a>(&'a self, names: &mut Vec<&'a str>) {
        match self {
            Self::Comparison { left, right, .. } => {
                names.push(left.name());
                if let Operand::Parameter(other) = right {
                    names.push(other.name());
                }
            }
            Self::InSet { parameter, .. } | Self::Like { parameter, .. } => {
                names.push(parameter.name());
            }
            Self::Not(inner) => inner.collect_names(names),
            Self::And(left, right) | Self::Or(left, right) => {
                left.collect_names(names);
                right.collect_names(names);
            }
            Self::IfThen {
                condition,
                then,
                otherwise,
            } => {
                condition.collect_names(names);
                then.collect_names(names);
                if let Some(otherwise) = otherwise {
                    otherwise.collect_names(names);
                }
            }
        }
    }
}

/// A constraint as stored in a model, with an optional comment line.
#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
    pub constraint: Constraint,
    pub comment: Option<String>,
}

impl Rule {
    pub fn new(constraint: Constraint) -> Self {
        Self {
            constraint,
            comment: None,
        }
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }
}

impl From<Constraint> for Rule {
    fn from(constraint: Constraint) -> Self {
        Self::new(constraint)
    }
}
