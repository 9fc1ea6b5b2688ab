//! Model parameters.

use crate::error::ValidationError;

use super::constraint::{CompareOp, Constraint, Operand};
use super::value::{Value, ValueType};

/// A named, typed set of legal values.
///
/// The parameter's type is fixed by the first value added; every later value
/// must agree with it.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    name: String,
    values: Vec<Value>,
    value_type: Option<ValueType>,
    comment: Option<String>,
}

impl Parameter {
    /// Create an empty parameter.
    pub fn new(name: impl Into<String>) -> Result<Self, ValidationError> {
        let name = name.into();
        validate_name(&name)?;
        Ok(Self {
            name,
            values: Vec::new(),
            value_type: None,
            comment: None,
        })
    }

    /// Create a parameter holding `values`, in order.
    pub fn with_values(
        name: impl Into<String>,
        values: impl IntoIterator<Item = Value>,
    ) -> Result<Self, ValidationError> {
        let mut parameter = Self::new(name)?;
        for value in values {
            parameter.add_value(value)?;
        }
        Ok(parameter)
    }

    /// Append a value, enforcing type homogeneity.
    pub fn add_value(&mut self, value: Value) -> Result<(), ValidationError> {
        match self.value_type {
            Some(expected) if expected != value.value_type() => {
                return Err(ValidationError::TypeMismatch {
                    expected,
                    actual: value.value_type(),
                });
            }
            Some(_) => {}
            None => self.value_type = Some(value.value_type()),
        }
        self.values.push(value);
        Ok(())
    }

    /// Append a value, consuming and returning the parameter.
    pub fn with_value(mut self, value: Value) -> Result<Self, ValidationError> {
        self.add_value(value)?;
        Ok(self)
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Declared type, or `None` before the first value is added.
    pub fn value_type(&self) -> Option<ValueType> {
        self.value_type
    }

    pub fn comment(&self) -> Option<&str> {
        self.comment.as_deref()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    // ==================== Constraint factories ====================

    /// `[self] = operand`
    pub fn equal(&self, operand: impl Into<Operand>) -> Result<Constraint, ValidationError> {
        Constraint::comparison(self, CompareOp::Equal, operand)
    }

    /// `[self] <> operand`
    pub fn not_equal(&self, operand: impl Into<Operand>) -> Result<Constraint, ValidationError> {
        Constraint::comparison(self, CompareOp::NotEqual, operand)
    }

    /// `[self] < operand`
    pub fn less_than(&self, operand: impl Into<Operand>) -> Result<Constraint, ValidationError> {
        Constraint::comparison(self, CompareOp::LessThan, operand)
    }

    /// `[self] <= operand`
    pub fn less_or_equal(
        &self,
        operand: impl Into<Operand>,
    ) -> Result<Constraint, ValidationError> {
        Constraint::comparison(self, CompareOp::LessOrEqual, operand)
    }

    /// `[self] > operand`
    pub fn greater_than(
        &self,
        operand: impl Into<Operand>,
    ) -> Result<Constraint, ValidationError> {
        Constraint::comparison(self, CompareOp::GreaterThan, operand)
    }

    /// `[self] >= operand`
    pub fn greater_or_equal(
        &self,
        operand: impl Into<Operand>,
    ) -> Result<Constraint, ValidationError> {
        Constraint::comparison(self, CompareOp::GreaterOrEqual, operand)
    }

    /// `[self] IN {values}`
    pub fn in_set(
        &self,
        values: impl IntoIterator<Item = Value>,
    ) -> Result<Constraint, ValidationError> {
        Constraint::in_set(self, values, false)
    }

    /// `[self] NOT IN {values}`
    pub fn not_in(
        &self,
        values: impl IntoIterator<Item = Value>,
    ) -> Result<Constraint, ValidationError> {
        Constraint::in_set(self, values, true)
    }

    /// `[self] LIKE "pattern"`; string parameters only.
    pub fn like(&self, pattern: impl Into<String>) -> Result<Constraint, ValidationError> {
        Constraint::like(self, pattern)
    }
}

/// Names end up between `[` `]` in constraints, before `:` in parameter
/// lines, inside `{..} @ N` sub-model lists, and head the engine's
/// tab-separated output. A leading `#` would turn the line into a comment.
fn validate_name(name: &str) -> Result<(), ValidationError> {
    let reserved = |c: char| {
        matches!(
            c,
            ':' | '[' | ']' | '{' | '}' | ',' | '@' | '\t' | '\r' | '\n'
        )
    };
    if name.trim().is_empty()
        || name.starts_with('#')
        || name.chars().any(reserved)
        || name.trim() != name
    {
        return Err(ValidationError::InvalidName(name.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_fixed_by_first_value() {
        let mut p = Parameter::new("Size").unwrap();
        assert_eq!(p.value_type(), None);

        p.add_value(Value::int32(1)).unwrap();
        p.add_value(Value::int64(2)).unwrap();
        assert_eq!(p.value_type(), Some(ValueType::Number));

        let err = p.add_value(Value::string("3")).unwrap_err();
        assert_eq!(
            err,
            ValidationError::TypeMismatch {
                expected: ValueType::Number,
                actual: ValueType::String,
            }
        );
        assert_eq!(p.len(), 2);
    }

    #[test]
    fn test_plain_values_are_not_deduplicated() {
        let p = Parameter::with_values("A", [Value::string("x"), Value::string("x")]).unwrap();
        assert_eq!(p.len(), 2);
    }

    #[test]
    fn test_invalid_names() {
        for name in [
            "", "  ", "a:b", "[a]", "tab\tname", " padded", "#C", "C,D", "{A", "B}", "A@2",
        ] {
            assert!(
                matches!(Parameter::new(name), Err(ValidationError::InvalidName(_))),
                "{name:?} should be rejected"
            );
        }
        assert!(Parameter::new("Font Size").is_ok());
        assert!(Parameter::new("Issue #4").is_ok());
    }

    #[test]
    fn test_empty_value_sets_fail() {
        let p = Parameter::with_values("A", [Value::string("x")]).unwrap();
        assert_eq!(
            p.in_set(Vec::new()).unwrap_err(),
            ValidationError::EmptyValueSet("A".to_string())
        );
        assert_eq!(
            p.not_in(Vec::new()).unwrap_err(),
            ValidationError::EmptyValueSet("A".to_string())
        );
    }
}
