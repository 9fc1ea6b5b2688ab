//! Sub-models: parameter subsets covered at their own order.

use crate::error::ValidationError;

use super::constraint::ParamRef;
use super::parameter::Parameter;

/// A group of parameters combined at `order` instead of the model's order.
#[derive(Debug, Clone, PartialEq)]
pub struct SubModel {
    order: usize,
    parameters: Vec<ParamRef>,
    comment: Option<String>,
}

impl SubModel {
    /// Fails unless `2 <= order <= parameters.len()`.
    pub fn new(order: usize, parameters: &[&Parameter]) -> Result<Self, ValidationError> {
        if order < 2 || order > parameters.len() {
            return Err(ValidationError::InvalidOrder {
                order,
                parameter_count: parameters.len(),
            });
        }
        Ok(Self {
            order,
            parameters: parameters.iter().map(|p| ParamRef::from(*p)).collect(),
            comment: None,
        })
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    pub fn order(&self) -> usize {
        self.order
    }

    pub fn parameters(&self) -> &[ParamRef] {
        &self.parameters
    }

    pub fn parameter_names(&self) -> impl Iterator<Item = &str> {
        self.parameters.iter().map(ParamRef::name)
    }

    pub fn comment(&self) -> Option<&str> {
        self.comment.as_deref()
    }
}
