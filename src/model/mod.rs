//! Declarative generation models.
//!
//! A [`Model`] aggregates parameters, constraints, if-then rules and
//! sub-models. It is the unit that gets rendered into the engine's input
//! language and generated from.
//!
//! ## Example
//!
//! ```rust,ignore
//! use pict_core::model::{Constraint, Model, Parameter, Value};
//!
//! let os = Parameter::with_values("OS", [Value::string("Win"), Value::string("Mac")])?;
//! let ram = Parameter::with_values("RAM", [Value::int32(4), Value::int32(8)])?;
//!
//! let mut model = Model::new();
//! model.add_constraint(Constraint::if_then(
//!     os.equal(Value::string("Mac"))?,
//!     ram.greater_than(Value::int32(4))?,
//! )?);
//! model.add_parameter(os)?;
//! model.add_parameter(ram)?;
//! ```

mod constraint;
mod parameter;
mod submodel;
mod value;

pub use constraint::{CompareOp, Constraint, Operand, ParamRef, Rule};
pub use parameter::Parameter;
pub use submodel::SubModel;
pub use value::{EnumTag, ObjectRef, RawValue, Value, ValueKind, ValueType, DEFAULT_WEIGHT};

use crate::error::{Result, ValidationError};
use crate::lookup::LookupContext;
use crate::settings::Settings;

/// A complete generation model.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Model {
    parameters: Vec<Parameter>,
    constraints: Vec<Rule>,
    if_then_rules: Vec<Rule>,
    sub_models: Vec<SubModel>,
    comment: Option<String>,
}

impl Model {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    /// Append a parameter. Names are unique within a model.
    pub fn add_parameter(&mut self, parameter: Parameter) -> std::result::Result<(), ValidationError> {
        if self.parameter(parameter.name()).is_some() {
            return Err(ValidationError::DuplicateParameter(
                parameter.name().to_string(),
            ));
        }
        self.parameters.push(parameter);
        Ok(())
    }

    /// Append a constraint. If-then rules go to their own list.
    pub fn add_constraint(&mut self, rule: impl Into<Rule>) {
        let rule = rule.into();
        if rule.constraint.is_if_then() {
            self.if_then_rules.push(rule);
        } else {
            self.constraints.push(rule);
        }
    }

    pub fn add_sub_model(&mut self, sub_model: SubModel) {
        self.sub_models.push(sub_model);
    }

    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    pub fn parameter(&self, name: &str) -> Option<&Parameter> {
        self.parameters.iter().find(|p| p.name() == name)
    }

    /// Constraints other than if-then rules.
    pub fn constraints(&self) -> &[Rule] {
        &self.constraints
    }

    pub fn if_then_rules(&self) -> &[Rule] {
        &self.if_then_rules
    }

    pub fn sub_models(&self) -> &[SubModel] {
        &self.sub_models
    }

    pub fn comment(&self) -> Option<&str> {
        self.comment.as_deref()
    }

    /// Build the token mapping used to render this model and to read the
    /// engine's output back.
    pub fn lookup_context(&self, settings: &Settings) -> Result<LookupContext<'_>> {
        LookupContext::build(self, settings)
    }
}
