//! Rendering models into the engine's input language.
//!
//! The output is a pure function of the model and the lookup context; it is
//! hashed into cache keys, so it must stay byte-for-byte deterministic.
//!
//! Layout:
//!
//! ```text
//! # model comment
//! Name: v1, v2, v3
//!
//! {A, B, C} @ 3
//!
//! IF ([A] = "x") THEN ([B] > 2);
//! [C] <> "y";
//! ```

use crate::error::{Result, ValidationError};
use crate::lookup::{escape, LookupContext};
use crate::model::{
    Constraint, Model, Operand, ParamRef, Parameter, Rule, SubModel, Value, ValueKind, ValueType,
};
use crate::settings::Settings;

/// Render `model` under `settings`.
pub fn render_model(model: &Model, settings: &Settings) -> Result<String> {
    let lookup = model.lookup_context(settings)?;
    ModelWriter::new(&lookup, settings).write(model)
}

/// Writes model entities as engine input text.
pub struct ModelWriter<'a, 'm> {
    lookup: &'a LookupContext<'m>,
    settings: &'a Settings,
}

impl<'a, 'm> ModelWriter<'a, 'm> {
    pub fn new(lookup: &'a LookupContext<'m>, settings: &'a Settings) -> Self {
        Self { lookup, settings }
    }

    /// Render a whole model.
    pub fn write(&self, model: &Model) -> Result<String> {
        let mut lines = Vec::new();

        push_comment(&mut lines, model.comment());
        for parameter in model.parameters() {
            push_comment(&mut lines, parameter.comment());
            lines.push(self.write_parameter(parameter)?);
        }

        lines.push(String::new());
        for sub_model in model.sub_models() {
            push_comment(&mut lines, sub_model.comment());
            lines.push(self.write_sub_model(sub_model)?);
        }

        lines.push(String::new());
        for rule in model.if_then_rules().iter().chain(model.constraints()) {
            push_comment(&mut lines, rule.comment.as_deref());
            lines.push(self.write_rule(rule)?);
        }

        let mut text = lines.join("\n");
        text.push('\n');
        Ok(text)
    }

    /// `Name: v1, v2`
    pub fn write_parameter(&self, parameter: &Parameter) -> Result<String> {
        if parameter.is_empty() {
            return Err(ValidationError::EmptyParameter(parameter.name().to_string()).into());
        }
        let separator = format!("{} ", self.settings.value_delimiter);
        let tokens = parameter
            .values()
            .iter()
            .map(|v| self.lookup.output_token(v))
            .collect::<Result<Vec<_>>>()?;
        Ok(format!("{}: {}", parameter.name(), tokens.join(&separator)))
    }

    /// `{A, B} @ 2`
    pub fn write_sub_model(&self, sub_model: &SubModel) -> Result<String> {
        let names = sub_model
            .parameters()
            .iter()
            .map(|p| self.known(p).map(ParamRef::name))
            .collect::<Result<Vec<_>>>()?;
        Ok(format!("{{{}}} @ {}", names.join(", "), sub_model.order()))
    }

    /// A top-level rule, terminated by `;`.
    pub fn write_rule(&self, rule: &Rule) -> Result<String> {
        Ok(format!("{};", self.write_term(&rule.constraint)?))
    }

    /// A constraint expression without the terminating `;`.
    pub fn write_term(&self, constraint: &Constraint) -> Result<String> {
        let text = match constraint {
            Constraint::Comparison { op, left, right } => {
                let right = match right {
                    Operand::Parameter(other) => self.reference(other)?,
                    Operand::Value(value) => self.literal(value)?,
                };
                format!("{} {} {}", self.reference(left)?, op.symbol(), right)
            }
            Constraint::InSet {
                parameter,
                values,
                negated,
            } => {
                let literals = values
                    .iter()
                    .map(|v| self.literal(v))
                    .collect::<Result<Vec<_>>>()?;
                let keyword = if *negated { "NOT IN" } else { "IN" };
                format!(
                    "{} {} {{{}}}",
                    self.reference(parameter)?,
                    keyword,
                    literals.join(", ")
                )
            }
            Constraint::Like { parameter, pattern } => {
                format!("{} LIKE \"{}\"", self.reference(parameter)?, escape(pattern))
            }
            Constraint::Not(inner) => format!("NOT ({})", self.write_term(inner)?),
            Constraint::And(left, right) => format!(
                "(({}) AND ({}))",
                self.write_term(left)?,
                self.write_term(right)?
            ),
            Constraint::Or(left, right) => format!(
                "(({}) OR ({}))",
                self.write_term(left)?,
                self.write_term(right)?
            ),
            Constraint::IfThen {
                condition,
                then,
                otherwise,
            } => {
                let mut text = format!(
                    "IF ({}) THEN ({})",
                    self.write_term(condition)?,
                    self.write_term(then)?
                );
                if let Some(otherwise) = otherwise {
                    text.push_str(&format!(" ELSE ({})", self.write_term(otherwise)?));
                }
                text
            }
        };
        Ok(text)
    }

    fn known<'p>(&self, parameter: &'p ParamRef) -> Result<&'p ParamRef> {
        match self.lookup.parameter_index(parameter.name()) {
            Some(_) => Ok(parameter),
            None => Err(ValidationError::UnknownParameter(parameter.name().to_string()).into()),
        }
    }

    fn reference(&self, parameter: &ParamRef) -> Result<String> {
        Ok(format!("[{}]", self.known(parameter)?.name()))
    }

    /// Plain non-negative numbers are bare; everything else is quoted.
    fn literal(&self, value: &Value) -> Result<String> {
        let token = self.lookup.token(value)?;
        let bare = value.value_type() == ValueType::Number
            && value.kind() != ValueKind::Char
            && !value.is_negative();
        if bare {
            Ok(token)
        } else {
            Ok(format!("\"{token}\""))
        }
    }
}

fn push_comment(lines: &mut Vec<String>, comment: Option<&str>) {
    if let Some(comment) = comment.filter(|c| !c.trim().is_empty()) {
        for line in comment.lines() {
            lines.push(format!("# {line}"));
        }
    }
}
