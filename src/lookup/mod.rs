//! Bidirectional mapping between model values and engine tokens.
//!
//! A [`LookupContext`] is built once per (model, settings) pair. It decides
//! the token every declared value (and alias) is written as, and it maps the
//! tokens in the engine's output back onto the model's values.
//!
//! Two encodings exist:
//!
//! - the **lookup key** (`token`): negative prefix + escaped text. This is
//!   what the engine echoes back and what constraints refer to.
//! - the **output token** (`output_token`): the lookup key followed by the
//!   alias chain and the `(weight)` suffix, as written on parameter lines.

mod encode;

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fmt::Write as _;

use uuid::Uuid;

use crate::error::{Error, Result, ValidationError};
use crate::model::{Model, Parameter, RawValue, Value, DEFAULT_WEIGHT};
use crate::settings::Settings;
use crate::tuple::{Tuple, TupleField};

pub(crate) use encode::escape;
use encode::{check_token, enum_text, Delimiters};

/// Identity of a complex value for token assignment.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum ObjectKey {
    Ptr(usize),
    Guid(Uuid),
    Bytes(Vec<u8>),
    Null,
}

impl ObjectKey {
    fn of(raw: &RawValue) -> Option<Self> {
        match raw {
            RawValue::Object(obj) => Some(Self::Ptr(obj.addr())),
            RawValue::Guid(g) => Some(Self::Guid(*g)),
            RawValue::Bytes(b) => Some(Self::Bytes(b.clone())),
            RawValue::Null => Some(Self::Null),
            _ => None,
        }
    }
}

/// Token mapping for one model under one set of settings.
#[derive(Debug)]
pub struct LookupContext<'m> {
    model: &'m Model,
    delimiters: Delimiters,
    case_sensitive: bool,
    /// Per parameter position: folded lookup key -> value index.
    columns: Vec<HashMap<String, usize>>,
    objects: HashMap<ObjectKey, String>,
}

impl<'m> LookupContext<'m> {
    /// Build the mapping for every declared value and alias of `model`.
    pub fn build(model: &'m Model, settings: &Settings) -> Result<Self> {
        let mut ctx = Self {
            model,
            delimiters: Delimiters {
                value: settings.value_delimiter,
                alias: settings.alias_delimiter,
                negative: settings.negative_prefix,
            },
            case_sensitive: settings.case_sensitive,
            columns: Vec::with_capacity(model.parameters().len()),
            objects: HashMap::new(),
        };

        for parameter in model.parameters() {
            let column = ctx.build_column(parameter)?;
            ctx.columns.push(column);
        }

        tracing::debug!(
            parameters = ctx.columns.len(),
            objects = ctx.objects.len(),
            "built lookup context"
        );
        Ok(ctx)
    }

    fn build_column(&mut self, parameter: &Parameter) -> Result<HashMap<String, usize>> {
        let mut column: HashMap<String, usize> = HashMap::new();

        for (index, value) in parameter.values().iter().enumerate() {
            self.register_object(value);

            let mut keys = vec![self.token(value)?];
            for alias in value.aliases() {
                keys.push(self.token(alias)?);
            }

            for key in keys {
                match column.entry(self.fold(key)) {
                    Entry::Vacant(slot) => {
                        slot.insert(index);
                    }
                    Entry::Occupied(slot) => {
                        if parameter.values()[*slot.get()] != *value {
                            return Err(ValidationError::AmbiguousToken {
                                parameter: parameter.name().to_string(),
                                token: slot.key().clone(),
                            }
                            .into());
                        }
                    }
                }
            }
        }

        Ok(column)
    }

    fn register_object(&mut self, value: &Value) {
        if let Some(key) = ObjectKey::of(value.raw()) {
            let next = self.objects.len() + 1;
            self.objects
                .entry(key)
                .or_insert_with(|| format!("o_{next:x}"));
        }
    }

    fn fold(&self, key: String) -> String {
        if self.case_sensitive {
            key
        } else {
            key.to_lowercase()
        }
    }

    /// The model this context was built from.
    pub fn model(&self) -> &'m Model {
        self.model
    }

    /// Lookup key for `value`: negative prefix plus escaped text, no weight
    /// and no aliases.
    pub fn token(&self, value: &Value) -> Result<String> {
        let text = match value.raw() {
            RawValue::String(s) => escape(s),
            RawValue::Int32(n) => n.to_string(),
            RawValue::Int64(n) => n.to_string(),
            RawValue::Char(c) => escape(&c.to_string()),
            RawValue::Bool(b) => b.to_string(),
            RawValue::Enum(tag) => enum_text(&tag.name),
            raw => {
                let key = ObjectKey::of(raw).ok_or_else(|| {
                    ValidationError::UnknownValue(value.to_string())
                })?;
                self.objects
                    .get(&key)
                    .cloned()
                    .ok_or_else(|| ValidationError::UnknownValue(value.to_string()))?
            }
        };

        check_token(&text, self.delimiters)?;

        if value.is_negative() {
            Ok(format!("{}{}", self.delimiters.negative, text))
        } else {
            Ok(text)
        }
    }

    /// Token written on a parameter line: the lookup key, the alias chain,
    /// and the weight suffix.
    ///
    /// The engine doubles negation on aliases that repeat the prefix, so the
    /// prefix is dropped after each alias delimiter. Only the end of the
    /// chain carries the weight.
    pub fn output_token(&self, value: &Value) -> Result<String> {
        let mut out = self.token(value)?;

        for alias in value.aliases() {
            let key = self.token(alias)?;
            out.push(self.delimiters.alias);
            out.push_str(key.strip_prefix(self.delimiters.negative).unwrap_or(&key));
        }

        if value.weight() != DEFAULT_WEIGHT {
            let _ = write!(out, " ({})", value.weight());
        }
        Ok(out)
    }

    /// Position of the parameter called `name`.
    pub fn parameter_index(&self, name: &str) -> Option<usize> {
        self.model
            .parameters()
            .iter()
            .position(|p| p.name() == name)
    }

    /// Resolve a token emitted by the engine for the parameter at `index`.
    ///
    /// A miss means the engine produced something the model never declared.
    pub fn find_value(&self, index: usize, token: &str) -> Result<&'m Value> {
        let parameter = self.model.parameters().get(index).ok_or_else(|| {
            Error::integrity(format!("#{index}"), token, "no parameter at this position")
        })?;

        self.columns[index]
            .get(&self.fold(token.to_string()))
            .map(|&value_index| &parameter.values()[value_index])
            .ok_or_else(|| {
                Error::integrity(
                    parameter.name(),
                    token,
                    "engine emitted a token the model did not declare",
                )
            })
    }

    /// Convert a parsed table (header row first) into tuples.
    pub fn tuples(&self, table: &[Vec<String>]) -> Result<Vec<Tuple>> {
        let Some((header, rows)) = table.split_first() else {
            return Ok(Vec::new());
        };

        let indices = header
            .iter()
            .map(|name| {
                self.parameter_index(name).ok_or_else(|| {
                    Error::integrity(name, "", "engine output names an undeclared parameter")
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let mut seen = vec![false; self.model.parameters().len()];
        for (&index, name) in indices.iter().zip(header) {
            if std::mem::replace(&mut seen[index], true) {
                return Err(Error::integrity(
                    name,
                    "",
                    "engine output repeats a parameter column",
                ));
            }
        }
        if let Some(missing) = seen.iter().position(|&present| !present) {
            return Err(Error::integrity(
                self.model.parameters()[missing].name(),
                "",
                "engine output omits a declared parameter",
            ));
        }

        rows.iter()
            .map(|row| {
                if row.len() != indices.len() {
                    return Err(Error::integrity(
                        "<row>",
                        row.join("\t"),
                        format!("expected {} fields, got {}", indices.len(), row.len()),
                    ));
                }
                let fields = header
                    .iter()
                    .zip(&indices)
                    .zip(row)
                    .map(|((name, &index), token)| {
                        Ok(TupleField {
                            parameter: name.clone(),
                            value: self.find_value(index, token)?.clone(),
                        })
                    })
                    .collect::<Result<Vec<_>>>()?;
                Ok(Tuple::new(fields))
            })
            .collect()
    }
}
