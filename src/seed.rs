//! Seeding files.
//!
//! A seeding file lists rows (complete or partial) the engine must include
//! in its output. The format mirrors the engine's own output: a
//! tab-separated header of parameter names, then one tab-separated row per
//! seed, with empty cells for unbound parameters.

use std::path::Path;

use crate::error::{Error, Result, ValidationError};
use crate::lookup::LookupContext;
use crate::model::Value;

/// Rows to seed a generation with.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SeedRows {
    rows: Vec<Vec<(String, Value)>>,
}

impl SeedRows {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one row of `(parameter name, value)` bindings.
    pub fn add_row<I, S>(&mut self, bindings: I)
    where
        I: IntoIterator<Item = (S, Value)>,
        S: Into<String>,
    {
        self.rows
            .push(bindings.into_iter().map(|(n, v)| (n.into(), v)).collect());
    }

    pub fn with_row<I, S>(mut self, bindings: I) -> Self
    where
        I: IntoIterator<Item = (S, Value)>,
        S: Into<String>,
    {
        self.add_row(bindings);
        self
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Render the seeding file for the model behind `lookup`.
    ///
    /// Columns follow the model's parameter order and include only
    /// parameters some row binds. Every value must be one the parameter
    /// declares.
    pub fn render(&self, lookup: &LookupContext<'_>) -> Result<String> {
        let parameters = lookup.model().parameters();
        let mut used = vec![false; parameters.len()];

        let mut rows = Vec::with_capacity(self.rows.len());
        for row in &self.rows {
            let mut cells: Vec<Option<String>> = vec![None; parameters.len()];
            for (name, value) in row {
                let index = lookup
                    .parameter_index(name)
                    .ok_or_else(|| ValidationError::UnknownParameter(name.clone()))?;
                let token = lookup.token(value)?;
                lookup.find_value(index, &token).map_err(|_| {
                    Error::from(ValidationError::UnknownValue(format!("{name}={value}")))
                })?;
                used[index] = true;
                cells[index] = Some(token);
            }
            rows.push(cells);
        }

        let columns: Vec<usize> = (0..parameters.len()).filter(|&i| used[i]).collect();
        let mut lines = Vec::with_capacity(rows.len() + 1);
        lines.push(
            columns
                .iter()
                .map(|&i| parameters[i].name())
                .collect::<Vec<_>>()
                .join("\t"),
        );
        for cells in rows {
            lines.push(
                columns
                    .iter()
                    .map(|&i| cells[i].as_deref().unwrap_or(""))
                    .collect::<Vec<_>>()
                    .join("\t"),
            );
        }

        let mut text = lines.join("\n");
        text.push('\n');
        Ok(text)
    }

    /// Render and write the seeding file to `path`.
    pub fn write_to(&self, path: &Path, lookup: &LookupContext<'_>) -> Result<()> {
        let text = self.render(lookup)?;
        std::fs::write(path, text)
            .map_err(|e| Error::io(format!("writing seed file {}", path.display()), e))
    }
}
