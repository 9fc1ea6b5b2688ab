//! Scripted engine for runner tests.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::engine::{AsyncEngine, Engine, EngineOutput};
use crate::error::{Error, Result};

enum Script {
    /// Emit every combination of the declared values.
    Cartesian,
    /// Emit this stdout verbatim.
    Fixed(String),
}

pub(crate) struct FakeEngine {
    script: Script,
    stderr: String,
    status: Option<i32>,
    calls: AtomicUsize,
    seen: Mutex<Vec<(PathBuf, Vec<String>)>>,
}

impl FakeEngine {
    /// Seed reported for `/r` without an explicit seed.
    pub(crate) const RANDOM_SEED: i64 = 1234;

    fn with_script(script: Script) -> Self {
        Self {
            script,
            stderr: String::new(),
            status: Some(0),
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn cartesian() -> Self {
        Self::with_script(Script::Cartesian)
    }

    pub(crate) fn fixed(stdout: &str) -> Self {
        Self::with_script(Script::Fixed(stdout.to_string()))
    }

    pub(crate) fn with_stderr(mut self, stderr: &str) -> Self {
        self.stderr = stderr.to_string();
        self
    }

    pub(crate) fn with_status(mut self, status: Option<i32>) -> Self {
        self.status = status;
        self
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn last_call(&self) -> Option<(PathBuf, Vec<String>)> {
        self.seen.lock().unwrap().last().cloned()
    }

    fn respond(&self, model_file: &Path, args: &[String]) -> Result<EngineOutput> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen
            .lock()
            .unwrap()
            .push((model_file.to_path_buf(), args.to_vec()));

        let text = std::fs::read_to_string(model_file)
            .map_err(|e| Error::io("reading model in fake engine", e))?;
        let stdout = match self.script {
            Script::Cartesian => cartesian(&text),
            Script::Fixed(ref stdout) => stdout.clone(),
        };

        let mut stderr = self.stderr.clone();
        if let Some(flag) = args.iter().find(|a| a.starts_with("/r")) {
            let seed = flag
                .strip_prefix("/r:")
                .and_then(|s| s.parse().ok())
                .unwrap_or(Self::RANDOM_SEED);
            stderr.push_str(&format!("Used seed: {seed}\n"));
        }

        Ok(EngineOutput::new(stdout, stderr).with_status(self.status))
    }
}

/// Cartesian product of the parameter lines of a rendered model, using
/// each value's primary token.
fn cartesian(text: &str) -> String {
    let mut names = Vec::new();
    let mut columns: Vec<Vec<String>> = Vec::new();

    for line in text.lines() {
        if line.starts_with('#') {
            continue;
        }
        if line.is_empty() {
            break;
        }
        let Some((name, values)) = line.split_once(": ") else {
            continue;
        };
        names.push(name.to_string());
        columns.push(
            values
                .split(", ")
                .map(|v| {
                    let v = match v.rfind(" (") {
                        Some(at) if v.ends_with(')') => &v[..at],
                        _ => v,
                    };
                    v.split('|').next().unwrap_or(v).to_string()
                })
                .collect(),
        );
    }

    let mut rows: Vec<Vec<String>> = vec![Vec::new()];
    for column in &columns {
        rows = rows
            .into_iter()
            .flat_map(|row| {
                column.iter().map(move |value| {
                    let mut row = row.clone();
                    row.push(value.clone());
                    row
                })
            })
            .collect();
    }

    let mut out = names.join("\t");
    out.push('\n');
    for row in rows {
        out.push_str(&row.join("\t"));
        out.push('\n');
    }
    out
}

impl Engine for FakeEngine {
    fn run(&self, model_file: &Path, args: &[String]) -> Result<EngineOutput> {
        self.respond(model_file, args)
    }
}

#[async_trait]
impl AsyncEngine for FakeEngine {
    async fn run(&self, model_file: &Path, args: &[String]) -> Result<EngineOutput> {
        self.respond(model_file, args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cartesian_script() {
        let text = "# comment\nA: x, y|z (2)\nB: 1, ~2\n\n{A, B} @ 2\n";
        assert_eq!(cartesian(text), "A\tB\nx\t1\nx\t~2\ny\t1\ny\t~2\n");
    }
}
