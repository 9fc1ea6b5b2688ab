//! The external generation engine.
//!
//! The covering algorithm itself lives in the `pict` binary. This module
//! locates that binary, feeds it model files, and splits what it prints into
//! a result table and diagnostics.
//!
//! [`Engine`] is the seam the runner talks to; [`ProcessEngine`] is the real
//! subprocess implementation and tests substitute scripted fakes.

mod async_engine;
mod locator;
mod output;
mod temp;

pub use async_engine::{AsyncEngine, TokioProcessEngine};
pub use locator::{arch_file_name, EngineLocator, BINARY_ENV, SEARCH_DIR_ENV};
pub use output::{parse_diagnostics, parse_table, Diagnostics};
pub use temp::TempModelFile;

use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};

use crate::error::{Error, Result};

/// Everything one engine invocation produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineOutput {
    pub stdout: String,
    pub stderr: String,
    /// Exit code; `None` when the process was terminated by a signal.
    pub status: Option<i32>,
}

impl EngineOutput {
    /// Output of a run that exited cleanly.
    pub fn new(stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: stderr.into(),
            status: Some(0),
        }
    }

    pub fn with_status(mut self, status: Option<i32>) -> Self {
        self.status = status;
        self
    }

    pub fn success(&self) -> bool {
        self.status == Some(0)
    }
}

impl From<Output> for EngineOutput {
    fn from(output: Output) -> Self {
        Self {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            status: output.status.code(),
        }
    }
}

/// Runs the engine on a model file.
///
/// `args` are the flags derived from [`crate::Settings`]; the model file is
/// always passed first.
pub trait Engine: Send + Sync {
    fn run(&self, model_file: &Path, args: &[String]) -> Result<EngineOutput>;
}

/// Blocking subprocess engine.
#[derive(Debug, Clone)]
pub struct ProcessEngine {
    binary: PathBuf,
}

impl ProcessEngine {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// Resolve the binary with [`EngineLocator::from_env`].
    pub fn locate() -> Result<Self> {
        EngineLocator::from_env().locate().map(Self::new)
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }
}

impl Engine for ProcessEngine {
    fn run(&self, model_file: &Path, args: &[String]) -> Result<EngineOutput> {
        tracing::debug!(binary = %self.binary.display(), ?args, "running engine");

        let output = Command::new(&self.binary)
            .arg(model_file)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| spawn_error(&self.binary, e))?;

        Ok(output.into())
    }
}

pub(crate) fn spawn_error(binary: &Path, err: std::io::Error) -> Error {
    if err.kind() == std::io::ErrorKind::NotFound {
        Error::EngineNotFound {
            searched: binary.display().to_string(),
            arch: std::env::consts::ARCH.to_string(),
        }
    } else {
        Error::io(format!("spawning {}", binary.display()), err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_binary_is_engine_not_found() {
        let engine = ProcessEngine::new("/nonexistent/dir/pict");
        let err = engine
            .run(Path::new("model.txt"), &[])
            .unwrap_err();
        match err {
            Error::EngineNotFound { searched, arch } => {
                assert!(searched.contains("/nonexistent/dir/pict"));
                assert_eq!(arch, std::env::consts::ARCH);
            }
            other => panic!("expected EngineNotFound, got {other:?}"),
        }
    }

    #[test]
    fn test_output_status() {
        assert!(EngineOutput::new("", "").success());
        assert!(!EngineOutput::new("", "").with_status(Some(1)).success());
        assert!(!EngineOutput::new("", "").with_status(None).success());
    }

    #[cfg(unix)]
    #[test]
    fn test_process_engine_captures_streams() {
        let dir = tempfile::tempdir().unwrap();
        let model = dir.path().join("model.txt");
        std::fs::write(&model, "A: 1\n").unwrap();

        let engine = ProcessEngine::new("cat");
        let output = engine.run(&model, &[]).unwrap();
        assert_eq!(output.stdout, "A: 1\n");
        assert!(output.success());
    }
}
