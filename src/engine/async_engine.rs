//! Async engine invocation with an optional time bound.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;

use super::{spawn_error, EngineLocator, EngineOutput};
use crate::error::{Error, Result};

/// Async counterpart of [`super::Engine`].
#[async_trait]
pub trait AsyncEngine: Send + Sync {
    async fn run(&self, model_file: &Path, args: &[String]) -> Result<EngineOutput>;
}

/// `tokio::process` engine. A run that exceeds the timeout is killed and
/// reported as [`Error::Timeout`].
#[derive(Debug, Clone)]
pub struct TokioProcessEngine {
    binary: PathBuf,
    timeout: Option<Duration>,
}

impl TokioProcessEngine {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            timeout: None,
        }
    }

    /// Resolve the binary with [`EngineLocator::from_env`].
    pub fn locate() -> Result<Self> {
        EngineLocator::from_env().locate().map(Self::new)
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }
}

#[async_trait]
impl AsyncEngine for TokioProcessEngine {
    async fn run(&self, model_file: &Path, args: &[String]) -> Result<EngineOutput> {
        tracing::debug!(binary = %self.binary.display(), ?args, "running engine");

        let child = Command::new(&self.binary)
            .arg(model_file)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| spawn_error(&self.binary, e))?;

        let output = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, child.wait_with_output())
                .await
                .map_err(|_| Error::timeout(limit.as_millis() as u64))?,
            None => child.wait_with_output().await,
        }
        .map_err(|e| Error::io("waiting for the engine", e))?;

        Ok(output.into())
    }
}
