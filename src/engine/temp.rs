//! Temporary model files.

use std::path::{Path, PathBuf};

use uuid::Uuid;

use crate::error::{Error, Result};

/// A model file in the temp directory, removed when dropped.
#[derive(Debug)]
pub struct TempModelFile {
    path: PathBuf,
}

impl TempModelFile {
    /// Write `text` to a fresh `pict-model-<uuid>.txt` in the system temp
    /// directory.
    pub fn create(text: &str) -> Result<Self> {
        Self::create_in(&std::env::temp_dir(), text)
    }

    pub fn create_in(dir: &Path, text: &str) -> Result<Self> {
        let path = dir.join(format!("pict-model-{}.txt", Uuid::new_v4()));
        std::fs::write(&path, text)
            .map_err(|e| Error::io(format!("writing model file {}", path.display()), e))?;
        tracing::debug!(path = %path.display(), bytes = text.len(), "wrote model file");
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempModelFile {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            tracing::warn!(path = %self.path.display(), error = %e, "failed to remove model file");
        }
    }
}
