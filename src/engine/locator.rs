//! Engine binary discovery.

use std::env::consts::{ARCH, EXE_SUFFIX};
use std::path::PathBuf;

use crate::error::{Error, Result};

/// Environment variable naming the engine binary directly.
pub const BINARY_ENV: &str = "PICT_BINARY";
/// Environment variable naming a directory of per-architecture binaries.
pub const SEARCH_DIR_ENV: &str = "PICT_SEARCH_DIR";

/// Engine file name for a processor architecture tag.
///
/// Unrecognized architectures fall back to the plain `pict` name.
pub fn arch_file_name(arch: &str) -> String {
    let stem = match arch {
        "x86" => "pict.x86",
        "x86_64" => "pict.amd64",
        "aarch64" => "pict.arm64",
        "arm" => "pict.arm",
        _ => "pict",
    };
    format!("{stem}{EXE_SUFFIX}")
}

fn plain_file_name() -> String {
    format!("pict{EXE_SUFFIX}")
}

/// Where to look for the engine, in order: an explicit path, the
/// architecture-specific file in the search directory, plain `pict` in the
/// search directory, then `PATH`.
#[derive(Debug, Clone)]
pub struct EngineLocator {
    pub binary_path: Option<PathBuf>,
    pub search_dir: Option<PathBuf>,
    /// Fall back to a `PATH` lookup.
    pub use_path: bool,
    /// Architecture tag used to pick the file name.
    pub arch: String,
}

impl Default for EngineLocator {
    fn default() -> Self {
        Self {
            binary_path: None,
            search_dir: None,
            use_path: true,
            arch: ARCH.to_string(),
        }
    }
}

impl EngineLocator {
    /// Read [`BINARY_ENV`] and [`SEARCH_DIR_ENV`]; `~` is expanded in both.
    pub fn from_env() -> Self {
        let expand = |value: String| PathBuf::from(shellexpand::tilde(&value).as_ref());
        Self {
            binary_path: std::env::var(BINARY_ENV).ok().map(expand),
            search_dir: std::env::var(SEARCH_DIR_ENV).ok().map(expand),
            ..Self::default()
        }
    }

    pub fn with_binary_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.binary_path = Some(path.into());
        self
    }

    pub fn with_search_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.search_dir = Some(dir.into());
        self
    }

    pub fn with_arch(mut self, arch: impl Into<String>) -> Self {
        self.arch = arch.into();
        self
    }

    pub fn without_path_lookup(mut self) -> Self {
        self.use_path = false;
        self
    }

    fn candidates(&self) -> Vec<PathBuf> {
        let mut candidates = Vec::new();
        if let Some(ref path) = self.binary_path {
            candidates.push(path.clone());
        }
        if let Some(ref dir) = self.search_dir {
            let specific = dir.join(arch_file_name(&self.arch));
            let plain = dir.join(plain_file_name());
            if specific != plain {
                candidates.push(specific);
            }
            candidates.push(plain);
        }
        candidates
    }

    /// Resolve the engine binary.
    pub fn locate(&self) -> Result<PathBuf> {
        let mut searched = Vec::new();

        for candidate in self.candidates() {
            if candidate.is_file() {
                tracing::debug!(path = %candidate.display(), "located engine");
                return Ok(candidate);
            }
            searched.push(candidate.display().to_string());
        }

        if self.use_path {
            match which::which(plain_file_name()) {
                Ok(path) => {
                    tracing::debug!(path = %path.display(), "located engine on PATH");
                    return Ok(path);
                }
                Err(_) => searched.push(format!("{} on PATH", plain_file_name())),
            }
        }

        Err(Error::EngineNotFound {
            searched: searched.join(", "),
            arch: self.arch.clone(),
        })
    }
}
