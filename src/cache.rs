//! Content-addressed cache of engine executions.
//!
//! Entries are keyed by a SHA-256 digest of the engine flags, the rendered
//! model text and (when configured) the seeding file, and persisted in a
//! small SQLite database.
//!
//! A [`CacheRegistry`] hands out one [`CacheStore`] per file path, so every
//! runner in a process that points at the same file shares one in-memory
//! table and one writer.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::error::{Error, Result};

/// Digest identifying one (flags, model, seed rows) combination.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey(pub String);

impl CacheKey {
    pub fn generate(flags: &str, model_text: &str, seed_rows: Option<&[u8]>) -> Self {
        let mut hasher = Sha256::new();

        hasher.update(b"flags:");
        hasher.update(flags.as_bytes());
        hasher.update(b"\n");

        hasher.update(b"model:");
        hasher.update(model_text.as_bytes());
        hasher.update(b"\n");

        if let Some(rows) = seed_rows {
            hasher.update(b"seed:");
            hasher.update(rows);
        }

        let hash = hasher.finalize();
        CacheKey(format!("{:x}", hash))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let short: String = self.0.chars().take(16).collect();
        write!(f, "{short}")
    }
}

/// The record of one engine run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionInformation {
    /// Model file the engine read.
    pub source_file_name: String,
    pub generated_at: DateTime<Utc>,
    /// Flag string passed to the engine.
    pub options_used: String,
    /// Parsed stdout, header row first.
    pub table: Vec<Vec<String>>,
    /// Seed the engine used, when it reported one.
    pub random_seed: Option<i64>,
    /// Whether the engine chose the seed itself.
    pub seed_was_random: bool,
    #[serde(default)]
    pub warnings: Vec<String>,
}

impl ExecutionInformation {
    /// Whether two runs produced the same table. Timestamps and file names
    /// are ignored.
    pub fn same_output(&self, other: &Self) -> bool {
        self.table == other.table
    }
}

#[derive(Debug, Default)]
struct CacheState {
    entries: HashMap<String, ExecutionInformation>,
    dirty: bool,
}

/// In-memory table of executions backed by one cache file.
#[derive(Debug)]
pub struct CacheStore {
    path: PathBuf,
    state: Mutex<CacheState>,
}

impl CacheStore {
    /// Load the cache at `path`.
    ///
    /// A missing file is an empty cache. An unreadable one is logged and
    /// also treated as empty; the next save replaces it.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = if path.exists() {
            match read_entries(&path) {
                Ok(entries) => {
                    tracing::debug!(path = %path.display(), entries = entries.len(), "loaded cache");
                    entries
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "ignoring unreadable cache file");
                    HashMap::new()
                }
            }
        } else {
            HashMap::new()
        };

        Self {
            path,
            state: Mutex::new(CacheState {
                entries,
                dirty: false,
            }),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn state(&self) -> Result<MutexGuard<'_, CacheState>> {
        self.state
            .lock()
            .map_err(|e| Error::Cache(format!("Failed to lock cache: {}", e)))
    }

    pub fn get(&self, key: &CacheKey) -> Result<Option<ExecutionInformation>> {
        Ok(self.state()?.entries.get(key.as_str()).cloned())
    }

    /// Store an execution. The cache only becomes dirty when the table
    /// differs from what is already stored under `key`.
    ///
    /// Returns whether the entry changed.
    pub fn insert(&self, key: &CacheKey, info: ExecutionInformation) -> Result<bool> {
        let mut state = self.state()?;
        let changed = state
            .entries
            .get(key.as_str())
            .map_or(true, |existing| !existing.same_output(&info));
        if changed {
            state.entries.insert(key.0.clone(), info);
            state.dirty = true;
        }
        Ok(changed)
    }

    pub fn is_dirty(&self) -> Result<bool> {
        Ok(self.state()?.dirty)
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.state()?.entries.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Write the cache to disk if it changed since load or the last save.
    ///
    /// The file is written beside the target and renamed into place.
    /// Returns whether anything was written.
    pub fn save(&self) -> Result<bool> {
        let mut state = self.state()?;
        if !state.dirty {
            return Ok(false);
        }

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| Error::io(format!("creating {}", parent.display()), e))?;
        }

        let staging = self
            .path
            .with_extension(format!("{}.tmp", Uuid::new_v4().simple()));
        if let Err(e) = write_entries(&staging, &state.entries) {
            let _ = std::fs::remove_file(&staging);
            return Err(e);
        }
        std::fs::rename(&staging, &self.path).map_err(|e| {
            let _ = std::fs::remove_file(&staging);
            Error::io(format!("replacing {}", self.path.display()), e)
        })?;

        state.dirty = false;
        tracing::info!(path = %self.path.display(), entries = state.entries.len(), "saved cache");
        Ok(true)
    }
}

fn storage_error(e: rusqlite::Error) -> Error {
    Error::Cache(e.to_string())
}

fn read_entries(path: &Path) -> Result<HashMap<String, ExecutionInformation>> {
    let conn = Connection::open(path).map_err(storage_error)?;
    let mut stmt = conn
        .prepare("SELECT key, payload FROM executions")
        .map_err(storage_error)?;
    let rows = stmt
        .query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, Vec<u8>>(1)?))
        })
        .map_err(storage_error)?;

    let mut entries = HashMap::new();
    for row in rows {
        let (key, payload) = row.map_err(storage_error)?;
        entries.insert(key, serde_json::from_slice(&payload)?);
    }
    Ok(entries)
}

fn write_entries(path: &Path, entries: &HashMap<String, ExecutionInformation>) -> Result<()> {
    let mut conn = Connection::open(path).map_err(storage_error)?;
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS executions (
            key TEXT PRIMARY KEY,
            payload BLOB NOT NULL
        )",
    )
    .map_err(storage_error)?;

    let mut keys: Vec<&String> = entries.keys().collect();
    keys.sort();

    let tx = conn.transaction().map_err(storage_error)?;
    {
        let mut stmt = tx
            .prepare("INSERT OR REPLACE INTO executions (key, payload) VALUES (?1, ?2)")
            .map_err(storage_error)?;
        for key in keys {
            let payload = serde_json::to_vec(&entries[key])?;
            stmt.execute(params![key, payload]).map_err(storage_error)?;
        }
    }
    tx.commit().map_err(storage_error)
}

/// One [`CacheStore`] per cache file path.
#[derive(Debug, Default)]
pub struct CacheRegistry {
    stores: Mutex<HashMap<PathBuf, Arc<CacheStore>>>,
}

impl CacheRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The store for `path`, loading it on first use.
    pub fn open(&self, path: impl AsRef<Path>) -> Result<Arc<CacheStore>> {
        let path = std::path::absolute(path.as_ref())
            .map_err(|e| Error::io(format!("resolving {}", path.as_ref().display()), e))?;
        let mut stores = self
            .stores
            .lock()
            .map_err(|e| Error::Cache(format!("Failed to lock cache registry: {}", e)))?;

        let store = stores
            .entry(path.clone())
            .or_insert_with(|| Arc::new(CacheStore::load(path)));
        Ok(Arc::clone(store))
    }

    /// Save every dirty store; the first failure is returned after all
    /// stores were attempted.
    pub fn save_all(&self) -> Result<()> {
        let stores: Vec<Arc<CacheStore>> = self
            .stores
            .lock()
            .map_err(|e| Error::Cache(format!("Failed to lock cache registry: {}", e)))?
            .values()
            .cloned()
            .collect();

        let mut first_error = None;
        for store in stores {
            if let Err(e) = store.save() {
                tracing::warn!(path = %store.path().display(), error = %e, "failed to save cache");
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}
