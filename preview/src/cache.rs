//! File-backed preview cache.
//!
//! One pretty-printed JSON object mapping absolute URLs to [`PreviewRecord`]s.
//! Loaded once per transform, mutated in memory, and written back at most
//! once when something changed. The cache is best-effort: a missing or
//! corrupt file reads as empty and write failures are reported, never fatal.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use linkcard_utils::{atomic_write, recover_bak_file};
use serde_json::{Map, Value};

use crate::types::{CacheLoadError, CacheWriteError, PreviewRecord};

#[derive(Debug)]
pub struct PreviewCache {
    path: PathBuf,
    /// Raw entries; unrecognized fields survive a load/persist cycle.
    entries: Map<String, Value>,
    dirty: bool,
}

impl PreviewCache {
    /// Load the cache at `path`. Never fails; unreadable files yield an empty cache.
    #[must_use]
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        recover_bak_file(&path);

        let entries = match read_entries(&path) {
            Ok(entries) => entries,
            Err(CacheLoadError::Io(e)) if e.kind() == io::ErrorKind::NotFound => Map::new(),
            Err(e) => {
                tracing::warn!(path = %path.display(), "Ignoring unreadable link preview cache: {e}");
                Map::new()
            }
        };
        tracing::debug!(path = %path.display(), entries = entries.len(), "Loaded link preview cache");

        Self {
            path,
            entries,
            dirty: false,
        }
    }

    /// An empty cache that will be written to `path` on persist.
    #[must_use]
    pub fn empty(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            entries: Map::new(),
            dirty: false,
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Cached record for `url`. Entries that do not parse as a record are misses.
    #[must_use]
    pub fn get(&self, url: &str) -> Option<PreviewRecord> {
        let value = self.entries.get(url)?;
        match serde_json::from_value(value.clone()) {
            Ok(record) => Some(record),
            Err(e) => {
                tracing::debug!(url, "Skipping malformed cache entry: {e}");
                None
            }
        }
    }

    pub fn insert(&mut self, url: impl Into<String>, record: &PreviewRecord) {
        match serde_json::to_value(record) {
            Ok(value) => {
                self.entries.insert(url.into(), value);
                self.dirty = true;
            }
            Err(e) => tracing::warn!("Failed to encode preview record: {e}"),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Write the cache if anything changed since it was loaded or last persisted.
    ///
    /// Returns `Ok(false)` when there was nothing to write.
    pub fn persist(&mut self) -> Result<bool, CacheWriteError> {
        if !self.dirty {
            return Ok(false);
        }
        let mut json = serde_json::to_string_pretty(&self.entries)?;
        json.push('\n');
        atomic_write(&self.path, json.as_bytes())?;
        self.dirty = false;
        tracing::debug!(path = %self.path.display(), entries = self.entries.len(), "Persisted link preview cache");
        Ok(true)
    }
}

fn read_entries(path: &Path) -> Result<Map<String, Value>, CacheLoadError> {
    let raw = fs::read_to_string(path)?;
    match serde_json::from_str::<Value>(&raw)? {
        Value::Object(entries) => Ok(entries),
        _ => Err(CacheLoadError::NotAnObject),
    }
}
