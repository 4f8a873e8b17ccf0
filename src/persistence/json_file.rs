//! JSON file persistence adapter.
//!
//! The file holds a single JSON array, one object per key:
//!
//! ```text
//! [
//!   { "key": "session", "value": "abc123", "expiry_time": 1760000000000 },
//!   { "key": "name", "value": "Ariz" }
//! ]
//! ```
//!
//! `expiry_time` is omitted for keys that never expire. Writes go to a sibling
//! temporary file which is then renamed over the target, so a crash mid-write
//! leaves the previous file intact.

use crate::clock::Timestamp;
use crate::persistence::PersistenceAdapter;
use crate::storage::WrappedValue;
use anyhow::Context;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Serialize)]
struct RecordRef<'a, V> {
    key: &'a str,
    value: &'a V,
    #[serde(skip_serializing_if = "Option::is_none")]
    expiry_time: Option<Timestamp>,
}

#[derive(Deserialize)]
struct Record<V> {
    key: String,
    value: V,
    #[serde(default)]
    expiry_time: Option<Timestamp>,
}

/// Persists entries as a JSON array in a file.
#[derive(Debug, Clone)]
pub struct JsonFileAdapter {
    path: PathBuf,
}

impl JsonFileAdapter {
    /// Creates an adapter for `path`. Nothing is touched until the first call.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns the file this adapter reads and writes.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl<V> PersistenceAdapter<V> for JsonFileAdapter
where
    V: Serialize + DeserializeOwned,
{
    fn persist(&mut self, entries: &[(&str, &WrappedValue<V>)]) -> anyhow::Result<()> {
        let records: Vec<RecordRef<'_, V>> = entries
            .iter()
            .map(|&(key, entry)| RecordRef {
                key,
                value: entry.value(),
                expiry_time: entry.expiry_time(),
            })
            .collect();
        let json = serde_json::to_vec_pretty(&records).context("failed to encode entries")?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }

        let temp = self.temp_path();
        fs::write(&temp, json).with_context(|| format!("failed to write {}", temp.display()))?;
        fs::rename(&temp, &self.path)
            .with_context(|| format!("failed to replace {}", self.path.display()))?;

        debug!(path = %self.path.display(), entries = records.len(), "Persisted entries");
        Ok(())
    }

    fn restore(&mut self) -> anyhow::Result<Vec<(String, WrappedValue<V>)>> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "No persisted file, restoring empty");
            return Ok(Vec::new());
        }

        let raw = fs::read(&self.path)
            .with_context(|| format!("failed to read {}", self.path.display()))?;
        let records: Vec<Record<V>> = serde_json::from_slice(&raw)
            .with_context(|| format!("failed to decode {}", self.path.display()))?;

        debug!(path = %self.path.display(), entries = records.len(), "Restored entries");
        Ok(records
            .into_iter()
            .map(|r| (r.key, WrappedValue::new(r.value, r.expiry_time)))
            .collect())
    }
}
