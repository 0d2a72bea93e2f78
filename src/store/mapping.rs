use anyhow::{Context, Result};
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Durable key/value mapping holding the decision store's fields
///
/// `commit` replaces the whole mapping in one step: after it returns, either
/// the previous or the new mapping is on disk, never a mix of both.
pub trait MappingStore: Send {
    /// Read the full mapping, empty if nothing was stored yet
    fn load(&self) -> Result<Map<String, Value>>;

    /// Atomically replace the stored mapping
    fn commit(&mut self, map: &Map<String, Value>) -> Result<()>;
}

/// Mapping store kept in a single JSON file
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at the default location in the config directory
    pub fn open_default() -> Result<Self> {
        Ok(Self::new(crate::config::ConfigManager::decisions_file_path()?))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl MappingStore for JsonFileStore {
    fn load(&self) -> Result<Map<String, Value>> {
        if !self.path.exists() {
            return Ok(Map::new());
        }

        let content = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read decision store: {}", self.path.display()))?;

        if content.trim().is_empty() {
            return Ok(Map::new());
        }

        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse decision store: {}", self.path.display()))
    }

    fn commit(&mut self, map: &Map<String, Value>) -> Result<()> {
        write_atomically(&self.path, &serde_json::to_string_pretty(map)?)
    }
}

/// Write `content` next to `path` and rename it into place
pub(crate) fn write_atomically(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }

    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, content)
        .with_context(|| format!("Failed to write temporary file: {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path)
        .with_context(|| format!("Failed to replace file: {}", path.display()))?;

    Ok(())
}

/// In-process mapping store
///
/// Clones share the same underlying map, so a test can hold one handle,
/// drop the decision store and reopen it from another handle to simulate a
/// process restart.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    map: Arc<Mutex<Map<String, Value>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of what is currently stored
    pub fn contents(&self) -> Map<String, Value> {
        self.map
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl MappingStore for MemoryStore {
    fn load(&self) -> Result<Map<String, Value>> {
        Ok(self.contents())
    }

    fn commit(&mut self, map: &Map<String, Value>) -> Result<()> {
        *self
            .map
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = map.clone();
        Ok(())
    }
}
