use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

use super::record::OperationRecord;
use super::types::OperationType;

/// Maximum number of operations to keep in history
const MAX_HISTORY_SIZE: usize = 50;

/// Rolling log of recent operations, most recent first
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct OperationHistory {
    operations: Vec<OperationRecord>,

    /// Where the log is saved; `None` means the default location
    #[serde(skip)]
    path: Option<PathBuf>,
}

impl OperationHistory {
    fn history_file_path(&self) -> Result<PathBuf> {
        match &self.path {
            Some(path) => Ok(path.clone()),
            None => crate::config::ConfigManager::sync_history_path(),
        }
    }

    /// Load operation history from a custom path
    /// Creates a new empty history if the file doesn't exist
    ///
    /// # Arguments
    /// * `path` - Optional custom path to load from. If None, uses default location.
    pub fn from_path(path: Option<PathBuf>) -> Result<Self> {
        let empty = Self {
            operations: Vec::new(),
            path,
        };
        let file_path = empty.history_file_path()?;

        if !file_path.exists() {
            return Ok(empty);
        }

        let content = fs::read_to_string(&file_path).with_context(|| {
            format!("Failed to read sync history file from: {}", file_path.display())
        })?;

        let mut history: OperationHistory = serde_json::from_str(&content).with_context(|| {
            format!("Failed to parse sync history JSON from: {}", file_path.display())
        })?;
        history.path = empty.path;

        Ok(history)
    }

    /// Load operation history from the default location
    pub fn load() -> Result<Self> {
        Self::from_path(None)
    }

    pub fn save(&self) -> Result<()> {
        let file_path = self.history_file_path()?;
        let content =
            serde_json::to_string_pretty(self).context("Failed to serialize sync history")?;

        crate::store::write_atomically(&file_path, &content).with_context(|| {
            format!("Failed to write sync history file to: {}", file_path.display())
        })
    }

    /// Add a new operation record and persist
    /// Older entries beyond MAX_HISTORY_SIZE are dropped
    pub fn add_operation(&mut self, record: OperationRecord) -> Result<()> {
        self.operations.insert(0, record);
        self.operations.truncate(MAX_HISTORY_SIZE);
        self.save()
    }

    pub fn get_last_operation(&self) -> Option<&OperationRecord> {
        self.operations.first()
    }

    /// Get the most recent operation of a specific type
    pub fn get_last_operation_by_type(&self, op_type: OperationType) -> Option<&OperationRecord> {
        self.operations
            .iter()
            .find(|op| op.operation_type == op_type)
    }

    pub fn list_operations(&self) -> &[OperationRecord] {
        &self.operations
    }

    pub fn clear(&mut self) -> Result<()> {
        self.operations.clear();
        self.save()
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}

/// Append a record to the default history, logging instead of failing
pub fn record_operation(record: OperationRecord) {
    let result = OperationHistory::load().and_then(|mut history| history.add_operation(record));
    if let Err(e) = result {
        log::warn!("Failed to update sync history: {e:#}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup_test_env() -> (TempDir, PathBuf) {
        let temp_dir = TempDir::new().unwrap();
        let history_path = temp_dir.path().join("sync-history.json");
        (temp_dir, history_path)
    }

    #[test]
    fn test_missing_file_is_empty_history() {
        let (_temp, path) = setup_test_env();
        let history = OperationHistory::from_path(Some(path)).unwrap();
        assert!(history.is_empty());
        assert!(history.get_last_operation().is_none());
    }

    #[test]
    fn test_add_persists_most_recent_first() {
        let (_temp, path) = setup_test_env();
        let mut history = OperationHistory::from_path(Some(path.clone())).unwrap();

        history
            .add_operation(OperationRecord::reset("first", true, None))
            .unwrap();
        history
            .add_operation(OperationRecord::reset("second", true, None))
            .unwrap();

        let reloaded = OperationHistory::from_path(Some(path)).unwrap();
        assert_eq!(reloaded.len(), 2);
        assert_eq!(
            reloaded.get_last_operation().unwrap().message.as_deref(),
            Some("second")
        );
        assert!(reloaded
            .get_last_operation_by_type(OperationType::Sync)
            .is_none());
    }

    #[test]
    fn test_history_rotation() {
        let (_temp, path) = setup_test_env();
        let mut history = OperationHistory::from_path(Some(path)).unwrap();

        for i in 0..(MAX_HISTORY_SIZE + 5) {
            history
                .add_operation(OperationRecord::reset(format!("op {i}"), true, None))
                .unwrap();
        }

        assert_eq!(history.len(), MAX_HISTORY_SIZE);
        let expected = format!("op {}", MAX_HISTORY_SIZE + 4);
        assert_eq!(
            history.list_operations()[0].message.as_deref(),
            Some(expected.as_str())
        );
    }

    #[test]
    fn test_clear_persists() {
        let (_temp, path) = setup_test_env();
        let mut history = OperationHistory::from_path(Some(path.clone())).unwrap();
        history
            .add_operation(OperationRecord::reset("x", true, None))
            .unwrap();
        history.clear().unwrap();

        assert!(OperationHistory::from_path(Some(path)).unwrap().is_empty());
    }
}
