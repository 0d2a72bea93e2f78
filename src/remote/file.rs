use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};

use crate::snapshot::RemoteRecord;

use super::RemoteStore;

const RECORD_FILE_NAME: &str = "record.json";

/// Remote store kept as one JSON file in a directory
///
/// Point it at a folder replicated by a cloud drive and every device that
/// shares the folder sees the same record.
#[derive(Debug, Clone)]
pub struct FileRemoteStore {
    dir: PathBuf,
}

impl FileRemoteStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn record_path(&self) -> PathBuf {
        self.dir.join(RECORD_FILE_NAME)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[async_trait]
impl RemoteStore for FileRemoteStore {
    async fn fetch_record(&self) -> Result<Option<RemoteRecord>> {
        let path = self.record_path();

        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("Failed to read remote record: {}", path.display()))
            }
        };

        // A truncated or garbled file degrades to an empty record so the next
        // write-back repairs it; bad fields inside a valid object are handled
        // by RemoteRecord::decode.
        match serde_json::from_str(&content) {
            Ok(record) => Ok(Some(record)),
            Err(e) => {
                log::warn!(
                    "Remote record {} is unreadable ({e}), treating it as empty",
                    path.display()
                );
                Ok(Some(RemoteRecord::default()))
            }
        }
    }

    async fn write_record(&self, record: &RemoteRecord) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("Failed to create remote directory: {}", self.dir.display()))?;

        let path = self.record_path();
        let tmp_path = path.with_extension("json.tmp");
        let content =
            serde_json::to_string_pretty(record).context("Failed to serialize remote record")?;

        tokio::fs::write(&tmp_path, content)
            .await
            .with_context(|| format!("Failed to write remote record: {}", tmp_path.display()))?;
        tokio::fs::rename(&tmp_path, &path)
            .await
            .with_context(|| format!("Failed to replace remote record: {}", path.display()))?;

        Ok(())
    }

    fn describe(&self) -> String {
        self.record_path().display().to_string()
    }
}
