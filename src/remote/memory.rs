use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use crate::snapshot::RemoteRecord;

use super::RemoteStore;

#[derive(Debug, Default)]
struct MemoryRemoteState {
    record: Option<RemoteRecord>,
    failing_fetches: u32,
    failing_writes: u32,
    latency: Duration,
    fetches: u32,
    writes: u32,
}

/// In-process remote store
///
/// Clones share the same record, so two coordinators built on clones of one
/// handle behave like two devices talking to the same backend. Failures and
/// latency can be injected for tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryRemoteStore {
    state: Arc<Mutex<MemoryRemoteState>>,
}

impl MemoryRemoteStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryRemoteState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Currently stored record
    pub fn record(&self) -> Option<RemoteRecord> {
        self.lock().record.clone()
    }

    /// Replace the stored record directly, bypassing failure injection
    pub fn set_record(&self, record: Option<RemoteRecord>) {
        self.lock().record = record;
    }

    /// Make the next `count` fetches fail
    pub fn fail_next_fetches(&self, count: u32) {
        self.lock().failing_fetches = count;
    }

    /// Make the next `count` writes fail
    pub fn fail_next_writes(&self, count: u32) {
        self.lock().failing_writes = count;
    }

    /// Delay every call by `latency`
    pub fn set_latency(&self, latency: Duration) {
        self.lock().latency = latency;
    }

    /// Number of fetch attempts so far
    pub fn fetch_count(&self) -> u32 {
        self.lock().fetches
    }

    /// Number of write attempts so far
    pub fn write_count(&self) -> u32 {
        self.lock().writes
    }

    fn latency(&self) -> Duration {
        self.lock().latency
    }
}

#[async_trait]
impl RemoteStore for MemoryRemoteStore {
    async fn fetch_record(&self) -> Result<Option<RemoteRecord>> {
        let latency = self.latency();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        let mut state = self.lock();
        state.fetches += 1;
        if state.failing_fetches > 0 {
            state.failing_fetches -= 1;
            return Err(anyhow!("remote unavailable"));
        }
        Ok(state.record.clone())
    }

    async fn write_record(&self, record: &RemoteRecord) -> Result<()> {
        let latency = self.latency();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        let mut state = self.lock();
        state.writes += 1;
        if state.failing_writes > 0 {
            state.failing_writes -= 1;
            return Err(anyhow!("remote rejected write"));
        }
        state.record = Some(record.clone());
        Ok(())
    }

    fn describe(&self) -> String {
        "in-memory remote".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::SyncSnapshot;

    #[tokio::test]
    async fn test_clones_share_record() {
        let device_a = MemoryRemoteStore::new();
        let device_b = device_a.clone();

        device_a
            .write_record(&RemoteRecord::from_snapshot(&SyncSnapshot::reset_marker(3.0)))
            .await
            .unwrap();

        let fetched = device_b.fetch_record().await.unwrap().unwrap();
        assert_eq!(fetched.decode().reset_timestamp, 3.0);
    }

    #[tokio::test]
    async fn test_injected_failures_are_consumed() {
        let remote = MemoryRemoteStore::new();
        remote.fail_next_fetches(1);

        assert!(remote.fetch_record().await.is_err());
        assert!(remote.fetch_record().await.unwrap().is_none());
        assert_eq!(remote.fetch_count(), 2);
    }
}
