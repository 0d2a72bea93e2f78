use anyhow::{Context, Result};
use chrono::Utc;
use std::sync::{Arc, Mutex as StdMutex, MutexGuard};
use std::time::Duration;
use tokio::sync::{broadcast, watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::merge::MergeStats;
use crate::remote::RemoteStore;
use crate::snapshot::{epoch_now, RemoteRecord};
use crate::store::DecisionStore;

use super::retry::RetryPolicy;
use super::status::SyncStatus;

/// Shortest interval accepted for periodic sync
const MIN_SYNC_INTERVAL: Duration = Duration::from_secs(1);

/// What a call to [`SyncCoordinator::sync_now`] did
#[derive(Debug, Clone, PartialEq)]
pub enum SyncOutcome {
    /// Sync is switched off; the remote was not contacted
    Disabled,
    /// Another cycle was already running; this call did nothing
    Coalesced,
    /// A full cycle completed
    Synced(MergeStats),
    /// The cycle failed; local data is unchanged or fully merged
    Failed(String),
}

struct PeriodicSync {
    shutdown: watch::Sender<bool>,
    _task: JoinHandle<()>,
}

/// Owns the fetch → merge → write-back cycle between the local decision
/// store and a remote store
///
/// Only one cycle runs at a time. A `sync_now` arriving while a cycle is in
/// flight is coalesced into it rather than queued. Errors never escape a
/// cycle; they end up in the observable [`SyncStatus`].
pub struct SyncCoordinator {
    store: Arc<DecisionStore>,
    remote: Arc<dyn RemoteStore>,
    retry: RetryPolicy,
    device_id: String,
    status: watch::Sender<SyncStatus>,
    outcomes: broadcast::Sender<SyncOutcome>,
    in_flight: Mutex<()>,
    periodic: StdMutex<Option<PeriodicSync>>,
}

impl SyncCoordinator {
    pub fn new(store: Arc<DecisionStore>, remote: Arc<dyn RemoteStore>, retry: RetryPolicy) -> Self {
        let (status, _) = watch::channel(SyncStatus::Idle);
        let (outcomes, _) = broadcast::channel(16);

        Self {
            store,
            remote,
            retry,
            device_id: "unknown-device".to_string(),
            status,
            outcomes,
            in_flight: Mutex::new(()),
            periodic: StdMutex::new(None),
        }
    }

    /// Identify this device in the records it writes
    pub fn with_device_id(mut self, device_id: impl Into<String>) -> Self {
        self.device_id = device_id.into();
        self
    }

    pub fn store(&self) -> &Arc<DecisionStore> {
        &self.store
    }

    /// Current status
    pub fn status(&self) -> SyncStatus {
        self.status.borrow().clone()
    }

    /// Watch status changes
    pub fn subscribe(&self) -> watch::Receiver<SyncStatus> {
        self.status.subscribe()
    }

    /// Receive the outcome of every completed cycle, including periodic ones
    pub fn subscribe_outcomes(&self) -> broadcast::Receiver<SyncOutcome> {
        self.outcomes.subscribe()
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    fn set_status(&self, status: SyncStatus) {
        log::debug!("Sync status: {status}");
        self.status.send_replace(status);
    }

    fn periodic(&self) -> MutexGuard<'_, Option<PeriodicSync>> {
        self.periodic
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Run one sync cycle now
    pub async fn sync_now(&self) -> SyncOutcome {
        if !self.store.sync_enabled() {
            log::info!("Sync is disabled, not contacting {}", self.remote.describe());
            self.set_status(SyncStatus::Disabled);
            return SyncOutcome::Disabled;
        }

        let Ok(_cycle) = self.in_flight.try_lock() else {
            log::debug!("Sync already in flight, coalescing request");
            return SyncOutcome::Coalesced;
        };

        self.set_status(SyncStatus::Syncing);

        let outcome = match self.run_cycle().await {
            Ok(stats) => {
                self.set_status(SyncStatus::Synced { at: Utc::now() });
                SyncOutcome::Synced(stats)
            }
            Err(e) => {
                let message = format!("{e:#}");
                log::error!("Sync failed: {message}");
                self.set_status(SyncStatus::Error(message.clone()));
                SyncOutcome::Failed(message)
            }
        };

        // No subscribers is fine
        let _ = self.outcomes.send(outcome.clone());
        outcome
    }

    /// fetch → merge → local write → remote write, strictly in that order
    async fn run_cycle(&self) -> Result<MergeStats> {
        log::info!("Syncing with {}", self.remote.describe());

        let record = match self
            .retry
            .run("fetch remote snapshot", || self.remote.fetch_record())
            .await?
        {
            Some(record) => record,
            None => {
                log::info!("No remote record yet, starting from an empty snapshot");
                RemoteRecord::default()
            }
        };

        let remote = record.decode();
        let result = self
            .store
            .reconcile(&remote)
            .context("Failed to persist merged decisions locally")?;

        let outgoing = record
            .with_merged(&result.merged)
            .stamped_by(&self.device_id);
        self.retry
            .run("write remote snapshot", || self.remote.write_record(&outgoing))
            .await?;

        let stats = result.stats;
        log::info!(
            "Sync complete: {} kept, {} deleted{}",
            stats.merged_kept,
            stats.merged_deleted,
            if stats.reset_applied {
                " (remote reset applied)"
            } else {
                ""
            }
        );

        Ok(stats)
    }

    /// Clear the remote snapshot and stamp a reset marker at the current time
    ///
    /// Local state is not touched; callers follow up with
    /// [`DecisionStore::reset_all`] once this succeeds.
    pub async fn reset_remote(&self) -> Result<()> {
        self.reset_remote_at(epoch_now()).await
    }

    /// Same as [`reset_remote`](Self::reset_remote) with an explicit reset time
    pub async fn reset_remote_at(&self, timestamp: f64) -> Result<()> {
        let _cycle = self.in_flight.lock().await;

        match self.write_reset_marker(timestamp).await {
            Ok(()) => {
                log::info!("Remote snapshot reset at {timestamp}");
                self.set_status(SyncStatus::RemoteReset { at: Utc::now() });
                Ok(())
            }
            Err(e) => {
                log::error!("Remote reset failed: {e:#}");
                self.set_status(SyncStatus::Error(format!("Reset failed: {e:#}")));
                Err(e)
            }
        }
    }

    async fn write_reset_marker(&self, timestamp: f64) -> Result<()> {
        let record = self
            .retry
            .run("fetch remote snapshot", || self.remote.fetch_record())
            .await?
            .unwrap_or_default();

        let outgoing = record.with_reset(timestamp).stamped_by(&self.device_id);
        self.retry
            .run("write reset snapshot", || self.remote.write_record(&outgoing))
            .await
    }

    /// Reset the remote first, then local state; local is untouched if the remote fails
    pub async fn reset_everywhere(&self) -> Result<()> {
        self.reset_remote().await?;
        self.store.reset_all()
    }

    /// Turn sync on and run a cycle straight away
    pub async fn enable(&self) -> Result<SyncOutcome> {
        self.store.set_sync_enabled(true)?;
        Ok(self.sync_now().await)
    }

    /// Turn sync off; an in-flight cycle still completes
    pub fn disable(&self) -> Result<()> {
        self.store.set_sync_enabled(false)?;
        self.set_status(SyncStatus::Disabled);
        Ok(())
    }

    /// Sync every `interval`, starting one interval from now
    ///
    /// A running schedule is stopped first, so there is never more than one
    /// timer. Must be called from within a tokio runtime.
    pub fn start_periodic_sync(self: &Arc<Self>, interval: Duration) {
        self.stop_periodic_sync();

        let interval = interval.max(MIN_SYNC_INTERVAL);
        let (shutdown, mut shutdown_rx) = watch::channel(false);
        let coordinator = Arc::downgrade(self);

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = shutdown_rx.changed() => break,
                    _ = ticker.tick() => {
                        // The cycle runs outside the select, so shutdown never cuts it short
                        let Some(coordinator) = coordinator.upgrade() else { break };
                        coordinator.sync_now().await;
                    }
                }
            }

            log::debug!("Periodic sync stopped");
        });

        log::info!("Periodic sync every {interval:?}");
        *self.periodic() = Some(PeriodicSync {
            shutdown,
            _task: task,
        });
    }

    /// Stop the periodic schedule; returns whether one was running
    pub fn stop_periodic_sync(&self) -> bool {
        match self.periodic().take() {
            Some(periodic) => {
                periodic.shutdown.send_replace(true);
                true
            }
            None => false,
        }
    }

    pub fn is_periodic_sync_running(&self) -> bool {
        self.periodic().is_some()
    }
}

impl Drop for SyncCoordinator {
    fn drop(&mut self) {
        self.stop_periodic_sync();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::MemoryRemoteStore;
    use crate::snapshot::SyncSnapshot;
    use crate::store::MemoryStore;

    fn coordinator(remote: &MemoryRemoteStore) -> Arc<SyncCoordinator> {
        let store = Arc::new(DecisionStore::open(MemoryStore::new()).unwrap());
        store.set_sync_enabled(true).unwrap();
        let retry = RetryPolicy {
            attempts: 2,
            base_delay: Duration::from_millis(10),
            timeout: Duration::from_secs(5),
        };
        Arc::new(
            SyncCoordinator::new(store, Arc::new(remote.clone()), retry).with_device_id("test-device"),
        )
    }

    #[tokio::test]
    async fn test_disabled_sync_never_contacts_remote() {
        let remote = MemoryRemoteStore::new();
        let coordinator = coordinator(&remote);
        coordinator.disable().unwrap();

        assert_eq!(coordinator.sync_now().await, SyncOutcome::Disabled);
        assert_eq!(coordinator.status(), SyncStatus::Disabled);
        assert_eq!(remote.fetch_count(), 0);
    }

    #[tokio::test]
    async fn test_first_sync_creates_remote_record() {
        let remote = MemoryRemoteStore::new();
        let coordinator = coordinator(&remote);
        coordinator.store().mark_kept("X", 1000.0).unwrap();

        let outcome = coordinator.sync_now().await;

        assert!(matches!(outcome, SyncOutcome::Synced(_)));
        let record = remote.record().expect("remote record created");
        assert_eq!(record.decode().kept_record.get("X"), Some(&1000.0));
        assert_eq!(record.modified_by(), Some("test-device"));
        assert!(matches!(coordinator.status(), SyncStatus::Synced { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_failure_is_retried() {
        let remote = MemoryRemoteStore::new();
        let coordinator = coordinator(&remote);
        remote.fail_next_fetches(1);

        assert!(matches!(coordinator.sync_now().await, SyncOutcome::Synced(_)));
        assert_eq!(remote.fetch_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_persistent_failure_surfaces_in_status() {
        let remote = MemoryRemoteStore::new();
        let coordinator = coordinator(&remote);
        coordinator.store().mark_kept("X", 1.0).unwrap();
        remote.fail_next_writes(5);

        let outcome = coordinator.sync_now().await;

        assert!(matches!(outcome, SyncOutcome::Failed(ref m) if m.contains("remote rejected write")));
        assert!(coordinator.status().is_error());
        // Merged state was kept locally; the remote catches up next time
        assert!(coordinator.store().is_kept("X"));
        assert!(remote.record().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_sync_is_coalesced() {
        let remote = MemoryRemoteStore::new();
        remote.set_latency(Duration::from_secs(1));
        let coordinator = coordinator(&remote);

        let (first, second) = tokio::join!(coordinator.sync_now(), coordinator.sync_now());

        let outcomes = [first, second];
        assert_eq!(
            outcomes.iter().filter(|o| matches!(o, SyncOutcome::Synced(_))).count(),
            1
        );
        assert!(outcomes.contains(&SyncOutcome::Coalesced));
        assert_eq!(remote.fetch_count(), 1);
        assert_eq!(remote.write_count(), 1);
    }

    #[tokio::test]
    async fn test_reset_remote_failure_leaves_local_untouched() {
        let remote = MemoryRemoteStore::new();
        let coordinator = coordinator(&remote);
        coordinator.store().mark_kept("X", 1.0).unwrap();
        remote.fail_next_fetches(2);

        assert!(coordinator.reset_everywhere().await.is_err());
        assert!(coordinator.store().is_kept("X"));
        assert!(coordinator.status().is_error());
    }

    #[tokio::test]
    async fn test_reset_remote_writes_marker() {
        let remote = MemoryRemoteStore::new();
        remote.set_record(Some(RemoteRecord::from_snapshot(&SyncSnapshot {
            deleted_count: 9,
            ..SyncSnapshot::default()
        })));
        let coordinator = coordinator(&remote);

        coordinator.reset_remote_at(5000.0).await.unwrap();

        let decoded = remote.record().unwrap().decode();
        assert!(decoded.is_fresh_reset());
        assert_eq!(decoded.reset_timestamp, 5000.0);
        assert!(matches!(coordinator.status(), SyncStatus::RemoteReset { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_periodic_sync_ticks_after_first_interval() {
        let remote = MemoryRemoteStore::new();
        let coordinator = coordinator(&remote);

        coordinator.start_periodic_sync(Duration::from_secs(12));
        assert!(coordinator.is_periodic_sync_running());

        tokio::time::sleep(Duration::from_secs(11)).await;
        assert_eq!(remote.fetch_count(), 0);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(remote.fetch_count(), 1);

        tokio::time::sleep(Duration::from_secs(12)).await;
        assert_eq!(remote.fetch_count(), 2);

        assert!(coordinator.stop_periodic_sync());
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(remote.fetch_count(), 2);
        assert!(!coordinator.stop_periodic_sync());
    }

    #[tokio::test(start_paused = true)]
    async fn test_periodic_outcomes_are_broadcast() {
        let remote = MemoryRemoteStore::new();
        let coordinator = coordinator(&remote);
        let mut outcomes = coordinator.subscribe_outcomes();

        coordinator.start_periodic_sync(Duration::from_secs(5));
        let outcome = outcomes.recv().await.unwrap();

        assert!(matches!(outcome, SyncOutcome::Synced(_)));
        coordinator.stop_periodic_sync();
    }

    #[tokio::test(start_paused = true)]
    async fn test_restarting_periodic_sync_replaces_timer() {
        let remote = MemoryRemoteStore::new();
        let coordinator = coordinator(&remote);

        coordinator.start_periodic_sync(Duration::from_secs(10));
        coordinator.start_periodic_sync(Duration::from_secs(10));

        tokio::time::sleep(Duration::from_secs(11)).await;
        assert_eq!(remote.fetch_count(), 1);
        coordinator.stop_periodic_sync();
    }

    #[tokio::test]
    async fn test_status_is_observable() {
        let remote = MemoryRemoteStore::new();
        let coordinator = coordinator(&remote);
        let mut status = coordinator.subscribe();

        coordinator.sync_now().await;

        assert!(status.has_changed().unwrap());
        assert!(matches!(*status.borrow_and_update(), SyncStatus::Synced { .. }));
    }
}
