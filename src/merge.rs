use serde::{Deserialize, Serialize};

use crate::snapshot::{DeletedSet, KeptRecord, SyncSnapshot};

/// Result of reconciling a local and a remote snapshot
#[derive(Debug, Clone, PartialEq)]
pub struct MergeResult {
    /// The reconciled snapshot, to be written locally and remotely
    pub merged: SyncSnapshot,

    /// Statistics about the merge
    pub stats: MergeStats,
}

/// Statistics about a merge operation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MergeStats {
    /// Whether the remote was found freshly reset
    pub reset_applied: bool,

    /// Kept entries on each side and in the result
    pub local_kept: usize,
    pub remote_kept: usize,
    pub merged_kept: usize,

    /// Local kept entries discarded because they predate the reset timestamp
    pub kept_dropped_by_reset: usize,

    /// Shared kept entries where the local timestamp was newer than the remote one
    pub kept_timestamps_advanced: usize,

    /// Deleted entries on each side and in the result
    pub local_deleted: usize,
    pub remote_deleted: usize,
    pub merged_deleted: usize,

    /// Asset IDs present in both the merged kept record and the merged deleted set
    pub kept_and_deleted: usize,
}

/// Pure reconciler for decision snapshots
///
/// Kept timestamps resolve by maximum, deletions by union and counters as
/// high-water marks. A freshly reset remote wipes everything except local
/// keep decisions made after the reset.
pub struct SnapshotMerger<'a> {
    local: &'a SyncSnapshot,
    remote: &'a SyncSnapshot,
    stats: MergeStats,
}

impl<'a> SnapshotMerger<'a> {
    /// Creates a new merger for the given snapshots
    pub fn new(local: &'a SyncSnapshot, remote: &'a SyncSnapshot) -> Self {
        SnapshotMerger {
            local,
            remote,
            stats: MergeStats::default(),
        }
    }

    /// Performs the merge and returns the result
    pub fn merge(mut self) -> MergeResult {
        self.stats.local_kept = self.local.kept_record.len();
        self.stats.remote_kept = self.remote.kept_record.len();
        self.stats.local_deleted = self.local.deleted_set.len();
        self.stats.remote_deleted = self.remote.deleted_set.len();

        let merged = if self.remote.is_fresh_reset() {
            self.stats.reset_applied = true;
            self.merge_after_reset()
        } else {
            self.merge_normal()
        };

        self.stats.merged_kept = merged.kept_record.len();
        self.stats.merged_deleted = merged.deleted_set.len();
        self.stats.kept_and_deleted = merged
            .kept_record
            .keys()
            .filter(|id| merged.deleted_set.contains(*id))
            .count();

        if self.stats.kept_and_deleted > 0 {
            log::warn!(
                "{} asset(s) are both kept and deleted after merge",
                self.stats.kept_and_deleted
            );
        }

        MergeResult {
            merged,
            stats: self.stats,
        }
    }

    /// Remote was cleared at `reset_timestamp`: only later keep decisions survive
    fn merge_after_reset(&mut self) -> SyncSnapshot {
        let reset_at = self.remote.reset_timestamp;

        let kept_record: KeptRecord = self
            .local
            .kept_record
            .iter()
            .filter(|(_, ts)| **ts > reset_at)
            .map(|(id, ts)| (id.clone(), *ts))
            .collect();

        self.stats.kept_dropped_by_reset = self.local.kept_record.len() - kept_record.len();

        log::info!(
            "Remote was reset at {reset_at}; keeping {} post-reset decision(s), dropping {}",
            kept_record.len(),
            self.stats.kept_dropped_by_reset
        );

        SyncSnapshot {
            kept_record,
            deleted_set: DeletedSet::new(),
            deleted_count: 0,
            freed_space_bytes: 0,
            reset_timestamp: reset_at,
        }
    }

    fn merge_normal(&mut self) -> SyncSnapshot {
        SyncSnapshot {
            kept_record: self.merge_kept(),
            deleted_set: self
                .local
                .deleted_set
                .union(&self.remote.deleted_set)
                .cloned()
                .collect(),
            // High-water marks, not sums: both sides may have counted the same deletions
            deleted_count: self.local.deleted_count.max(self.remote.deleted_count),
            freed_space_bytes: self
                .local
                .freed_space_bytes
                .max(self.remote.freed_space_bytes),
            reset_timestamp: self.remote.reset_timestamp,
        }
    }

    fn merge_kept(&mut self) -> KeptRecord {
        let reset_at = self.remote.reset_timestamp;
        let mut merged = self.remote.kept_record.clone();

        for (id, local_ts) in &self.local.kept_record {
            match merged.get_mut(id) {
                Some(remote_ts) => {
                    if *local_ts > *remote_ts {
                        *remote_ts = *local_ts;
                        self.stats.kept_timestamps_advanced += 1;
                    }
                }
                None if *local_ts > reset_at => {
                    merged.insert(id.clone(), *local_ts);
                }
                None => {
                    log::debug!("Dropping kept '{id}' at {local_ts}: predates reset at {reset_at}");
                    self.stats.kept_dropped_by_reset += 1;
                }
            }
        }

        merged
    }
}

/// Reconcile a local snapshot with a remote one
///
/// This is the single entry point of the merge engine. It never fails and
/// performs no I/O.
pub fn merge_snapshots(local: &SyncSnapshot, remote: &SyncSnapshot) -> MergeResult {
    SnapshotMerger::new(local, remote).merge()
}
