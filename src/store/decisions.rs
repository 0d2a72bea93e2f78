use anyhow::Result;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard};

use crate::merge::{merge_snapshots, MergeResult};
use crate::snapshot::{epoch_now, keys, AssetId, DeletedSet, KeptRecord, SyncSnapshot};

use super::mapping::{JsonFileStore, MappingStore};

/// Cooldown after which a kept asset re-enters rotation under [`KeptPolicy::Cooldown`]
pub const DEFAULT_COOLDOWN_SECS: f64 = 7.0 * 24.0 * 60.0 * 60.0;

/// How long a "keep" decision excludes an asset from triage
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub enum KeptPolicy {
    /// Kept assets never come back
    #[default]
    Permanent,
    /// Kept assets come back once `secs` have passed since the decision
    Cooldown { secs: f64 },
}

/// Aggregate figures shown to the user
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Statistics {
    pub kept_count: usize,
    pub deleted_count: i64,
    pub freed_space_bytes: i64,
}

/// Everything the decision store persists, updated as one unit
#[derive(Debug, Clone, Default, PartialEq)]
struct Decisions {
    kept: KeptRecord,
    deleted: DeletedSet,
    deleted_count: i64,
    freed_space_bytes: i64,
    sync_enabled: bool,
}

impl Decisions {
    fn decode(map: &Map<String, Value>) -> Self {
        Decisions {
            kept: decode_field(map, keys::KEPT_IMAGES),
            deleted: decode_field::<Vec<AssetId>>(map, keys::DELETED_IMAGES)
                .into_iter()
                .collect(),
            deleted_count: decode_field(map, keys::DELETED_COUNT),
            freed_space_bytes: decode_field(map, keys::FREED_SPACE),
            sync_enabled: decode_field(map, keys::SYNC_ENABLED),
        }
    }

    /// Merge our fields into `base`, leaving keys we do not own untouched
    fn encode_into(&self, base: &Map<String, Value>) -> Map<String, Value> {
        let mut deleted: Vec<&AssetId> = self.deleted.iter().collect();
        deleted.sort();

        let mut map = base.clone();
        map.insert(
            keys::KEPT_IMAGES.to_string(),
            Value::Object(
                self.kept
                    .iter()
                    .map(|(id, ts)| (id.clone(), Value::from(*ts)))
                    .collect(),
            ),
        );
        map.insert(
            keys::DELETED_IMAGES.to_string(),
            Value::Array(deleted.into_iter().map(|id| Value::from(id.as_str())).collect()),
        );
        map.insert(keys::DELETED_COUNT.to_string(), Value::from(self.deleted_count));
        map.insert(keys::FREED_SPACE.to_string(), Value::from(self.freed_space_bytes));
        map.insert(keys::SYNC_ENABLED.to_string(), Value::from(self.sync_enabled));
        map
    }

    fn clear_decisions(&mut self) {
        self.kept.clear();
        self.deleted.clear();
        self.deleted_count = 0;
        self.freed_space_bytes = 0;
    }
}

fn decode_field<T>(map: &Map<String, Value>, key: &str) -> T
where
    T: Default + serde::de::DeserializeOwned,
{
    match map.get(key) {
        None | Some(Value::Null) => T::default(),
        Some(value) => serde_json::from_value(value.clone()).unwrap_or_else(|e| {
            log::warn!("Stored field '{key}' is unreadable, resetting it: {e}");
            T::default()
        }),
    }
}

struct Inner {
    decisions: Decisions,
    backing: Box<dyn MappingStore>,
    /// Last committed mapping, including keys owned by other components
    committed: Map<String, Value>,
}

impl Inner {
    /// Apply `f` to a staged copy, persist it, then make it current
    fn mutate<R>(&mut self, f: impl FnOnce(&mut Decisions) -> R) -> Result<R> {
        let mut staged = self.decisions.clone();
        let out = f(&mut staged);

        if staged != self.decisions {
            let map = staged.encode_into(&self.committed);
            self.backing.commit(&map)?;
            self.committed = map;
            self.decisions = staged;
        }

        Ok(out)
    }
}

/// Authoritative local record of keep/delete decisions and statistics
///
/// Every mutation is written through to the backing [`MappingStore`] before
/// it returns, and all operations serialize on one lock, so a keep decision
/// arriving during a merge write-back can never interleave with it.
pub struct DecisionStore {
    inner: Mutex<Inner>,
}

impl DecisionStore {
    /// Load the store from `backing`
    pub fn open(backing: impl MappingStore + 'static) -> Result<Self> {
        let committed = backing.load()?;
        let decisions = Decisions::decode(&committed);

        log::debug!(
            "Decision store loaded: {} kept, {} deleted",
            decisions.kept.len(),
            decisions.deleted.len()
        );

        Ok(Self {
            inner: Mutex::new(Inner {
                decisions,
                backing: Box::new(backing),
                committed,
            }),
        })
    }

    /// Load the store from `decisions.json` in the config directory
    pub fn open_default() -> Result<Self> {
        Self::open(JsonFileStore::open_default()?)
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn mutate<R>(&self, f: impl FnOnce(&mut Decisions) -> R) -> Result<R> {
        self.lock().mutate(f)
    }

    /// Record a keep decision, overwriting any earlier timestamp
    pub fn mark_kept(&self, id: &str, timestamp: f64) -> Result<()> {
        self.mutate(|d| {
            d.kept.insert(id.to_string(), timestamp);
        })
    }

    /// Record a keep decision made now
    pub fn mark_kept_now(&self, id: &str) -> Result<()> {
        self.mark_kept(id, epoch_now())
    }

    pub fn is_kept(&self, id: &str) -> bool {
        self.lock().decisions.kept.contains_key(id)
    }

    /// True if `id` was kept less than `cooldown_secs` ago
    pub fn is_kept_recently(&self, id: &str, cooldown_secs: f64) -> bool {
        self.is_kept_recently_at(id, cooldown_secs, epoch_now())
    }

    pub fn is_kept_recently_at(&self, id: &str, cooldown_secs: f64, now: f64) -> bool {
        self.lock()
            .decisions
            .kept
            .get(id)
            .is_some_and(|ts| now - ts < cooldown_secs)
    }

    /// Undo a keep decision; returns whether one existed
    pub fn remove_kept(&self, id: &str) -> Result<bool> {
        self.mutate(|d| d.kept.remove(id).is_some())
    }

    /// Record a deletion together with its statistics in one write
    pub fn mark_deleted(&self, id: &str, freed_bytes: i64) -> Result<()> {
        self.mutate(|d| {
            d.deleted.insert(id.to_string());
            d.deleted_count += 1;
            d.freed_space_bytes += freed_bytes;
        })
    }

    /// Record a deletion unless `id` is already in the deleted set
    ///
    /// Check and write happen under one lock. Returns whether anything was recorded.
    pub fn record_deletion(&self, id: &str, freed_bytes: i64) -> Result<bool> {
        self.mutate(|d| {
            if !d.deleted.insert(id.to_string()) {
                return false;
            }
            d.deleted_count += 1;
            d.freed_space_bytes += freed_bytes;
            true
        })
    }

    pub fn is_deleted(&self, id: &str) -> bool {
        self.lock().decisions.deleted.contains(id)
    }

    /// Whether triage should skip `id` under `policy`
    pub fn is_excluded(&self, id: &str, policy: KeptPolicy) -> bool {
        self.is_excluded_at(id, policy, epoch_now())
    }

    pub fn is_excluded_at(&self, id: &str, policy: KeptPolicy, now: f64) -> bool {
        let inner = self.lock();
        if inner.decisions.deleted.contains(id) {
            return true;
        }
        match (policy, inner.decisions.kept.get(id)) {
            (_, None) => false,
            (KeptPolicy::Permanent, Some(_)) => true,
            (KeptPolicy::Cooldown { secs }, Some(ts)) => now - ts < secs,
        }
    }

    /// Clear every decision and both counters
    ///
    /// The sync toggle is a user preference and survives.
    pub fn reset_all(&self) -> Result<()> {
        log::info!("Resetting all local decisions");
        self.mutate(Decisions::clear_decisions)
    }

    /// Remove kept entries for the given IDs, or all of them when `scope` is `None`
    ///
    /// Returns the number of entries removed.
    pub fn reset_kept_for_scope(&self, scope: Option<&HashSet<AssetId>>) -> Result<usize> {
        self.mutate(|d| {
            let before = d.kept.len();
            match scope {
                Some(ids) => d.kept.retain(|id, _| !ids.contains(id)),
                None => d.kept.clear(),
            }
            before - d.kept.len()
        })
    }

    /// Remove deleted entries for the given IDs, or all of them when `scope` is `None`
    ///
    /// Counters are statistics of work already done and are not rolled back.
    pub fn reset_deleted_for_scope(&self, scope: Option<&HashSet<AssetId>>) -> Result<usize> {
        self.mutate(|d| {
            let before = d.deleted.len();
            match scope {
                Some(ids) => d.deleted.retain(|id| !ids.contains(id)),
                None => d.deleted.clear(),
            }
            before - d.deleted.len()
        })
    }

    pub fn kept_record(&self) -> KeptRecord {
        self.lock().decisions.kept.clone()
    }

    pub fn set_kept_record(&self, kept: KeptRecord) -> Result<()> {
        self.mutate(|d| d.kept = kept)
    }

    pub fn deleted_set(&self) -> DeletedSet {
        self.lock().decisions.deleted.clone()
    }

    pub fn set_deleted_set(&self, deleted: DeletedSet) -> Result<()> {
        self.mutate(|d| d.deleted = deleted)
    }

    pub fn deleted_count(&self) -> i64 {
        self.lock().decisions.deleted_count
    }

    pub fn set_deleted_count(&self, count: i64) -> Result<()> {
        self.mutate(|d| d.deleted_count = count)
    }

    pub fn freed_space_bytes(&self) -> i64 {
        self.lock().decisions.freed_space_bytes
    }

    pub fn set_freed_space_bytes(&self, bytes: i64) -> Result<()> {
        self.mutate(|d| d.freed_space_bytes = bytes)
    }

    pub fn kept_count(&self) -> usize {
        self.lock().decisions.kept.len()
    }

    pub fn stats(&self) -> Statistics {
        let inner = self.lock();
        Statistics {
            kept_count: inner.decisions.kept.len(),
            deleted_count: inner.decisions.deleted_count,
            freed_space_bytes: inner.decisions.freed_space_bytes,
        }
    }

    /// Current state as a snapshot; the local side carries no reset marker
    pub fn snapshot(&self) -> SyncSnapshot {
        snapshot_of(&self.lock().decisions)
    }

    /// Replace the four decision fields with `merged` in one write
    ///
    /// With `reset_first`, the store is cleared before being overwritten so a
    /// remote reset also takes effect locally.
    pub fn apply_merged(&self, merged: &SyncSnapshot, reset_first: bool) -> Result<()> {
        self.lock().mutate(|d| apply_to(d, merged, reset_first))
    }

    /// Merge the current local state with `remote` and persist the result
    ///
    /// Snapshot, merge and write-back happen under one lock acquisition, so
    /// no local decision can slip in between and be overwritten.
    pub fn reconcile(&self, remote: &SyncSnapshot) -> Result<MergeResult> {
        let mut inner = self.lock();
        let local = snapshot_of(&inner.decisions);
        let result = merge_snapshots(&local, remote);

        let reset_first = result.stats.reset_applied;
        if reset_first {
            log::info!("Applying remote reset to local decisions");
        }
        inner.mutate(|d| apply_to(d, &result.merged, reset_first))?;

        Ok(result)
    }

    pub fn sync_enabled(&self) -> bool {
        self.lock().decisions.sync_enabled
    }

    pub fn set_sync_enabled(&self, enabled: bool) -> Result<()> {
        self.mutate(|d| d.sync_enabled = enabled)
    }
}

fn snapshot_of(d: &Decisions) -> SyncSnapshot {
    SyncSnapshot {
        kept_record: d.kept.clone(),
        deleted_set: d.deleted.clone(),
        deleted_count: d.deleted_count,
        freed_space_bytes: d.freed_space_bytes,
        reset_timestamp: 0.0,
    }
}

fn apply_to(d: &mut Decisions, merged: &SyncSnapshot, reset_first: bool) {
    if reset_first {
        d.clear_decisions();
    }
    d.kept = merged.kept_record.clone();
    d.deleted = merged.deleted_set.clone();
    d.deleted_count = merged.deleted_count;
    d.freed_space_bytes = merged.freed_space_bytes;
}
