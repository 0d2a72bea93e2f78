//! Headless triage session
//!
//! Walks the assets that still need a decision one at a time. "Keep" is
//! recorded straight away; "delete" only stages the asset for review. The
//! review step deletes the confirmed assets through the [`AssetSource`] one
//! at a time and records each of them exactly once.

use anyhow::{Context, Result};
use std::collections::{HashSet, VecDeque};

use crate::assets::{AlbumId, Asset, AssetSource, DateRange};
use crate::snapshot::AssetId;
use crate::store::{DecisionStore, KeptPolicy};

/// Which assets a session covers
#[derive(Debug, Clone, Default)]
pub struct TriageFilter {
    pub album: Option<AlbumId>,
    pub date_range: Option<DateRange>,
}

#[derive(Debug, Clone)]
enum Decision {
    Kept(Asset),
    Staged(Asset),
}

/// Result of confirming the review step
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReviewOutcome {
    pub deleted: Vec<AssetId>,
    pub kept: Vec<AssetId>,
    pub freed_bytes: i64,
}

/// Assets still needing a decision, oldest first
pub fn triage_queue(
    store: &DecisionStore,
    source: &dyn AssetSource,
    policy: KeptPolicy,
    filter: &TriageFilter,
) -> Result<Vec<Asset>> {
    let mut queue: Vec<Asset> = source
        .list_assets(filter.album.as_deref())
        .context("Failed to list assets")?
        .into_iter()
        .filter(|asset| !store.is_excluded(&asset.id, policy))
        .filter(|asset| {
            filter
                .date_range
                .map_or(true, |range| range.contains(asset.creation_date))
        })
        .collect();

    // Undated assets sort last; ties broken by ID for a stable order
    queue.sort_by(|a, b| match (a.creation_date, b.creation_date) {
        (Some(x), Some(y)) => x.cmp(&y).then_with(|| a.id.cmp(&b.id)),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => a.id.cmp(&b.id),
    });

    Ok(queue)
}

pub struct TriageSession<'a> {
    store: &'a DecisionStore,
    source: &'a dyn AssetSource,
    policy: KeptPolicy,
    filter: TriageFilter,
    queue: VecDeque<Asset>,
    pending: Vec<Asset>,
    history: Vec<Decision>,
}

impl<'a> TriageSession<'a> {
    pub fn start(
        store: &'a DecisionStore,
        source: &'a dyn AssetSource,
        policy: KeptPolicy,
        filter: TriageFilter,
    ) -> Result<Self> {
        let queue = triage_queue(store, source, policy, &filter)?;
        log::info!("Triage session started with {} asset(s)", queue.len());

        Ok(Self {
            store,
            source,
            policy,
            filter,
            queue: queue.into(),
            pending: Vec::new(),
            history: Vec::new(),
        })
    }

    /// The asset awaiting a decision
    pub fn current(&self) -> Option<&Asset> {
        self.queue.front()
    }

    pub fn remaining(&self) -> usize {
        self.queue.len()
    }

    /// Assets staged for deletion, in the order they were staged
    pub fn pending(&self) -> &[Asset] {
        &self.pending
    }

    pub fn can_undo(&self) -> bool {
        !self.history.is_empty()
    }

    /// Keep the current asset; the decision is stored immediately
    pub fn keep_current(&mut self) -> Result<Option<AssetId>> {
        let Some(asset) = self.queue.front().cloned() else {
            return Ok(None);
        };

        self.store.mark_kept_now(&asset.id)?;
        self.queue.pop_front();
        let id = asset.id.clone();
        self.history.push(Decision::Kept(asset));
        self.refill_if_empty()?;
        Ok(Some(id))
    }

    /// Stage the current asset for deletion; nothing is stored until review
    pub fn mark_current_for_deletion(&mut self) -> Result<Option<AssetId>> {
        let Some(asset) = self.queue.pop_front() else {
            return Ok(None);
        };

        let id = asset.id.clone();
        self.pending.push(asset.clone());
        self.history.push(Decision::Staged(asset));
        self.refill_if_empty()?;
        Ok(Some(id))
    }

    /// Revert the most recent decision and put its asset back at the front
    pub fn undo_last(&mut self) -> Result<Option<AssetId>> {
        let Some(decision) = self.history.pop() else {
            return Ok(None);
        };

        let asset = match decision {
            Decision::Kept(asset) => {
                self.store.remove_kept(&asset.id)?;
                asset
            }
            Decision::Staged(asset) => {
                self.pending.retain(|staged| staged.id != asset.id);
                asset
            }
        };

        let id = asset.id.clone();
        self.queue.retain(|queued| queued.id != asset.id);
        self.queue.push_front(asset);
        Ok(Some(id))
    }

    /// Delete the `selected` staged assets and keep the rest of the batch
    ///
    /// Assets are deleted one at a time and each is recorded as soon as the
    /// source has removed it. If a deletion fails, the assets already removed
    /// stay recorded and leave the batch, the rest stays staged, and the
    /// error is returned.
    pub fn confirm_review(&mut self, selected: &HashSet<AssetId>) -> Result<ReviewOutcome> {
        let (to_delete, to_keep): (Vec<Asset>, Vec<Asset>) = self
            .pending
            .iter()
            .cloned()
            .partition(|asset| selected.contains(&asset.id));

        let mut outcome = ReviewOutcome::default();

        for asset in &to_delete {
            if let Err(e) = self.delete_one(asset) {
                self.drop_from_batch(&outcome.deleted);
                return Err(e.context(format!(
                    "Failed to delete selected assets ({} of {} deleted)",
                    outcome.deleted.len(),
                    to_delete.len()
                )));
            }
            outcome.deleted.push(asset.id.clone());
            outcome.freed_bytes += asset.byte_size;
        }

        for asset in &to_keep {
            self.store.mark_kept_now(&asset.id)?;
        }
        outcome.kept = to_keep.into_iter().map(|a| a.id).collect();

        self.pending.clear();
        self.history.clear();
        self.refill_if_empty()?;

        log::info!(
            "Review confirmed: {} deleted, {} kept, {} bytes freed",
            outcome.deleted.len(),
            outcome.kept.len(),
            outcome.freed_bytes
        );
        Ok(outcome)
    }

    fn delete_one(&self, asset: &Asset) -> Result<()> {
        self.source
            .delete_assets(std::slice::from_ref(&asset.id))
            .with_context(|| format!("Failed to delete {}", asset.id))?;
        if !self.store.record_deletion(&asset.id, asset.byte_size)? {
            log::warn!("Deletion of {} was already recorded", asset.id);
        }
        Ok(())
    }

    /// Forget staged and undoable entries for assets that are already gone
    fn drop_from_batch(&mut self, removed: &[AssetId]) {
        self.pending.retain(|asset| !removed.contains(&asset.id));
        self.history.retain(|decision| match decision {
            Decision::Staged(asset) => !removed.contains(&asset.id),
            Decision::Kept(_) => true,
        });
    }

    /// Reload from the source once the queue runs dry, skipping staged assets
    fn refill_if_empty(&mut self) -> Result<()> {
        if !self.queue.is_empty() {
            return Ok(());
        }

        let staged: HashSet<&AssetId> = self.pending.iter().map(|a| &a.id).collect();
        self.queue = triage_queue(self.store, self.source, self.policy, &self.filter)?
            .into_iter()
            .filter(|asset| !staged.contains(&asset.id))
            .collect();
        Ok(())
    }
}

/// Clear decisions for the assets of one album, or everything when `album` is `None`
///
/// Returns how many kept and deleted entries were removed. Counters are left as is.
pub fn reset_scope(
    store: &DecisionStore,
    source: &dyn AssetSource,
    album: Option<&str>,
) -> Result<(usize, usize)> {
    let scope: Option<HashSet<AssetId>> = match album {
        Some(album) => Some(
            source
                .list_assets(Some(album))?
                .into_iter()
                .map(|asset| asset.id)
                .collect(),
        ),
        None => None,
    };

    let kept = store.reset_kept_for_scope(scope.as_ref())?;
    let deleted = store.reset_deleted_for_scope(scope.as_ref())?;
    log::info!(
        "Reset {} kept and {} deleted decision(s) in {}",
        kept,
        deleted,
        album.unwrap_or("the whole library")
    );
    Ok((kept, deleted))
}
