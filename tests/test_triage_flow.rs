use std::collections::HashSet;
use std::fs;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

use swipeclean_sync::assets::{AssetSource, DirectoryAssetSource};
use swipeclean_sync::remote::MemoryRemoteStore;
use swipeclean_sync::store::{DecisionStore, KeptPolicy, MemoryStore};
use swipeclean_sync::sync::{RetryPolicy, SyncCoordinator, SyncOutcome};
use swipeclean_sync::triage::{reset_scope, triage_queue, TriageFilter, TriageSession};

fn library() -> TempDir {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    fs::create_dir_all(root.join("Trip")).unwrap();
    fs::write(root.join("a.jpg"), vec![0u8; 300]).unwrap();
    fs::write(root.join("b.jpg"), vec![0u8; 200]).unwrap();
    fs::write(root.join("Trip").join("c.jpg"), vec![0u8; 100]).unwrap();
    temp
}

fn store() -> Arc<DecisionStore> {
    let store = Arc::new(DecisionStore::open(MemoryStore::new()).unwrap());
    store.set_sync_enabled(true).unwrap();
    store
}

fn queued_ids(store: &DecisionStore, source: &dyn AssetSource) -> HashSet<String> {
    triage_queue(store, source, KeptPolicy::Permanent, &TriageFilter::default())
        .unwrap()
        .into_iter()
        .map(|a| a.id)
        .collect()
}

fn ids(list: &[&str]) -> HashSet<String> {
    list.iter().map(|s| s.to_string()).collect()
}

#[test]
fn test_review_deletes_files_and_records_decisions() {
    let temp = library();
    let source = DirectoryAssetSource::new(temp.path());
    let store = store();

    let mut session =
        TriageSession::start(&store, &source, KeptPolicy::Permanent, TriageFilter::default())
            .unwrap();
    assert_eq!(session.remaining(), 3);

    let mut staged = Vec::new();
    while let Some(id) = session.mark_current_for_deletion().unwrap() {
        staged.push(id);
    }
    assert_eq!(staged.len(), 3);
    assert_eq!(store.deleted_count(), 0);

    let outcome = session
        .confirm_review(&ids(&["a.jpg", "Trip/c.jpg"]))
        .unwrap();

    assert_eq!(outcome.freed_bytes, 400);
    assert!(!temp.path().join("a.jpg").exists());
    assert!(!temp.path().join("Trip").join("c.jpg").exists());
    assert!(temp.path().join("b.jpg").exists());
    assert_eq!(store.deleted_count(), 2);
    assert_eq!(store.freed_space_bytes(), 400);
    assert!(store.is_kept("b.jpg"));
    assert!(queued_ids(&store, &source).is_empty());
}

#[test]
fn test_album_reset_returns_assets_to_the_queue() {
    let temp = library();
    let source = DirectoryAssetSource::new(temp.path());
    let store = store();
    store.mark_kept_now("Trip/c.jpg").unwrap();
    store.mark_kept_now("a.jpg").unwrap();

    assert_eq!(queued_ids(&store, &source), ids(&["b.jpg"]));

    let (kept, deleted) = reset_scope(&store, &source, Some("Trip")).unwrap();
    assert_eq!((kept, deleted), (1, 0));
    assert_eq!(queued_ids(&store, &source), ids(&["b.jpg", "Trip/c.jpg"]));
}

#[test]
fn test_cooldown_policy_brings_kept_assets_back() {
    let temp = library();
    let source = DirectoryAssetSource::new(temp.path());
    let store = store();
    // Kept long ago
    store.mark_kept("a.jpg", 1.0).unwrap();

    let permanent =
        triage_queue(&store, &source, KeptPolicy::Permanent, &TriageFilter::default()).unwrap();
    let cooldown = triage_queue(
        &store,
        &source,
        KeptPolicy::Cooldown { secs: 60.0 },
        &TriageFilter::default(),
    )
    .unwrap();

    assert_eq!(permanent.len(), 2);
    assert_eq!(cooldown.len(), 3);
}

#[tokio::test]
async fn test_decisions_from_one_device_hide_assets_on_another() {
    let temp = library();
    let source = DirectoryAssetSource::new(temp.path());
    let remote = MemoryRemoteStore::new();
    let retry = RetryPolicy::once(Duration::from_secs(5));

    let phone = SyncCoordinator::new(store(), Arc::new(remote.clone()), retry)
        .with_device_id("phone");
    let tablet =
        SyncCoordinator::new(store(), Arc::new(remote.clone()), retry).with_device_id("tablet");

    phone.store().mark_kept_now("a.jpg").unwrap();
    phone.store().mark_deleted("b.jpg", 200).unwrap();

    assert!(matches!(phone.sync_now().await, SyncOutcome::Synced(_)));
    assert!(matches!(tablet.sync_now().await, SyncOutcome::Synced(_)));

    assert_eq!(queued_ids(tablet.store(), &source), ids(&["Trip/c.jpg"]));
}
