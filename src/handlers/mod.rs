//! Command handler modules
//!
//! One module per area of the CLI. Handlers print with `colored` and return
//! `anyhow` errors to `main`.

pub mod config;
pub mod decisions;
pub mod history;
pub mod reset;
pub mod status;
pub mod sync;
pub mod triage;

use anyhow::{Context, Result};
use std::sync::Arc;

use crate::remote::FileRemoteStore;
use crate::settings::SyncSettings;
use crate::store::DecisionStore;
use crate::sync::SyncCoordinator;

pub use config::handle_config;
pub use decisions::{handle_delete, handle_keep, handle_unkeep};
pub use history::{handle_history_clear, handle_history_list};
pub use reset::handle_reset;
pub use status::handle_status;
pub use sync::{handle_sync, handle_watch};
pub use triage::handle_triage;

/// Check if we're running in an interactive terminal
pub fn is_interactive() -> bool {
    atty::is(atty::Stream::Stdin) && atty::is(atty::Stream::Stdout)
}

/// Everything a command needs: settings, the local store and a coordinator
/// bound to the configured remote
pub struct AppContext {
    pub settings: SyncSettings,
    pub store: Arc<DecisionStore>,
    pub coordinator: Arc<SyncCoordinator>,
}

impl AppContext {
    pub fn open() -> Result<Self> {
        let mut settings = SyncSettings::load().context("Failed to load settings")?;
        let (device_id, created) = settings.ensure_device_id();
        if created {
            log::info!("Generated device ID {device_id}");
            settings.save().context("Failed to save device ID")?;
        }

        let store = Arc::new(DecisionStore::open_default().context("Failed to open decision store")?);
        let coordinator = coordinator_for(&settings, store.clone(), &device_id.to_string())?;

        Ok(Self {
            settings,
            store,
            coordinator,
        })
    }

    pub fn device_id(&self) -> Option<String> {
        Some(self.coordinator.device_id().to_string())
    }
}

/// A coordinator for `store` bound to the remote that `settings` names
pub fn coordinator_for(
    settings: &SyncSettings,
    store: Arc<DecisionStore>,
    device_id: &str,
) -> Result<Arc<SyncCoordinator>> {
    let remote = Arc::new(FileRemoteStore::new(settings.remote_dir()?));
    Ok(Arc::new(
        SyncCoordinator::new(store, remote, settings.retry_policy()).with_device_id(device_id),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::sync::SyncOutcome;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_coordinator_writes_to_the_configured_remote() {
        let old_remote = TempDir::new().unwrap();
        let new_remote = TempDir::new().unwrap();
        let store = Arc::new(DecisionStore::open(MemoryStore::new()).unwrap());
        store.mark_kept("A", 30.0).unwrap();

        let mut settings = SyncSettings {
            remote_path: Some(old_remote.path().to_path_buf()),
            ..Default::default()
        };
        let before = coordinator_for(&settings, store.clone(), "device").unwrap();

        settings.remote_path = Some(new_remote.path().to_path_buf());
        let after = coordinator_for(&settings, store.clone(), before.device_id()).unwrap();
        assert!(matches!(after.enable().await.unwrap(), SyncOutcome::Synced(_)));

        assert_eq!(after.device_id(), "device");
        assert!(new_remote.path().join("record.json").exists());
        assert!(!old_remote.path().join("record.json").exists());
    }
}
