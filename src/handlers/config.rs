//! Configuration command handler

use anyhow::{anyhow, Result};
use colored::Colorize;
use std::path::PathBuf;

use crate::logger::log_sync_outcome;
use crate::settings::{show_settings, update_settings, KeptPolicyKind};
use crate::sync::SyncOutcome;

use super::{coordinator_for, AppContext};

/// Options accepted by the `config` command
#[derive(Debug, Default)]
pub struct ConfigChanges {
    pub enable_sync: bool,
    pub disable_sync: bool,
    pub interval: Option<u64>,
    pub policy: Option<KeptPolicyKind>,
    pub cooldown_days: Option<u32>,
    pub remote: Option<PathBuf>,
    pub show: bool,
}

impl ConfigChanges {
    fn touches_settings(&self) -> bool {
        self.interval.is_some()
            || self.policy.is_some()
            || self.cooldown_days.is_some()
            || self.remote.is_some()
    }
}

pub async fn handle_config(ctx: &AppContext, changes: ConfigChanges) -> Result<()> {
    if changes.enable_sync && changes.disable_sync {
        return Err(anyhow!("--enable-sync and --disable-sync cannot be combined"));
    }

    let settings = if changes.touches_settings() {
        update_settings(
            changes.interval,
            changes.policy,
            changes.cooldown_days,
            changes.remote.clone(),
        )?
    } else {
        ctx.settings.clone()
    };

    // A new remote takes effect for the enable below, not only on the next run
    let coordinator = if changes.remote.is_some() {
        coordinator_for(&settings, ctx.store.clone(), ctx.coordinator.device_id())?
    } else {
        ctx.coordinator.clone()
    };

    if changes.disable_sync {
        coordinator.disable()?;
        println!("{}", "Sync disabled".green());
    }

    if changes.enable_sync {
        println!("{}", "Sync enabled, running first sync...".green());
        let outcome = coordinator.enable().await?;
        log_sync_outcome(&outcome, coordinator.device_id());
        match outcome {
            SyncOutcome::Synced(stats) => println!(
                "  {} {} kept, {} deleted",
                "Synced:".green(),
                stats.merged_kept,
                stats.merged_deleted
            ),
            SyncOutcome::Failed(message) => println!(
                "  {} {} (will retry on the next sync)",
                "Sync failed:".red(),
                message
            ),
            SyncOutcome::Disabled | SyncOutcome::Coalesced => {}
        }
    }

    let changed = changes.touches_settings() || changes.enable_sync || changes.disable_sync;
    if changes.show || !changed {
        show_settings(&settings, ctx.store.sync_enabled())?;
    }

    Ok(())
}
