//! Sync and watch command handlers

use anyhow::{anyhow, Context, Result};
use colored::Colorize;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;

use crate::history::{record_operation, OperationRecord};
use crate::logger::log_sync_outcome;
use crate::sync::SyncOutcome;

use super::AppContext;

fn print_outcome(outcome: &SyncOutcome) {
    match outcome {
        SyncOutcome::Synced(stats) => {
            println!(
                "{} {} kept, {} deleted",
                "Synced:".green().bold(),
                stats.merged_kept,
                stats.merged_deleted
            );
            if stats.reset_applied {
                println!(
                    "  {} another device reset the shared data; {} local decision(s) were older and dropped",
                    "Note:".yellow(),
                    stats.kept_dropped_by_reset
                );
            }
            if stats.kept_and_deleted > 0 {
                println!(
                    "  {} {} asset(s) are both kept and deleted",
                    "Warning:".yellow(),
                    stats.kept_and_deleted
                );
            }
        }
        SyncOutcome::Failed(message) => {
            println!("{} {}", "Sync failed:".red().bold(), message);
        }
        SyncOutcome::Disabled => {
            println!(
                "{}",
                "Sync is disabled. Enable it with 'config --enable-sync'.".yellow()
            );
        }
        SyncOutcome::Coalesced => {
            println!("{}", "A sync is already running.".dimmed());
        }
    }
}

/// Run a single sync cycle
pub async fn handle_sync(ctx: &AppContext) -> Result<()> {
    let outcome = ctx.coordinator.sync_now().await;
    print_outcome(&outcome);
    log_sync_outcome(&outcome, ctx.coordinator.device_id());

    if let Some(record) = OperationRecord::from_sync(&outcome, ctx.device_id()) {
        record_operation(record);
    }

    match outcome {
        SyncOutcome::Failed(message) => Err(anyhow!(message)),
        _ => Ok(()),
    }
}

/// Sync once, then periodically until Ctrl-C
pub async fn handle_watch(ctx: &AppContext, interval: Option<u64>) -> Result<()> {
    if !ctx.store.sync_enabled() {
        print_outcome(&SyncOutcome::Disabled);
        return Ok(());
    }

    let interval = interval
        .map(Duration::from_secs)
        .unwrap_or_else(|| ctx.settings.sync_interval());

    println!(
        "{} every {}s (Ctrl-C to stop)",
        "Watching".cyan().bold(),
        interval.as_secs().max(1)
    );

    // Subscribed before the first cycle so its outcome is printed by the loop
    let mut outcomes = ctx.coordinator.subscribe_outcomes();
    ctx.coordinator.sync_now().await;
    ctx.coordinator.start_periodic_sync(interval);

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            result = &mut ctrl_c => {
                result.context("Failed to listen for Ctrl-C")?;
                break;
            }
            received = outcomes.recv() => match received {
                Ok(outcome) => {
                    print_outcome(&outcome);
                    log_sync_outcome(&outcome, ctx.coordinator.device_id());
                    if let Some(record) = OperationRecord::from_sync(&outcome, ctx.device_id()) {
                        record_operation(record);
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    log::warn!("Missed {skipped} sync outcome(s)");
                }
                Err(RecvError::Closed) => break,
            },
        }
    }

    ctx.coordinator.stop_periodic_sync();
    println!("\n{}", "Stopped watching.".dimmed());
    Ok(())
}
