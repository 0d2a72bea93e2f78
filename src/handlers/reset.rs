//! Reset command handler

use anyhow::{anyhow, Context, Result};
use colored::Colorize;
use inquire::Confirm;
use std::path::Path;

use crate::assets::DirectoryAssetSource;
use crate::history::{record_operation, OperationRecord};
use crate::logger::log_to_file;
use crate::triage::reset_scope;

use super::{is_interactive, AppContext};

fn confirm(prompt: &str, assume_yes: bool) -> Result<bool> {
    if assume_yes {
        return Ok(true);
    }
    if !is_interactive() {
        return Err(anyhow!(
            "Refusing to reset without confirmation; pass --yes when not running in a terminal"
        ));
    }

    Confirm::new(prompt)
        .with_default(false)
        .prompt()
        .context("Failed to get confirmation")
}

/// Reset everything (remote first, then local) or only one album's decisions locally
pub async fn handle_reset(
    ctx: &AppContext,
    album: Option<&str>,
    dir: Option<&Path>,
    assume_yes: bool,
) -> Result<()> {
    if let Some(album) = album {
        let dir = dir.ok_or_else(|| anyhow!("--album needs --dir to list the album's assets"))?;

        if !confirm(&format!("Forget all decisions for album '{album}'?"), assume_yes)? {
            println!("{}", "Reset cancelled.".yellow());
            return Ok(());
        }

        let source = DirectoryAssetSource::new(dir);
        let result = reset_scope(&ctx.store, &source, Some(album));
        record_operation(OperationRecord::reset(
            format!("album {album}"),
            result.is_ok(),
            ctx.device_id(),
        ));
        let (kept, deleted) = result?;

        println!(
            "{} Cleared {} kept and {} deleted decision(s) in {}",
            "✓".green(),
            kept,
            deleted,
            album.bold()
        );
        println!(
            "{}",
            "Album resets are local; other devices keep their decisions.".dimmed()
        );
        return Ok(());
    }

    let prompt = if ctx.store.sync_enabled() {
        "Erase all decisions on this device and in the shared remote?"
    } else {
        "Erase all decisions on this device?"
    };
    if !confirm(prompt, assume_yes)? {
        println!("{}", "Reset cancelled.".yellow());
        return Ok(());
    }

    let (scope, result) = if ctx.store.sync_enabled() {
        ("all devices", ctx.coordinator.reset_everywhere().await)
    } else {
        ("this device", ctx.store.reset_all())
    };
    record_operation(OperationRecord::reset(scope, result.is_ok(), ctx.device_id()));
    let status = if result.is_ok() { "ok" } else { "failed" };
    if let Err(e) = log_to_file(&format!("reset {status} scope={scope}")) {
        log::warn!("Failed to write activity log: {e:#}");
    }

    result.context("Reset failed; local decisions were left untouched")?;
    println!("{} All decisions cleared on {}", "✓".green(), scope);
    Ok(())
}
