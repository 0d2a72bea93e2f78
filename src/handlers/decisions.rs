//! Handlers for recording single decisions by asset ID

use anyhow::{anyhow, Result};
use colored::Colorize;

use super::status::format_bytes;
use super::AppContext;

pub fn handle_keep(ctx: &AppContext, id: &str) -> Result<()> {
    ctx.store.mark_kept_now(id)?;
    println!("{} Kept {}", "✓".green(), id.bold());
    Ok(())
}

pub fn handle_unkeep(ctx: &AppContext, id: &str) -> Result<()> {
    if ctx.store.remove_kept(id)? {
        println!("{} {} is back in rotation", "✓".green(), id.bold());
    } else {
        println!("{}", format!("{id} was not kept").yellow());
    }
    Ok(())
}

/// Record a deletion done outside the tool
pub fn handle_delete(ctx: &AppContext, id: &str, bytes: i64) -> Result<()> {
    if bytes < 0 {
        return Err(anyhow!("Freed bytes cannot be negative"));
    }

    if !ctx.store.record_deletion(id, bytes)? {
        println!("{}", format!("Deletion of {id} was already recorded").yellow());
        return Ok(());
    }

    let stats = ctx.store.stats();
    println!(
        "{} Recorded deletion of {} ({}); {} freed in total",
        "✓".green(),
        id.bold(),
        format_bytes(bytes),
        format_bytes(stats.freed_space_bytes)
    );
    Ok(())
}
