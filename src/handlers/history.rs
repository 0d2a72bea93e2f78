//! History command handlers

use anyhow::{Context, Result};
use colored::Colorize;

use crate::history::{self, OperationType};

/// Handle history list command
pub fn handle_history_list(limit: usize) -> Result<()> {
    let history = history::OperationHistory::load().context("Failed to load sync history")?;

    if history.is_empty() {
        println!("{}", "No operations in history.".yellow());
        return Ok(());
    }

    println!("{}", "Sync History".cyan().bold());
    println!("{}", "=".repeat(80).cyan());

    let operations = history.list_operations();
    let display_count = operations.len().min(limit);

    for (idx, op) in operations.iter().take(display_count).enumerate() {
        let num = format!("{}.", idx + 1);
        let op_type = match op.operation_type {
            OperationType::Sync => "SYNC".blue(),
            OperationType::Reset => "RESET".magenta(),
        };
        let result = if op.success {
            "ok".green()
        } else {
            "failed".red()
        };

        println!("\n{} {} {}", num.bold(), op_type.bold(), result);
        println!(
            "   {} {}",
            "Time:".dimmed(),
            op.timestamp.format("%Y-%m-%d %H:%M:%S UTC")
        );

        if let Some(device) = &op.device_id {
            println!("   {} {}", "Device:".dimmed(), device);
        }

        if let Some(stats) = &op.stats {
            println!(
                "   {} {} kept ({} local, {} remote), {} deleted",
                "Merged:".dimmed(),
                stats.merged_kept,
                stats.local_kept,
                stats.remote_kept,
                stats.merged_deleted
            );
            if stats.reset_applied {
                println!(
                    "   {} remote reset applied, {} entries dropped",
                    "Reset:".dimmed(),
                    stats.kept_dropped_by_reset
                );
            }
        }

        if let Some(message) = &op.message {
            let label = match op.operation_type {
                OperationType::Reset => "Scope:",
                OperationType::Sync => "Error:",
            };
            println!("   {} {}", label.dimmed(), message);
        }
    }

    if operations.len() > display_count {
        println!(
            "\n{} Showing {} of {} operations",
            "Note:".yellow(),
            display_count,
            operations.len()
        );
    }

    Ok(())
}

/// Handle history clear command
pub fn handle_history_clear() -> Result<()> {
    let mut history =
        history::OperationHistory::load().context("Failed to load sync history")?;

    if history.is_empty() {
        println!("{}", "No history to clear.".yellow());
        return Ok(());
    }

    let count = history.len();
    history.clear().context("Failed to clear history")?;

    println!(
        "{} Cleared {} operation(s) from history.",
        "SUCCESS:".green().bold(),
        count
    );

    Ok(())
}
