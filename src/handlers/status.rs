//! Status command handler

use anyhow::Result;
use colored::Colorize;

use crate::history::{OperationHistory, OperationType};

use super::AppContext;

/// Render a byte count the way file managers do (1000-based)
pub fn format_bytes(bytes: i64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

    let mut value = bytes.max(0) as f64;
    let mut unit = 0;
    while value >= 1000.0 && unit < UNITS.len() - 1 {
        value /= 1000.0;
        unit += 1;
    }

    if unit == 0 {
        format!("{} {}", bytes.max(0), UNITS[0])
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}

pub fn handle_status(ctx: &AppContext) -> Result<()> {
    let stats = ctx.store.stats();

    println!("{}", "SwipeClean Status".cyan().bold());
    println!("{}", "=".repeat(40).cyan());
    println!("  {} {}", "Kept:".bold(), stats.kept_count);
    println!("  {} {}", "Deleted:".bold(), stats.deleted_count);
    println!(
        "  {} {}",
        "Space freed:".bold(),
        format_bytes(stats.freed_space_bytes)
    );

    println!();
    println!(
        "  {} {}",
        "Sync:".bold(),
        if ctx.store.sync_enabled() {
            "enabled".green()
        } else {
            "disabled".yellow()
        }
    );
    println!(
        "  {} {}",
        "Remote:".bold(),
        ctx.settings.remote_dir()?.display()
    );

    match OperationHistory::load() {
        Ok(history) => match history.get_last_operation_by_type(OperationType::Sync) {
            Some(last) if last.success => println!(
                "  {} {}",
                "Last sync:".bold(),
                last.timestamp
                    .with_timezone(&chrono::Local)
                    .format("%Y-%m-%d %H:%M:%S")
            ),
            Some(last) => println!(
                "  {} {}",
                "Last sync:".bold(),
                format!("failed ({})", last.message.as_deref().unwrap_or("unknown error")).red()
            ),
            None => println!("  {} {}", "Last sync:".bold(), "never".dimmed()),
        },
        Err(e) => log::warn!("Could not read sync history: {e:#}"),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0, "0 B")]
    #[case(999, "999 B")]
    #[case(1_500, "1.5 KB")]
    #[case(2_000_000, "2.0 MB")]
    #[case(3_200_000_000, "3.2 GB")]
    #[case(-5, "0 B")]
    fn test_format_bytes(#[case] bytes: i64, #[case] expected: &str) {
        assert_eq!(format_bytes(bytes), expected);
    }
}
