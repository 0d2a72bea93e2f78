//! Triage command handler
//!
//! Without `--interactive` the queue is printed in triage order. With it,
//! each asset is offered in turn and the staged deletions are reviewed at
//! the end.

use anyhow::{anyhow, Context, Result};
use chrono::{NaiveDate, NaiveTime, TimeZone, Utc};
use colored::Colorize;
use inquire::{MultiSelect, Select};
use std::collections::HashSet;
use std::path::Path;

use crate::assets::{Asset, DateRange, DirectoryAssetSource};
use crate::logger::log_to_file;
use crate::triage::{triage_queue, TriageFilter, TriageSession};

use super::status::format_bytes;
use super::{is_interactive, AppContext};

/// Maximum number of queued assets to print
const MAX_ASSETS_TO_DISPLAY: usize = 50;

const KEEP: &str = "Keep";
const DELETE: &str = "Delete";
const UNDO: &str = "Undo";
const REVIEW: &str = "Review and finish";

/// Turn optional CLI dates into an inclusive range covering whole days
pub fn date_range(from: Option<NaiveDate>, to: Option<NaiveDate>) -> Result<Option<DateRange>> {
    if from.is_none() && to.is_none() {
        return Ok(None);
    }

    let start = match from {
        Some(day) => Utc.from_utc_datetime(&day.and_time(NaiveTime::MIN)),
        None => chrono::DateTime::<Utc>::MIN_UTC,
    };
    let end = match to {
        // Last nanosecond of the day, so sub-second times at 23:59:59 still match
        Some(day) => Utc.from_utc_datetime(
            &day.and_hms_nano_opt(23, 59, 59, 999_999_999)
                .ok_or_else(|| anyhow!("Invalid end date: {day}"))?,
        ),
        None => chrono::DateTime::<Utc>::MAX_UTC,
    };

    DateRange::new(start, end).map(Some)
}

fn describe(asset: &Asset) -> String {
    let date = asset
        .creation_date
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "undated".to_string());
    format!("{}  ({}, {})", asset.id, date, format_bytes(asset.byte_size))
}

pub fn handle_triage(
    ctx: &AppContext,
    dir: &Path,
    album: Option<String>,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
    interactive: bool,
) -> Result<()> {
    let source = DirectoryAssetSource::new(dir);
    let filter = TriageFilter {
        album,
        date_range: date_range(from, to)?,
    };
    let policy = ctx.settings.kept_policy();

    if !interactive {
        let queue = triage_queue(&ctx.store, &source, policy, &filter)?;
        if queue.is_empty() {
            println!("{}", "Nothing left to triage.".green());
            return Ok(());
        }

        println!(
            "{} {} asset(s) to triage",
            "Queue:".cyan().bold(),
            queue.len()
        );
        for (idx, asset) in queue.iter().take(MAX_ASSETS_TO_DISPLAY).enumerate() {
            println!("  {:3}. {}", idx + 1, describe(asset));
        }
        if queue.len() > MAX_ASSETS_TO_DISPLAY {
            println!(
                "  {} and {} more...",
                "...".dimmed(),
                queue.len() - MAX_ASSETS_TO_DISPLAY
            );
        }
        return Ok(());
    }

    if !is_interactive() {
        return Err(anyhow!("Interactive triage requires a terminal"));
    }

    let mut session = TriageSession::start(&ctx.store, &source, policy, filter)?;

    while let Some(asset) = session.current() {
        let title = format!(
            "{} [{} left, {} staged]",
            describe(asset),
            session.remaining(),
            session.pending().len()
        );
        let mut options = vec![KEEP, DELETE];
        if session.can_undo() {
            options.push(UNDO);
        }
        options.push(REVIEW);

        let Ok(choice) = Select::new(&title, options).prompt() else {
            break;
        };

        match choice {
            KEEP => {
                session.keep_current()?;
            }
            DELETE => {
                session.mark_current_for_deletion()?;
            }
            UNDO => {
                session.undo_last()?;
            }
            _ => break,
        }
    }

    if session.pending().is_empty() {
        println!("{}", "No deletions staged.".green());
        return Ok(());
    }

    let labels: Vec<String> = session.pending().iter().map(describe).collect();
    let all: Vec<usize> = (0..labels.len()).collect();
    let chosen = MultiSelect::new("Delete these assets? (deselect to keep)", labels.clone())
        .with_default(&all)
        .prompt()
        .context("Failed to get review selection")?;

    let selected: HashSet<String> = session
        .pending()
        .iter()
        .zip(&labels)
        .filter(|(_, label)| chosen.contains(label))
        .map(|(asset, _)| asset.id.clone())
        .collect();

    let outcome = session.confirm_review(&selected)?;
    let line = format!(
        "review deleted={} kept={} freed={}",
        outcome.deleted.len(),
        outcome.kept.len(),
        outcome.freed_bytes
    );
    if let Err(e) = log_to_file(&line) {
        log::warn!("Failed to write activity log: {e:#}");
    }
    println!(
        "{} Deleted {} asset(s), kept {}, freed {}",
        "✓".green(),
        outcome.deleted.len(),
        outcome.kept.len(),
        format_bytes(outcome.freed_bytes)
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_date_range_covers_whole_days() {
        let day = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        let range = date_range(Some(day), Some(day)).unwrap().unwrap();

        assert_eq!(range.start, Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap());
        let next_midnight = Utc.with_ymd_and_hms(2024, 5, 2, 0, 0, 0).unwrap();
        assert_eq!(range.end, next_midnight - chrono::Duration::nanoseconds(1));

        let late = Utc.with_ymd_and_hms(2024, 5, 1, 23, 59, 59).unwrap()
            + chrono::Duration::milliseconds(700);
        assert!(range.contains(Some(late)));
        assert!(!range.contains(Some(next_midnight)));
    }

    #[test]
    fn test_open_ended_ranges() {
        assert!(date_range(None, None).unwrap().is_none());

        let day = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        let from_only = date_range(Some(day), None).unwrap().unwrap();
        assert!(from_only.contains(Some(Utc::now())));
        assert!(date_range(
            Some(day),
            Some(NaiveDate::from_ymd_opt(2024, 4, 1).unwrap())
        )
        .is_err());
    }
}
