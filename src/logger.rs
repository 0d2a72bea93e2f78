//! Console logging and the activity log
//!
//! Console output goes through `env_logger` and follows `RUST_LOG`. The
//! activity log is a plain text file in the config directory that keeps one
//! line per sync cycle, review and reset, so a device's sync history can be
//! read back after the terminal is gone.

use anyhow::{Context, Result};
use log::LevelFilter;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::config::ConfigManager;
use crate::sync::SyncOutcome;

/// Activity logs above this size are rotated to `.log.old`
const MAX_LOG_SIZE: u64 = 10 * 1024 * 1024;

/// Level from `RUST_LOG`, `info` when unset or unparseable
fn console_level() -> LevelFilter {
    std::env::var("RUST_LOG")
        .ok()
        .and_then(|s| s.parse::<LevelFilter>().ok())
        .unwrap_or(LevelFilter::Info)
}

/// Initialize console logging and open the activity log
///
/// Console verbosity follows `RUST_LOG` (`error`, `warn`, `info`, `debug`,
/// `trace`, `off`). Logs go to stderr so command output stays pipeable.
///
/// ```bash
/// # Watch every merge decision while syncing
/// RUST_LOG=debug swipeclean-sync sync
/// ```
pub fn init_logger() -> Result<()> {
    ConfigManager::ensure_config_dir()?;
    let level = console_level();

    env_logger::Builder::from_default_env()
        .format(|buf, record| {
            writeln!(
                buf,
                "{} [{:5}] {}",
                chrono::Local::now().format("%H:%M:%S"),
                record.level(),
                record.args()
            )
        })
        .filter_level(level)
        .target(env_logger::Target::Stderr)
        .try_init()
        .ok(); // already initialized (tests, repeated calls)

    log::debug!("Console logging at {level:?}");
    Ok(())
}

/// Append-only text log of what this device did
#[derive(Debug, Clone)]
pub struct ActivityLog {
    path: PathBuf,
}

impl ActivityLog {
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The log in the config directory
    pub fn open_default() -> Result<Self> {
        Ok(Self::at(ConfigManager::log_file_path()?))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one timestamped line
    pub fn append(&self, message: &str) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("Failed to open log file: {}", self.path.display()))?;

        writeln!(
            file,
            "[{}] {}",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
            message
        )
        .with_context(|| format!("Failed to write log file: {}", self.path.display()))
    }

    /// Move the log aside once it grows past `max_bytes`, replacing an older backup
    ///
    /// Returns the backup path when a rotation happened.
    pub fn rotate_if_larger_than(&self, max_bytes: u64) -> Result<Option<PathBuf>> {
        let size = match std::fs::metadata(&self.path) {
            Ok(metadata) => metadata.len(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("Failed to stat log file: {}", self.path.display()))
            }
        };
        if size <= max_bytes {
            return Ok(None);
        }

        let backup = self.path.with_extension("log.old");
        if backup.exists() {
            std::fs::remove_file(&backup)?;
        }
        std::fs::rename(&self.path, &backup)
            .with_context(|| format!("Failed to rotate log file: {}", self.path.display()))?;
        Ok(Some(backup))
    }
}

/// Append a line to the default activity log
pub fn log_to_file(message: &str) -> Result<()> {
    ActivityLog::open_default()?.append(message)
}

/// Rotate the default activity log if it exceeds 10MB
pub fn rotate_log_if_needed() -> Result<()> {
    if let Some(backup) = ActivityLog::open_default()?.rotate_if_larger_than(MAX_LOG_SIZE)? {
        log::info!("Log file rotated to {}", backup.display());
    }
    Ok(())
}

/// One activity log line for a sync cycle; coalesced calls did nothing and get none
pub fn describe_sync_outcome(outcome: &SyncOutcome, device_id: &str) -> Option<String> {
    let line = match outcome {
        SyncOutcome::Synced(stats) => {
            let mut line = format!(
                "sync ok device={device_id} kept={} deleted={}",
                stats.merged_kept, stats.merged_deleted
            );
            if stats.reset_applied {
                line.push_str(&format!(
                    " reset_applied dropped={}",
                    stats.kept_dropped_by_reset
                ));
            }
            if stats.kept_and_deleted > 0 {
                line.push_str(&format!(" overlap={}", stats.kept_and_deleted));
            }
            line
        }
        SyncOutcome::Failed(message) => format!("sync failed device={device_id}: {message}"),
        SyncOutcome::Disabled => format!("sync skipped device={device_id}: disabled"),
        SyncOutcome::Coalesced => return None,
    };
    Some(line)
}

/// Record a sync outcome in the activity log
///
/// Logging must not fail a sync, so write errors are only warned about.
pub fn log_sync_outcome(outcome: &SyncOutcome, device_id: &str) {
    let Some(line) = describe_sync_outcome(outcome, device_id) else {
        return;
    };
    if let Err(e) = log_to_file(&line) {
        log::warn!("Failed to write activity log: {e:#}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merge::MergeStats;
    use serial_test::serial;
    use std::fs::File;
    use tempfile::TempDir;

    #[test]
    fn test_append_keeps_earlier_lines() -> Result<()> {
        let temp = TempDir::new()?;
        let log = ActivityLog::at(temp.path().join("activity.log"));

        log.append("sync ok device=a kept=1 deleted=0")?;
        log.append("review deleted=2 kept=1")?;

        let contents = std::fs::read_to_string(log.path())?;
        let lines: Vec<_> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with("sync ok device=a kept=1 deleted=0"));
        assert!(lines[1].starts_with('['));
        Ok(())
    }

    #[test]
    fn test_rotation_replaces_backup() -> Result<()> {
        let temp = TempDir::new()?;
        let log = ActivityLog::at(temp.path().join("activity.log"));
        assert_eq!(log.rotate_if_larger_than(10)?, None);

        std::fs::write(temp.path().join("activity.log.old"), "stale")?;
        let mut file = File::create(log.path())?;
        file.write_all(&[b'a'; 64])?;
        drop(file);

        let backup = log.rotate_if_larger_than(10)?.expect("rotated");
        assert_eq!(std::fs::read(&backup)?.len(), 64);
        assert!(!log.path().exists());

        log.append("fresh")?;
        assert_eq!(log.rotate_if_larger_than(1024)?, None);
        Ok(())
    }

    #[test]
    fn test_sync_outcome_lines() {
        let stats = MergeStats {
            reset_applied: true,
            merged_kept: 3,
            merged_deleted: 2,
            kept_dropped_by_reset: 1,
            ..Default::default()
        };

        assert_eq!(
            describe_sync_outcome(&SyncOutcome::Synced(stats), "dev").as_deref(),
            Some("sync ok device=dev kept=3 deleted=2 reset_applied dropped=1")
        );
        assert_eq!(
            describe_sync_outcome(&SyncOutcome::Failed("timed out".into()), "dev").as_deref(),
            Some("sync failed device=dev: timed out")
        );
        assert_eq!(describe_sync_outcome(&SyncOutcome::Coalesced, "dev"), None);
    }

    #[test]
    #[serial]
    #[cfg(target_os = "linux")]
    fn test_sync_outcome_reaches_default_log() -> Result<()> {
        let temp = TempDir::new()?;
        let previous = std::env::var("XDG_CONFIG_HOME").ok();
        std::env::set_var("XDG_CONFIG_HOME", temp.path());

        let result = (|| {
            ConfigManager::ensure_config_dir()?;
            log_sync_outcome(&SyncOutcome::Disabled, "dev");
            log_sync_outcome(&SyncOutcome::Coalesced, "dev");
            std::fs::read_to_string(ConfigManager::log_file_path()?)
                .context("activity log missing")
        })();

        match previous {
            Some(value) => std::env::set_var("XDG_CONFIG_HOME", value),
            None => std::env::remove_var("XDG_CONFIG_HOME"),
        }

        let contents = result?;
        assert_eq!(contents.lines().count(), 1);
        assert!(contents.contains("sync skipped device=dev: disabled"));
        Ok(())
    }
}
