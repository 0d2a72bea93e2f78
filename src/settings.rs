use anyhow::{anyhow, Context, Result};
use colored::Colorize;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use uuid::Uuid;

use crate::store::{KeptPolicy, DEFAULT_COOLDOWN_SECS};
use crate::sync::RetryPolicy;

/// Which keep-exclusion rule triage applies
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeptPolicyKind {
    /// Kept assets are excluded for good
    #[default]
    Permanent,
    /// Kept assets come back after `cooldown_secs`
    Cooldown,
}

impl std::str::FromStr for KeptPolicyKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "permanent" => Ok(KeptPolicyKind::Permanent),
            "cooldown" => Ok(KeptPolicyKind::Cooldown),
            other => Err(anyhow!(
                "Unknown kept policy '{other}' (expected 'permanent' or 'cooldown')"
            )),
        }
    }
}

/// User settings for sync and triage, stored as TOML
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncSettings {
    /// Seconds between periodic sync cycles
    #[serde(default = "default_sync_interval")]
    pub sync_interval_secs: u64,

    /// Upper bound for one remote call
    #[serde(default = "default_remote_timeout")]
    pub remote_timeout_secs: u64,

    /// Attempts per remote call, including the first
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,

    /// Delay before the first retry; doubles each time
    #[serde(default = "default_retry_base_delay")]
    pub retry_base_delay_ms: u64,

    #[serde(default)]
    pub kept_policy: KeptPolicyKind,

    #[serde(default = "default_cooldown")]
    pub cooldown_secs: u64,

    /// Directory of the file remote; defaults to `remote/` in the config directory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_path: Option<PathBuf>,

    /// Identifies this device in remote records
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<Uuid>,
}

fn default_sync_interval() -> u64 {
    12
}

fn default_remote_timeout() -> u64 {
    10
}

fn default_retry_attempts() -> u32 {
    3
}

fn default_retry_base_delay() -> u64 {
    500
}

fn default_cooldown() -> u64 {
    DEFAULT_COOLDOWN_SECS as u64
}

impl Default for SyncSettings {
    fn default() -> Self {
        SyncSettings {
            sync_interval_secs: default_sync_interval(),
            remote_timeout_secs: default_remote_timeout(),
            retry_attempts: default_retry_attempts(),
            retry_base_delay_ms: default_retry_base_delay(),
            kept_policy: KeptPolicyKind::default(),
            cooldown_secs: default_cooldown(),
            remote_path: None,
            device_id: None,
        }
    }
}

impl SyncSettings {
    /// Load settings from the default location, falling back to defaults
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::settings_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings file: {}", path.display()))?;

        toml::from_str(&content)
            .with_context(|| format!("Failed to parse settings file: {}", path.display()))
    }

    /// Save settings to the default location
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::settings_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize settings")?;

        fs::write(path, content)
            .with_context(|| format!("Failed to write settings file: {}", path.display()))?;

        Ok(())
    }

    fn settings_path() -> Result<PathBuf> {
        crate::config::ConfigManager::settings_file_path()
    }

    pub fn sync_interval(&self) -> Duration {
        Duration::from_secs(self.sync_interval_secs)
    }

    pub fn kept_policy(&self) -> KeptPolicy {
        match self.kept_policy {
            KeptPolicyKind::Permanent => KeptPolicy::Permanent,
            KeptPolicyKind::Cooldown => KeptPolicy::Cooldown {
                secs: self.cooldown_secs as f64,
            },
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            attempts: self.retry_attempts.max(1),
            base_delay: Duration::from_millis(self.retry_base_delay_ms),
            timeout: Duration::from_secs(self.remote_timeout_secs.max(1)),
        }
    }

    /// Directory of the file remote
    pub fn remote_dir(&self) -> Result<PathBuf> {
        match &self.remote_path {
            Some(path) => Ok(path.clone()),
            None => crate::config::ConfigManager::default_remote_dir(),
        }
    }

    /// The device ID, generating one on first use; returns whether it was new
    pub fn ensure_device_id(&mut self) -> (Uuid, bool) {
        match self.device_id {
            Some(id) => (id, false),
            None => {
                let id = Uuid::new_v4();
                self.device_id = Some(id);
                (id, true)
            }
        }
    }
}

/// Apply changes from the `config` command and save them
pub fn update_settings(
    interval: Option<u64>,
    policy: Option<KeptPolicyKind>,
    cooldown_days: Option<u32>,
    remote_path: Option<PathBuf>,
) -> Result<SyncSettings> {
    let mut settings = SyncSettings::load()?;

    if let Some(secs) = interval {
        if secs == 0 {
            return Err(anyhow!("Sync interval must be at least one second"));
        }
        settings.sync_interval_secs = secs;
        println!("{}", format!("Set sync interval to {secs}s").green());
    }

    if let Some(policy) = policy {
        settings.kept_policy = policy;
        println!("{}", format!("Set kept policy to {policy:?}").green());
    }

    if let Some(days) = cooldown_days {
        settings.cooldown_secs = u64::from(days) * 24 * 60 * 60;
        println!("{}", format!("Set cooldown to {days} days").green());
    }

    if let Some(path) = remote_path {
        println!(
            "{}",
            format!("Set remote directory to {}", path.display()).green()
        );
        settings.remote_path = Some(path);
    }

    settings.save()?;
    Ok(settings)
}

/// Print the current settings
pub fn show_settings(settings: &SyncSettings, sync_enabled: bool) -> Result<()> {
    println!("{}", "Current Settings:".bold());
    println!(
        "  Sync: {}",
        if sync_enabled {
            "enabled".green()
        } else {
            "disabled".yellow()
        }
    );
    println!("  Sync interval: {}s", settings.sync_interval_secs);
    println!(
        "  Remote timeout: {}s, {} attempt(s), {}ms backoff",
        settings.remote_timeout_secs, settings.retry_attempts, settings.retry_base_delay_ms
    );
    match settings.kept_policy {
        KeptPolicyKind::Permanent => println!("  Kept policy: permanent"),
        KeptPolicyKind::Cooldown => println!(
            "  Kept policy: cooldown ({} days)",
            settings.cooldown_secs / (24 * 60 * 60)
        ),
    }
    println!("  Remote: {}", settings.remote_dir()?.display());
    if let Some(id) = settings.device_id {
        println!("  Device: {id}");
    }
    Ok(())
}
