use anyhow::{Context, Result};
use std::path::PathBuf;

/// Name of the directory holding all swipeclean-sync files
const APP_DIR_NAME: &str = "swipeclean-sync";

/// Cross-platform configuration directory manager
pub struct ConfigManager;

impl ConfigManager {
    /// Get the main configuration directory path following platform conventions:
    /// - Linux: $XDG_CONFIG_HOME/swipeclean-sync or ~/.config/swipeclean-sync
    /// - macOS: ~/Library/Application Support/swipeclean-sync
    /// - Windows: %APPDATA%\swipeclean-sync
    pub fn config_dir() -> Result<PathBuf> {
        #[cfg(target_os = "linux")]
        {
            if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
                Ok(PathBuf::from(xdg_config).join(APP_DIR_NAME))
            } else {
                let home = dirs::home_dir().context("Failed to get home directory")?;
                Ok(home.join(".config").join(APP_DIR_NAME))
            }
        }

        #[cfg(target_os = "macos")]
        {
            let home = dirs::home_dir().context("Failed to get home directory")?;
            Ok(home
                .join("Library")
                .join("Application Support")
                .join(APP_DIR_NAME))
        }

        #[cfg(target_os = "windows")]
        {
            Ok(dirs::config_dir()
                .context("Failed to get Windows config directory")?
                .join(APP_DIR_NAME))
        }

        #[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
        {
            let home = dirs::home_dir().context("Failed to get home directory")?;
            Ok(home.join(".swipeclean-sync"))
        }
    }

    /// Get the durable decision store path (decisions.json)
    pub fn decisions_file_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("decisions.json"))
    }

    /// Get the settings file path (settings.toml)
    pub fn settings_file_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("settings.toml"))
    }

    /// Get the sync history file path
    pub fn sync_history_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("sync-history.json"))
    }

    /// Get the default directory of the file-backed remote store
    pub fn default_remote_dir() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("remote"))
    }

    /// Get the log file path
    pub fn log_file_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("swipeclean-sync.log"))
    }

    /// Ensure the configuration directory exists
    pub fn ensure_config_dir() -> Result<PathBuf> {
        let config_dir = Self::config_dir()?;
        std::fs::create_dir_all(&config_dir).with_context(|| {
            format!(
                "Failed to create config directory: {}",
                config_dir.display()
            )
        })?;
        Ok(config_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_config_paths() {
        let config_dir = ConfigManager::config_dir().unwrap();
        assert!(config_dir.to_string_lossy().contains("swipeclean-sync"));

        let decisions = ConfigManager::decisions_file_path().unwrap();
        assert!(decisions.to_string_lossy().ends_with("decisions.json"));

        let settings = ConfigManager::settings_file_path().unwrap();
        assert!(settings.to_string_lossy().ends_with("settings.toml"));

        let history = ConfigManager::sync_history_path().unwrap();
        assert!(history.to_string_lossy().ends_with("sync-history.json"));

        let remote = ConfigManager::default_remote_dir().unwrap();
        assert!(remote.starts_with(&config_dir));

        let log = ConfigManager::log_file_path().unwrap();
        assert!(log.to_string_lossy().contains("swipeclean-sync.log"));
    }

    #[test]
    #[serial]
    #[cfg(target_os = "linux")]
    fn test_xdg_config_home_respected() {
        let previous = std::env::var("XDG_CONFIG_HOME").ok();
        std::env::set_var("XDG_CONFIG_HOME", "/tmp/test-xdg-config");
        let config_dir = ConfigManager::config_dir().unwrap();
        assert_eq!(
            config_dir,
            PathBuf::from("/tmp/test-xdg-config/swipeclean-sync")
        );
        match previous {
            Some(value) => std::env::set_var("XDG_CONFIG_HOME", value),
            None => std::env::remove_var("XDG_CONFIG_HOME"),
        }
    }
}
