//! Application path management.
//!
//! - **Dev mode**: if `config.yaml` exists in the current working directory
//!   (typical when running with `cargo run`), config, state and logs all
//!   live next to it.
//! - **Installed mode** (default): data is stored under the user data
//!   directory (`~/.local/share/playdeck` on the device).

use anyhow::Context;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Application name used for directories in installed mode
const APP_NAME: &str = "playdeck";

/// File holding the persisted player selection
const SELECTION_FILE: &str = "selection.json";

/// Application paths for config, state, and logs.
#[derive(Debug, Clone)]
pub struct AppPaths {
    /// Path to the configuration file
    pub config: PathBuf,
    /// Directory for persisted state (player selection)
    pub state_dir: PathBuf,
    /// Directory for the rolling log files
    pub logs_dir: PathBuf,
    /// Whether the paths were taken from the working directory
    pub is_dev: bool,
}

impl AppPaths {
    /// Detect the appropriate paths based on environment.
    ///
    /// Called before logging is initialized, so diagnostics go to stderr.
    pub fn detect() -> Self {
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        if cwd.join("config.yaml").exists() {
            #[cfg(debug_assertions)]
            eprintln!("[paths] Running in DEV mode (config.yaml found in {})", cwd.display());
            return Self::rooted_at(&cwd, true);
        }

        let data_dir = dirs::data_dir().unwrap_or_else(|| {
            eprintln!("[paths] WARNING: no user data directory, falling back to cwd");
            cwd.clone()
        });
        Self::rooted_at(&data_dir.join(APP_NAME), false)
    }

    /// Paths under a single base directory
    pub fn rooted_at(base: &Path, is_dev: bool) -> Self {
        let (state_dir, logs_dir) = if is_dev {
            (base.join(".state"), base.join("logs"))
        } else {
            (base.join("state"), base.join("logs"))
        };
        Self {
            config: base.join("config.yaml"),
            state_dir,
            logs_dir,
            is_dev,
        }
    }

    /// Use an explicit config file instead of the detected one
    pub fn with_config(mut self, config: PathBuf) -> Self {
        self.config = config;
        self
    }

    /// Get the base directory (for displaying in logs)
    pub fn base_dir(&self) -> PathBuf {
        self.config
            .parent()
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// Persisted player selection
    pub fn selection_file(&self) -> PathBuf {
        self.state_dir.join(SELECTION_FILE)
    }

    /// Ensure the state and log directories exist.
    pub fn ensure_directories(&self) -> anyhow::Result<()> {
        for dir in [&self.state_dir, &self.logs_dir] {
            if !dir.exists() {
                debug!("Creating directory: {}", dir.display());
                std::fs::create_dir_all(dir)
                    .with_context(|| format!("Failed to create {}", dir.display()))?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dev_layout() {
        let paths = AppPaths::rooted_at(Path::new("/srv/deck"), true);
        assert!(paths.is_dev);
        assert_eq!(paths.config, PathBuf::from("/srv/deck/config.yaml"));
        assert_eq!(paths.selection_file(), PathBuf::from("/srv/deck/.state/selection.json"));
        assert_eq!(paths.base_dir(), PathBuf::from("/srv/deck"));
    }

    #[test]
    fn test_explicit_config_keeps_state_location() {
        let paths = AppPaths::rooted_at(Path::new("/home/pi/.local/share/playdeck"), false)
            .with_config(PathBuf::from("/etc/playdeck.yaml"));
        assert_eq!(paths.config, PathBuf::from("/etc/playdeck.yaml"));
        assert_eq!(paths.logs_dir, PathBuf::from("/home/pi/.local/share/playdeck/logs"));
    }

    #[test]
    fn test_ensure_directories_creates_both() {
        let dir = tempfile::tempdir().unwrap();
        let paths = AppPaths::rooted_at(dir.path(), false);
        paths.ensure_directories().unwrap();
        assert!(paths.state_dir.is_dir());
        assert!(paths.logs_dir.is_dir());
    }
}
