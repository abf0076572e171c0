//! Dispatcher state and its JSON snapshot
//!
//! The selection (network, room, playlist prefix, backend) survives restarts:
//! it is written when the dispatcher stops and read back at startup.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::fs;
use tracing::{debug, error, info};

use super::guard::PlaylistGuard;
use crate::backends::BackendKind;
use crate::config::AppConfig;
use crate::protocol::Bank;

/// Which player is addressed, and where
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerSelection {
    pub network: u8,
    pub room: u8,
    pub playlist_prefix: String,
    pub backend: BackendKind,
}

impl PlayerSelection {
    /// Playlist name for a bank slot, e.g. `zCharliebert_B07`
    pub fn playlist_name(&self, bank: Bank, index: u8) -> String {
        format!("{}_{}{:02}", self.playlist_prefix, bank, index)
    }
}

/// State owned by the dispatcher task
#[derive(Debug)]
pub struct DispatcherState {
    pub selection: PlayerSelection,
    pub guard: PlaylistGuard,
}

/// Selection snapshot for JSON serialization
#[derive(Debug, Serialize, Deserialize)]
pub struct SelectionSnapshot {
    /// Timestamp of snapshot creation (milliseconds since epoch)
    pub timestamp: i64,
    /// Version of the snapshot format
    pub version: String,
    pub selection: PlayerSelection,
}

impl SelectionSnapshot {
    /// Current snapshot format version
    pub const VERSION: &'static str = "1.0.0";

    pub fn new(selection: PlayerSelection) -> Self {
        Self {
            timestamp: chrono::Utc::now().timestamp_millis(),
            version: Self::VERSION.to_string(),
            selection,
        }
    }

    /// Save snapshot to JSON file
    pub async fn save_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let json =
            serde_json::to_string_pretty(self).context("Failed to serialize selection snapshot")?;

        fs::write(path, json)
            .await
            .with_context(|| format!("Failed to write selection snapshot: {}", path.display()))?;

        debug!("Selection saved to {}", path.display());
        Ok(())
    }

    /// Load snapshot from JSON file
    pub async fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read selection snapshot: {}", path.display()))?;

        let snapshot: SelectionSnapshot =
            serde_json::from_str(&json).context("Failed to parse selection snapshot JSON")?;

        debug!(
            "Selection snapshot loaded (version: {}, timestamp: {})",
            snapshot.version, snapshot.timestamp
        );
        Ok(snapshot)
    }
}

/// Selection to start with: the persisted one if it still fits the site,
/// otherwise the configured default
pub async fn restore_selection(path: impl AsRef<Path>, config: &AppConfig) -> PlayerSelection {
    let fallback = config.player.default_selection(&config.site);
    let path = path.as_ref();
    if !path.exists() {
        info!("No saved selection, using default");
        return fallback;
    }

    match SelectionSnapshot::load_from_file(path).await {
        Ok(snapshot) if config.site.contains(&snapshot.selection) => {
            info!(
                "Restored selection: network {}, room {}, {} ({})",
                snapshot.selection.network,
                snapshot.selection.room,
                snapshot.selection.backend,
                snapshot.selection.playlist_prefix
            );
            snapshot.selection
        }
        Ok(snapshot) => {
            error!(
                "Saved selection (network {}, room {}, {}) does not exist, using default",
                snapshot.selection.network, snapshot.selection.room, snapshot.selection.backend
            );
            fallback
        }
        Err(e) => {
            error!("Could not restore selection: {:#}", e);
            fallback
        }
    }
}
