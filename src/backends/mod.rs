//! Player backends (Sonos, MPD)
//!
//! The network clients themselves live outside this crate; the dispatcher only
//! sees the capability surface below. Every call is fallible and the
//! dispatcher treats a failure as "log and continue".

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

pub mod console;
pub mod network;

pub use console::{BackendCall, ConsoleBackend};
pub use network::{NetworkSelector, NoopNetworkSelector, WpaCliSelector};

/// Which player implementation serves a network
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Sonos,
    Mpd,
}

impl BackendKind {
    pub fn all() -> &'static [BackendKind] {
        &[BackendKind::Sonos, BackendKind::Mpd]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Sonos => "sonos",
            BackendKind::Mpd => "mpd",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "sonos" => Ok(BackendKind::Sonos),
            "mpd" => Ok(BackendKind::Mpd),
            other => anyhow::bail!("Unknown player backend '{}'", other),
        }
    }
}

/// Player capability surface
///
/// Note: all methods take &self so backends can be shared as
/// `Arc<dyn PlayerBackend>`. Implementations use interior mutability.
#[async_trait]
pub trait PlayerBackend: Send + Sync {
    /// Backend name for logs (e.g., "sonos", "console:mpd")
    fn name(&self) -> &str;

    /// Pause if playing, otherwise resume; returns true if it paused
    async fn toggle_play_pause(&self, room: &str) -> Result<bool>;

    async fn skip_to_next(&self, room: &str) -> Result<()>;

    async fn skip_to_previous(&self, room: &str) -> Result<()>;

    /// Start `playlist` from its first track
    async fn start_playlist(&self, playlist: &str, room: &str) -> Result<()>;

    /// Start the alternate variant of `playlist`
    async fn start_playlist_alt(&self, playlist: &str, room: &str) -> Result<()>;

    /// Jump to track `track` (1-based) of the current playlist
    async fn play_track(&self, track: u8, room: &str) -> Result<()>;

    /// Relative volume change; the backend enforces its own limits
    async fn adjust_volume(&self, delta: i32, room: &str) -> Result<()>;

    async fn is_currently_playing(&self, room: &str) -> Result<bool>;
}

/// Backends available at runtime, looked up by kind
#[derive(Clone, Default)]
pub struct BackendRegistry {
    backends: HashMap<BackendKind, Arc<dyn PlayerBackend>>,
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, kind: BackendKind, backend: Arc<dyn PlayerBackend>) -> Self {
        self.backends.insert(kind, backend);
        self
    }

    pub fn get(&self, kind: BackendKind) -> Option<Arc<dyn PlayerBackend>> {
        self.backends.get(&kind).cloned()
    }

    /// Registry with a console backend for every kind
    pub fn console() -> Self {
        BackendKind::all().iter().fold(Self::new(), |registry, kind| {
            registry.with(*kind, Arc::new(ConsoleBackend::new(*kind)))
        })
    }
}
