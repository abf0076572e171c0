//! Console backend - logs all player calls for testing and debugging

use anyhow::{bail, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tracing::{debug, info};

use super::{BackendKind, PlayerBackend};

/// Quietest volume a playback command leaves the room at
pub const MIN_VOLUME: i32 = 10;
/// Loudest volume reachable with the encoder
pub const MAX_VOLUME: i32 = 50;

/// One recorded capability call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendCall {
    TogglePlayPause { room: String },
    SkipToNext { room: String },
    SkipToPrevious { room: String },
    StartPlaylist { playlist: String, room: String },
    StartPlaylistAlt { playlist: String, room: String },
    PlayTrack { track: u8, room: String },
    AdjustVolume { delta: i32, room: String },
    IsCurrentlyPlaying { room: String },
}

/// ConsoleBackend logs every call instead of talking to a real player
///
/// It keeps just enough state to behave like one: a play/pause flag (so the
/// idle timer has something to query) and a volume clamped to the same
/// limits the real backends enforce. It can also be told to fail, which
/// exercises the dispatcher's failure policy.
pub struct ConsoleBackend {
    name: String,
    playing: AtomicBool,
    volume: Mutex<i32>,
    failing: AtomicBool,
    calls: Mutex<Vec<BackendCall>>,
    /// Execution counter for debugging
    execution_count: AtomicU64,
}

impl ConsoleBackend {
    pub fn new(kind: BackendKind) -> Self {
        Self {
            name: format!("console:{}", kind),
            playing: AtomicBool::new(false),
            volume: Mutex::new(MIN_VOLUME),
            failing: AtomicBool::new(false),
            calls: Mutex::new(Vec::new()),
            execution_count: AtomicU64::new(0),
        }
    }

    /// Make every following call fail (or succeed again)
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn set_playing(&self, playing: bool) {
        self.playing.store(playing, Ordering::SeqCst);
    }

    pub fn is_playing(&self) -> bool {
        self.playing.load(Ordering::SeqCst)
    }

    pub fn volume(&self) -> i32 {
        *self.volume.lock()
    }

    /// All calls received so far, in order
    pub fn calls(&self) -> Vec<BackendCall> {
        self.calls.lock().clone()
    }

    /// Number of playlist starts received (both variants)
    pub fn playlist_starts(&self) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|c| {
                matches!(
                    c,
                    BackendCall::StartPlaylist { .. } | BackendCall::StartPlaylistAlt { .. }
                )
            })
            .count()
    }

    fn record(&self, call: BackendCall) -> Result<()> {
        let exec_num = self.execution_count.fetch_add(1, Ordering::SeqCst) + 1;
        info!(
            "🎵 [{}] Backend '{}' → {:?} [exec #{}]",
            chrono::Local::now().format("%H:%M:%S%.3f"),
            self.name,
            call,
            exec_num
        );
        self.calls.lock().push(call);

        if self.failing.load(Ordering::SeqCst) {
            bail!("Backend '{}' unreachable", self.name);
        }
        Ok(())
    }

    /// Make sure playback starts audible but not painful
    fn sound_check(&self) {
        let mut volume = self.volume.lock();
        let checked = (*volume).clamp(MIN_VOLUME, MAX_VOLUME);
        if checked != *volume {
            debug!("Volume {} out of range, reset to {}", *volume, checked);
            *volume = checked;
        }
    }
}

#[async_trait]
impl PlayerBackend for ConsoleBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn toggle_play_pause(&self, room: &str) -> Result<bool> {
        self.record(BackendCall::TogglePlayPause { room: room.to_string() })?;
        self.sound_check();
        let was_playing = self.playing.fetch_xor(true, Ordering::SeqCst);
        debug!("{} in {}", if was_playing { "Paused" } else { "Playing" }, room);
        Ok(was_playing)
    }

    async fn skip_to_next(&self, room: &str) -> Result<()> {
        self.record(BackendCall::SkipToNext { room: room.to_string() })
    }

    async fn skip_to_previous(&self, room: &str) -> Result<()> {
        self.record(BackendCall::SkipToPrevious { room: room.to_string() })
    }

    async fn start_playlist(&self, playlist: &str, room: &str) -> Result<()> {
        self.record(BackendCall::StartPlaylist {
            playlist: playlist.to_string(),
            room: room.to_string(),
        })?;
        self.sound_check();
        self.set_playing(true);
        Ok(())
    }

    async fn start_playlist_alt(&self, playlist: &str, room: &str) -> Result<()> {
        self.record(BackendCall::StartPlaylistAlt {
            playlist: playlist.to_string(),
            room: room.to_string(),
        })?;
        self.sound_check();
        self.set_playing(true);
        Ok(())
    }

    async fn play_track(&self, track: u8, room: &str) -> Result<()> {
        if track < 1 {
            bail!("Cannot play track number {}", track);
        }
        self.record(BackendCall::PlayTrack {
            track,
            room: room.to_string(),
        })?;
        self.set_playing(true);
        Ok(())
    }

    async fn adjust_volume(&self, delta: i32, room: &str) -> Result<()> {
        self.record(BackendCall::AdjustVolume {
            delta,
            room: room.to_string(),
        })?;
        let mut volume = self.volume.lock();
        *volume = volume.saturating_add(delta).clamp(MIN_VOLUME, MAX_VOLUME);
        debug!("Volume in {} now {}", room, *volume);
        Ok(())
    }

    async fn is_currently_playing(&self, room: &str) -> Result<bool> {
        self.record(BackendCall::IsCurrentlyPlaying { room: room.to_string() })?;
        Ok(self.is_playing())
    }
}
