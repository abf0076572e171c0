//! Playlist restart guard
//!
//! Starting a playlist is a long-running backend operation. A debounced
//! double-press must not start it twice, so each backend remembers when it
//! last admitted a start and drops starts that come too soon after, unless
//! the previous start was cancelled in the meantime (pause, skip).

use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

use crate::backends::BackendKind;

/// Per-backend minimum-interval guard with a single cancellation flag
#[derive(Debug)]
pub struct PlaylistGuard {
    interval: Duration,
    last_start: HashMap<BackendKind, Instant>,
    cancelled: bool,
}

impl PlaylistGuard {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_start: HashMap::new(),
            cancelled: false,
        }
    }

    /// Decide whether a playlist start on `backend` may proceed at `now`
    ///
    /// An admitted start becomes the new reference point and consumes the
    /// cancellation flag.
    pub fn admit(&mut self, backend: BackendKind, now: Instant) -> bool {
        if let Some(last) = self.last_start.get(&backend) {
            let elapsed = now.saturating_duration_since(*last);
            if elapsed < self.interval && !self.cancelled {
                debug!(
                    "Discarding playlist start on {} ({:.1}s after the last one)",
                    backend,
                    elapsed.as_secs_f32()
                );
                return false;
            }
        }
        self.last_start.insert(backend, now);
        self.cancelled = false;
        true
    }

    /// Mark the running start as cancelled (playback paused or skipped)
    pub fn cancel(&mut self) {
        self.cancelled = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GUARD: Duration = Duration::from_secs(10);

    #[test]
    fn test_first_start_is_admitted() {
        let mut guard = PlaylistGuard::new(GUARD);
        assert!(guard.admit(BackendKind::Sonos, Instant::now()));
    }

    #[test]
    fn test_start_inside_window_is_dropped() {
        let mut guard = PlaylistGuard::new(GUARD);
        let t0 = Instant::now();
        assert!(guard.admit(BackendKind::Sonos, t0));
        assert!(!guard.admit(BackendKind::Sonos, t0 + Duration::from_secs(3)));
        // Dropped starts do not move the reference point
        assert!(guard.admit(BackendKind::Sonos, t0 + GUARD));
    }

    #[test]
    fn test_backends_are_guarded_independently() {
        let mut guard = PlaylistGuard::new(GUARD);
        let t0 = Instant::now();
        assert!(guard.admit(BackendKind::Sonos, t0));
        assert!(guard.admit(BackendKind::Mpd, t0 + Duration::from_secs(1)));
    }

    #[test]
    fn test_cancel_admits_next_start_once() {
        let mut guard = PlaylistGuard::new(GUARD);
        let t0 = Instant::now();
        guard.admit(BackendKind::Sonos, t0);
        guard.cancel();
        assert!(guard.admit(BackendKind::Sonos, t0 + Duration::from_secs(1)));
        assert!(!guard.admit(BackendKind::Sonos, t0 + Duration::from_secs(2)));
    }
}
