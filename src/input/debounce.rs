//! Per-channel switch debouncing
//!
//! A mechanical switch produces a burst of edges per press. Only the first
//! edge of a burst is admitted; any further edge on the same channel inside
//! the debounce window is treated as bounce and dropped without logging.

use dashmap::DashMap;
use std::time::{Duration, Instant};
use tracing::trace;

/// Debouncer for switch channels
///
/// Uses DashMap so edge handlers on different callback threads never
/// contend on a global lock.
pub struct SwitchDebouncer {
    /// Key: channel, Value: time of the last admitted edge
    last_edge: DashMap<u8, Instant>,

    /// Minimum spacing between two admitted edges on one channel
    window: Duration,
}

impl SwitchDebouncer {
    /// Create a debouncer with the given window
    pub fn new(window: Duration) -> Self {
        Self {
            last_edge: DashMap::new(),
            window,
        }
    }

    /// Admit or reject an edge on `channel` observed at `now`
    ///
    /// Rejected edges do not extend the window: it is always measured from the
    /// last admitted edge.
    pub fn accept_at(&self, channel: u8, now: Instant) -> bool {
        let mut admitted = true;
        self.last_edge
            .entry(channel)
            .and_modify(|last| {
                if now.saturating_duration_since(*last) < self.window {
                    admitted = false;
                } else {
                    *last = now;
                }
            })
            .or_insert(now);

        if !admitted {
            trace!("Bounce on channel {} dropped", channel);
        }
        admitted
    }
}
