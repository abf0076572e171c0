//! DispatcherHandle - Public API for the dispatcher actor
//!
//! Cloneable and usable from any thread: switch callbacks, the rotary drain,
//! the idle timer and the console all hold one.

use tokio::sync::{mpsc, oneshot};
use tracing::{trace, warn};

use super::messages::DispatcherMessage;
use crate::protocol::{parse_command_line, Command};

/// Sending half of the command channel
///
/// # Hot path (fire-and-forget)
/// - `send` / `send_line` - enqueue a command
///
/// # Query (async with response)
/// - `is_playing` - playback state of the active backend
#[derive(Clone)]
pub struct DispatcherHandle {
    tx: mpsc::UnboundedSender<DispatcherMessage>,
}

impl DispatcherHandle {
    pub fn new(tx: mpsc::UnboundedSender<DispatcherMessage>) -> Self {
        Self { tx }
    }

    /// Enqueue a command; false if the dispatcher is gone
    ///
    /// Never blocks: the channel is unbounded and preserves send order.
    pub fn send(&self, command: Command) -> bool {
        trace!("Enqueue {}", command);
        self.tx.send(DispatcherMessage::Command(command)).is_ok()
    }

    /// Parse a protocol line and enqueue it; malformed lines are logged and dropped
    pub fn send_line(&self, line: &str) -> bool {
        match parse_command_line(line) {
            Some(command) => self.send(command),
            None => false,
        }
    }

    /// Whether the active backend reports ongoing playback
    ///
    /// False if the dispatcher is gone or the backend query failed.
    pub async fn is_playing(&self) -> bool {
        let (respond, response) = oneshot::channel();
        if self.tx.send(DispatcherMessage::IsPlaying { respond }).is_err() {
            warn!("Playback query dropped: dispatcher stopped");
            return false;
        }
        response.await.unwrap_or(false)
    }

    /// Push the stop sentinel
    pub(crate) fn stop(&self) {
        let _ = self.tx.send(DispatcherMessage::Stop);
    }
}
