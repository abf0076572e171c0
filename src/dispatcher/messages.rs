//! Messages accepted by the dispatcher actor
//!
//! Commands are fire-and-forget. The playback query carries a oneshot
//! channel for its answer. `Stop` is the "no more commands" sentinel pushed
//! once during shutdown.

use tokio::sync::oneshot;

use crate::protocol::Command;

pub enum DispatcherMessage {
    /// Execute a command against the active backend
    Command(Command),

    /// Ask whether the active backend is currently playing
    ///
    /// Answered in queue order, after every command sent before it.
    IsPlaying { respond: oneshot::Sender<bool> },

    /// Stop the dispatcher loop
    Stop,
}

impl std::fmt::Debug for DispatcherMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DispatcherMessage::Command(command) => write!(f, "Command({})", command),
            DispatcherMessage::IsPlaying { .. } => write!(f, "IsPlaying"),
            DispatcherMessage::Stop => write!(f, "Stop"),
        }
    }
}
