//! Command and status channels
//!
//! Commands flow from the control plane to the dispatcher, status events flow
//! back to the LED controller. Both directions are ordered and unbounded, so
//! producers never block. The status side is drained without waiting from
//! the poll loop.

use tokio::sync::mpsc;
use tracing::{debug, trace};

use crate::dispatcher::{DispatcherHandle, DispatcherMessage};
use crate::protocol::{parse_status_line, StatusEvent};

/// Receiving half of the command channel, owned by the dispatcher
pub type CommandReceiver = mpsc::UnboundedReceiver<DispatcherMessage>;

/// Create the control plane -> dispatcher channel
pub fn command_channel() -> (DispatcherHandle, CommandReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (DispatcherHandle::new(tx), rx)
}

/// Create the dispatcher -> control plane channel
pub fn status_channel() -> (StatusSender, StatusReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (StatusSender { tx }, StatusReceiver { rx })
}

/// Sending half of the status channel
#[derive(Clone)]
pub struct StatusSender {
    tx: mpsc::UnboundedSender<StatusEvent>,
}

impl StatusSender {
    pub fn send(&self, event: StatusEvent) {
        trace!("Status: {}", event);
        if self.tx.send(event).is_err() {
            debug!("Status event {} dropped: control plane stopped", event);
        }
    }

    /// Parse a protocol line and send it; malformed lines are logged and dropped
    pub fn send_line(&self, line: &str) -> bool {
        match parse_status_line(line) {
            Some(event) => {
                self.send(event);
                true
            }
            None => false,
        }
    }
}

/// Receiving half of the status channel
pub struct StatusReceiver {
    rx: mpsc::UnboundedReceiver<StatusEvent>,
}

impl StatusReceiver {
    /// Take every pending event without waiting
    pub fn drain(&mut self) -> Vec<StatusEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.rx.try_recv() {
            events.push(event);
        }
        events
    }
}
