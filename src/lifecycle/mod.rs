//! Process lifecycle signals
//!
//! One `Lifecycle` is created at startup and cloned into every worker. It
//! carries the global stop flag, the power-off request and the activity
//! signal the idle timer consumes. Nothing here is ambient: every worker gets
//! its handle at construction.

pub mod inactivity;
pub mod stop_file;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info};

use crate::dispatcher::DispatcherHandle;

pub use inactivity::{InactivityTimer, PlaybackSource, TickOutcome};
pub use stop_file::StopFileWatcher;

struct Inner {
    stop: watch::Sender<bool>,
    power_off: AtomicBool,
    activity: AtomicBool,
    dispatcher: DispatcherHandle,
}

/// Shared stop/power-off/activity signals
#[derive(Clone)]
pub struct Lifecycle {
    inner: Arc<Inner>,
}

impl Lifecycle {
    pub fn new(dispatcher: DispatcherHandle) -> Self {
        let (stop, _) = watch::channel(false);
        Self {
            inner: Arc::new(Inner {
                stop,
                power_off: AtomicBool::new(false),
                activity: AtomicBool::new(false),
                dispatcher,
            }),
        }
    }

    /// Set the stop flag
    ///
    /// The first call wakes every `stopped()` waiter and pushes the stop
    /// sentinel to the dispatcher; later calls change nothing. Returns true
    /// for the call that actually stopped.
    pub fn request_stop(&self) -> bool {
        let was_stopped = self.inner.stop.send_replace(true);
        if was_stopped {
            debug!("Stop already requested");
            return false;
        }
        info!("🛑 Stop requested");
        self.inner.dispatcher.stop();
        true
    }

    pub fn is_stopped(&self) -> bool {
        *self.inner.stop.borrow()
    }

    /// Resolve once the stop flag is set
    pub async fn stopped(&self) {
        let mut rx = self.inner.stop.subscribe();
        // The sender lives in `self`, so this only returns once stopped
        let _ = rx.wait_for(|stopped| *stopped).await;
    }

    /// Ask for the host to be powered off once everything has stopped
    pub fn request_power_off(&self) {
        if !self.inner.power_off.swap(true, Ordering::SeqCst) {
            info!("Power-off requested");
        }
    }

    pub fn power_off_requested(&self) -> bool {
        self.inner.power_off.load(Ordering::SeqCst)
    }

    /// Note that an input event was processed
    pub fn raise_activity(&self) {
        self.inner.activity.store(true, Ordering::SeqCst);
    }

    /// Consume the activity signal
    pub fn take_activity(&self) -> bool {
        self.inner.activity.swap(false, Ordering::SeqCst)
    }
}
