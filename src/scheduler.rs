//! Cancellable delayed task
//!
//! At most one task is pending. Scheduling again aborts the previous task,
//! so a confirmation armed twice never fires twice and no timer outlives its
//! replacement.

use parking_lot::Mutex;
use std::future::Future;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::trace;

/// Single-slot delayed task scheduler
///
/// Holds a runtime handle captured at construction so tasks can be scheduled
/// from threads that are not part of the runtime (hardware callbacks, the
/// console thread).
pub struct DelayedTask {
    runtime: Handle,
    pending: Mutex<Option<JoinHandle<()>>>,
}

impl DelayedTask {
    pub fn new(runtime: Handle) -> Self {
        Self {
            runtime,
            pending: Mutex::new(None),
        }
    }

    /// Scheduler bound to the runtime of the calling task
    ///
    /// Panics outside a tokio runtime, like `Handle::current`.
    pub fn current() -> Self {
        Self::new(Handle::current())
    }

    /// Run `task` after `delay`, replacing any pending task
    pub fn schedule<F>(&self, delay: Duration, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut pending = self.pending.lock();
        if let Some(previous) = pending.take() {
            if !previous.is_finished() {
                trace!("Pending delayed task replaced");
            }
            previous.abort();
        }
        *pending = Some(self.runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            task.await;
        }));
    }

    /// Abort the pending task; true if one was still waiting
    pub fn cancel(&self) -> bool {
        match self.pending.lock().take() {
            Some(task) => {
                let waiting = !task.is_finished();
                task.abort();
                waiting
            }
            None => false,
        }
    }

    /// True while the scheduled task has not run to completion
    pub fn is_pending(&self) -> bool {
        self.pending
            .lock()
            .as_ref()
            .map(|task| !task.is_finished())
            .unwrap_or(false)
    }
}

impl Drop for DelayedTask {
    fn drop(&mut self) {
        if let Some(task) = self.pending.get_mut().take() {
            task.abort();
        }
    }
}
