//! Switch-off confirmation (Mode+Back held)
//!
//! Pressing Back while Mode is held arms a delayed check. When it runs, the
//! device is switched off only if both switches are still down and nothing
//! else was pressed in between. The arming press itself accounts for one
//! operation, so exactly one is tolerated.

use std::time::Duration;
use tracing::info;

use super::mode::OperationCounter;
use crate::hardware::SwitchLines;
use crate::input::Switch;
use crate::scheduler::DelayedTask;

/// Operations allowed between arming and firing (the arming press)
const TOLERATED_OPERATIONS: u32 = 1;

pub struct SwitchOff {
    hold: Duration,
    task: DelayedTask,
}

impl SwitchOff {
    /// Must be created inside a tokio runtime
    pub fn new(hold: Duration) -> Self {
        Self {
            hold,
            task: DelayedTask::current(),
        }
    }

    /// Run `confirm` once the hold time has elapsed, replacing a pending check
    pub fn arm<F>(&self, confirm: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.task.schedule(self.hold, async move { confirm() });
    }

    pub fn is_armed(&self) -> bool {
        self.task.is_pending()
    }

    pub fn disarm(&self) {
        self.task.cancel();
    }
}

/// Whether an armed switch-off should go ahead
pub fn confirmed(lines: &dyn SwitchLines, operations: OperationCounter, snapshot: u32) -> bool {
    if !(lines.is_pressed(Switch::Mode) && lines.is_pressed(Switch::Back)) {
        info!("Switch-off cancelled: Mode+Back released");
        return false;
    }
    let since = operations.since(snapshot);
    if since > TOLERATED_OPERATIONS {
        info!("Switch-off cancelled: {} operations since it was armed", since);
        return false;
    }
    true
}
