//! Inactivity shutdown timer
//!
//! Counts idle time in coarse ticks. Any processed input resets the count.
//! When the idle threshold is reached the device is switched off, unless the
//! active player is still playing, in which case shutdown is postponed for
//! another idle period, a bounded number of times. The bound keeps a stuck or
//! misreporting backend from keeping the device on forever.

use async_trait::async_trait;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

use super::Lifecycle;
use crate::config::ShutdownConfig;
use crate::dispatcher::DispatcherHandle;

/// "Is playback active" capability
#[async_trait]
pub trait PlaybackSource: Send + Sync {
    async fn is_currently_playing(&self) -> bool;
}

#[async_trait]
impl PlaybackSource for DispatcherHandle {
    async fn is_currently_playing(&self) -> bool {
        self.is_playing().await
    }
}

/// What one tick decided
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Input was seen since the last tick: idle time and deferrals cleared
    Reset,
    /// Still below the threshold
    Idle,
    /// Threshold reached while playing: idle window restarted
    Deferred,
    /// Shutdown and stop requested
    Shutdown,
}

pub struct InactivityTimer<P> {
    lifecycle: Lifecycle,
    playback: P,
    tick: Duration,
    idle_timeout: Duration,
    max_deferrals: u32,
    idle: Duration,
    deferrals: u32,
}

impl<P: PlaybackSource> InactivityTimer<P> {
    pub fn new(config: &ShutdownConfig, lifecycle: Lifecycle, playback: P) -> Self {
        Self {
            lifecycle,
            playback,
            tick: config.tick(),
            idle_timeout: config.idle_timeout(),
            max_deferrals: config.max_deferrals,
            idle: Duration::ZERO,
            deferrals: 0,
        }
    }

    pub fn idle(&self) -> Duration {
        self.idle
    }

    pub fn deferrals(&self) -> u32 {
        self.deferrals
    }

    /// Tick until shutdown is decided or the stop flag is set
    pub async fn run(mut self) {
        info!(
            "Inactivity timer started (idle timeout {}s, tick {}s, max {} deferrals)",
            self.idle_timeout.as_secs(),
            self.tick.as_secs(),
            self.max_deferrals
        );

        let mut ticker = interval(self.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = self.lifecycle.stopped() => break,
                _ = ticker.tick() => {
                    if self.on_tick().await == TickOutcome::Shutdown {
                        break;
                    }
                }
            }
        }
        debug!("Inactivity timer stopped");
    }

    /// Account for one elapsed tick
    pub async fn on_tick(&mut self) -> TickOutcome {
        if self.lifecycle.take_activity() {
            if !self.idle.is_zero() || self.deferrals > 0 {
                debug!("Activity seen, resetting the inactivity timer");
            }
            self.idle = Duration::ZERO;
            self.deferrals = 0;
            return TickOutcome::Reset;
        }

        self.idle += self.tick;
        if self.idle < self.idle_timeout {
            return TickOutcome::Idle;
        }

        if self.deferrals < self.max_deferrals && self.playback.is_currently_playing().await {
            self.deferrals += 1;
            self.idle = Duration::ZERO;
            info!(
                "Idle for {}s but music is playing, shutdown postponed ({}/{})",
                self.idle_timeout.as_secs(),
                self.deferrals,
                self.max_deferrals
            );
            return TickOutcome::Deferred;
        }

        // A stop that landed during the playback query is a plain exit
        if self.lifecycle.is_stopped() {
            debug!("Stop already requested, not powering off");
            return TickOutcome::Shutdown;
        }

        info!("💤 Idle for {}s, shutting down", self.idle.as_secs());
        self.lifecycle.request_power_off();
        self.lifecycle.request_stop();
        TickOutcome::Shutdown
    }
}
