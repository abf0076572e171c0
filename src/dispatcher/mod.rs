//! Player dispatcher
//!
//! Single consumer of the command channel. Each command runs to completion
//! against the active backend before the next one is taken, and backend
//! failures are logged and swallowed so one bad call never stops the loop.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                        Dispatcher                        │
//! │  DispatcherState { selection, playlist guard }           │
//! │                 ▲                          │             │
//! │                 │ DispatcherMessage        │ StatusEvent │
//! │  ┌──────────────┴───────────┐              ▼             │
//! │  │ command rx (unbounded)   │        status tx           │
//! │  └──────────────────────────┘                            │
//! └──────────────────────────────────────────────────────────┘
//! ```

pub mod guard;
pub mod handle;
pub mod messages;
pub mod state;

#[cfg(test)]
mod tests;

use anyhow::{anyhow, bail, Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::backends::{BackendRegistry, NetworkSelector, PlayerBackend};
use crate::channel::{CommandReceiver, StatusSender};
use crate::config::{AppConfig, SiteConfig};
use crate::lifecycle::Lifecycle;
use crate::protocol::{Command, StatusEvent};

pub use guard::PlaylistGuard;
pub use handle::DispatcherHandle;
pub use messages::DispatcherMessage;
pub use state::{restore_selection, DispatcherState, PlayerSelection, SelectionSnapshot};

/// Generic command running the indicator self-test
pub const INDICATOR_TEST_COMMAND: u8 = 1;

pub struct Dispatcher {
    rx: CommandReceiver,
    status: StatusSender,
    backends: BackendRegistry,
    network_selector: Arc<dyn NetworkSelector>,
    site: SiteConfig,
    network_settle: Duration,
    indicator_test: Duration,
    lifecycle: Lifecycle,
    state: DispatcherState,
}

impl Dispatcher {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: &AppConfig,
        selection: PlayerSelection,
        rx: CommandReceiver,
        status: StatusSender,
        backends: BackendRegistry,
        network_selector: Arc<dyn NetworkSelector>,
        lifecycle: Lifecycle,
    ) -> Self {
        Self {
            rx,
            status,
            backends,
            network_selector,
            site: config.site.clone(),
            network_settle: config.player.network_settle(),
            indicator_test: config.player.indicator_test(),
            lifecycle,
            state: DispatcherState {
                selection,
                guard: PlaylistGuard::new(config.player.playlist_guard()),
            },
        }
    }

    pub fn spawn(self) -> JoinHandle<DispatcherState> {
        tokio::spawn(self.run())
    }

    /// Process messages until the stop sentinel; returns the final state
    pub async fn run(mut self) -> DispatcherState {
        info!(
            "🎛️  Dispatcher started (network {}, room {}, {})",
            self.state.selection.network, self.state.selection.room, self.state.selection.backend
        );
        self.sync_indicators();

        while let Some(message) = self.rx.recv().await {
            match message {
                DispatcherMessage::Command(command) => self.execute(command).await,
                DispatcherMessage::IsPlaying { respond } => {
                    let playing = self.is_playing().await;
                    let _ = respond.send(playing);
                }
                DispatcherMessage::Stop => {
                    debug!("Stop sentinel received");
                    break;
                }
            }
        }

        info!("Dispatcher stopped");
        self.state
    }

    async fn execute(&mut self, command: Command) {
        debug!(command = %command, "Executing");
        if let Err(e) = self.try_execute(command).await {
            error!("Command '{}' failed: {:#}", command, e);
        }
    }

    async fn try_execute(&mut self, command: Command) -> Result<()> {
        match command {
            Command::PlayPause => {
                let (backend, room) = self.target()?;
                // Only pausing cancels the running start; resuming keeps it
                if backend.toggle_play_pause(&room).await? {
                    self.state.guard.cancel();
                }
            }
            Command::Forward => {
                let (backend, room) = self.target()?;
                backend.skip_to_next(&room).await?;
                self.state.guard.cancel();
            }
            Command::Back => {
                let (backend, room) = self.target()?;
                backend.skip_to_previous(&room).await?;
                self.state.guard.cancel();
            }
            Command::Playlist { bank, index } => {
                let (backend, room) = self.target()?;
                if self.state.guard.admit(self.state.selection.backend, Instant::now()) {
                    let name = self.state.selection.playlist_name(bank, index);
                    info!("Starting playlist {} in {}", name, room);
                    backend.start_playlist(&name, &room).await?;
                }
            }
            Command::AltPlaylist { bank, index } => {
                let (backend, room) = self.target()?;
                if self.state.guard.admit(self.state.selection.backend, Instant::now()) {
                    let name = self.state.selection.playlist_name(bank, index);
                    info!("Starting alternate playlist {} in {}", name, room);
                    backend.start_playlist_alt(&name, &room).await?;
                }
            }
            Command::Track { index } => {
                let (backend, room) = self.target()?;
                backend.play_track(index, &room).await?;
            }
            Command::Volume { delta } => {
                let (backend, room) = self.target()?;
                backend.adjust_volume(delta, &room).await?;
            }
            Command::Room { index } => self.select_room(index)?,
            Command::Net { index } => self.select_network(index).await?,
            Command::Generic { index } => self.run_generic(index).await?,
            Command::Shutdown => {
                info!("Shutdown command received");
                self.lifecycle.request_power_off();
                self.lifecycle.request_stop();
            }
        }
        Ok(())
    }

    /// Active backend and the room it addresses
    fn target(&self) -> Result<(Arc<dyn PlayerBackend>, String)> {
        Ok((self.active_backend()?, self.room_name()))
    }

    fn active_backend(&self) -> Result<Arc<dyn PlayerBackend>> {
        let kind = self.state.selection.backend;
        self.backends
            .get(kind)
            .ok_or_else(|| anyhow!("No {} backend available", kind))
    }

    fn room_name(&self) -> String {
        let selection = &self.state.selection;
        self.site
            .room(selection.network, selection.room)
            .map(|r| r.name.clone())
            .unwrap_or_default()
    }

    fn select_room(&mut self, index: u8) -> Result<()> {
        let network = self.state.selection.network;
        let room = self
            .site
            .room(network, index)
            .with_context(|| format!("Room {} does not exist on network {}", index, network))?;

        info!("Room: {} ({})", room.name, index);
        self.state.selection.room = index;
        self.sync_indicators();
        Ok(())
    }

    /// Switch network, backend and (if needed) room
    ///
    /// Nothing changes unless joining the wireless network succeeded.
    async fn select_network(&mut self, index: u8) -> Result<()> {
        let target = self
            .site
            .network(index)
            .cloned()
            .with_context(|| format!("Network {} does not exist", index))?;

        if index == self.state.selection.network {
            debug!("Network '{}' is already the active network", target.name);
        } else if let Some(id) = target.selector_id {
            self.network_selector
                .select_network(id)
                .await
                .with_context(|| format!("Could not join network '{}'", target.name))?;
            debug!("Waiting {:?} for network '{}' to settle", self.network_settle, target.name);
            tokio::time::sleep(self.network_settle).await;
        }

        if target.backend != self.state.selection.backend {
            info!("Switching player to {}", target.backend);
            self.state.selection.backend = target.backend;
        }
        self.state.selection.network = index;

        if self.site.room(index, self.state.selection.room).is_none() {
            let first = self
                .site
                .first_room(index)
                .with_context(|| format!("Network '{}' has no rooms", target.name))?;
            warn!(
                "Room {} does not exist on network '{}', using {}",
                self.state.selection.room, target.name, first.name
            );
            self.state.selection.room = first.index;
        }

        info!("Network: {} ({})", target.name, index);
        self.sync_indicators();
        Ok(())
    }

    async fn run_generic(&mut self, index: u8) -> Result<()> {
        if index != INDICATOR_TEST_COMMAND {
            bail!("Command {} does not exist", index);
        }
        info!("Indicator self-test ({:?})", self.indicator_test);
        self.status.send(StatusEvent::ProgressStart);
        tokio::time::sleep(self.indicator_test).await;
        self.status.send(StatusEvent::ProgressStop);
        Ok(())
    }

    async fn is_playing(&self) -> bool {
        let backend = match self.active_backend() {
            Ok(backend) => backend,
            Err(e) => {
                error!("Playback query failed: {:#}", e);
                return false;
            }
        };
        match backend.is_currently_playing(&self.room_name()).await {
            Ok(playing) => playing,
            Err(e) => {
                error!("Playback query on {} failed: {:#}", backend.name(), e);
                false
            }
        }
    }

    fn sync_indicators(&self) {
        self.status.send(StatusEvent::RoomNetworkSync {
            network: self.state.selection.network,
            room: self.state.selection.room,
        });
    }
}
