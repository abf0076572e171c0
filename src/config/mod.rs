//! Configuration management for PlayDeck
//!
//! Handles loading, parsing and validation of the YAML configuration file.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tokio::fs;

use crate::backends::BackendKind;
use crate::dispatcher::PlayerSelection;
use crate::input::{Switch, SwitchMap};

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub input: InputConfig,
    #[serde(default)]
    pub leds: LedConfig,
    #[serde(default)]
    pub player: PlayerConfig,
    #[serde(default)]
    pub shutdown: ShutdownConfig,
    pub site: SiteConfig,
}

/// Switch and encoder input
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct InputConfig {
    #[serde(default = "default_switch_debounce_ms")]
    pub switch_debounce_ms: u64,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// How long Mode+Back must stay held before the device switches off
    #[serde(default = "default_switch_off_hold_ms")]
    pub switch_off_hold_ms: u64,
    /// Physical channel -> switch; the stock wiring when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channels: Option<HashMap<u8, Switch>>,
}

impl InputConfig {
    pub fn switch_debounce(&self) -> Duration {
        Duration::from_millis(self.switch_debounce_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn switch_off_hold(&self) -> Duration {
        Duration::from_millis(self.switch_off_hold_ms)
    }

    pub fn switch_map(&self) -> SwitchMap {
        match &self.channels {
            Some(channels) => SwitchMap::new(channels.clone()),
            None => SwitchMap::default(),
        }
    }
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            switch_debounce_ms: default_switch_debounce_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            switch_off_hold_ms: default_switch_off_hold_ms(),
            channels: None,
        }
    }
}

/// Indicator LEDs
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LedConfig {
    #[serde(default = "default_blink_interval_ms")]
    pub blink_interval_ms: u64,
    #[serde(default = "default_room_leds")]
    pub room_leds: u8,
    #[serde(default = "default_network_leds")]
    pub network_leds: u8,
    /// Room LEDs cycled through while a progress bracket is open
    #[serde(default = "default_progress_sequence")]
    pub progress_sequence: Vec<u8>,
}

impl LedConfig {
    pub fn blink_interval(&self) -> Duration {
        Duration::from_millis(self.blink_interval_ms)
    }
}

impl Default for LedConfig {
    fn default() -> Self {
        Self {
            blink_interval_ms: default_blink_interval_ms(),
            room_leds: default_room_leds(),
            network_leds: default_network_leds(),
            progress_sequence: default_progress_sequence(),
        }
    }
}

/// Player dispatch
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PlayerConfig {
    /// Minimum spacing between two playlist starts on one backend
    #[serde(default = "default_playlist_guard_secs")]
    pub playlist_guard_secs: u64,
    /// Wait after joining another wireless network
    #[serde(default = "default_network_settle_secs")]
    pub network_settle_secs: u64,
    /// Duration of the indicator self-test (generic command 1)
    #[serde(default = "default_indicator_test_secs")]
    pub indicator_test_secs: u64,
    #[serde(default = "default_network")]
    pub network: u8,
    #[serde(default = "default_room")]
    pub room: u8,
    #[serde(default = "default_playlist_prefix")]
    pub playlist_prefix: String,
}

impl PlayerConfig {
    pub fn playlist_guard(&self) -> Duration {
        Duration::from_secs(self.playlist_guard_secs)
    }

    pub fn network_settle(&self) -> Duration {
        Duration::from_secs(self.network_settle_secs)
    }

    pub fn indicator_test(&self) -> Duration {
        Duration::from_secs(self.indicator_test_secs)
    }

    /// Selection used when nothing valid was persisted
    ///
    /// The backend follows from the network.
    pub fn default_selection(&self, site: &SiteConfig) -> PlayerSelection {
        PlayerSelection {
            network: self.network,
            room: self.room,
            playlist_prefix: self.playlist_prefix.clone(),
            backend: site
                .network(self.network)
                .map(|n| n.backend)
                .unwrap_or(BackendKind::Sonos),
        }
    }
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            playlist_guard_secs: default_playlist_guard_secs(),
            network_settle_secs: default_network_settle_secs(),
            indicator_test_secs: default_indicator_test_secs(),
            network: default_network(),
            room: default_room(),
            playlist_prefix: default_playlist_prefix(),
        }
    }
}

/// Idle shutdown and power-off
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ShutdownConfig {
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,
    #[serde(default = "default_tick_secs")]
    pub tick_secs: u64,
    /// Times shutdown may be postponed because music is still playing
    #[serde(default = "default_max_deferrals")]
    pub max_deferrals: u32,
    /// Run once all workers have stopped, if shutdown was requested
    /// (empty to disable)
    #[serde(default = "default_power_off_command")]
    pub power_off_command: String,
    /// Creating this file in the working directory stops the service
    #[serde(default = "default_stop_file")]
    pub stop_file: String,
}

impl ShutdownConfig {
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    pub fn tick(&self) -> Duration {
        Duration::from_secs(self.tick_secs)
    }
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            idle_timeout_secs: default_idle_timeout_secs(),
            tick_secs: default_tick_secs(),
            max_deferrals: default_max_deferrals(),
            power_off_command: default_power_off_command(),
            stop_file: default_stop_file(),
        }
    }
}

/// Site description: which networks and rooms the selector positions mean
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SiteConfig {
    pub networks: Vec<NetworkConfig>,
    pub rooms: Vec<RoomConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NetworkConfig {
    /// Selector position (1-based)
    pub index: u8,
    pub name: String,
    pub backend: BackendKind,
    /// Supplicant network id; None when no wireless switch is needed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector_id: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RoomConfig {
    pub network: u8,
    /// Selector position within the network (0 when there is only one room)
    pub index: u8,
    pub name: String,
}

impl SiteConfig {
    pub fn network(&self, index: u8) -> Option<&NetworkConfig> {
        self.networks.iter().find(|n| n.index == index)
    }

    pub fn room(&self, network: u8, index: u8) -> Option<&RoomConfig> {
        self.rooms
            .iter()
            .find(|r| r.network == network && r.index == index)
    }

    /// Lowest-indexed room of a network
    pub fn first_room(&self, network: u8) -> Option<&RoomConfig> {
        self.rooms
            .iter()
            .filter(|r| r.network == network)
            .min_by_key(|r| r.index)
    }

    /// True if `selection` names an existing network/room pair
    pub fn contains(&self, selection: &PlayerSelection) -> bool {
        self.network(selection.network)
            .map(|n| n.backend == selection.backend)
            .unwrap_or(false)
            && self.room(selection.network, selection.room).is_some()
    }

    fn validate(&self) -> Result<()> {
        if self.networks.is_empty() {
            anyhow::bail!("At least one network must be defined");
        }

        let mut indices = HashSet::new();
        for network in &self.networks {
            if network.name.is_empty() {
                anyhow::bail!("Network {} name cannot be empty", network.index);
            }
            if !indices.insert(network.index) {
                anyhow::bail!("Network index {} is defined twice", network.index);
            }
            if self.first_room(network.index).is_none() {
                anyhow::bail!("Network '{}' has no rooms", network.name);
            }
        }

        let mut rooms = HashSet::new();
        for room in &self.rooms {
            if self.network(room.network).is_none() {
                anyhow::bail!(
                    "Room '{}' refers to unknown network {}",
                    room.name,
                    room.network
                );
            }
            if !rooms.insert((room.network, room.index)) {
                anyhow::bail!(
                    "Room {} is defined twice on network {}",
                    room.index,
                    room.network
                );
            }
        }
        Ok(())
    }
}

impl Default for SiteConfig {
    /// Two Sonos households plus the local MPD player
    fn default() -> Self {
        let network = |index, name: &str, backend, selector_id| NetworkConfig {
            index,
            name: name.to_string(),
            backend,
            selector_id,
        };
        let room = |network, index, name: &str| RoomConfig {
            network,
            index,
            name: name.to_string(),
        };
        Self {
            networks: vec![
                network(1, "AP2", BackendKind::Sonos, Some(1)),
                network(2, "aantgr", BackendKind::Sonos, Some(0)),
                network(3, "charliebert", BackendKind::Mpd, None),
            ],
            rooms: vec![
                room(1, 1, "Wohnzimmer"),
                room(1, 2, "Obenauf"),
                room(2, 1, "Bedroom"),
                room(2, 2, "Bathroom"),
                room(2, 3, "Office"),
                room(2, 4, "Kitchen"),
                room(2, 5, "Living Room"),
                room(2, 6, "Charlie's Room"),
                room(3, 0, "Charliebert"),
            ],
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            input: InputConfig::default(),
            leds: LedConfig::default(),
            player: PlayerConfig::default(),
            shutdown: ShutdownConfig::default(),
            site: SiteConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a YAML file
    pub async fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file: {}", path))?;

        Self::parse(&contents).with_context(|| format!("Invalid config file: {}", path))
    }

    /// Parse and validate YAML configuration text
    pub fn parse(contents: &str) -> Result<Self> {
        let config: AppConfig =
            serde_yaml::from_str(contents).context("Failed to parse YAML config")?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub async fn save(&self, path: &str) -> Result<()> {
        let yaml = serde_yaml::to_string(self).context("Failed to serialize config to YAML")?;

        fs::write(path, yaml)
            .await
            .with_context(|| format!("Failed to write config file: {}", path))?;

        Ok(())
    }

    /// Validate configuration for correctness and consistency
    pub fn validate(&self) -> Result<()> {
        if self.input.switch_debounce_ms < 300 {
            anyhow::bail!(
                "switch_debounce_ms must be at least 300 (got {})",
                self.input.switch_debounce_ms
            );
        }
        if self.input.poll_interval_ms == 0 {
            anyhow::bail!("poll_interval_ms cannot be 0");
        }
        let switches = self.input.switch_map();
        if !switches.has_modifiers() {
            anyhow::bail!("Input channels must include the Mode and Bank switches");
        }

        if self.leds.blink_interval_ms == 0 {
            anyhow::bail!("blink_interval_ms cannot be 0");
        }
        for led in &self.leds.progress_sequence {
            if *led == 0 || *led > self.leds.room_leds {
                anyhow::bail!(
                    "Progress sequence LED {} is not a room LED (1-{})",
                    led,
                    self.leds.room_leds
                );
            }
        }

        if self.shutdown.tick_secs == 0 {
            anyhow::bail!("Shutdown tick_secs cannot be 0");
        }
        if self.shutdown.stop_file.is_empty() {
            anyhow::bail!("Shutdown stop_file cannot be empty");
        }

        self.site.validate().context("Invalid site description")?;

        let selection = self.player.default_selection(&self.site);
        if !self.site.contains(&selection) {
            anyhow::bail!(
                "Default selection (network {}, room {}) does not exist in the site description",
                selection.network,
                selection.room
            );
        }

        Ok(())
    }
}

fn default_switch_debounce_ms() -> u64 { 1000 }
fn default_poll_interval_ms() -> u64 { 100 }
fn default_switch_off_hold_ms() -> u64 { 3000 }
fn default_blink_interval_ms() -> u64 { 500 }
fn default_room_leds() -> u8 { 6 }
fn default_network_leds() -> u8 { 3 }
fn default_progress_sequence() -> Vec<u8> { (1..=6).collect() }
fn default_playlist_guard_secs() -> u64 { 10 }
fn default_network_settle_secs() -> u64 { 5 }
fn default_indicator_test_secs() -> u64 { 10 }
fn default_network() -> u8 { 2 }
fn default_room() -> u8 { 3 }
fn default_playlist_prefix() -> String { "zCharliebert".to_string() }
fn default_idle_timeout_secs() -> u64 { 600 }
fn default_tick_secs() -> u64 { 5 }
fn default_max_deferrals() -> u32 { 2 }
fn default_power_off_command() -> String { "/sbin/shutdown -h now".to_string() }
fn default_stop_file() -> String { "PLAYDECK_STOP".to_string() }
