//! Debounced input source
//!
//! Converts raw switch edges and rotary quadrature edges into clean events.
//! The physical wiring (channel number -> switch) is fixed at startup.

pub mod debounce;
pub mod rotary;

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use debounce::SwitchDebouncer;
pub use rotary::{RotaryDecoder, RotaryLine};

/// Number of numbered playlist/track switches
pub const NUMBERED_SWITCHES: u8 = 12;

/// Identity of a physical switch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Switch {
    /// One of the 12 playlist/track switches (1-12)
    Numbered(u8),
    PlayPause,
    Forward,
    Back,
    Bank,
    Mode,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown switch name '{0}'")]
pub struct SwitchParseError(pub String);

impl fmt::Display for Switch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Switch::Numbered(n) => write!(f, "Switch {}", n),
            Switch::PlayPause => write!(f, "Play/Pause"),
            Switch::Forward => write!(f, "Forward"),
            Switch::Back => write!(f, "Back"),
            Switch::Bank => write!(f, "Bank"),
            Switch::Mode => write!(f, "Mode"),
        }
    }
}

impl FromStr for Switch {
    type Err = SwitchParseError;

    /// Accepts wiring-table names ("Switch 7", "Play/Pause") as well as the
    /// short console forms ("7", "play", "fwd").
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let lower = trimmed.to_lowercase();
        let numbered = lower.strip_prefix("switch").map(str::trim).unwrap_or(&lower);
        if let Ok(n) = numbered.parse::<u8>() {
            if (1..=NUMBERED_SWITCHES).contains(&n) {
                return Ok(Switch::Numbered(n));
            }
            return Err(SwitchParseError(trimmed.to_string()));
        }
        match lower.as_str() {
            "play/pause" | "play" | "pause" => Ok(Switch::PlayPause),
            "forward" | "fwd" | "next" => Ok(Switch::Forward),
            "back" | "previous" | "prev" => Ok(Switch::Back),
            "bank" => Ok(Switch::Bank),
            "mode" | "alt" => Ok(Switch::Mode),
            _ => Err(SwitchParseError(trimmed.to_string())),
        }
    }
}

impl TryFrom<String> for Switch {
    type Error = SwitchParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Switch> for String {
    fn from(value: Switch) -> Self {
        value.to_string()
    }
}

/// Direction of a switch edge (switches are active-low with pull-ups)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchEdge {
    /// Falling edge: the switch was pushed down
    Pressed,
    /// Rising edge: the switch was let go
    Released,
}

/// Raw event delivered by the hardware edge subsystem
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEvent {
    /// Edge on a switch channel
    Switch { channel: u8, edge: SwitchEdge },
    /// Edge on one of the two encoder lines, with both line levels read in the handler
    Rotary { line: RotaryLine, a: bool, b: bool },
}

/// Immutable mapping from physical channel to switch identity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwitchMap {
    by_channel: HashMap<u8, Switch>,
}

impl SwitchMap {
    /// Build a map from a channel table
    pub fn new(by_channel: HashMap<u8, Switch>) -> Self {
        Self { by_channel }
    }

    pub fn switch_for(&self, channel: u8) -> Option<Switch> {
        self.by_channel.get(&channel).copied()
    }

    pub fn channel_for(&self, switch: Switch) -> Option<u8> {
        self.by_channel
            .iter()
            .find(|(_, s)| **s == switch)
            .map(|(c, _)| *c)
    }

    /// Whether the Mode and Bank switches are wired (both are required)
    pub fn has_modifiers(&self) -> bool {
        self.channel_for(Switch::Mode).is_some() && self.channel_for(Switch::Bank).is_some()
    }
}

impl Default for SwitchMap {
    /// Default wiring of the front panel (BCM channel numbers)
    fn default() -> Self {
        let table = [
            (14, Switch::Numbered(1)),
            (24, Switch::Numbered(2)),
            (12, Switch::Numbered(3)),
            (15, Switch::Numbered(4)),
            (25, Switch::Numbered(5)),
            (16, Switch::Numbered(6)),
            (18, Switch::Numbered(7)),
            (8, Switch::Numbered(8)),
            (20, Switch::Numbered(9)),
            (23, Switch::Numbered(10)),
            (7, Switch::Numbered(11)),
            (21, Switch::Numbered(12)),
            (5, Switch::PlayPause),
            (11, Switch::Forward),
            (9, Switch::Back),
            (17, Switch::Bank),
            (27, Switch::Mode),
        ];
        Self::new(table.into_iter().collect())
    }
}
