//! Hardware seams
//!
//! The wire-level drivers for switches, LEDs, selector knobs and the encoder
//! live outside this crate. The control plane only talks to them through the
//! traits below, which keeps every piece of logic testable against
//! [`VirtualPanel`].

pub mod virtual_panel;

use anyhow::Result;
use std::fmt;
use std::sync::Arc;

use crate::input::Switch;
use crate::protocol::Bank;

pub use virtual_panel::VirtualPanel;

/// Live level of the switch lines
///
/// Used to re-check held modifiers: a release interrupt can be missed while
/// other work runs, so "is Mode still down" is always asked of the line itself.
pub trait SwitchLines: Send + Sync {
    /// True while the switch is physically held down (line pulled low)
    fn is_pressed(&self, switch: Switch) -> bool;
}

/// Current position of the room and network selector
///
/// `None` is the "unknown" sentinel: the selector could not be read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SelectorReading {
    pub network: Option<u8>,
    pub room: Option<u8>,
}

impl SelectorReading {
    pub fn new(network: u8, room: u8) -> Self {
        Self {
            network: Some(network),
            room: Some(room),
        }
    }

    /// Both values are known
    pub fn is_known(&self) -> bool {
        self.network.is_some() && self.room.is_some()
    }
}

impl fmt::Display for SelectorReading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let show = |v: Option<u8>| v.map(|n| n.to_string()).unwrap_or_else(|| "?".to_string());
        write!(f, "net {} / room {}", show(self.network), show(self.room))
    }
}

/// Room/network selector capability
pub trait RoomNetworkSelector: Send + Sync {
    fn read(&self) -> SelectorReading;
}

/// Identity of an indicator LED
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Led {
    Bank(Bank),
    /// Room indicator (1-based)
    Room(u8),
    /// Network indicator (1-based)
    Network(u8),
}

impl fmt::Display for Led {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Led::Bank(b) => write!(f, "Bank {}", b),
            Led::Room(n) => write!(f, "Room {}", n),
            Led::Network(n) => write!(f, "Network {}", n),
        }
    }
}

/// LED output capability
pub trait LedPanel: Send + Sync {
    fn set_led(&self, led: Led, on: bool) -> Result<()>;
}

/// The three hardware seams, as the control plane holds them
#[derive(Clone)]
pub struct Hardware {
    pub lines: Arc<dyn SwitchLines>,
    pub selector: Arc<dyn RoomNetworkSelector>,
    pub leds: Arc<dyn LedPanel>,
}

impl Hardware {
    /// Every seam backed by the same software panel
    pub fn virtual_panel(panel: Arc<VirtualPanel>) -> Self {
        Self {
            lines: panel.clone(),
            selector: panel.clone(),
            leds: panel,
        }
    }
}
