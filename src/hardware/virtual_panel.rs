//! Software front panel
//!
//! Stands in for the physical switches, selector knobs and LEDs. The console
//! drives it interactively and the test suites use it to script presses,
//! releases and selector changes.

use std::collections::{BTreeMap, HashSet};

use anyhow::Result;
use parking_lot::RwLock;
use tracing::trace;

use super::{Led, LedPanel, RoomNetworkSelector, SelectorReading, SwitchLines};
use crate::input::Switch;

/// In-memory panel implementing every hardware seam
#[derive(Default)]
pub struct VirtualPanel {
    held: RwLock<HashSet<Switch>>,
    selector: RwLock<SelectorReading>,
    leds: RwLock<BTreeMap<Led, bool>>,
}

impl VirtualPanel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a switch as held down
    pub fn hold(&self, switch: Switch) {
        self.held.write().insert(switch);
    }

    /// Mark a switch as released
    pub fn release(&self, switch: Switch) {
        self.held.write().remove(&switch);
    }

    pub fn set_selector(&self, reading: SelectorReading) {
        *self.selector.write() = reading;
    }

    /// Current state of one LED (off if never written)
    pub fn led(&self, led: Led) -> bool {
        self.leds.read().get(&led).copied().unwrap_or(false)
    }

    /// All LEDs currently lit, in display order
    pub fn lit(&self) -> Vec<Led> {
        self.leds
            .read()
            .iter()
            .filter(|(_, on)| **on)
            .map(|(led, _)| *led)
            .collect()
    }
}

impl SwitchLines for VirtualPanel {
    fn is_pressed(&self, switch: Switch) -> bool {
        self.held.read().contains(&switch)
    }
}

impl RoomNetworkSelector for VirtualPanel {
    fn read(&self) -> SelectorReading {
        *self.selector.read()
    }
}

impl LedPanel for VirtualPanel {
    fn set_led(&self, led: Led, on: bool) -> Result<()> {
        trace!("LED {} -> {}", led, if on { "on" } else { "off" });
        self.leds.write().insert(led, on);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::Bank;

    #[test]
    fn test_hold_and_release() {
        let panel = VirtualPanel::new();
        assert!(!panel.is_pressed(Switch::Mode));
        panel.hold(Switch::Mode);
        assert!(panel.is_pressed(Switch::Mode));
        panel.release(Switch::Mode);
        assert!(!panel.is_pressed(Switch::Mode));
    }

    #[test]
    fn test_leds_track_writes() {
        let panel = VirtualPanel::new();
        panel.set_led(Led::Bank(Bank::C), true).unwrap();
        panel.set_led(Led::Room(2), true).unwrap();
        panel.set_led(Led::Room(2), false).unwrap();
        assert_eq!(panel.lit(), vec![Led::Bank(Bank::C)]);
    }
}
