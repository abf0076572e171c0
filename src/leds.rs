//! LED feedback controller
//!
//! Renders the whole indicator panel once per poll tick from the mode view
//! and the last status events. Blink phases are derived from a monotonic
//! clock at render time, so a delayed tick just shows the phase that is
//! current when it finally runs. Only LEDs whose level changed are written.

use std::collections::BTreeMap;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::config::LedConfig;
use crate::control::mode::{Latch, ModeView};
use crate::hardware::{Led, LedPanel};
use crate::protocol::{Bank, StatusEvent};

/// Level of every LED for one tick
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LedFrame {
    levels: BTreeMap<Led, bool>,
}

impl LedFrame {
    pub fn get(&self, led: Led) -> bool {
        self.levels.get(&led).copied().unwrap_or(false)
    }

    fn set(&mut self, led: Led, on: bool) {
        self.levels.insert(led, on);
    }

    /// LEDs lit in this frame
    pub fn lit(&self) -> Vec<Led> {
        self.levels
            .iter()
            .filter(|(_, on)| **on)
            .map(|(led, _)| *led)
            .collect()
    }

    /// LEDs whose level differs from `previous` (all of them without one)
    pub fn changes<'a>(
        &'a self,
        previous: Option<&'a LedFrame>,
    ) -> impl Iterator<Item = (Led, bool)> + 'a {
        self.levels
            .iter()
            .filter(move |(led, on)| previous.map(|p| p.get(**led) != **on).unwrap_or(true))
            .map(|(led, on)| (*led, *on))
    }
}

pub struct LedController {
    blink_interval: Duration,
    room_leds: u8,
    network_leds: u8,
    progress_sequence: Vec<u8>,
    /// Reference point for blink phases
    origin: Instant,
    selection: Option<(u8, u8)>,
    progress_since: Option<Instant>,
    shown: Option<LedFrame>,
}

impl LedController {
    pub fn new(config: &LedConfig) -> Self {
        Self {
            blink_interval: config.blink_interval(),
            room_leds: config.room_leds,
            network_leds: config.network_leds,
            progress_sequence: config.progress_sequence.clone(),
            origin: Instant::now(),
            selection: None,
            progress_since: None,
            shown: None,
        }
    }

    pub fn on_status(&mut self, event: StatusEvent) {
        match event {
            StatusEvent::RoomNetworkSync { network, room } => {
                debug!("Indicators: network {}, room {}", network, room);
                self.selection = Some((network, room));
            }
            StatusEvent::ProgressStart => {
                if self.progress_since.is_none() {
                    self.progress_since = Some(Instant::now());
                }
            }
            StatusEvent::ProgressStop => {
                self.progress_since = None;
            }
        }
    }

    /// Number of whole blink intervals between `since` and `now`
    fn steps(&self, since: Instant, now: Instant) -> u128 {
        let interval = self.blink_interval.as_millis().max(1);
        now.saturating_duration_since(since).as_millis() / interval
    }

    /// Compute the frame for `view` at `now`
    pub fn render(&self, view: ModeView, now: Instant) -> LedFrame {
        let mut frame = LedFrame::default();
        let blink_on = self.steps(self.origin, now) % 2 == 0;

        for bank in Bank::ALL {
            let active = bank == view.bank;
            let on = match view.latch {
                Some(Latch::Shift) => blink_on,
                Some(Latch::AltPlaylist) => active && blink_on,
                None => active,
            };
            frame.set(Led::Bank(bank), on);
        }

        let (network, room) = self.selection.unwrap_or((0, 0));
        let progress_room = self.progress_since.and_then(|since| {
            if self.progress_sequence.is_empty() {
                return None;
            }
            let step = self.steps(since, now) % self.progress_sequence.len() as u128;
            Some(self.progress_sequence[step as usize])
        });

        for n in 1..=self.room_leds {
            let on = match progress_room {
                Some(lit) => n == lit,
                None => n == room,
            };
            frame.set(Led::Room(n), on);
        }
        for n in 1..=self.network_leds {
            frame.set(Led::Network(n), n == network);
        }
        frame
    }

    /// Render and write the LEDs that changed since the last refresh
    pub fn refresh(&mut self, view: ModeView, now: Instant, panel: &dyn LedPanel) {
        let frame = self.render(view, now);
        let mut failed = false;
        for (led, on) in frame.changes(self.shown.as_ref()) {
            if let Err(e) = panel.set_led(led, on) {
                warn!("Could not set {}: {:#}", led, e);
                failed = true;
            }
        }
        // Rewrite everything next time if the panel missed a write
        self.shown = if failed { None } else { Some(frame) };
    }
}
