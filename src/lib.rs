//! Playdeck - physical remote control front end for Sonos and MPD players
//!
//! Debounced switches, a volume encoder and two selector knobs drive a mode
//! state machine; commands travel as text lines to a single dispatcher actor
//! that talks to the players. LEDs mirror the mode and selection, and an
//! inactivity timer powers the device off when nothing is happening.

pub mod backends;
pub mod channel;
pub mod cli;
pub mod config;
pub mod control;
pub mod dispatcher;
pub mod hardware;
pub mod input;
pub mod leds;
pub mod lifecycle;
pub mod paths;
pub mod protocol;
pub mod scheduler;
