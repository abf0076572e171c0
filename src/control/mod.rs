//! Control plane
//!
//! Entry point for hardware events and owner of the poll loop.
//!
//! ```text
//! switch edge ──▶ debounce ──▶ ModeMachine ──▶ commands ──▶ dispatcher
//! rotary edge ──▶ RotaryDecoder ··· (drained each tick) ──▶ VOLUME n
//! poll tick   ──▶ stale Alt check, status drain, LED refresh
//! ```
//!
//! `handle_event` is synchronous and may be called from any thread (hardware
//! callbacks, the console). It only takes short locks and pushes onto
//! unbounded channels.

pub mod bank;
pub mod mode;
pub mod switch_off;

#[cfg(test)]
mod tests;

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{debug, info, trace};

use crate::channel::StatusReceiver;
use crate::config::InputConfig;
use crate::dispatcher::DispatcherHandle;
use crate::hardware::Hardware;
use crate::input::rotary::volume_delta;
use crate::input::{InputEvent, RotaryDecoder, Switch, SwitchDebouncer, SwitchEdge, SwitchMap};
use crate::leds::LedController;
use crate::lifecycle::Lifecycle;
use crate::protocol::{Bank, Command};

use mode::{Inputs, ModeMachine, ModeView, Reaction};
use switch_off::SwitchOff;

struct Shared {
    machine: Mutex<ModeMachine>,
    switches: SwitchMap,
    debouncer: SwitchDebouncer,
    rotary: RotaryDecoder,
    hardware: Hardware,
    dispatcher: DispatcherHandle,
    lifecycle: Lifecycle,
    switch_off: SwitchOff,
}

impl Shared {
    fn inputs(&self) -> Inputs<'_> {
        Inputs {
            lines: self.hardware.lines.as_ref(),
            selector: self.hardware.selector.as_ref(),
        }
    }

    fn confirm_switch_off(&self, snapshot: u32) {
        let operations = self.machine.lock().operations();
        if switch_off::confirmed(self.hardware.lines.as_ref(), operations, snapshot) {
            info!("🔌 Mode+Back held, switching off");
            self.dispatcher.send(Command::Shutdown);
        }
    }
}

/// Cloneable handle on the control plane
#[derive(Clone)]
pub struct ControlPlane {
    shared: Arc<Shared>,
}

impl ControlPlane {
    /// Must be created inside a tokio runtime (the switch-off timer uses it)
    pub fn new(
        config: &InputConfig,
        hardware: Hardware,
        dispatcher: DispatcherHandle,
        lifecycle: Lifecycle,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                machine: Mutex::new(ModeMachine::new(Bank::A)),
                switches: config.switch_map(),
                debouncer: SwitchDebouncer::new(config.switch_debounce()),
                rotary: RotaryDecoder::new(),
                hardware,
                dispatcher,
                lifecycle,
                switch_off: SwitchOff::new(config.switch_off_hold()),
            }),
        }
    }

    pub fn switches(&self) -> &SwitchMap {
        &self.shared.switches
    }

    pub fn mode_view(&self) -> ModeView {
        self.shared.machine.lock().view()
    }

    pub fn switch_off_armed(&self) -> bool {
        self.shared.switch_off.is_armed()
    }

    /// Handle one raw hardware event
    pub fn handle_event(&self, event: InputEvent) {
        match event {
            InputEvent::Switch { channel, edge } => {
                let Some(switch) = self.shared.switches.switch_for(channel) else {
                    trace!("Edge on unmapped channel {} ignored", channel);
                    return;
                };
                match edge {
                    SwitchEdge::Pressed => {
                        if self.shared.debouncer.accept_at(channel, Instant::now().into_std()) {
                            self.on_press(switch);
                        }
                    }
                    SwitchEdge::Released => self.on_release(switch),
                }
            }
            InputEvent::Rotary { line, a, b } => {
                self.shared.rotary.on_edge(line, a, b);
            }
        }
    }

    fn on_press(&self, switch: Switch) {
        debug!("{} pressed", switch);
        let reaction = {
            let io = self.shared.inputs();
            self.shared.machine.lock().on_press(switch, &io)
        };
        self.apply(reaction);
        self.shared.lifecycle.raise_activity();
    }

    fn on_release(&self, switch: Switch) {
        let reaction = {
            let io = self.shared.inputs();
            self.shared.machine.lock().on_release(switch, &io)
        };
        if !reaction.commands.is_empty() {
            self.shared.lifecycle.raise_activity();
        }
        self.apply(reaction);
    }

    fn apply(&self, reaction: Reaction) {
        for command in reaction.commands {
            info!("▶ {}", command);
            self.shared.dispatcher.send(command);
        }
        if let Some(snapshot) = reaction.arm_switch_off {
            let shared = Arc::clone(&self.shared);
            self.shared
                .switch_off
                .arm(move || shared.confirm_switch_off(snapshot));
        }
    }

    /// One poll tick: rotary drain, stale Alt check, status drain, LED refresh
    pub fn poll_once(&self, leds: &mut LedController, status: &mut StatusReceiver) {
        let pulses = self.shared.rotary.drain();
        if pulses != 0 {
            let command = Command::Volume {
                delta: volume_delta(pulses),
            };
            debug!("{} pulses: {}", pulses, command);
            self.shared.dispatcher.send(command);
            self.shared.lifecycle.raise_activity();
        }

        let reaction = {
            let io = self.shared.inputs();
            self.shared.machine.lock().poll(&io)
        };
        if !reaction.commands.is_empty() {
            self.shared.lifecycle.raise_activity();
        }
        self.apply(reaction);

        for event in status.drain() {
            leds.on_status(event);
        }
        leds.refresh(self.mode_view(), Instant::now(), self.shared.hardware.leds.as_ref());
    }

    /// Poll until the stop flag is set
    pub async fn run(
        self,
        mut leds: LedController,
        mut status: StatusReceiver,
        poll_interval: Duration,
    ) {
        info!("Control plane started (poll every {:?})", poll_interval);
        let mut ticker = interval(poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = self.shared.lifecycle.stopped() => break,
                _ = ticker.tick() => self.poll_once(&mut leds, &mut status),
            }
        }

        self.shared.switch_off.disarm();
        debug!("Control plane stopped");
    }
}
