//! Interactive console
//!
//! A rustyline REPL that plays the role of the physical panel. Switch and
//! encoder commands are turned into the same `InputEvent`s a hardware
//! callback would deliver; anything else is tried as a raw protocol line.

use anyhow::{bail, Result};
use colored::*;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::sync::Arc;
use std::thread;
use tracing::{debug, warn};

use crate::channel::StatusSender;
use crate::control::ControlPlane;
use crate::dispatcher::DispatcherHandle;
use crate::hardware::{SelectorReading, VirtualPanel};
use crate::input::{InputEvent, RotaryLine, Switch, SwitchEdge};
use crate::lifecycle::Lifecycle;
use crate::protocol::{Command, StatusEvent};

/// One parsed console line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Press(Switch),
    Release(Switch),
    Tap(Switch),
    /// Detents of the volume encoder, negative for counter-clockwise
    Turn(i32),
    Select { network: u8, room: u8 },
    Leds,
    Help,
    Quit,
    Send(Command),
    Status(StatusEvent),
}

impl ConsoleCommand {
    pub fn parse(line: &str) -> Result<Self> {
        let mut words = line.split_whitespace();
        let Some(first) = words.next() else {
            bail!("empty line");
        };
        let args: Vec<&str> = words.collect();

        let command = match (first.to_ascii_lowercase().as_str(), args.as_slice()) {
            ("press", [switch]) => ConsoleCommand::Press(switch.parse()?),
            ("release", [switch]) => ConsoleCommand::Release(switch.parse()?),
            ("tap", [switch]) => ConsoleCommand::Tap(switch.parse()?),
            ("turn", [detents]) => ConsoleCommand::Turn(detents.parse()?),
            ("select", [network, room]) => ConsoleCommand::Select {
                network: network.parse()?,
                room: room.parse()?,
            },
            ("leds", []) => ConsoleCommand::Leds,
            ("help", []) | ("?", []) => ConsoleCommand::Help,
            ("quit", []) | ("exit", []) => ConsoleCommand::Quit,
            _ => match line.parse::<Command>() {
                Ok(command) => ConsoleCommand::Send(command),
                Err(command_err) => match line.parse::<StatusEvent>() {
                    Ok(event) => ConsoleCommand::Status(event),
                    Err(_) => bail!("{}", command_err),
                },
            },
        };
        Ok(command)
    }
}

/// REPL state shared with the rest of the process
pub struct Console {
    panel: Arc<VirtualPanel>,
    plane: ControlPlane,
    dispatcher: DispatcherHandle,
    status: StatusSender,
    lifecycle: Lifecycle,
}

impl Console {
    pub fn new(
        panel: Arc<VirtualPanel>,
        plane: ControlPlane,
        dispatcher: DispatcherHandle,
        status: StatusSender,
        lifecycle: Lifecycle,
    ) -> Self {
        Self {
            panel,
            plane,
            dispatcher,
            status,
            lifecycle,
        }
    }

    /// Run the REPL on its own OS thread; readline blocks
    pub fn spawn(self) -> Result<thread::JoinHandle<()>> {
        let handle = thread::Builder::new()
            .name("console".into())
            .spawn(move || {
                if let Err(e) = self.run() {
                    warn!("Console stopped: {:#}", e);
                }
            })?;
        Ok(handle)
    }

    fn run(&self) -> Result<()> {
        let mut rl = DefaultEditor::new()?;
        println!(
            "{}",
            "playdeck console - type 'help' for commands".bold().cyan()
        );

        while !self.lifecycle.is_stopped() {
            match rl.readline("playdeck> ") {
                Ok(line) => {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    let _ = rl.add_history_entry(line);
                    match ConsoleCommand::parse(line) {
                        Ok(command) => {
                            if !self.execute(command) {
                                break;
                            }
                        }
                        Err(e) => println!("{} {}", "✗".red(), e),
                    }
                }
                Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => {
                    self.lifecycle.request_stop();
                    break;
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    /// Returns false when the console should exit
    pub fn execute(&self, command: ConsoleCommand) -> bool {
        debug!("Console: {:?}", command);
        match command {
            ConsoleCommand::Press(switch) => self.press(switch),
            ConsoleCommand::Release(switch) => self.release(switch),
            ConsoleCommand::Tap(switch) => {
                self.press(switch);
                self.release(switch);
            }
            ConsoleCommand::Turn(detents) => self.turn(detents),
            ConsoleCommand::Select { network, room } => {
                self.panel.set_selector(SelectorReading::new(network, room));
                println!("Selector: network {}, room {}", network, room);
            }
            ConsoleCommand::Leds => self.print_leds(),
            ConsoleCommand::Help => print_help(),
            ConsoleCommand::Quit => {
                self.lifecycle.request_stop();
                return false;
            }
            ConsoleCommand::Send(command) => {
                if !self.dispatcher.send(command) {
                    println!("{} dispatcher is not running", "✗".red());
                }
            }
            ConsoleCommand::Status(event) => self.status.send(event),
        }
        true
    }

    fn edge(&self, switch: Switch, edge: SwitchEdge) {
        match self.plane.switches().channel_for(switch) {
            Some(channel) => self.plane.handle_event(InputEvent::Switch { channel, edge }),
            None => println!("{} {} is not wired", "✗".red(), switch),
        }
    }

    fn press(&self, switch: Switch) {
        self.panel.hold(switch);
        self.edge(switch, SwitchEdge::Pressed);
    }

    fn release(&self, switch: Switch) {
        self.panel.release(switch);
        self.edge(switch, SwitchEdge::Released);
    }

    /// Replay full quadrature sequences, one per detent
    fn turn(&self, detents: i32) {
        let sequence: [(RotaryLine, bool, bool); 4] = if detents >= 0 {
            [
                (RotaryLine::A, false, true),
                (RotaryLine::B, false, false),
                (RotaryLine::A, true, false),
                (RotaryLine::B, true, true),
            ]
        } else {
            [
                (RotaryLine::B, true, false),
                (RotaryLine::A, false, false),
                (RotaryLine::B, false, true),
                (RotaryLine::A, true, true),
            ]
        };
        for _ in 0..detents.unsigned_abs() {
            for (line, a, b) in sequence {
                self.plane.handle_event(InputEvent::Rotary { line, a, b });
            }
        }
    }

    fn print_leds(&self) {
        let view = self.plane.mode_view();
        let lit: Vec<String> = self
            .panel
            .lit()
            .iter()
            .map(|led| led.to_string())
            .collect();
        println!("Mode: {:?}, bank {}", view.latch, view.bank.to_string().yellow());
        if lit.is_empty() {
            println!("LEDs: {}", "(all off)".dimmed());
        } else {
            println!("LEDs: {}", lit.join(" ").green());
        }
    }
}

fn print_help() {
    println!("\n{}", "Panel".bold());
    println!("  press <switch>     hold a switch (1-12, bank, mode, play, fwd, back)");
    println!("  release <switch>   release a held switch");
    println!("  tap <switch>       press and release");
    println!("  turn <n>           turn the volume knob n detents (negative = down)");
    println!("  select <net> <room> move the selector knobs");
    println!("  leds               show lit LEDs");
    println!("\n{}", "Protocol".bold());
    println!("  PLAY/PAUSE, PLAYLIST A 01, ROOM 3, NET 1, COMMAND 1, ...");
    println!("  NETWORK/ROOM 2; 3, PROGRESS START, PROGRESS STOP");
    println!("\n  quit               stop playdeck\n");
}
