//! Mode state machine
//!
//! Overloads the fixed set of physical switches into many logical commands.
//! `Alt` is a held modifier (true only while the Mode switch is physically
//! down); `Shift` and `AltPlaylist` are latched modifiers entered with a chord
//! (Mode+Play, Mode+Forward) and cleared by the next qualifying action.
//!
//! ```text
//!                 Mode down                 Mode up / found released
//!   Normal ───────────────────▶ Alt ───────────────────────────▶ Normal
//!                                │  + Play ──▶ latch Shift          (emits ROOM/NET
//!                                │  + Fwd  ──▶ latch AltPlaylist     if the selector
//!                                │  + Back ──▶ arm switch-off        moved meanwhile)
//! ```

use tracing::{debug, error, info, trace};

use super::bank::BankRing;
use crate::hardware::{RoomNetworkSelector, SelectorReading, SwitchLines};
use crate::input::Switch;
use crate::protocol::{Bank, Command};

/// The operation counter wraps here to avoid unbounded growth
pub const OPERATION_COUNT_WRAP: u32 = 100_000;

/// Effective mode of the panel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Normal,
    Alt,
    Shift,
    AltPlaylist,
}

/// Latched modifier
///
/// A single slot, so Shift and AltPlaylist can never both be active:
/// entering one replaces the other.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Latch {
    Shift,
    AltPlaylist,
}

/// Wrapping count of processed input operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OperationCounter(u32);

impl OperationCounter {
    pub fn value(&self) -> u32 {
        self.0
    }

    pub fn bump(&mut self) {
        self.0 = (self.0 + 1) % OPERATION_COUNT_WRAP;
    }

    /// Number of operations since `snapshot`, accounting for wrap-around
    pub fn since(&self, snapshot: u32) -> u32 {
        (self.0 + OPERATION_COUNT_WRAP - snapshot % OPERATION_COUNT_WRAP) % OPERATION_COUNT_WRAP
    }
}

/// Live hardware reads the machine needs while reacting
pub struct Inputs<'a> {
    pub lines: &'a dyn SwitchLines,
    pub selector: &'a dyn RoomNetworkSelector,
}

/// Output of one transition
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Reaction {
    /// Commands to enqueue, in order
    pub commands: Vec<Command>,
    /// Operation count snapshot when a switch-off confirmation must be armed
    pub arm_switch_off: Option<u32>,
}

/// Snapshot of the state the LED controller renders
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModeView {
    pub bank: Bank,
    pub latch: Option<Latch>,
    pub alt_held: bool,
}

/// Mode state machine
pub struct ModeMachine {
    alt_held: bool,
    latch: Option<Latch>,
    banks: BankRing,
    /// Selector reading taken when Alt was entered
    selector_snapshot: Option<SelectorReading>,
    operations: OperationCounter,
}

impl ModeMachine {
    pub fn new(bank: Bank) -> Self {
        Self {
            alt_held: false,
            latch: None,
            banks: BankRing::new(bank),
            selector_snapshot: None,
            operations: OperationCounter::default(),
        }
    }

    /// Effective mode; a held Alt takes precedence over a latch
    pub fn mode(&self) -> Mode {
        if self.alt_held {
            return Mode::Alt;
        }
        match self.latch {
            None => Mode::Normal,
            Some(Latch::Shift) => Mode::Shift,
            Some(Latch::AltPlaylist) => Mode::AltPlaylist,
        }
    }

    pub fn is_shift(&self) -> bool {
        self.latch == Some(Latch::Shift)
    }

    pub fn is_alt_playlist(&self) -> bool {
        self.latch == Some(Latch::AltPlaylist)
    }

    pub fn active_bank(&self) -> Bank {
        self.banks.active()
    }

    pub fn operations(&self) -> OperationCounter {
        self.operations
    }

    pub fn view(&self) -> ModeView {
        ModeView {
            bank: self.banks.active(),
            latch: self.latch,
            alt_held: self.alt_held,
        }
    }

    /// React to a debounced press of `switch`
    pub fn on_press(&mut self, switch: Switch, io: &Inputs<'_>) -> Reaction {
        let before = self.operations.value();
        self.operations.bump();

        let mut reaction = Reaction::default();
        let alt = self.refresh_alt(io, &mut reaction);

        match switch {
            Switch::Mode => {
                if !alt {
                    self.enter_alt(io);
                }
            }
            Switch::Bank => {
                if self.is_shift() {
                    debug!("Bank pressed: leaving shift mode");
                    self.latch = None;
                } else {
                    let bank = self.banks.rotate(alt);
                    info!("Active bank: {}", bank);
                }
            }
            Switch::Numbered(n) => {
                let command = if alt {
                    Command::Track { index: n }
                } else if self.is_shift() {
                    Command::Generic { index: n }
                } else if self.is_alt_playlist() {
                    self.latch = None;
                    Command::AltPlaylist {
                        bank: self.banks.active(),
                        index: n,
                    }
                } else {
                    Command::Playlist {
                        bank: self.banks.active(),
                        index: n,
                    }
                };
                reaction.commands.push(command);
            }
            Switch::PlayPause => {
                if self.is_shift() {
                    debug!("Play/Pause pressed: leaving shift mode");
                    self.latch = None;
                } else if alt {
                    info!("Mode+Play: entering shift mode");
                    self.latch = Some(Latch::Shift);
                } else {
                    reaction.commands.push(Command::PlayPause);
                }
            }
            Switch::Forward => {
                if self.is_alt_playlist() {
                    debug!("Forward pressed: leaving alt-playlist mode");
                    self.latch = None;
                } else if alt {
                    info!("Mode+Forward: entering alt-playlist mode");
                    self.latch = Some(Latch::AltPlaylist);
                } else {
                    reaction.commands.push(Command::Forward);
                }
            }
            Switch::Back => {
                if alt {
                    info!("Mode+Back: switch-off sequence armed");
                    reaction.arm_switch_off = Some(before);
                } else {
                    reaction.commands.push(Command::Back);
                }
            }
        }

        reaction
    }

    /// React to a release edge; only the Mode switch has release semantics
    ///
    /// The edge only ends Alt if the Mode line reads up. An edge while the
    /// line is still down is contact bounce and leaves Alt held.
    pub fn on_release(&mut self, switch: Switch, io: &Inputs<'_>) -> Reaction {
        let mut reaction = Reaction::default();
        if switch != Switch::Mode || !self.alt_held {
            return reaction;
        }
        if io.lines.is_pressed(Switch::Mode) {
            trace!("Release bounce on Mode ignored, line still down");
            return reaction;
        }
        self.operations.bump();
        self.exit_alt(io, &mut reaction);
        reaction
    }

    /// Periodic check for a held Alt whose release interrupt was missed
    pub fn poll(&mut self, io: &Inputs<'_>) -> Reaction {
        let mut reaction = Reaction::default();
        if self.alt_held && !io.lines.is_pressed(Switch::Mode) {
            debug!("Mode switch found released, leaving alt mode");
            self.operations.bump();
            self.exit_alt(io, &mut reaction);
        }
        reaction
    }

    /// Live Alt state: the flag only counts while the Mode line is still low
    fn refresh_alt(&mut self, io: &Inputs<'_>, reaction: &mut Reaction) -> bool {
        if self.alt_held && !io.lines.is_pressed(Switch::Mode) {
            debug!("Stale alt mode detected, leaving it");
            self.exit_alt(io, reaction);
        }
        self.alt_held
    }

    fn enter_alt(&mut self, io: &Inputs<'_>) {
        let reading = io.selector.read();
        debug!("Entering alt mode ({})", reading);
        self.alt_held = true;
        self.selector_snapshot = Some(reading);
    }

    fn exit_alt(&mut self, io: &Inputs<'_>, reaction: &mut Reaction) {
        self.alt_held = false;
        let before = self.selector_snapshot.take().unwrap_or_default();
        let after = io.selector.read();

        if !before.is_known() || !after.is_known() {
            error!(
                "Room/network selection unknown ({} -> {}), change discarded",
                before, after
            );
            return;
        }

        // Network first: room indices are interpreted within the current network
        if before.network != after.network {
            if let Some(index) = after.network {
                info!("Network selection changed: {} -> {}", before, after);
                reaction.commands.push(Command::Net { index });
            }
        }
        if before.room != after.room {
            if let Some(index) = after.room {
                info!("Room selection changed: {} -> {}", before, after);
                reaction.commands.push(Command::Room { index });
            }
        }
        debug!("Leaving alt mode");
    }
}

impl Default for ModeMachine {
    fn default() -> Self {
        Self::new(Bank::A)
    }
}
