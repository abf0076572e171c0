//! Command and status protocol between the control plane and the dispatcher
//!
//! Both directions keep the line-oriented text format `VERB [BANK] [VALUE]`
//! on the wire, but nothing past this module ever sees a raw string: lines are
//! parsed into [`Command`] / [`StatusEvent`] and rendered back with `Display`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

/// Playlist bank (one of four groups of 12 playlist slots)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Bank {
    A,
    B,
    C,
    D,
}

impl Bank {
    /// All banks in rotation order
    pub const ALL: [Bank; 4] = [Bank::A, Bank::B, Bank::C, Bank::D];

    /// Slot index of this bank (0-3)
    pub fn index(self) -> usize {
        match self {
            Bank::A => 0,
            Bank::B => 1,
            Bank::C => 2,
            Bank::D => 3,
        }
    }

    /// Bank for a slot index, wrapping modulo 4
    pub fn from_index(index: usize) -> Self {
        Self::ALL[index % Self::ALL.len()]
    }

    pub fn letter(self) -> char {
        match self {
            Bank::A => 'A',
            Bank::B => 'B',
            Bank::C => 'C',
            Bank::D => 'D',
        }
    }
}

impl fmt::Display for Bank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.letter())
    }
}

impl FromStr for Bank {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "A" => Ok(Bank::A),
            "B" => Ok(Bank::B),
            "C" => Ok(Bank::C),
            "D" => Ok(Bank::D),
            other => Err(ProtocolError::InvalidBank(other.to_string())),
        }
    }
}

/// Errors produced while parsing a protocol line
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("empty line")]
    Empty,

    #[error("unknown verb '{0}'")]
    UnknownVerb(String),

    #[error("missing {what} for {verb}")]
    MissingArgument { verb: &'static str, what: &'static str },

    #[error("invalid number '{0}'")]
    InvalidNumber(String),

    #[error("invalid bank '{0}'")]
    InvalidBank(String),

    #[error("unexpected trailing input '{0}'")]
    Trailing(String),
}

/// Logical command emitted by the control plane and executed by the dispatcher
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    PlayPause,
    Forward,
    Back,
    Playlist { bank: Bank, index: u8 },
    AltPlaylist { bank: Bank, index: u8 },
    Track { index: u8 },
    Volume { delta: i32 },
    Room { index: u8 },
    Net { index: u8 },
    Generic { index: u8 },
    Shutdown,
}

impl Command {
    /// Protocol verb for this command
    pub fn verb(&self) -> &'static str {
        match self {
            Command::PlayPause => "PLAY/PAUSE",
            Command::Forward => "FORWARD",
            Command::Back => "BACK",
            Command::Playlist { .. } => "PLAYLIST",
            Command::AltPlaylist { .. } => "ALTPLAYLIST",
            Command::Track { .. } => "TRACK",
            Command::Volume { .. } => "VOLUME",
            Command::Room { .. } => "ROOM",
            Command::Net { .. } => "NET",
            Command::Generic { .. } => "COMMAND",
            Command::Shutdown => "SHUTDOWN",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Playlist { bank, index } | Command::AltPlaylist { bank, index } => {
                write!(f, "{} {} {:02}", self.verb(), bank, index)
            }
            Command::Track { index }
            | Command::Room { index }
            | Command::Net { index }
            | Command::Generic { index } => write!(f, "{} {}", self.verb(), index),
            Command::Volume { delta } => write!(f, "{} {:+}", self.verb(), delta),
            Command::PlayPause | Command::Forward | Command::Back | Command::Shutdown => {
                write!(f, "{}", self.verb())
            }
        }
    }
}

/// Token cursor over one protocol line
struct Tokens<'a> {
    verb: &'static str,
    inner: std::str::SplitWhitespace<'a>,
}

impl<'a> Tokens<'a> {
    fn next_number<T: FromStr>(&mut self, what: &'static str) -> Result<T, ProtocolError> {
        let raw = self.inner.next().ok_or(ProtocolError::MissingArgument {
            verb: self.verb,
            what,
        })?;
        // Accept an explicit '+' sign on values, e.g. "VOLUME +3"
        let digits = raw.strip_prefix('+').unwrap_or(raw);
        digits
            .parse::<T>()
            .map_err(|_| ProtocolError::InvalidNumber(raw.to_string()))
    }

    fn next_bank(&mut self) -> Result<Bank, ProtocolError> {
        self.inner
            .next()
            .ok_or(ProtocolError::MissingArgument {
                verb: self.verb,
                what: "bank",
            })?
            .parse()
    }

    fn finish<T>(mut self, value: T) -> Result<T, ProtocolError> {
        match self.inner.next() {
            None => Ok(value),
            Some(extra) => Err(ProtocolError::Trailing(extra.to_string())),
        }
    }
}

impl FromStr for Command {
    type Err = ProtocolError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        let verb = words.next().ok_or(ProtocolError::Empty)?;
        let verb: &'static str = match verb {
            "PLAY/PAUSE" => "PLAY/PAUSE",
            "FORWARD" => "FORWARD",
            "BACK" => "BACK",
            "PLAYLIST" => "PLAYLIST",
            "ALTPLAYLIST" => "ALTPLAYLIST",
            "TRACK" => "TRACK",
            "VOLUME" => "VOLUME",
            "ROOM" => "ROOM",
            "NET" => "NET",
            "COMMAND" => "COMMAND",
            "SHUTDOWN" => "SHUTDOWN",
            other => return Err(ProtocolError::UnknownVerb(other.to_string())),
        };
        let mut t = Tokens { verb, inner: words };

        let command = match verb {
            "PLAY/PAUSE" => Command::PlayPause,
            "FORWARD" => Command::Forward,
            "BACK" => Command::Back,
            "SHUTDOWN" => Command::Shutdown,
            "PLAYLIST" => {
                let bank = t.next_bank()?;
                let index = t.next_number("playlist number")?;
                Command::Playlist { bank, index }
            }
            "ALTPLAYLIST" => {
                let bank = t.next_bank()?;
                let index = t.next_number("playlist number")?;
                Command::AltPlaylist { bank, index }
            }
            "TRACK" => Command::Track {
                index: t.next_number("track number")?,
            },
            "VOLUME" => Command::Volume {
                delta: t.next_number("volume delta")?,
            },
            "ROOM" => Command::Room {
                index: t.next_number("room number")?,
            },
            "NET" => Command::Net {
                index: t.next_number("network number")?,
            },
            _ => Command::Generic {
                index: t.next_number("command number")?,
            },
        };

        t.finish(command)
    }
}

/// Status notification from the dispatcher back to the control plane
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusEvent {
    RoomNetworkSync { network: u8, room: u8 },
    ProgressStart,
    ProgressStop,
}

impl fmt::Display for StatusEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusEvent::RoomNetworkSync { network, room } => {
                write!(f, "NETWORK/ROOM {}; {}", network, room)
            }
            StatusEvent::ProgressStart => write!(f, "PROGRESS START"),
            StatusEvent::ProgressStop => write!(f, "PROGRESS STOP"),
        }
    }
}

impl FromStr for StatusEvent {
    type Err = ProtocolError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        let verb = words.next().ok_or(ProtocolError::Empty)?;
        match verb {
            "PROGRESS" => {
                let which = words.next();
                let t = Tokens {
                    verb: "PROGRESS",
                    inner: words,
                };
                match which {
                    Some("START") => t.finish(StatusEvent::ProgressStart),
                    Some("STOP") => t.finish(StatusEvent::ProgressStop),
                    Some(other) => Err(ProtocolError::UnknownVerb(format!("PROGRESS {}", other))),
                    None => Err(ProtocolError::MissingArgument {
                        verb: "PROGRESS",
                        what: "START/STOP",
                    }),
                }
            }
            "NETWORK/ROOM" => {
                // "NETWORK/ROOM <net>; <room>" - the separator may hug either number
                let rest: String = words.collect::<Vec<_>>().join(" ");
                let (net, room) = rest.split_once(';').ok_or(ProtocolError::MissingArgument {
                    verb: "NETWORK/ROOM",
                    what: "room",
                })?;
                let mut t = Tokens {
                    verb: "NETWORK/ROOM",
                    inner: net.split_whitespace(),
                };
                let network = t.next_number("network")?;
                t.finish(())?;
                let mut t = Tokens {
                    verb: "NETWORK/ROOM",
                    inner: room.split_whitespace(),
                };
                let room = t.next_number("room")?;
                t.finish(StatusEvent::RoomNetworkSync { network, room })
            }
            other => Err(ProtocolError::UnknownVerb(other.to_string())),
        }
    }
}

/// Parse a command line, logging and discarding anything unrecognized
pub fn parse_command_line(line: &str) -> Option<Command> {
    match line.parse::<Command>() {
        Ok(command) => Some(command),
        Err(e) => {
            warn!("Unrecognized command: '{}' ({})", line.trim(), e);
            None
        }
    }
}

/// Parse a status line, logging and discarding anything unrecognized
pub fn parse_status_line(line: &str) -> Option<StatusEvent> {
    match line.parse::<StatusEvent>() {
        Ok(event) => Some(event),
        Err(e) => {
            warn!("Unrecognized status: '{}' ({})", line.trim(), e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_verbs() {
        assert_eq!("PLAY/PAUSE".parse::<Command>(), Ok(Command::PlayPause));
        assert_eq!("FORWARD".parse::<Command>(), Ok(Command::Forward));
        assert_eq!("  BACK  ".parse::<Command>(), Ok(Command::Back));
        assert_eq!("SHUTDOWN".parse::<Command>(), Ok(Command::Shutdown));
    }

    #[test]
    fn test_parse_playlist_with_bank() {
        assert_eq!(
            "PLAYLIST A 01".parse::<Command>(),
            Ok(Command::Playlist { bank: Bank::A, index: 1 })
        );
        assert_eq!(
            "ALTPLAYLIST D 12".parse::<Command>(),
            Ok(Command::AltPlaylist { bank: Bank::D, index: 12 })
        );
    }

    #[test]
    fn test_parse_signed_volume() {
        assert_eq!("VOLUME -4".parse::<Command>(), Ok(Command::Volume { delta: -4 }));
        assert_eq!("VOLUME +9".parse::<Command>(), Ok(Command::Volume { delta: 9 }));
        assert_eq!("VOLUME 2".parse::<Command>(), Ok(Command::Volume { delta: 2 }));
    }

    #[test]
    fn test_display_matches_wire_format() {
        assert_eq!(Command::Playlist { bank: Bank::B, index: 7 }.to_string(), "PLAYLIST B 07");
        assert_eq!(Command::Volume { delta: -3 }.to_string(), "VOLUME -3");
        assert_eq!(Command::Volume { delta: 4 }.to_string(), "VOLUME +4");
        assert_eq!(Command::Generic { index: 10 }.to_string(), "COMMAND 10");
        assert_eq!(Command::Room { index: 5 }.to_string(), "ROOM 5");
    }

    #[test]
    fn test_rejects_malformed_lines() {
        assert_eq!(
            "FOO BAR".parse::<Command>(),
            Err(ProtocolError::UnknownVerb("FOO".to_string()))
        );
        assert!(matches!(
            "PLAYLIST A".parse::<Command>(),
            Err(ProtocolError::MissingArgument { .. })
        ));
        assert_eq!(
            "PLAYLIST E 1".parse::<Command>(),
            Err(ProtocolError::InvalidBank("E".to_string()))
        );
        assert_eq!(
            "TRACK x".parse::<Command>(),
            Err(ProtocolError::InvalidNumber("x".to_string()))
        );
        assert_eq!(
            "FORWARD 3".parse::<Command>(),
            Err(ProtocolError::Trailing("3".to_string()))
        );
        assert_eq!("".parse::<Command>(), Err(ProtocolError::Empty));
        // Verbs are case sensitive on the wire
        assert!("play/pause".parse::<Command>().is_err());
    }

    #[test]
    fn test_parse_command_line_discards_garbage() {
        assert_eq!(parse_command_line("FOO BAR"), None);
        assert_eq!(parse_command_line("TRACK 3"), Some(Command::Track { index: 3 }));
    }

    #[test]
    fn test_status_lines() {
        assert_eq!(
            "NETWORK/ROOM 2; 3".parse::<StatusEvent>(),
            Ok(StatusEvent::RoomNetworkSync { network: 2, room: 3 })
        );
        assert_eq!(
            "NETWORK/ROOM 1 ;0".parse::<StatusEvent>(),
            Ok(StatusEvent::RoomNetworkSync { network: 1, room: 0 })
        );
        assert_eq!("PROGRESS START".parse::<StatusEvent>(), Ok(StatusEvent::ProgressStart));
        assert_eq!("PROGRESS STOP".parse::<StatusEvent>(), Ok(StatusEvent::ProgressStop));
        assert_eq!(
            StatusEvent::RoomNetworkSync { network: 3, room: 0 }.to_string(),
            "NETWORK/ROOM 3; 0"
        );
    }

    #[test]
    fn test_status_rejects_malformed_lines() {
        assert_eq!(parse_status_line("FOO BAR"), None);
        assert_eq!(parse_status_line("PROGRESS"), None);
        assert_eq!(parse_status_line("PROGRESS START NOW"), None);
        assert_eq!(parse_status_line("NETWORK/ROOM 2"), None);
        assert_eq!(parse_status_line("NETWORK/ROOM x; 1"), None);
    }

    #[test]
    fn test_bank_rotation_helpers() {
        assert_eq!(Bank::from_index(5), Bank::B);
        assert_eq!(Bank::D.index(), 3);
        assert_eq!("C".parse::<Bank>(), Ok(Bank::C));
    }
}
