//! MIDI message value type and formatting helpers
//!
//! Every message the mapper handles is a fixed 3-byte channel message
//! `[status, data1, data2]`. Bytes 0 and 1 identify the control, byte 2 is
//! the live value.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of bytes in a mapped MIDI message
pub const MESSAGE_LEN: usize = 3;

/// Raw 3-byte MIDI message
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MidiMessage(pub [u8; MESSAGE_LEN]);

/// Message class encoded in the status byte's high nibble
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageClass {
    NoteOff,
    NoteOn,
    PolyPressure,
    ControlChange,
    ProgramChange,
    ChannelPressure,
    PitchBend,
    System,
}

impl MidiMessage {
    pub const fn new(status: u8, data1: u8, data2: u8) -> Self {
        Self([status, data1, data2])
    }

    /// Build a message from a driver byte slice.
    ///
    /// Returns `None` for slices shorter than three bytes; trailing bytes
    /// beyond the third are ignored.
    pub fn from_slice(data: &[u8]) -> Option<Self> {
        match data {
            [status, data1, data2, ..] => Some(Self([*status, *data1, *data2])),
            _ => None,
        }
    }

    pub fn status(&self) -> u8 {
        self.0[0]
    }

    pub fn data1(&self) -> u8 {
        self.0[1]
    }

    /// The variable byte (velocity, controller value)
    pub fn value(&self) -> u8 {
        self.0[2]
    }

    /// Channel (0-15) for channel messages
    pub fn channel(&self) -> Option<u8> {
        match self.class() {
            MessageClass::System => None,
            _ => Some(self.status() & 0x0F),
        }
    }

    pub fn class(&self) -> MessageClass {
        match self.status() & 0xF0 {
            0x80 => MessageClass::NoteOff,
            0x90 => MessageClass::NoteOn,
            0xA0 => MessageClass::PolyPressure,
            0xB0 => MessageClass::ControlChange,
            0xC0 => MessageClass::ProgramChange,
            0xD0 => MessageClass::ChannelPressure,
            0xE0 => MessageClass::PitchBend,
            _ => MessageClass::System,
        }
    }

    /// True when both messages address the same control (bytes 0 and 1).
    pub fn same_control(&self, other: &MidiMessage) -> bool {
        self.0[0] == other.0[0] && self.0[1] == other.0[1]
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl From<[u8; MESSAGE_LEN]> for MidiMessage {
    fn from(bytes: [u8; MESSAGE_LEN]) -> Self {
        Self(bytes)
    }
}

impl fmt::Display for MidiMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [_, data1, data2] = self.0;
        match (self.class(), self.channel()) {
            (MessageClass::NoteOn, Some(ch)) if data2 == 0 => {
                write!(f, "NoteOff ch:{} n:{} v:0", ch + 1, data1)
            }
            (MessageClass::NoteOn, Some(ch)) => {
                write!(f, "NoteOn ch:{} n:{} v:{}", ch + 1, data1, data2)
            }
            (MessageClass::NoteOff, Some(ch)) => {
                write!(f, "NoteOff ch:{} n:{} v:{}", ch + 1, data1, data2)
            }
            (MessageClass::ControlChange, Some(ch)) => {
                write!(f, "CC ch:{} cc:{} v:{}", ch + 1, data1, data2)
            }
            (MessageClass::PitchBend, Some(ch)) => {
                let value = ((data2 as u16 & 0x7F) << 7) | (data1 as u16 & 0x7F);
                write!(f, "PitchBend ch:{} v:{}", ch + 1, value)
            }
            (class, Some(ch)) => write!(f, "{:?} ch:{} {} {}", class, ch + 1, data1, data2),
            (_, None) => write!(f, "System {}", format_hex(&self.0)),
        }
    }
}

/// Format MIDI bytes as hex string for debugging
pub fn format_hex(data: &[u8]) -> String {
    data.iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Parse a message typed by a user, e.g. `"B0 07 7F"` or `"dec 176 7 127"`.
///
/// Bytes are hex, as [`format_hex`] prints them; an optional `0x` prefix is
/// accepted. A leading `dec` switches the whole line to decimal.
pub fn parse_message(text: &str) -> Option<MidiMessage> {
    let mut tokens = text
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|t| !t.is_empty())
        .peekable();

    let decimal = tokens.next_if(|t| t.eq_ignore_ascii_case("dec")).is_some();
    let bytes = tokens
        .map(|token| {
            if decimal {
                token.parse::<u8>().ok()
            } else {
                let hex = token
                    .strip_prefix("0x")
                    .or_else(|| token.strip_prefix("0X"))
                    .unwrap_or(token);
                u8::from_str_radix(hex, 16).ok()
            }
        })
        .collect::<Option<Vec<u8>>>()?;

    if bytes.len() != MESSAGE_LEN {
        return None;
    }
    MidiMessage::from_slice(&bytes)
}

/// Format a message for monitor output
pub fn format_monitor(timestamp_us: u64, message: &MidiMessage) -> String {
    format!(
        "[{:>10.3}ms] IN  | {} => {}",
        timestamp_us as f64 / 1000.0,
        format_hex(message.as_bytes()),
        message
    )
}
