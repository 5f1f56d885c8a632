//! MIDI driver boundary
//!
//! The engine talks to hardware only through [`MidiDriver`]. The production
//! implementation sits on `midir`; [`VirtualDriver`] serves test mode and the
//! test suite with in-memory ports.

pub mod midir_backend;
pub mod virtual_backend;

pub use midir_backend::MidirDriver;
pub use virtual_backend::{VirtualDeviceHandle, VirtualDriver};

use crate::error::Result;

/// Receives `(timestamp_us, bytes)` on the driver's input thread
pub type InputCallback = Box<dyn FnMut(u64, &[u8]) + Send + 'static>;

/// Port enumeration, connection and transmission for one input and one
/// output port at a time.
///
/// Port numbers are indices into the lists returned by
/// [`input_port_names`](MidiDriver::input_port_names) and
/// [`output_port_names`](MidiDriver::output_port_names).
pub trait MidiDriver: Send {
    /// Display name of the platform MIDI API
    fn api_name(&self) -> String;

    fn input_port_names(&self) -> Result<Vec<String>>;

    fn output_port_names(&self) -> Result<Vec<String>>;

    /// Open an input port and start delivering messages to `callback`
    fn open_input(&mut self, port: usize, callback: InputCallback) -> Result<()>;

    fn open_output(&mut self, port: usize) -> Result<()>;

    /// Stop the input callback and close the input port
    fn close_input(&mut self);

    fn close_output(&mut self);

    fn is_input_open(&self) -> bool;

    fn is_output_open(&self) -> bool;

    /// Transmit raw bytes on the open output port
    fn send(&mut self, data: &[u8]) -> Result<()>;
}

/// Strip driver decoration from a port name.
///
/// Drivers tend to append the port number and a colon-qualified client id
/// (ALSA: `"Faderport:Faderport MIDI 1 24:0"`). The decimal `port_number` is
/// searched anywhere in the name and removed together with the character in
/// front of it, then the name is cut at the first colon.
///
/// Both the input and the output list must go through this same rule so the
/// two sides of one device compare equal.
pub fn sanitize_device_name(name: &str, port_number: usize) -> String {
    let mut sanitized = name.to_string();

    let suffix = port_number.to_string();
    if let Some(index) = sanitized.find(&suffix) {
        let start = sanitized[..index]
            .char_indices()
            .next_back()
            .map(|(i, _)| i)
            .unwrap_or(index);
        sanitized.replace_range(start..index + suffix.len(), "");
    }

    if let Some(colon) = sanitized.find(':') {
        sanitized.truncate(colon);
    }

    sanitized
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_sanitize_alsa_names() {
        assert_eq!(sanitize_device_name("Faderport:Faderport MIDI 1 24:0", 1), "Faderport");
        assert_eq!(
            sanitize_device_name("Midi Through:Midi Through Port-0 14:0", 0),
            "Midi Through"
        );
    }

    #[test]
    fn test_sanitize_numeric_suffix() {
        assert_eq!(sanitize_device_name("Launchpad Mini 2", 2), "Launchpad Mini");
        assert_eq!(sanitize_device_name("M-Audio Oxygen 49 3", 3), "M-Audio Oxygen 49");
    }

    #[test]
    fn test_sanitize_matches_first_occurrence() {
        // The port number is searched anywhere, not only as a suffix
        assert_eq!(sanitize_device_name("Oxygen 49 4", 4), "Oxygen9 4");
    }

    #[test]
    fn test_sanitize_number_at_start() {
        assert_eq!(sanitize_device_name("1-Controller", 1), "-Controller");
    }

    #[test]
    fn test_sanitize_plain_name_unchanged() {
        assert_eq!(sanitize_device_name("Faderport", 0), "Faderport");
        assert_eq!(sanitize_device_name("M-Audio", 1), "M-Audio");
    }

    proptest! {
        #[test]
        fn prop_sanitized_names_are_fixed_points(
            name in "[A-Za-z _-]{0,24}",
            port in 0usize..64,
        ) {
            prop_assert_eq!(sanitize_device_name(&name, port), name);
        }
    }
}
