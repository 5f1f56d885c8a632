//! `midir` implementation of the driver boundary

use midir::{Ignore, MidiInput, MidiInputConnection, MidiOutput, MidiOutputConnection};
use tracing::debug;

use super::{InputCallback, MidiDriver};
use crate::error::{Error, Result};

/// Hardware MIDI driver backed by the platform API `midir` selects
pub struct MidirDriver {
    client_name: String,
    input: Option<MidiInputConnection<()>>,
    output: Option<MidiOutputConnection>,
}

impl MidirDriver {
    /// Create a driver, failing early if the platform MIDI API is unavailable
    pub fn new(client_name: impl Into<String>) -> Result<Self> {
        let client_name = client_name.into();
        MidiInput::new(&client_name)?;

        Ok(Self {
            client_name,
            input: None,
            output: None,
        })
    }

    fn scanner_name(&self) -> String {
        format!("{}-scanner", self.client_name)
    }
}

fn platform_api_name() -> &'static str {
    if cfg!(target_os = "linux") {
        "ALSA"
    } else if cfg!(any(target_os = "macos", target_os = "ios")) {
        "CoreMIDI"
    } else if cfg!(windows) {
        "Windows MultiMedia"
    } else {
        "Unknown"
    }
}

impl MidiDriver for MidirDriver {
    fn api_name(&self) -> String {
        platform_api_name().to_string()
    }

    fn input_port_names(&self) -> Result<Vec<String>> {
        let midi_in = MidiInput::new(&self.scanner_name())?;
        let names = midi_in
            .ports()
            .iter()
            .map(|port| midi_in.port_name(port))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(names)
    }

    fn output_port_names(&self) -> Result<Vec<String>> {
        let midi_out = MidiOutput::new(&self.scanner_name())?;
        let names = midi_out
            .ports()
            .iter()
            .map(|port| midi_out.port_name(port))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(names)
    }

    fn open_input(&mut self, port: usize, mut callback: InputCallback) -> Result<()> {
        self.close_input();

        let mut midi_in = MidiInput::new(&self.client_name)?;
        midi_in.ignore(Ignore::None);

        let ports = midi_in.ports();
        let in_port = ports
            .get(port)
            .ok_or_else(|| Error::InvalidArgument(format!("input port {} does not exist", port)))?;
        let port_name = midi_in.port_name(in_port)?;

        let connection = midi_in.connect(
            in_port,
            &format!("{}-in", self.client_name),
            move |timestamp, data, _| callback(timestamp, data),
            (),
        )?;

        debug!("MIDI IN opened: '{}' (port {})", port_name, port);
        self.input = Some(connection);
        Ok(())
    }

    fn open_output(&mut self, port: usize) -> Result<()> {
        self.close_output();

        let midi_out = MidiOutput::new(&self.client_name)?;
        let ports = midi_out.ports();
        let out_port = ports
            .get(port)
            .ok_or_else(|| Error::InvalidArgument(format!("output port {} does not exist", port)))?;
        let port_name = midi_out.port_name(out_port)?;

        let connection = midi_out.connect(out_port, &format!("{}-out", self.client_name))?;

        debug!("MIDI OUT opened: '{}' (port {})", port_name, port);
        self.output = Some(connection);
        Ok(())
    }

    fn close_input(&mut self) {
        if let Some(connection) = self.input.take() {
            connection.close();
            debug!("MIDI IN closed");
        }
    }

    fn close_output(&mut self) {
        if let Some(connection) = self.output.take() {
            connection.close();
            debug!("MIDI OUT closed");
        }
    }

    fn is_input_open(&self) -> bool {
        self.input.is_some()
    }

    fn is_output_open(&self) -> bool {
        self.output.is_some()
    }

    fn send(&mut self, data: &[u8]) -> Result<()> {
        let output = self
            .output
            .as_mut()
            .ok_or_else(|| Error::Driver("output port is not open".to_string()))?;
        output.send(data)?;
        Ok(())
    }
}
