//! In-memory driver for test mode and tests
//!
//! Ports exist only as names. A [`VirtualDeviceHandle`] plays the role of the
//! hardware: it injects incoming messages into the open input callback and
//! records everything the engine transmits.

use parking_lot::Mutex;
use std::sync::Arc;
use tracing::debug;

use super::{InputCallback, MidiDriver};
use crate::error::{Error, Result};

/// Port names offered in test mode
pub const TEST_DEVICE_NAMES: [&str; 2] = ["Faderport", "M-Audio"];

#[derive(Default)]
struct VirtualState {
    input_port: Option<usize>,
    output_port: Option<usize>,
    callback: Option<InputCallback>,
    /// Bumped on every open/close so a callback taken out for delivery
    /// is not restored into a newer connection
    generation: u64,
    sent: Vec<Vec<u8>>,
}

pub struct VirtualDriver {
    inputs: Vec<String>,
    outputs: Vec<String>,
    state: Arc<Mutex<VirtualState>>,
}

impl VirtualDriver {
    pub fn new(inputs: Vec<String>, outputs: Vec<String>) -> Self {
        Self {
            inputs,
            outputs,
            state: Arc::new(Mutex::new(VirtualState::default())),
        }
    }

    /// Same names on the input and output side
    pub fn with_ports<S: AsRef<str>>(names: &[S]) -> Self {
        let names: Vec<String> = names.iter().map(|n| n.as_ref().to_string()).collect();
        Self::new(names.clone(), names)
    }

    /// The canned devices used by test mode
    pub fn test_devices() -> Self {
        Self::with_ports(&TEST_DEVICE_NAMES)
    }

    pub fn handle(&self) -> VirtualDeviceHandle {
        VirtualDeviceHandle {
            state: Arc::clone(&self.state),
        }
    }
}

impl MidiDriver for VirtualDriver {
    fn api_name(&self) -> String {
        "Virtual".to_string()
    }

    fn input_port_names(&self) -> Result<Vec<String>> {
        Ok(self.inputs.clone())
    }

    fn output_port_names(&self) -> Result<Vec<String>> {
        Ok(self.outputs.clone())
    }

    fn open_input(&mut self, port: usize, callback: InputCallback) -> Result<()> {
        if port >= self.inputs.len() {
            return Err(Error::InvalidArgument(format!("input port {} does not exist", port)));
        }
        let mut state = self.state.lock();
        state.input_port = Some(port);
        state.callback = Some(callback);
        state.generation += 1;
        debug!("Virtual MIDI IN opened: '{}' (port {})", self.inputs[port], port);
        Ok(())
    }

    fn open_output(&mut self, port: usize) -> Result<()> {
        if port >= self.outputs.len() {
            return Err(Error::InvalidArgument(format!("output port {} does not exist", port)));
        }
        self.state.lock().output_port = Some(port);
        debug!("Virtual MIDI OUT opened: '{}' (port {})", self.outputs[port], port);
        Ok(())
    }

    fn close_input(&mut self) {
        let mut state = self.state.lock();
        state.input_port = None;
        state.callback = None;
        state.generation += 1;
    }

    fn close_output(&mut self) {
        self.state.lock().output_port = None;
    }

    fn is_input_open(&self) -> bool {
        self.state.lock().input_port.is_some()
    }

    fn is_output_open(&self) -> bool {
        self.state.lock().output_port.is_some()
    }

    fn send(&mut self, data: &[u8]) -> Result<()> {
        let mut state = self.state.lock();
        if state.output_port.is_none() {
            return Err(Error::Driver("output port is not open".to_string()));
        }
        state.sent.push(data.to_vec());
        Ok(())
    }
}

/// The "hardware" side of a [`VirtualDriver`]
#[derive(Clone)]
pub struct VirtualDeviceHandle {
    state: Arc<Mutex<VirtualState>>,
}

impl VirtualDeviceHandle {
    /// Deliver a message to the open input. Returns `false` when no input
    /// port is open.
    ///
    /// The callback runs without the driver lock held, so it may call back
    /// into the engine.
    pub fn inject(&self, timestamp: u64, data: &[u8]) -> bool {
        let (mut callback, generation) = {
            let mut state = self.state.lock();
            match state.callback.take() {
                Some(callback) => (callback, state.generation),
                None => return false,
            }
        };

        callback(timestamp, data);

        let mut state = self.state.lock();
        if state.generation == generation && state.callback.is_none() {
            state.callback = Some(callback);
        }
        true
    }

    /// Port the engine has open for input
    pub fn input_port(&self) -> Option<usize> {
        self.state.lock().input_port
    }

    pub fn output_port(&self) -> Option<usize> {
        self.state.lock().output_port
    }

    /// Everything transmitted so far
    pub fn sent(&self) -> Vec<Vec<u8>> {
        self.state.lock().sent.clone()
    }

    pub fn take_sent(&self) -> Vec<Vec<u8>> {
        std::mem::take(&mut self.state.lock().sent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_inject_requires_open_input() {
        let driver = VirtualDriver::test_devices();
        let handle = driver.handle();
        assert!(!handle.inject(0, &[0x90, 60, 100]));
    }

    #[test]
    fn test_inject_reaches_callback() {
        let mut driver = VirtualDriver::test_devices();
        let handle = driver.handle();
        let received = Arc::new(AtomicUsize::new(0));
        let counter = received.clone();

        driver
            .open_input(1, Box::new(move |_, _| {
                counter.fetch_add(1, Ordering::SeqCst);
            }))
            .unwrap();

        assert_eq!(handle.input_port(), Some(1));
        assert!(handle.inject(10, &[0x90, 60, 100]));
        assert!(handle.inject(20, &[0x80, 60, 0]));
        assert_eq!(received.load(Ordering::SeqCst), 2);

        driver.close_input();
        assert!(!handle.inject(30, &[0x90, 60, 100]));
    }

    #[test]
    fn test_open_unknown_port() {
        let mut driver = VirtualDriver::test_devices();
        assert!(driver.open_input(5, Box::new(|_, _| {})).is_err());
        assert!(driver.open_output(2).is_err());
    }

    #[test]
    fn test_send_records_bytes() {
        let mut driver = VirtualDriver::test_devices();
        let handle = driver.handle();

        assert!(driver.send(&[0xB0, 7, 0]).is_err());

        driver.open_output(0).unwrap();
        driver.send(&[0xB0, 7, 64]).unwrap();
        assert_eq!(handle.take_sent(), vec![vec![0xB0, 7, 64]]);
        assert!(handle.sent().is_empty());
    }
}
