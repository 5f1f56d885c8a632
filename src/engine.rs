//! MIDI processing engine
//!
//! The [`MidiProcessor`] owns the driver and at most one active
//! [`DeviceProfile`]. Incoming messages arrive on the driver thread and go
//! through, in order:
//! - MIDI learn capture for properties that are recording
//! - Dispatch to the bound action handlers (skipped when a capture happened)
//! - The bounded log buffer, evicting the oldest entry when full
//! - Every registered subscriber
//!
//! The UI thread edits the active profile through [`MidiProcessor::active_profile`].
//! Action handlers run with the profile lock held and must not call back into
//! the engine; subscribers run after it is released.

mod dispatch;


use dashmap::DashMap;
use parking_lot::{MappedMutexGuard, Mutex, MutexGuard};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, trace, warn};

use crate::actions::ActionHandlers;
use crate::driver::{
    sanitize_device_name, MidiDriver, MidirDriver, VirtualDeviceHandle, VirtualDriver,
};
use crate::error::{Error, Result};
use crate::midi::{format_hex, MidiMessage};
use crate::profile::{DeviceProfile, PropertyId};
use crate::queue::SpscQueue;

/// Default number of messages kept in the log buffer
pub const DEFAULT_LOG_CAPACITY: usize = 10;

/// Placeholder entry pre-filled into the log in test mode
pub const TEST_MODE_PLACEHOLDER: MidiMessage = MidiMessage([0x7F, 0x00, 0x00]);

/// A received message as seen by subscribers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MidiEvent {
    /// Driver timestamp in microseconds
    pub timestamp: u64,
    pub message: MidiMessage,
    /// Set when the message was captured by a recording property
    /// instead of being dispatched
    pub captured: Option<PropertyId>,
}

/// Subscriber invoked on the driver thread for every received message
pub type MidiCallback = Arc<dyn Fn(&MidiEvent) + Send + Sync>;

/// Handle returned by [`MidiProcessor::add_callback`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallbackId(u32);

/// State shared with the driver callback
struct Shared {
    active_profile: Mutex<Option<DeviceProfile>>,
    log: SpscQueue<MidiMessage>,
    callbacks: DashMap<CallbackId, MidiCallback>,
    actions: ActionHandlers,
}

impl Shared {
    fn on_driver_message(&self, timestamp: u64, data: &[u8]) {
        let Some(message) = MidiMessage::from_slice(data) else {
            warn!("Ignoring short MIDI message: {}", format_hex(data));
            return;
        };
        trace!("MIDI IN: {} ({})", message, format_hex(data));

        let captured = {
            let mut active = self.active_profile.lock();
            match active.as_mut() {
                Some(profile) => {
                    let captured = dispatch::capture_recording(profile, message);
                    if captured.is_none() {
                        dispatch::process_message(profile, &self.actions, message);
                    }
                    captured
                }
                None => None,
            }
        };

        if self.log.push_overwrite(message) {
            trace!("MIDI log full, dropped oldest entry");
        }

        let event = MidiEvent {
            timestamp,
            message,
            captured,
        };
        // Snapshot so subscribers may add or remove callbacks
        let callbacks: Vec<MidiCallback> = self
            .callbacks
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        for callback in callbacks {
            callback(&event);
        }
    }
}

/// Device activation, message dispatch and the message log
pub struct MidiProcessor {
    driver: Box<dyn MidiDriver>,
    shared: Arc<Shared>,
    next_callback_id: AtomicU32,
    virtual_device: Option<VirtualDeviceHandle>,
}

impl MidiProcessor {
    /// Create an engine on top of any driver
    pub fn new(
        driver: Box<dyn MidiDriver>,
        actions: ActionHandlers,
        log_capacity: usize,
    ) -> Result<Self> {
        if log_capacity == 0 {
            return Err(Error::InvalidArgument(
                "log capacity must be at least 1".to_string(),
            ));
        }

        info!(
            "MIDI engine created (api: {}, log capacity: {})",
            driver.api_name(),
            log_capacity
        );

        Ok(Self {
            driver,
            shared: Arc::new(Shared {
                active_profile: Mutex::new(None),
                log: SpscQueue::new(log_capacity),
                callbacks: DashMap::new(),
                actions,
            }),
            next_callback_id: AtomicU32::new(1),
            virtual_device: None,
        })
    }

    /// Create an engine on the platform MIDI API
    pub fn with_midir(
        client_name: &str,
        actions: ActionHandlers,
        log_capacity: usize,
    ) -> Result<Self> {
        let driver = MidirDriver::new(client_name)?;
        Self::new(Box::new(driver), actions, log_capacity)
    }

    /// Create an engine on canned virtual devices, with the log pre-filled
    /// with placeholder entries
    pub fn test_mode(actions: ActionHandlers, log_capacity: usize) -> Result<Self> {
        let driver = VirtualDriver::test_devices();
        let handle = driver.handle();

        let mut processor = Self::new(Box::new(driver), actions, log_capacity)?;
        while processor.shared.log.push(TEST_MODE_PLACEHOLDER).is_ok() {}
        processor.virtual_device = Some(handle);

        info!("MIDI engine running in test mode");
        Ok(processor)
    }

    pub fn is_test_mode(&self) -> bool {
        self.virtual_device.is_some()
    }

    /// The simulated hardware, only in test mode
    pub fn virtual_device(&self) -> Option<&VirtualDeviceHandle> {
        self.virtual_device.as_ref()
    }

    pub fn api_name(&self) -> String {
        self.driver.api_name()
    }

    /// Sanitized names of all input ports, in port order
    pub fn available_devices(&self) -> Vec<String> {
        match self.driver.input_port_names() {
            Ok(names) => names
                .iter()
                .enumerate()
                .map(|(port, name)| sanitize_device_name(name, port))
                .collect(),
            Err(e) => {
                error!("Failed to list MIDI input ports: {}", e);
                Vec::new()
            }
        }
    }

    /// Open the first input and output port whose sanitized name contains
    /// `device_name` and make a fresh profile for it active.
    ///
    /// On any failure the engine ends up with no active profile and no open
    /// ports.
    pub fn activate_profile(&mut self, device_name: &str) -> Result<()> {
        match self.try_activate(device_name) {
            Ok(()) => Ok(()),
            Err(e) => {
                warn!("Failed to activate profile '{}': {}", device_name, e);
                self.close_ports();
                *self.shared.active_profile.lock() = None;
                Err(e)
            }
        }
    }

    fn try_activate(&mut self, device_name: &str) -> Result<()> {
        if device_name.is_empty() {
            return Err(Error::InvalidArgument("device name cannot be empty".to_string()));
        }

        let inputs = self.driver.input_port_names()?;
        let outputs = self.driver.output_port_names()?;
        let (input_port, output_port) = find_port_pair(&inputs, &outputs, device_name)?;

        self.close_ports();
        *self.shared.active_profile.lock() = None;

        let shared = Arc::clone(&self.shared);
        self.driver.open_input(
            input_port,
            Box::new(move |timestamp, data| shared.on_driver_message(timestamp, data)),
        )?;
        self.driver.open_output(output_port)?;

        *self.shared.active_profile.lock() =
            Some(DeviceProfile::new(device_name, input_port, output_port));

        info!(
            "✅ Profile '{}' active (in: {} '{}', out: {} '{}')",
            device_name, input_port, inputs[input_port], output_port, outputs[output_port]
        );

        self.sync_output_properties()?;
        Ok(())
    }

    /// Close the ports and hand back the active profile with its runtime
    /// flags cleared
    pub fn deactivate_profile(&mut self) -> Option<DeviceProfile> {
        self.close_ports();

        let mut profile = self.shared.active_profile.lock().take()?;
        profile.reset_runtime_state();
        info!("Profile '{}' deactivated", profile.name());
        Some(profile)
    }

    fn close_ports(&mut self) {
        if self.driver.is_input_open() {
            self.driver.close_input();
        }
        if self.driver.is_output_open() {
            self.driver.close_output();
        }
    }

    pub fn has_active_profile(&self) -> bool {
        self.shared.active_profile.lock().is_some()
    }

    /// Lock the active profile for editing.
    ///
    /// Incoming messages wait while the guard is held, so keep it short.
    ///
    /// # Panics
    ///
    /// Panics when no profile is active.
    pub fn active_profile(&self) -> MappedMutexGuard<'_, DeviceProfile> {
        match self.try_active_profile() {
            Some(profile) => profile,
            None => panic!("no active device profile"),
        }
    }

    /// Lock the active profile, if there is one
    pub fn try_active_profile(&self) -> Option<MappedMutexGuard<'_, DeviceProfile>> {
        MutexGuard::try_map(self.shared.active_profile.lock(), |active| active.as_mut()).ok()
    }

    /// Dispatch a message against the active profile without going through
    /// the driver. Returns whether any action handler was invoked.
    pub fn process_input_message(&self, message: MidiMessage) -> bool {
        let mut active = self.shared.active_profile.lock();
        match active.as_mut() {
            Some(profile) => dispatch::process_message(profile, &self.shared.actions, message),
            None => false,
        }
    }

    /// Transmit one message on the active device's output port
    pub fn send_output_message(&mut self, message: MidiMessage) -> Result<()> {
        if !self.has_active_profile() {
            return Err(Error::NoActiveProfile);
        }

        self.driver.send(message.as_bytes()).map_err(|e| {
            error!("Failed to send MIDI message {}: {}", message, e);
            e
        })?;
        trace!("MIDI OUT: {}", message);
        Ok(())
    }

    /// Transmit every output property of the active profile, in order.
    /// Returns the number of messages sent.
    pub fn sync_output_properties(&mut self) -> Result<usize> {
        let messages: Vec<MidiMessage> = {
            let active = self.shared.active_profile.lock();
            let profile = active.as_ref().ok_or(Error::NoActiveProfile)?;
            profile.output_properties.iter().map(|p| p.message).collect()
        };

        for message in &messages {
            self.send_output_message(*message)?;
        }
        if !messages.is_empty() {
            debug!("Sent {} output properties", messages.len());
        }
        Ok(messages.len())
    }

    /// Register a subscriber for received messages
    pub fn add_callback<F>(&self, callback: F) -> CallbackId
    where
        F: Fn(&MidiEvent) + Send + Sync + 'static,
    {
        let id = CallbackId(self.next_callback_id.fetch_add(1, Ordering::Relaxed));
        self.shared.callbacks.insert(id, Arc::new(callback));
        debug!("MIDI callback {:?} registered", id);
        id
    }

    /// Returns `false` if the id was not registered
    pub fn remove_callback(&self, id: CallbackId) -> bool {
        self.shared.callbacks.remove(&id).is_some()
    }

    /// The bounded log of received messages, oldest first.
    /// The engine is the only producer; read it from one thread only.
    pub fn log_messages(&self) -> &SpscQueue<MidiMessage> {
        &self.shared.log
    }

    /// Take every logged message, oldest first
    pub fn drain_log(&self) -> Vec<MidiMessage> {
        self.shared.log.drain()
    }
}

impl Drop for MidiProcessor {
    fn drop(&mut self) {
        self.close_ports();
    }
}

/// Find the first input port whose sanitized name contains `device_name`
/// together with a matching output port. Output names are sanitized with the
/// input port's number.
pub fn find_port_pair(
    inputs: &[String],
    outputs: &[String],
    device_name: &str,
) -> Result<(usize, usize)> {
    let mut input_found = false;

    for (input_port, input_name) in inputs.iter().enumerate() {
        if !sanitize_device_name(input_name, input_port).contains(device_name) {
            continue;
        }
        input_found = true;

        let output_port = outputs
            .iter()
            .position(|output_name| {
                sanitize_device_name(output_name, input_port).contains(device_name)
            });
        if let Some(output_port) = output_port {
            return Ok((input_port, output_port));
        }
    }

    if input_found {
        Err(Error::NoMatchingOutput(device_name.to_string()))
    } else {
        Err(Error::DeviceNotFound(device_name.to_string()))
    }
}
