//! MIDI Mapper - bind MIDI controller input to desktop actions
//!
//! The library holds the mapping core (engine, profile model, persistence)
//! and the front-ends the binary wires together (shell, monitor).

pub mod actions;
pub mod cli;
pub mod config;
pub mod driver;
pub mod engine;
pub mod error;
pub mod midi;
pub mod monitor;
pub mod paths;
pub mod persistence;
pub mod profile;
pub mod queue;

pub use actions::{ActionHandlers, LoggingActions};
pub use engine::{CallbackId, MidiEvent, MidiProcessor};
pub use error::{Error, ErrorKind, Result};
pub use midi::MidiMessage;
pub use persistence::{LoadOutcome, ProfileStore};
pub use profile::{
    ActionType, DeviceProfile, InputProperty, MessageType, OutputProperty, PropertyId,
};
pub use queue::SpscQueue;
