//! Device profile data model
//!
//! A [`DeviceProfile`] holds the input bindings and output messages for one
//! named MIDI device. Properties live in insertion-ordered vectors and are
//! addressed by a [`PropertyId`] handed out by the owning profile, so the UI
//! can keep a handle across removals of other properties.

use std::fmt;
use std::path::PathBuf;

use crate::midi::MidiMessage;

/// Kind of MIDI message an input property listens for
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageType {
    #[default]
    None = 0,
    NoteOnOff = 1,
    ControlChange = 2,
}

impl MessageType {
    pub fn all() -> &'static [MessageType] {
        &[MessageType::None, MessageType::NoteOnOff, MessageType::ControlChange]
    }

    /// Decode a persisted ordinal
    pub fn from_u8(value: u8) -> Option<Self> {
        Self::all().get(value as usize).copied()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::None => "none",
            MessageType::NoteOnOff => "note",
            MessageType::ControlChange => "cc",
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Local action an input property triggers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ActionType {
    #[default]
    None = 0,
    Volume = 1,
    Mute = 2,
    ConsoleCommand = 3,
    OpenFile = 4,
}

impl ActionType {
    pub fn all() -> &'static [ActionType] {
        &[
            ActionType::None,
            ActionType::Volume,
            ActionType::Mute,
            ActionType::ConsoleCommand,
            ActionType::OpenFile,
        ]
    }

    /// Decode a persisted ordinal
    pub fn from_u8(value: u8) -> Option<Self> {
        Self::all().get(value as usize).copied()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::None => "none",
            ActionType::Volume => "volume",
            ActionType::Mute => "mute",
            ActionType::ConsoleCommand => "command",
            ActionType::OpenFile => "open",
        }
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Handle to a property, unique within its profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PropertyId(pub u32);

impl fmt::Display for PropertyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One input binding: a control on the device mapped to an action
#[derive(Debug, Clone, PartialEq)]
pub struct InputProperty {
    pub id: PropertyId,
    pub message_type: MessageType,
    pub action_type: ActionType,
    /// Command executed when `action_type` is `ConsoleCommand`
    pub console_command: String,
    /// File opened when `action_type` is `OpenFile`
    pub open_file_path: PathBuf,
    /// Match key: bytes 0 and 1 select the control, byte 2 is ignored
    pub message: MidiMessage,
    /// Note messages act as an on/off toggle instead of a momentary switch
    pub is_toggle: bool,

    // Runtime only, never persisted
    /// Next incoming message is captured into `message` (MIDI learn)
    pub is_recording: bool,
    pub is_console_command_active: bool,
}

impl InputProperty {
    fn new(id: PropertyId) -> Self {
        Self {
            id,
            message_type: MessageType::default(),
            action_type: ActionType::default(),
            console_command: String::new(),
            open_file_path: PathBuf::new(),
            message: MidiMessage::default(),
            is_toggle: false,
            is_recording: false,
            is_console_command_active: false,
        }
    }

    /// Whether an incoming message addresses this property's control
    pub fn matches(&self, incoming: &MidiMessage) -> bool {
        self.message.same_control(incoming)
    }

    pub fn reset_runtime_state(&mut self) {
        self.is_recording = false;
        self.is_console_command_active = false;
    }
}

/// One output binding: a message transmitted to the device
#[derive(Debug, Clone, PartialEq)]
pub struct OutputProperty {
    pub id: PropertyId,
    pub message: MidiMessage,
}

/// Bindings for one named MIDI device
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceProfile {
    name: String,
    pub input_port: usize,
    pub output_port: usize,
    pub input_properties: Vec<InputProperty>,
    pub output_properties: Vec<OutputProperty>,
    next_id: u32,
}

impl DeviceProfile {
    pub fn new(name: impl Into<String>, input_port: usize, output_port: usize) -> Self {
        Self {
            name: name.into(),
            input_port,
            output_port,
            input_properties: Vec::new(),
            output_properties: Vec::new(),
            next_id: 0,
        }
    }

    /// Sanitized device name, also the persistence key
    pub fn name(&self) -> &str {
        &self.name
    }

    fn allocate_id(&mut self) -> PropertyId {
        let id = PropertyId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Append a default input property and return it for editing
    pub fn make_input_property(&mut self) -> &mut InputProperty {
        let id = self.allocate_id();
        let index = self.input_properties.len();
        self.input_properties.push(InputProperty::new(id));
        &mut self.input_properties[index]
    }

    /// Append a default output property and return it for editing
    pub fn make_output_property(&mut self) -> &mut OutputProperty {
        let id = self.allocate_id();
        let index = self.output_properties.len();
        self.output_properties.push(OutputProperty {
            id,
            message: MidiMessage::default(),
        });
        &mut self.output_properties[index]
    }

    pub fn input_property(&self, id: PropertyId) -> Option<&InputProperty> {
        self.input_properties.iter().find(|p| p.id == id)
    }

    pub fn input_property_mut(&mut self, id: PropertyId) -> Option<&mut InputProperty> {
        self.input_properties.iter_mut().find(|p| p.id == id)
    }

    pub fn output_property(&self, id: PropertyId) -> Option<&OutputProperty> {
        self.output_properties.iter().find(|p| p.id == id)
    }

    pub fn output_property_mut(&mut self, id: PropertyId) -> Option<&mut OutputProperty> {
        self.output_properties.iter_mut().find(|p| p.id == id)
    }

    /// Remove an input property, keeping the order of the rest
    pub fn remove_input_property(&mut self, id: PropertyId) -> Option<InputProperty> {
        let index = self.input_properties.iter().position(|p| p.id == id)?;
        Some(self.input_properties.remove(index))
    }

    /// Remove an output property, keeping the order of the rest
    pub fn remove_output_property(&mut self, id: PropertyId) -> Option<OutputProperty> {
        let index = self.output_properties.iter().position(|p| p.id == id)?;
        Some(self.output_properties.remove(index))
    }

    /// Drop every property (before a reload from disk)
    pub fn clear_properties(&mut self) {
        self.input_properties.clear();
        self.output_properties.clear();
    }

    pub fn is_recording(&self) -> bool {
        self.input_properties.iter().any(|p| p.is_recording)
    }

    pub fn reset_runtime_state(&mut self) {
        for property in &mut self.input_properties {
            property.reset_runtime_state();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_make_properties_in_order() {
        let mut profile = DeviceProfile::new("Faderport", 1, 2);
        let a = profile.make_input_property().id;
        let b = profile.make_input_property().id;
        let out = profile.make_output_property().id;

        assert_ne!(a, b);
        assert_ne!(b, out);
        let ids: Vec<_> = profile.input_properties.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![a, b]);
        assert_eq!(profile.output_properties.len(), 1);
        assert_eq!(profile.name(), "Faderport");
    }

    #[test]
    fn test_remove_keeps_handles_stable() {
        let mut profile = DeviceProfile::new("Faderport", 0, 0);
        let a = profile.make_input_property().id;
        let b = profile.make_input_property().id;
        let c = profile.make_input_property().id;

        profile.input_property_mut(c).unwrap().console_command = "next".into();
        assert!(profile.remove_input_property(b).is_some());
        assert!(profile.remove_input_property(b).is_none());

        assert_eq!(profile.input_properties.len(), 2);
        assert!(profile.input_property(a).is_some());
        assert_eq!(profile.input_property(c).unwrap().console_command, "next");

        // Ids are never reused
        let d = profile.make_input_property().id;
        assert_ne!(d, b);
    }

    #[test]
    fn test_new_property_defaults() {
        let mut profile = DeviceProfile::new("M-Audio", 0, 0);
        let property = profile.make_input_property();
        assert_eq!(property.message_type, MessageType::None);
        assert_eq!(property.action_type, ActionType::None);
        assert_eq!(property.message, MidiMessage::new(0, 0, 0));
        assert!(!property.is_toggle);
        assert!(!property.is_recording);
    }

    #[test]
    fn test_reset_runtime_state() {
        let mut profile = DeviceProfile::new("Faderport", 0, 0);
        {
            let property = profile.make_input_property();
            property.is_recording = true;
            property.is_console_command_active = true;
        }
        assert!(profile.is_recording());

        profile.reset_runtime_state();
        assert!(!profile.is_recording());
        assert!(!profile.input_properties[0].is_console_command_active);
    }

    #[test]
    fn test_enum_ordinals() {
        assert_eq!(MessageType::from_u8(2), Some(MessageType::ControlChange));
        assert_eq!(MessageType::from_u8(3), None);
        assert_eq!(ActionType::from_u8(4), Some(ActionType::OpenFile));
        assert_eq!(ActionType::from_u8(5), None);
        for action in ActionType::all() {
            assert_eq!(ActionType::from_u8(*action as u8), Some(*action));
        }
    }
}
