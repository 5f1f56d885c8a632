//! Device profile persistence
//!
//! All profiles live in one YAML document keyed by device name:
//!
//! ```yaml
//! Faderport:
//!   InputProperties:
//!     - Midi Message Type: 2
//!       Midi Toggle: false
//!       Midi Action Type: 1
//!       Console Command: ''
//!       Open File Path: ''
//!       Midi Message: [176, 7, 0]
//!   OutputProperties:
//!     - Midi Message: [144, 16, 127]
//! ```
//!
//! Saving rewrites the whole document but only replaces the target device's
//! section. Loading is lenient: missing or malformed keys leave defaults.

use serde::Serialize;
use serde_yaml::{Mapping, Value};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::midi::{MidiMessage, MESSAGE_LEN};
use crate::paths::AppPaths;
use crate::profile::{ActionType, DeviceProfile, InputProperty, MessageType};

/// File name of the profiles document
pub const PROFILES_FILENAME: &str = "profiles.yaml";

const INPUT_PROPERTIES_KEY: &str = "InputProperties";
const OUTPUT_PROPERTIES_KEY: &str = "OutputProperties";

const MESSAGE_TYPE_KEY: &str = "Midi Message Type";
const TOGGLE_KEY: &str = "Midi Toggle";
const ACTION_TYPE_KEY: &str = "Midi Action Type";
const CONSOLE_COMMAND_KEY: &str = "Console Command";
const OPEN_FILE_PATH_KEY: &str = "Open File Path";
const MESSAGE_KEY: &str = "Midi Message";

/// Result of a successful [`ProfileStore::load_profile`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// The device's section was found and applied
    Loaded,
    /// The device has never been saved; the profile is untouched
    NotFound,
}

#[derive(Serialize)]
struct InputRecord<'a> {
    #[serde(rename = "Midi Message Type")]
    message_type: u8,
    #[serde(rename = "Midi Toggle")]
    is_toggle: bool,
    #[serde(rename = "Midi Action Type")]
    action_type: u8,
    #[serde(rename = "Console Command")]
    console_command: &'a str,
    #[serde(rename = "Open File Path")]
    open_file_path: String,
    #[serde(rename = "Midi Message")]
    message: MidiMessage,
}

#[derive(Serialize)]
struct OutputRecord {
    #[serde(rename = "Midi Message")]
    message: MidiMessage,
}

#[derive(Serialize)]
struct SectionRecord<'a> {
    #[serde(rename = "InputProperties")]
    inputs: Vec<InputRecord<'a>>,
    #[serde(rename = "OutputProperties")]
    outputs: Vec<OutputRecord>,
}

impl<'a> SectionRecord<'a> {
    fn from_profile(profile: &'a DeviceProfile) -> Self {
        Self {
            inputs: profile
                .input_properties
                .iter()
                .map(|p| InputRecord {
                    message_type: p.message_type as u8,
                    is_toggle: p.is_toggle,
                    action_type: p.action_type as u8,
                    console_command: &p.console_command,
                    open_file_path: p.open_file_path.to_string_lossy().into_owned(),
                    message: p.message,
                })
                .collect(),
            outputs: profile
                .output_properties
                .iter()
                .map(|p| OutputRecord { message: p.message })
                .collect(),
        }
    }
}

/// Reads and writes device profiles in the profiles document
#[derive(Debug, Clone)]
pub struct ProfileStore {
    path: PathBuf,
}

impl ProfileStore {
    /// Use the profiles document at `path`, creating it (and its directory)
    /// if it does not exist yet.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                debug!("Creating profiles directory: {}", parent.display());
                fs::create_dir_all(parent)?;
            }
        }

        if !path.exists() {
            fs::write(&path, "")?;
            info!("Created profiles file {}", path.display());
        }
        info!("Using profiles file {}", path.display());

        Ok(Self { path })
    }

    /// Use the per-user profiles document
    pub fn from_default_location() -> Result<Self> {
        Self::open(AppPaths::detect().profiles)
    }

    pub fn profiles_file_path(&self) -> &Path {
        &self.path
    }

    fn read_document(&self) -> Result<Mapping> {
        if !self.path.exists() {
            return Ok(Mapping::new());
        }

        let content = fs::read_to_string(&self.path)?;
        if content.trim().is_empty() {
            return Ok(Mapping::new());
        }

        match serde_yaml::from_str::<Value>(&content)? {
            Value::Mapping(root) => Ok(root),
            Value::Null => Ok(Mapping::new()),
            _ => Err(Error::Config(format!(
                "{} must contain a mapping of device names",
                self.path.display()
            ))),
        }
    }

    fn write_document(&self, root: &Mapping) -> Result<()> {
        let content = if root.is_empty() {
            String::new()
        } else {
            serde_yaml::to_string(root)?
        };
        fs::write(&self.path, content)?;
        Ok(())
    }

    /// Names of every device with a saved section, in document order
    pub fn profile_names(&self) -> Result<Vec<String>> {
        Ok(self
            .read_document()?
            .keys()
            .filter_map(|k| k.as_str().map(str::to_string))
            .collect())
    }

    /// Whether the document has a section for this profile's device
    pub fn has_profile(&self, profile: &DeviceProfile) -> bool {
        match self.read_document() {
            Ok(root) => root.contains_key(profile.name()),
            Err(e) => {
                warn!("Failed to read {}: {}", self.path.display(), e);
                false
            }
        }
    }

    /// Write this profile's section, keeping every other device's section
    pub fn save_profile(&self, profile: &DeviceProfile) -> Result<()> {
        let mut root = self.read_document()?;

        let section = serde_yaml::to_value(SectionRecord::from_profile(profile))?;
        root.insert(Value::String(profile.name().to_string()), section);

        self.write_document(&root)?;
        info!(
            "Saved profile {} ({} inputs, {} outputs) into {}",
            profile.name(),
            profile.input_properties.len(),
            profile.output_properties.len(),
            self.path.display()
        );
        Ok(())
    }

    /// Replace the profile's properties with the saved ones.
    ///
    /// A device without a saved section is not an error.
    pub fn load_profile(&self, profile: &mut DeviceProfile) -> Result<LoadOutcome> {
        let root = self.read_document()?;

        let Some(section) = root.get(profile.name()) else {
            debug!("No saved profile for {}", profile.name());
            return Ok(LoadOutcome::NotFound);
        };

        if let Some(inputs) = section.get(INPUT_PROPERTIES_KEY).and_then(Value::as_sequence) {
            profile.input_properties.clear();
            for node in inputs {
                read_input_property(node, profile.make_input_property());
            }
        }

        if let Some(outputs) = section.get(OUTPUT_PROPERTIES_KEY).and_then(Value::as_sequence) {
            profile.output_properties.clear();
            for node in outputs {
                let property = profile.make_output_property();
                if let Some(message) = read_message(node.get(MESSAGE_KEY)) {
                    property.message = message;
                }
            }
        }

        info!(
            "Loaded profile {} ({} inputs, {} outputs) from {}",
            profile.name(),
            profile.input_properties.len(),
            profile.output_properties.len(),
            self.path.display()
        );
        Ok(LoadOutcome::Loaded)
    }

    /// Remove this profile's section. Returns whether one was present.
    pub fn remove_profile(&self, profile: &DeviceProfile) -> Result<bool> {
        let mut root = self.read_document()?;
        if root.remove(profile.name()).is_none() {
            return Ok(false);
        }

        self.write_document(&root)?;
        info!("Removed profile {} from {}", profile.name(), self.path.display());
        Ok(true)
    }
}

fn read_u8(node: &Value, key: &str) -> Option<u8> {
    node.get(key)
        .and_then(Value::as_u64)
        .and_then(|v| u8::try_from(v).ok())
}

/// `true`/`false`, or `1`/`0` as older profile files store it
fn read_bool(node: &Value, key: &str) -> Option<bool> {
    let value = node.get(key)?;
    value.as_bool().or_else(|| value.as_u64().map(|n| n != 0))
}

fn read_string(node: &Value, key: &str) -> Option<String> {
    node.get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn read_message(node: Option<&Value>) -> Option<MidiMessage> {
    let seq = node?.as_sequence()?;
    if seq.len() != MESSAGE_LEN {
        return None;
    }

    let bytes = seq
        .iter()
        .map(|v| v.as_u64().and_then(|n| u8::try_from(n).ok()))
        .collect::<Option<Vec<u8>>>()?;
    MidiMessage::from_slice(&bytes)
}

fn read_input_property(node: &Value, property: &mut InputProperty) {
    if let Some(ordinal) = read_u8(node, MESSAGE_TYPE_KEY) {
        match MessageType::from_u8(ordinal) {
            Some(message_type) => property.message_type = message_type,
            None => warn!("Unknown message type {} in profile, using none", ordinal),
        }
    }

    if let Some(is_toggle) = read_bool(node, TOGGLE_KEY) {
        property.is_toggle = is_toggle;
    }

    if let Some(ordinal) = read_u8(node, ACTION_TYPE_KEY) {
        match ActionType::from_u8(ordinal) {
            Some(action_type) => property.action_type = action_type,
            None => warn!("Unknown action type {} in profile, using none", ordinal),
        }
    }

    if let Some(command) = read_string(node, CONSOLE_COMMAND_KEY) {
        property.console_command = command;
    }

    if let Some(path) = read_string(node, OPEN_FILE_PATH_KEY) {
        property.open_file_path = PathBuf::from(path);
    }

    if let Some(message) = read_message(node.get(MESSAGE_KEY)) {
        property.message = message;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn make_store() -> (TempDir, ProfileStore) {
        let dir = TempDir::new().unwrap();
        let store = ProfileStore::open(dir.path().join("nested").join(PROFILES_FILENAME)).unwrap();
        (dir, store)
    }

    fn make_faderport() -> DeviceProfile {
        let mut profile = DeviceProfile::new("Faderport", 1, 1);
        {
            let fader = profile.make_input_property();
            fader.message_type = MessageType::ControlChange;
            fader.action_type = ActionType::Volume;
            fader.message = MidiMessage::new(0xB0, 0x07, 0x00);
        }
        {
            let button = profile.make_input_property();
            button.message_type = MessageType::NoteOnOff;
            button.action_type = ActionType::ConsoleCommand;
            button.console_command = "echo hello".into();
            button.is_toggle = true;
            button.message = MidiMessage::new(0x90, 0x10, 0x7F);
            button.is_recording = true;
            button.is_console_command_active = true;
        }
        {
            let open = profile.make_input_property();
            open.message_type = MessageType::NoteOnOff;
            open.action_type = ActionType::OpenFile;
            open.open_file_path = PathBuf::from("/tmp/set list.txt");
            open.message = MidiMessage::new(0x90, 0x11, 0x00);
        }
        profile.make_output_property().message = MidiMessage::new(0x90, 0x10, 0x7F);
        profile
    }

    #[test]
    fn test_open_creates_file() {
        let (_dir, store) = make_store();
        assert!(store.profiles_file_path().exists());
        assert!(store.profile_names().unwrap().is_empty());
    }

    #[test]
    fn test_round_trip() {
        let (_dir, store) = make_store();
        let saved = make_faderport();
        store.save_profile(&saved).unwrap();
        assert!(store.has_profile(&saved));

        let mut loaded = DeviceProfile::new("Faderport", 0, 0);
        assert_eq!(store.load_profile(&mut loaded).unwrap(), LoadOutcome::Loaded);

        assert_eq!(loaded.input_properties.len(), 3);
        assert_eq!(loaded.output_properties.len(), 1);
        assert_eq!(&loaded.input_properties[0].message.0[..2], &[0xB0, 0x07]);

        for (a, b) in saved.input_properties.iter().zip(&loaded.input_properties) {
            assert_eq!(a.message_type, b.message_type);
            assert_eq!(a.action_type, b.action_type);
            assert_eq!(a.console_command, b.console_command);
            assert_eq!(a.open_file_path, b.open_file_path);
            assert_eq!(a.message, b.message);
            assert_eq!(a.is_toggle, b.is_toggle);
            // Runtime flags are never persisted
            assert!(!b.is_recording);
            assert!(!b.is_console_command_active);
        }
        assert_eq!(loaded.output_properties[0].message, MidiMessage::new(0x90, 0x10, 0x7F));
    }

    #[test]
    fn test_save_preserves_other_devices() {
        let (_dir, store) = make_store();
        let mut maudio = DeviceProfile::new("M-Audio", 0, 0);
        maudio.make_output_property().message = MidiMessage::new(0xB0, 1, 2);
        store.save_profile(&maudio).unwrap();
        store.save_profile(&make_faderport()).unwrap();

        // Saving again replaces only the Faderport section
        let mut smaller = DeviceProfile::new("Faderport", 0, 0);
        smaller.make_input_property().action_type = ActionType::Mute;
        store.save_profile(&smaller).unwrap();

        assert_eq!(store.profile_names().unwrap(), vec!["M-Audio", "Faderport"]);

        let mut loaded = DeviceProfile::new("M-Audio", 0, 0);
        store.load_profile(&mut loaded).unwrap();
        assert_eq!(loaded.output_properties[0].message, MidiMessage::new(0xB0, 1, 2));

        let mut loaded = DeviceProfile::new("Faderport", 0, 0);
        store.load_profile(&mut loaded).unwrap();
        assert_eq!(loaded.input_properties.len(), 1);
        assert!(loaded.output_properties.is_empty());
    }

    #[test]
    fn test_load_missing_profile_is_not_an_error() {
        let (_dir, store) = make_store();
        store.save_profile(&make_faderport()).unwrap();

        let mut profile = DeviceProfile::new("Launchpad", 0, 0);
        profile.make_input_property();
        assert_eq!(store.load_profile(&mut profile).unwrap(), LoadOutcome::NotFound);
        assert_eq!(profile.input_properties.len(), 1);
        assert!(!store.has_profile(&profile));
    }

    #[test]
    fn test_load_skips_missing_and_malformed_keys() {
        let (_dir, store) = make_store();
        fs::write(
            store.profiles_file_path(),
            r#"
Faderport:
  InputProperties:
    - Midi Action Type: 2
      Midi Message: [144, 5]
    - Midi Message Type: 9
      Midi Toggle: true
      Console Command: ''
      Midi Message: [176, 7, 12]
"#,
        )
        .unwrap();

        let mut profile = DeviceProfile::new("Faderport", 0, 0);
        assert_eq!(store.load_profile(&mut profile).unwrap(), LoadOutcome::Loaded);

        let first = &profile.input_properties[0];
        assert_eq!(first.action_type, ActionType::Mute);
        assert_eq!(first.message_type, MessageType::None);
        assert_eq!(first.message, MidiMessage::default());

        let second = &profile.input_properties[1];
        assert_eq!(second.message_type, MessageType::None);
        assert!(second.is_toggle);
        assert!(second.console_command.is_empty());
        assert_eq!(second.message, MidiMessage::new(176, 7, 12));
    }

    #[test]
    fn test_load_numeric_toggle() {
        let (_dir, store) = make_store();
        fs::write(
            store.profiles_file_path(),
            r#"
Faderport:
  InputProperties:
    - Midi Message Type: 1
      Midi Toggle: 1
      Midi Action Type: 2
      Midi Message: [144, 16, 127]
    - Midi Message Type: 1
      Midi Toggle: 0
      Midi Action Type: 2
      Midi Message: [144, 17, 127]
"#,
        )
        .unwrap();

        let mut profile = DeviceProfile::new("Faderport", 0, 0);
        assert_eq!(store.load_profile(&mut profile).unwrap(), LoadOutcome::Loaded);

        assert!(profile.input_properties[0].is_toggle);
        assert!(!profile.input_properties[1].is_toggle);
    }

    #[test]
    fn test_document_keys() {
        let (_dir, store) = make_store();
        store.save_profile(&make_faderport()).unwrap();

        let content = fs::read_to_string(store.profiles_file_path()).unwrap();
        for key in [
            INPUT_PROPERTIES_KEY,
            OUTPUT_PROPERTIES_KEY,
            MESSAGE_TYPE_KEY,
            TOGGLE_KEY,
            ACTION_TYPE_KEY,
            CONSOLE_COMMAND_KEY,
            OPEN_FILE_PATH_KEY,
            MESSAGE_KEY,
        ] {
            assert!(content.contains(key), "missing key {key}");
        }

        let root: Value = serde_yaml::from_str(&content).unwrap();
        let message = &root["Faderport"][INPUT_PROPERTIES_KEY][0][MESSAGE_KEY];
        assert_eq!(message.as_sequence().unwrap().len(), 3);
    }

    #[test]
    fn test_remove_profile() {
        let (_dir, store) = make_store();
        let faderport = make_faderport();
        let maudio = DeviceProfile::new("M-Audio", 0, 0);
        store.save_profile(&faderport).unwrap();
        store.save_profile(&maudio).unwrap();

        assert!(store.remove_profile(&faderport).unwrap());
        assert!(!store.remove_profile(&faderport).unwrap());
        assert_eq!(store.profile_names().unwrap(), vec!["M-Audio"]);

        assert!(store.remove_profile(&maudio).unwrap());
        let content = fs::read_to_string(store.profiles_file_path()).unwrap();
        assert!(content.is_empty());
    }

    #[test]
    fn test_non_mapping_root_is_rejected() {
        let (_dir, store) = make_store();
        fs::write(store.profiles_file_path(), "- just\n- a list\n").unwrap();

        let mut profile = DeviceProfile::new("Faderport", 0, 0);
        let err = store.load_profile(&mut profile).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(store.save_profile(&profile).is_err());
    }
}
