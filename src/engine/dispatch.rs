//! Input property dispatch and MIDI learn capture

use tracing::{debug, trace};

use crate::actions::ActionHandlers;
use crate::midi::MidiMessage;
use crate::profile::{ActionType, DeviceProfile, InputProperty, MessageType, PropertyId};

/// Store `message` into every recording property and stop their recording.
/// Returns the first captured property, `None` if nothing was recording.
pub(super) fn capture_recording(
    profile: &mut DeviceProfile,
    message: MidiMessage,
) -> Option<PropertyId> {
    let mut captured = None;

    for property in profile.input_properties.iter_mut().filter(|p| p.is_recording) {
        property.message = message;
        property.is_recording = false;
        debug!("🎹 Learned {} for input property {}", message, property.id);
        captured.get_or_insert(property.id);
    }

    captured
}

/// Run every input property matching `message`.
/// Returns whether at least one action handler was invoked.
pub(super) fn process_message(
    profile: &mut DeviceProfile,
    actions: &ActionHandlers,
    message: MidiMessage,
) -> bool {
    let mut dispatched = false;

    for property in profile
        .input_properties
        .iter_mut()
        .filter(|p| p.matches(&message))
    {
        if dispatch(property, actions, message.value()) {
            trace!(
                "Input property {} fired {} (value {})",
                property.id,
                property.action_type,
                message.value()
            );
            dispatched = true;
        }
    }

    dispatched
}

fn dispatch(property: &mut InputProperty, actions: &ActionHandlers, value: u8) -> bool {
    let pressed = value != 0;

    match property.action_type {
        ActionType::None => false,

        ActionType::Volume => {
            let Some(volume) = &actions.volume else {
                return false;
            };
            volume.set_volume(f32::from(value) / 127.0);
            true
        }

        ActionType::Mute => {
            let Some(mute) = &actions.mute else {
                return false;
            };
            if property.message_type == MessageType::NoteOnOff {
                if !property.is_toggle {
                    mute.set_mute(pressed);
                } else if pressed {
                    mute.set_mute(!mute.get_mute());
                }
            }
            true
        }

        ActionType::ConsoleCommand => {
            let Some(console) = &actions.console_command else {
                return false;
            };
            match property.message_type {
                MessageType::NoteOnOff if property.is_toggle => {
                    if pressed {
                        let active = !property.is_console_command_active;
                        property.is_console_command_active = active;
                        console.execute(&property.console_command, if active { 1.0 } else { 0.0 });
                    }
                }
                MessageType::NoteOnOff => console.execute(&property.console_command, 1.0),
                MessageType::ControlChange => {
                    console.execute(&property.console_command, f32::from(value))
                }
                MessageType::None => {}
            }
            true
        }

        ActionType::OpenFile => {
            let Some(open_file) = &actions.open_file else {
                return false;
            };
            if property.message_type == MessageType::NoteOnOff && pressed {
                open_file.open(&property.open_file_path);
            }
            true
        }
    }
}
