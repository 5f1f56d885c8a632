//! Action strategy interfaces
//!
//! The engine decides *when* an action fires; what the action does on the
//! host (changing the system volume, running a command, ...) is supplied by
//! the embedding application through these traits.
//!
//! All methods take `&self` because the engine calls them from the MIDI
//! driver thread. Implementations use interior mutability for their state.

pub mod logging;

use std::path::Path;
use std::sync::Arc;

pub use logging::LoggingActions;

/// Sets the master output volume
pub trait VolumeAction: Send + Sync {
    /// `volume` is normalized to `0.0..=1.0`
    fn set_volume(&self, volume: f32);
}

/// Reads and sets the master mute state
pub trait MuteAction: Send + Sync {
    fn set_mute(&self, muted: bool);
    fn get_mute(&self) -> bool;
}

/// Runs a console command with a parameter value
pub trait ConsoleCommandAction: Send + Sync {
    fn execute(&self, command: &str, value: f32);
}

/// Opens a file with the host's default handler
pub trait OpenFileAction: Send + Sync {
    fn open(&self, path: &Path);
}

/// Set of handlers the engine dispatches to. Unbound handlers are skipped.
#[derive(Clone, Default)]
pub struct ActionHandlers {
    pub volume: Option<Arc<dyn VolumeAction>>,
    pub mute: Option<Arc<dyn MuteAction>>,
    pub console_command: Option<Arc<dyn ConsoleCommandAction>>,
    pub open_file: Option<Arc<dyn OpenFileAction>>,
}

impl ActionHandlers {
    /// No handlers bound
    pub fn none() -> Self {
        Self::default()
    }

    /// Bind one object for every action kind
    pub fn all<T>(handler: Arc<T>) -> Self
    where
        T: VolumeAction + MuteAction + ConsoleCommandAction + OpenFileAction + 'static,
    {
        Self {
            volume: Some(handler.clone()),
            mute: Some(handler.clone()),
            console_command: Some(handler.clone()),
            open_file: Some(handler),
        }
    }

    pub fn with_volume(mut self, handler: Arc<dyn VolumeAction>) -> Self {
        self.volume = Some(handler);
        self
    }

    pub fn with_mute(mut self, handler: Arc<dyn MuteAction>) -> Self {
        self.mute = Some(handler);
        self
    }

    pub fn with_console_command(mut self, handler: Arc<dyn ConsoleCommandAction>) -> Self {
        self.console_command = Some(handler);
        self
    }

    pub fn with_open_file(mut self, handler: Arc<dyn OpenFileAction>) -> Self {
        self.open_file = Some(handler);
        self
    }
}

impl std::fmt::Debug for ActionHandlers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionHandlers")
            .field("volume", &self.volume.is_some())
            .field("mute", &self.mute.is_some())
            .field("console_command", &self.console_command.is_some())
            .field("open_file", &self.open_file.is_some())
            .finish()
    }
}
