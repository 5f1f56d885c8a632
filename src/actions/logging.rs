//! Logging actions - records every action for testing and headless use

use parking_lot::Mutex;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tracing::{debug, info};

use super::{ConsoleCommandAction, MuteAction, OpenFileAction, VolumeAction};

/// Implements every action by logging it.
///
/// Useful for:
/// - Trying out a profile without touching the host system
/// - Test mode, where no real device is attached
/// - Validating the values the engine computes
pub struct LoggingActions {
    muted: AtomicBool,
    /// Last volume set
    last_volume: Mutex<Option<f32>>,
    execution_count: AtomicU64,
}

impl LoggingActions {
    pub fn new() -> Self {
        Self {
            muted: AtomicBool::new(false),
            last_volume: Mutex::new(None),
            execution_count: AtomicU64::new(0),
        }
    }

    /// Last volume set, if any
    pub fn volume(&self) -> Option<f32> {
        *self.last_volume.lock()
    }

    /// Number of actions performed so far
    pub fn execution_count(&self) -> u64 {
        self.execution_count.load(Ordering::Relaxed)
    }

    fn record(&self, action: &str, detail: impl std::fmt::Display) {
        let exec_num = self.execution_count.fetch_add(1, Ordering::Relaxed) + 1;
        info!(
            "🎮 [{}] {} {} [exec #{}]",
            chrono::Local::now().format("%H:%M:%S%.3f"),
            action,
            detail,
            exec_num
        );
        debug!(action = action, exec_count = exec_num, "LoggingActions execution");
    }
}

impl Default for LoggingActions {
    fn default() -> Self {
        Self::new()
    }
}

impl VolumeAction for LoggingActions {
    fn set_volume(&self, volume: f32) {
        *self.last_volume.lock() = Some(volume);
        self.record("volume", format!("{:.0}%", volume * 100.0));
    }
}

impl MuteAction for LoggingActions {
    fn set_mute(&self, muted: bool) {
        self.muted.store(muted, Ordering::Relaxed);
        self.record("mute", if muted { "on" } else { "off" });
    }

    fn get_mute(&self) -> bool {
        self.muted.load(Ordering::Relaxed)
    }
}

impl ConsoleCommandAction for LoggingActions {
    fn execute(&self, command: &str, value: f32) {
        self.record("command", format!("'{}' {}", command, value));
    }
}

impl OpenFileAction for LoggingActions {
    fn open(&self, path: &Path) {
        self.record("open", path.display());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mute_state_round_trips() {
        let actions = LoggingActions::new();
        assert!(!actions.get_mute());
        actions.set_mute(true);
        assert!(actions.get_mute());
        actions.set_mute(false);
        assert!(!actions.get_mute());
    }

    #[test]
    fn test_execution_count() {
        let actions = LoggingActions::new();
        actions.set_volume(0.5);
        actions.execute("next-track", 1.0);
        actions.open(Path::new("/tmp/notes.txt"));
        assert_eq!(actions.execution_count(), 3);
        assert_eq!(actions.volume(), Some(0.5));
    }
}
