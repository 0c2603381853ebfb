//! Device-independent player commands and their keyboard bindings.

/// Seconds moved by one seek command.
pub const SEEK_STEP_SECS: f64 = 10.0;

/// Volume change for one volume command.
pub const VOLUME_STEP: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    TogglePlay,
    ToggleFullscreen,
    /// Relative seek in seconds.
    SeekBy(f64),
    /// Relative volume change.
    AdjustVolume(f64),
    /// Force volume to 0, or back to 1 when already silent.
    ToggleMute,
}

impl Command {
    /// Map a key name (as reported by the input layer) to a command.
    pub fn from_key(key: &str) -> Option<Self> {
        let command = match key.to_lowercase().as_str() {
            " " | "space" | "k" => Command::TogglePlay,
            "f" => Command::ToggleFullscreen,
            "arrowleft" | "j" => Command::SeekBy(-SEEK_STEP_SECS),
            "arrowright" | "l" => Command::SeekBy(SEEK_STEP_SECS),
            "arrowup" => Command::AdjustVolume(VOLUME_STEP),
            "arrowdown" => Command::AdjustVolume(-VOLUME_STEP),
            "m" => Command::ToggleMute,
            _ => return None,
        };
        Some(command)
    }
}
