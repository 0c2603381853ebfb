//! Playback session state.

use std::fmt;

use serde::{Deserialize, Serialize};

use dr_core::{MediaKind, MediaSource, SessionId};

use crate::error::PlaybackError;

/// How the session feeds the media surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackMode {
    /// The original file through the range media server.
    Direct,
    /// A DASH manifest through the adaptive engine.
    Adaptive,
}

impl PlaybackMode {
    pub fn for_kind(kind: MediaKind) -> Self {
        match kind {
            MediaKind::Raw => PlaybackMode::Direct,
            MediaKind::Adaptive => PlaybackMode::Adaptive,
        }
    }

    pub fn media_kind(self) -> MediaKind {
        match self {
            PlaybackMode::Direct => MediaKind::Raw,
            PlaybackMode::Adaptive => MediaKind::Adaptive,
        }
    }
}

impl fmt::Display for PlaybackMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlaybackMode::Direct => f.write_str("direct"),
            PlaybackMode::Adaptive => f.write_str("adaptive"),
        }
    }
}

/// Controller state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayerState {
    Idle,
    Loading,
    Playing,
    Paused,
    Seeking,
    Closed,
}

impl PlayerState {
    /// Whether user commands act in this state.
    pub fn accepts_commands(self) -> bool {
        matches!(self, PlayerState::Playing | PlayerState::Paused | PlayerState::Seeking)
    }
}

/// Whether playback should run once the pipeline allows it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayState {
    Playing,
    Paused,
}

impl PlayState {
    pub fn toggled(self) -> Self {
        match self {
            PlayState::Playing => PlayState::Paused,
            PlayState::Paused => PlayState::Playing,
        }
    }

    /// The settled controller state matching this play state.
    pub fn as_state(self) -> PlayerState {
        match self {
            PlayState::Playing => PlayerState::Playing,
            PlayState::Paused => PlayerState::Paused,
        }
    }
}

/// One reading of the adaptive engine's health.
///
/// Bitrates are in bits per second, the buffer in seconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSample {
    pub current_bitrate: f64,
    pub average_throughput: f64,
    pub buffer_length: f64,
}

impl MetricsSample {
    pub fn zeroed() -> Self {
        Self::default()
    }

    pub fn is_zeroed(&self) -> bool {
        *self == Self::default()
    }
}

impl fmt::Display for MetricsSample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Bitrate: {:.2} Mbps | Throughput: {:.2} Mbps | Buffer: {:.1}s",
            self.current_bitrate / 1_000_000.0,
            self.average_throughput / 1_000_000.0,
            self.buffer_length
        )
    }
}

/// Everything the UI renders for one player.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackSession {
    pub id: SessionId,
    pub source: Option<MediaSource>,
    pub mode: PlaybackMode,
    pub state: PlayerState,
    /// Remembered user intent, applied whenever the pipeline becomes ready.
    pub play_state: PlayState,
    pub current_time: f64,
    pub duration: f64,
    pub volume: f64,
    pub fullscreen: bool,
    /// Index into the manifest's variants; adaptive mode only.
    pub active_variant: Option<usize>,
    pub metrics: MetricsSample,
    #[serde(skip)]
    pub error: Option<PlaybackError>,
}

impl PlaybackSession {
    pub fn new(play_state: PlayState) -> Self {
        Self {
            id: SessionId::new(),
            source: None,
            mode: PlaybackMode::Direct,
            state: PlayerState::Idle,
            play_state,
            current_time: 0.0,
            duration: 0.0,
            volume: 1.0,
            fullscreen: false,
            active_variant: None,
            metrics: MetricsSample::zeroed(),
            error: None,
        }
    }

    /// Clamp a position to `[0, duration]`.
    pub fn clamp_time(&self, position: f64) -> f64 {
        if position.is_nan() {
            return 0.0;
        }
        position.clamp(0.0, self.duration.max(0.0))
    }
}

/// Clamp a volume to `[0, 1]`.
pub fn clamp_volume(volume: f64) -> f64 {
    if volume.is_nan() {
        return 0.0;
    }
    volume.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metrics_display_matches_overlay() {
        let sample = MetricsSample {
            current_bitrate: 3_128_000.0,
            average_throughput: 12_500_000.0,
            buffer_length: 7.46,
        };
        assert_eq!(
            sample.to_string(),
            "Bitrate: 3.13 Mbps | Throughput: 12.50 Mbps | Buffer: 7.5s"
        );
        assert_eq!(
            MetricsSample::zeroed().to_string(),
            "Bitrate: 0.00 Mbps | Throughput: 0.00 Mbps | Buffer: 0.0s"
        );
    }

    #[test]
    fn clamps() {
        let mut session = PlaybackSession::new(PlayState::Playing);
        session.duration = 120.0;
        assert_eq!(session.clamp_time(-5.0), 0.0);
        assert_eq!(session.clamp_time(500.0), 120.0);
        assert_eq!(session.clamp_time(f64::NAN), 0.0);
        assert_eq!(clamp_volume(1.7), 1.0);
        assert_eq!(clamp_volume(-0.2), 0.0);
    }

    #[test]
    fn mode_maps_to_kind() {
        assert_eq!(PlaybackMode::for_kind(MediaKind::Adaptive), PlaybackMode::Adaptive);
        assert_eq!(PlaybackMode::Direct.media_kind(), MediaKind::Raw);
    }

    #[test]
    fn only_settled_states_accept_commands() {
        assert!(PlayerState::Playing.accepts_commands());
        assert!(PlayerState::Seeking.accepts_commands());
        assert!(!PlayerState::Loading.accepts_commands());
        assert!(!PlayerState::Closed.accepts_commands());
        assert!(!PlayerState::Idle.accepts_commands());
    }
}
