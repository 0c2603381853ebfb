//! Playback failures.
//!
//! Unlike [`dr_core::Error`], these are cloneable: the session keeps the
//! error that closed it while the same value is handed back to the caller.

/// Why a playback session ended or an operation was refused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlaybackError {
    /// The media surface or engine could not decode the stream.
    #[error("Decode error: {0}")]
    Decode(String),

    /// A request to the media server failed in transit.
    #[error("Network error: {0}")]
    Network(String),

    /// The server could not produce a manifest for the source.
    #[error("Manifest unavailable [{code}]: {message}")]
    Manifest {
        /// Server error code, e.g. `transcode_failed`.
        code: String,
        message: String,
    },

    /// The adaptive engine rejected the manifest.
    #[error("Engine attach failed: {0}")]
    Attach(String),

    /// The operation needs an open source.
    #[error("No source is open")]
    NoSource,
}

impl PlaybackError {
    pub fn manifest(code: impl Into<String>, message: impl Into<String>) -> Self {
        PlaybackError::Manifest {
            code: code.into(),
            message: message.into(),
        }
    }
}

impl From<reqwest::Error> for PlaybackError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            PlaybackError::manifest("invalid_response", err.to_string())
        } else {
            PlaybackError::Network(err.to_string())
        }
    }
}
