//! Application configuration types.
//!
//! The top-level [`Config`] struct is deserialized from JSON and carries the
//! server, library, transcode and tools sections. Every section defaults
//! sensibly so a completely empty `{}` file is valid.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::manifest::Ladder;
use crate::media::DEFAULT_VIDEO_EXTENSIONS;
use crate::Error;

// ---------------------------------------------------------------------------
// Top-level Config
// ---------------------------------------------------------------------------

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub library: LibraryConfig,
    pub transcode: TranscodeConfig,
    pub tools: ToolsConfig,
}

impl Config {
    /// Deserialize a `Config` from a JSON string.
    pub fn from_json(json_str: &str) -> Result<Self> {
        serde_json::from_str(json_str)
            .map_err(|e| Error::Validation(format!("config parse error: {e}")))
    }

    /// Read and parse a config file, surfacing every failure.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    /// Load configuration from a file path, falling back to defaults if the
    /// path is `None` or the file does not exist.
    pub fn load_or_default(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::default();
        };

        match std::fs::read_to_string(path) {
            Ok(contents) => Self::from_json(&contents).unwrap_or_else(|e| {
                tracing::warn!("Failed to parse config file {}: {e}", path.display());
                Self::default()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("No config file at {}; using defaults", path.display());
                Self::default()
            }
            Err(e) => {
                tracing::warn!("Failed to read config file {}: {e}", path.display());
                Self::default()
            }
        }
    }

    /// Return a list of validation warnings (non-fatal issues).
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.server.port == 0 {
            warnings.push("server.port is 0; a random port will be assigned".into());
        }

        match &self.library.media_root {
            None => warnings.push(
                "library.media_root is not set; every media request will fail".into(),
            ),
            Some(root) if !root.is_dir() => warnings.push(format!(
                "library.media_root {} is not an existing directory",
                root.display()
            )),
            Some(_) => {}
        }

        if self.library.extensions.is_empty() {
            warnings.push("library.extensions is empty; no videos will be listed".into());
        }

        if self.transcode.segment_duration_secs == 0 {
            warnings.push("transcode.segment_duration_secs must be greater than 0".into());
        }

        if self.transcode.ladder.is_empty() {
            warnings.push("transcode.ladder has no variants".into());
        }

        for (i, v) in self.transcode.ladder.variants().iter().enumerate() {
            if v.width == 0 || v.height == 0 {
                warnings.push(format!("transcode.ladder[{i}] has a zero dimension"));
            }
            if v.video_bitrate_kbps == 0 {
                warnings.push(format!("transcode.ladder[{i}].video_bitrate_kbps is 0"));
            }
        }

        if self.transcode.timeout_secs == 0 {
            warnings.push("transcode.timeout_secs is 0; encodes will time out immediately".into());
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Sub-configs
// ---------------------------------------------------------------------------

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 3000,
        }
    }
}

/// Where the video library lives and what counts as a video.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LibraryConfig {
    /// Sandbox root. Unset is allowed at load time but fails every request.
    pub media_root: Option<PathBuf>,
    /// Container extensions visible to listing, lowercase without the dot.
    pub extensions: Vec<String>,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            media_root: None,
            extensions: DEFAULT_VIDEO_EXTENSIONS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Adaptive rendition settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscodeConfig {
    /// Root under which each source gets its own output directory.
    pub output_dir: PathBuf,
    #[serde(default = "default_segment_duration")]
    pub segment_duration_secs: u32,
    #[serde(default = "default_video_codec")]
    pub video_codec: String,
    #[serde(default = "default_audio_codec")]
    pub audio_codec: String,
    /// Encoder preset, passed through when set.
    pub preset: Option<String>,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    pub ladder: Ladder,
}

fn default_segment_duration() -> u32 {
    4
}
fn default_video_codec() -> String {
    "libx264".into()
}
fn default_audio_codec() -> String {
    "aac".into()
}
fn default_timeout() -> u64 {
    4 * 60 * 60
}

impl Default for TranscodeConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("./data/dash"),
            segment_duration_secs: default_segment_duration(),
            video_codec: default_video_codec(),
            audio_codec: default_audio_codec(),
            preset: None,
            timeout_secs: default_timeout(),
            ladder: Ladder::default(),
        }
    }
}

/// Paths to external CLI tools.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    pub ffmpeg_path: Option<PathBuf>,
    pub ffprobe_path: Option<PathBuf>,
}
