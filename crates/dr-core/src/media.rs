//! Playable media sources and container detection by extension.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Default container extensions that are visible to listing and playback.
pub const DEFAULT_VIDEO_EXTENSIONS: &[&str] = &["mp4", "webm", "mov", "avi", "mkv", "m4v"];

/// How a source is delivered to the player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    /// The original file, streamed byte-for-byte with range support.
    Raw,
    /// A segmented multi-bitrate rendition described by a manifest.
    Adaptive,
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaKind::Raw => f.write_str("raw"),
            MediaKind::Adaptive => f.write_str("adaptive"),
        }
    }
}

/// A playable unit, identified by its canonical path inside the media root.
///
/// Construct one only from a path that has already passed
/// [`crate::sandbox::validate`]; the value itself is immutable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaSource {
    absolute_path: PathBuf,
    display_name: String,
    kind: MediaKind,
}

impl MediaSource {
    pub fn new(absolute_path: PathBuf, kind: MediaKind) -> Self {
        let display_name = display_name(&absolute_path);
        Self {
            absolute_path,
            display_name,
            kind,
        }
    }

    pub fn absolute_path(&self) -> &Path {
        &self.absolute_path
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn kind(&self) -> MediaKind {
        self.kind
    }

    /// The same source, delivered differently.
    #[must_use]
    pub fn with_kind(&self, kind: MediaKind) -> Self {
        Self {
            kind,
            ..self.clone()
        }
    }
}

/// Human-readable title: the file name with its extension stripped.
pub fn display_name(path: &Path) -> String {
    path.file_stem()
        .or_else(|| path.file_name())
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Check if a path has one of the given container extensions
/// (case-insensitive).
pub fn has_video_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            let ext = ext.to_lowercase();
            extensions.iter().any(|allowed| allowed.eq_ignore_ascii_case(&ext))
        })
        .unwrap_or(false)
}

/// Guess the MIME type from the file extension.
pub fn guess_content_type(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "mp4" | "m4v" => "video/mp4",
        "mkv" => "video/x-matroska",
        "avi" => "video/x-msvideo",
        "webm" => "video/webm",
        "mov" => "video/quicktime",
        "ts" => "video/mp2t",
        "mpd" => "application/dash+xml",
        "m4s" => "video/iso.segment",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn defaults() -> Vec<String> {
        DEFAULT_VIDEO_EXTENSIONS.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn display_name_strips_extension() {
        let source = MediaSource::new(PathBuf::from("/media/Holiday 2023.mp4"), MediaKind::Raw);
        assert_eq!(source.display_name(), "Holiday 2023");
        assert_eq!(source.kind(), MediaKind::Raw);
    }

    #[test]
    fn with_kind_keeps_path() {
        let raw = MediaSource::new(PathBuf::from("/media/a.mkv"), MediaKind::Raw);
        let adaptive = raw.with_kind(MediaKind::Adaptive);
        assert_eq!(adaptive.absolute_path(), raw.absolute_path());
        assert_eq!(adaptive.kind(), MediaKind::Adaptive);
    }

    #[test]
    fn extension_allow_list_is_case_insensitive() {
        let exts = defaults();
        assert!(has_video_extension(Path::new("a.MP4"), &exts));
        assert!(has_video_extension(Path::new("/x/y/b.webm"), &exts));
        assert!(!has_video_extension(Path::new("notes.txt"), &exts));
        assert!(!has_video_extension(Path::new("no_extension"), &exts));
    }

    #[test]
    fn content_types() {
        assert_eq!(guess_content_type(Path::new("a.mp4")), "video/mp4");
        assert_eq!(guess_content_type(Path::new("a.MOV")), "video/quicktime");
        assert_eq!(guess_content_type(Path::new("manifest.mpd")), "application/dash+xml");
        assert_eq!(guess_content_type(Path::new("a.bin")), "application/octet-stream");
    }

    #[test]
    fn kind_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&MediaKind::Adaptive).unwrap(), "\"adaptive\"");
        assert_eq!(MediaKind::Raw.to_string(), "raw");
    }
}
