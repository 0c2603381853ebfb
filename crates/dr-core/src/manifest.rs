//! Adaptive rendition types: the variant ladder, manifest references and
//! the on-disk layout of an encoded output directory.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use crate::error::Result;

/// File name of the manifest inside an output directory.
pub const MANIFEST_FILE: &str = "manifest.mpd";

/// Sidecar recording which source revision an output directory was built from.
pub const SOURCE_STAMP_FILE: &str = "source.json";

/// Initialization segment naming, relative to the manifest.
pub const INIT_SEGMENT_TEMPLATE: &str = "init-stream$RepresentationID$.m4s";

/// Media segment naming, relative to the manifest.
pub const MEDIA_SEGMENT_TEMPLATE: &str = "chunk-stream$RepresentationID$-$Number%05d$.m4s";

/// URL prefix under which output directories are served.
pub const DASH_URL_PREFIX: &str = "/dash";

// ---------------------------------------------------------------------------
// Variant ladder
// ---------------------------------------------------------------------------

/// One bitrate/resolution encoding of a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Variant {
    pub width: u32,
    pub height: u32,
    pub video_bitrate_kbps: u32,
    pub audio_bitrate_kbps: u32,
}

impl Variant {
    pub const fn new(width: u32, height: u32, video_bitrate_kbps: u32, audio_bitrate_kbps: u32) -> Self {
        Self {
            width,
            height,
            video_bitrate_kbps,
            audio_bitrate_kbps,
        }
    }

    /// Combined audio and video bitrate in bits per second.
    pub fn total_bitrate_bps(&self) -> u64 {
        (u64::from(self.video_bitrate_kbps) + u64::from(self.audio_bitrate_kbps)) * 1000
    }

    /// `WIDTHxHEIGHT`, as ffmpeg's `-s` expects it.
    pub fn resolution(&self) -> String {
        format!("{}x{}", self.width, self.height)
    }
}

/// Ordered list of variants encoded for every adaptive source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Ladder(Vec<Variant>);

impl Ladder {
    pub fn new(variants: Vec<Variant>) -> Self {
        Self(variants)
    }

    pub fn variants(&self) -> &[Variant] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Default for Ladder {
    fn default() -> Self {
        Self(vec![
            Variant::new(1920, 1080, 6000, 192),
            Variant::new(1280, 720, 3000, 128),
            Variant::new(854, 480, 1500, 96),
        ])
    }
}

// ---------------------------------------------------------------------------
// ManifestRef
// ---------------------------------------------------------------------------

/// Where a finished manifest lives and what it describes.
///
/// Serializes to the `/api/dash` response shape; the filesystem path is
/// server-side only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestRef {
    #[serde(rename = "manifestUrl")]
    pub url: String,
    #[serde(skip)]
    pub path: PathBuf,
    pub variants: Vec<Variant>,
    #[serde(rename = "segmentDuration")]
    pub segment_duration_secs: u32,
}

impl ManifestRef {
    /// Reference for the manifest inside `output_dir`, addressed by the
    /// directory's own name under [`DASH_URL_PREFIX`].
    pub fn for_output_dir(output_dir: &Path, ladder: &Ladder, segment_duration_secs: u32) -> Self {
        let dir_name = output_dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            url: format!("{DASH_URL_PREFIX}/{dir_name}/{MANIFEST_FILE}"),
            path: output_dir.join(MANIFEST_FILE),
            variants: ladder.variants().to_vec(),
            segment_duration_secs,
        }
    }
}

// ---------------------------------------------------------------------------
// Output directory layout
// ---------------------------------------------------------------------------

/// Directory name for a source: its stem plus the first 8 hex chars of the
/// SHA-256 of the full canonical path, so equal stems never collide.
///
/// The name doubles as a URL path segment, so the stem is reduced to
/// `[A-Za-z0-9._-]`; the hash keeps sanitized names distinct.
pub fn output_dir_name(source: &Path) -> String {
    let stem: String = source
        .file_stem()
        .map(|s| s.to_string_lossy())
        .unwrap_or_default()
        .chars()
        .map(|c| match c {
            'A'..='Z' | 'a'..='z' | '0'..='9' | '.' | '_' | '-' => c,
            _ => '_',
        })
        .collect();
    let stem = match stem.trim_start_matches('.') {
        "" => "source",
        s => s,
    };
    let digest = Sha256::digest(source.as_os_str().as_encoded_bytes());
    let hash = hex::encode(&digest[..4]);
    format!("{stem}-{hash}")
}

/// A manifest is usable once it exists and is non-empty.
pub fn is_valid_manifest(path: &Path) -> bool {
    std::fs::metadata(path)
        .map(|m| m.is_file() && m.len() > 0)
        .unwrap_or(false)
}

/// Size and modification time of the source an output was encoded from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceStamp {
    pub path: PathBuf,
    pub size: u64,
    pub modified_unix: u64,
}

impl SourceStamp {
    /// Stamp the source as it currently is on disk.
    pub fn capture(source: &Path) -> Result<Self> {
        let meta = std::fs::metadata(source)?;
        let modified_unix = meta
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_secs())
            .unwrap_or(0);
        Ok(Self {
            path: source.to_path_buf(),
            size: meta.len(),
            modified_unix,
        })
    }

    /// The stamp stored in `output_dir`, if present and readable.
    pub fn read(output_dir: &Path) -> Option<Self> {
        let contents = std::fs::read_to_string(output_dir.join(SOURCE_STAMP_FILE)).ok()?;
        serde_json::from_str(&contents).ok()
    }

    pub fn write(&self, output_dir: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| crate::Error::Internal(format!("serialize source stamp: {e}")))?;
        std::fs::write(output_dir.join(SOURCE_STAMP_FILE), json)?;
        Ok(())
    }
}
