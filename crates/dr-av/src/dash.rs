//! Segmented multi-bitrate DASH encoding.
//!
//! One encoder invocation produces every variant of the ladder, the
//! segments for each, and the manifest that ties them together.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use dr_core::config::TranscodeConfig;
use dr_core::manifest::{INIT_SEGMENT_TEMPLATE, MANIFEST_FILE, MEDIA_SEGMENT_TEMPLATE};
use dr_core::Ladder;

use crate::command::ToolCommand;
use crate::tools::ToolRegistry;

/// Encoding parameters shared by every source.
#[derive(Debug, Clone)]
pub struct DashSettings {
    pub ladder: Ladder,
    pub segment_duration_secs: u32,
    pub video_codec: String,
    pub audio_codec: String,
    pub preset: Option<String>,
    pub timeout: Duration,
}

impl DashSettings {
    pub fn from_config(config: &TranscodeConfig) -> Self {
        Self {
            ladder: config.ladder.clone(),
            segment_duration_secs: config.segment_duration_secs,
            video_codec: config.video_codec.clone(),
            audio_codec: config.audio_codec.clone(),
            preset: config.preset.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }
}

impl Default for DashSettings {
    fn default() -> Self {
        Self::from_config(&TranscodeConfig::default())
    }
}

/// Something that turns a source file into a DASH rendition.
///
/// On success `output_dir` contains [`MANIFEST_FILE`] and its segments. The
/// caller owns directory creation and validation of the result.
#[async_trait]
pub trait DashEncoder: Send + Sync + 'static {
    async fn encode(
        &self,
        source: &Path,
        output_dir: &Path,
        settings: &DashSettings,
    ) -> dr_core::Result<()>;
}

/// Build the ffmpeg argument list for one DASH encode.
pub fn build_dash_args(source: &Path, output_dir: &Path, settings: &DashSettings) -> Vec<String> {
    let variants = settings.ladder.variants();
    let mut args: Vec<String> = vec!["-hide_banner".into(), "-y".into(), "-i".into()];
    args.push(source.to_string_lossy().into_owned());

    // One output video stream per rung, then one optional audio stream per rung.
    for _ in variants {
        args.extend(["-map".into(), "0:v:0".into()]);
    }
    for _ in variants {
        args.extend(["-map".into(), "0:a:0?".into()]);
    }

    args.extend([
        "-c:v".into(),
        settings.video_codec.clone(),
        "-c:a".into(),
        settings.audio_codec.clone(),
    ]);
    if let Some(preset) = &settings.preset {
        args.extend(["-preset".into(), preset.clone()]);
    }

    for (i, v) in variants.iter().enumerate() {
        args.extend([
            format!("-b:v:{i}"),
            format!("{}k", v.video_bitrate_kbps),
            format!("-s:v:{i}"),
            v.resolution(),
            format!("-b:a:{i}"),
            format!("{}k", v.audio_bitrate_kbps),
        ]);
    }

    args.extend([
        "-f".into(),
        "dash".into(),
        "-seg_duration".into(),
        settings.segment_duration_secs.to_string(),
        "-use_template".into(),
        "1".into(),
        "-use_timeline".into(),
        "1".into(),
        "-init_seg_name".into(),
        INIT_SEGMENT_TEMPLATE.into(),
        "-media_seg_name".into(),
        MEDIA_SEGMENT_TEMPLATE.into(),
        "-adaptation_sets".into(),
        "id=0,streams=v id=1,streams=a".into(),
    ]);
    args.push(output_dir.join(MANIFEST_FILE).to_string_lossy().into_owned());
    args
}

/// [`DashEncoder`] backed by a single ffmpeg process.
#[derive(Debug, Clone)]
pub struct FfmpegDashEncoder {
    ffmpeg: PathBuf,
}

impl FfmpegDashEncoder {
    pub fn new(ffmpeg: PathBuf) -> Self {
        Self { ffmpeg }
    }

    /// Use the ffmpeg found during tool discovery.
    pub fn from_registry(tools: &ToolRegistry) -> dr_core::Result<Self> {
        let ffmpeg = tools.require("ffmpeg")?;
        Ok(Self::new(ffmpeg.path.clone()))
    }
}

#[async_trait]
impl DashEncoder for FfmpegDashEncoder {
    async fn encode(
        &self,
        source: &Path,
        output_dir: &Path,
        settings: &DashSettings,
    ) -> dr_core::Result<()> {
        tracing::info!(
            source = %source.display(),
            output = %output_dir.display(),
            variants = settings.ladder.len(),
            segment_duration = settings.segment_duration_secs,
            "DASH encode starting"
        );

        let mut cmd = ToolCommand::new(self.ffmpeg.clone());
        cmd.timeout(settings.timeout)
            .current_dir(output_dir)
            .args(build_dash_args(source, output_dir, settings));
        let output = cmd.execute().await?;

        tracing::debug!(
            source = %source.display(),
            stderr_bytes = output.stderr.len(),
            "DASH encode finished"
        );
        Ok(())
    }
}
