//! # dr-av
//!
//! External tool management and DASH encoding for dashreel.
//!
//! This crate provides:
//!
//! - **Tool discovery** ([`ToolRegistry`]) -- find and cache paths to ffmpeg
//!   and ffprobe.
//! - **Command execution** ([`ToolCommand`]) -- async builder with timeout
//!   support for running external processes.
//! - **DASH encoding** ([`DashEncoder`], [`FfmpegDashEncoder`]) -- turn one
//!   source into a segmented multi-bitrate rendition plus manifest with a
//!   single encoder invocation.

pub mod command;
pub mod dash;
pub mod tools;

// ---- Re-exports for convenience ----

pub use command::{ToolCommand, ToolOutput};
pub use dash::{build_dash_args, DashEncoder, DashSettings, FfmpegDashEncoder};
pub use tools::{ToolConfig, ToolInfo, ToolRegistry};
