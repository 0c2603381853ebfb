//! dr-player: client-side playback control for dashreel.
//!
//! [`PlayerController`] drives one [`PlaybackSession`] through its state
//! machine, attaching either a direct (range-streamed) or an adaptive
//! (DASH) [`Pipeline`]. Platform specifics stay behind the
//! [`PlaybackSurface`], [`AdaptiveEngine`] and [`ManifestResolver`] traits.

pub mod abr;
pub mod command;
pub mod controller;
pub mod error;
pub mod pipeline;
pub mod resolver;
pub mod sampler;
pub mod session;

pub use abr::BitrateSelector;
pub use command::Command;
pub use controller::{PipelineEvent, PlayerController, PlayerOptions};
pub use error::PlaybackError;
pub use pipeline::{AdaptiveEngine, AdaptivePipeline, DirectPipeline, Pipeline, PlaybackSurface};
pub use resolver::{HttpManifestResolver, ManifestResolver};
pub use sampler::{MetricsSampler, Telemetry};
pub use session::{MetricsSample, PlayState, PlaybackMode, PlaybackSession, PlayerState};
