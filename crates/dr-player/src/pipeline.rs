//! Decoding pipelines and the platform hooks they drive.
//!
//! A session attaches exactly one [`Pipeline`] at a time. Direct playback
//! points the media surface at the range media server; adaptive playback
//! hands a manifest to an [`AdaptiveEngine`] and samples its metrics.

use std::sync::Arc;

use dr_core::ManifestRef;

use crate::error::PlaybackError;
use crate::sampler::MetricsSampler;
use crate::session::MetricsSample;

/// The media element the user sees.
pub trait PlaybackSurface: Send + Sync {
    /// Point the surface at a progressive URL.
    fn attach_source(&self, url: &str);
    /// Drop whatever source is attached.
    fn detach(&self);
    fn play(&self);
    fn pause(&self);
    fn seek(&self, position_secs: f64);
    fn set_volume(&self, volume: f64);
    fn set_fullscreen(&self, fullscreen: bool);
}

/// A segment-fetching player bound to the surface in adaptive mode.
pub trait AdaptiveEngine: Send + Sync {
    /// Start fetching the manifest and its segments.
    fn load(&self, manifest: &ManifestRef) -> Result<(), PlaybackError>;
    /// Current metrics, or `None` before a variant has been selected.
    fn sample(&self) -> Option<MetricsSample>;
    /// Pin playback to one variant of the loaded manifest.
    fn set_variant(&self, index: usize);
    /// Stop fetching and release the surface.
    fn reset(&self);
}

#[derive(Clone)]
pub struct DirectPipeline {
    surface: Arc<dyn PlaybackSurface>,
}

impl DirectPipeline {
    pub fn attach(surface: Arc<dyn PlaybackSurface>, url: &str) -> Self {
        tracing::debug!(%url, "Attaching direct pipeline");
        surface.attach_source(url);
        Self { surface }
    }
}

pub struct AdaptivePipeline {
    engine: Arc<dyn AdaptiveEngine>,
    manifest: ManifestRef,
    sampler: Option<MetricsSampler>,
}

impl AdaptivePipeline {
    pub fn attach(engine: Arc<dyn AdaptiveEngine>, manifest: ManifestRef) -> Result<Self, PlaybackError> {
        tracing::debug!(manifest = %manifest.url, "Attaching adaptive pipeline");
        engine.load(&manifest)?;
        Ok(Self {
            engine,
            manifest,
            sampler: None,
        })
    }

    pub fn manifest(&self) -> &ManifestRef {
        &self.manifest
    }

    pub(crate) fn set_sampler(&mut self, sampler: MetricsSampler) {
        self.sampler = Some(sampler);
    }
}

pub enum Pipeline {
    Direct(DirectPipeline),
    Adaptive(AdaptivePipeline),
}

impl Pipeline {
    /// Detach from the surface. Metrics sampling stops before the engine
    /// is reset so no sample is taken against a torn-down engine.
    pub async fn teardown(self) {
        match self {
            Pipeline::Direct(direct) => direct.surface.detach(),
            Pipeline::Adaptive(mut adaptive) => {
                if let Some(sampler) = adaptive.sampler.take() {
                    sampler.stop().await;
                }
                adaptive.engine.reset();
            }
        }
        tracing::debug!("Pipeline torn down");
    }
}
