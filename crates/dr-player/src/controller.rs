//! The playback controller state machine.
//!
//! ```text
//! Idle ──open──▶ Loading ──Ready──▶ Playing ⇄ Paused
//!                   │                  │  ▲
//!                 error             seek │ SeekSettled
//!                   ▼                  ▼  │
//!                 Closed ◀──close──  Seeking
//! ```
//!
//! Any error closes the session; nothing is retried.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use dr_core::MediaSource;

use crate::abr::BitrateSelector;
use crate::command::Command;
use crate::error::PlaybackError;
use crate::pipeline::{AdaptiveEngine, AdaptivePipeline, DirectPipeline, Pipeline, PlaybackSurface};
use crate::resolver::ManifestResolver;
use crate::sampler::{MetricsSampler, Telemetry, SAMPLE_INTERVAL};
use crate::session::{clamp_volume, PlayState, PlaybackMode, PlaybackSession, PlayerState};

#[derive(Debug, Clone)]
pub struct PlayerOptions {
    /// Start playing as soon as the pipeline is ready.
    pub autoplay: bool,
    /// Let the sampler pick variants from throughput and buffer.
    pub adaptive_bitrate: bool,
    pub sample_interval: Duration,
}

impl Default for PlayerOptions {
    fn default() -> Self {
        Self {
            autoplay: true,
            adaptive_bitrate: true,
            sample_interval: SAMPLE_INTERVAL,
        }
    }
}

impl PlayerOptions {
    fn initial_play_state(&self) -> PlayState {
        if self.autoplay {
            PlayState::Playing
        } else {
            PlayState::Paused
        }
    }
}

/// Notifications from the attached pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineEvent {
    /// First frame decodable; duration in seconds.
    Ready { duration: f64 },
    Playing,
    Paused,
    TimeUpdate(f64),
    /// A seek landed at this position.
    SeekSettled(f64),
    Error(PlaybackError),
}

/// Owns one playback session and at most one attached pipeline.
pub struct PlayerController {
    session: PlaybackSession,
    pipeline: Option<Pipeline>,
    surface: Arc<dyn PlaybackSurface>,
    engine: Arc<dyn AdaptiveEngine>,
    resolver: Arc<dyn ManifestResolver>,
    options: PlayerOptions,
    /// Bumped on every attach and detach.
    generation: Arc<AtomicU64>,
    telemetry: Arc<watch::Sender<Telemetry>>,
}

impl PlayerController {
    pub fn new(
        surface: Arc<dyn PlaybackSurface>,
        engine: Arc<dyn AdaptiveEngine>,
        resolver: Arc<dyn ManifestResolver>,
        options: PlayerOptions,
    ) -> Self {
        let (telemetry, _) = watch::channel(Telemetry::default());
        Self {
            session: PlaybackSession::new(options.initial_play_state()),
            pipeline: None,
            surface,
            engine,
            resolver,
            options,
            generation: Arc::new(AtomicU64::new(0)),
            telemetry: Arc::new(telemetry),
        }
    }

    /// Snapshot of the session with the latest metrics.
    pub fn session(&self) -> PlaybackSession {
        let telemetry = *self.telemetry.borrow();
        let mut session = self.session.clone();
        session.metrics = telemetry.sample;
        session.active_variant = telemetry.active_variant;
        session
    }

    pub fn state(&self) -> PlayerState {
        self.session.state
    }

    /// Metrics as they are published, one value per sampling tick.
    pub fn subscribe_metrics(&self) -> watch::Receiver<Telemetry> {
        self.telemetry.subscribe()
    }

    /// Open `source`, replacing whatever is playing. The source's kind picks
    /// the mode. Opening a closed player starts a fresh session.
    pub async fn open(&mut self, source: MediaSource) -> Result<(), PlaybackError> {
        self.detach().await;
        if self.session.state == PlayerState::Closed {
            self.session = PlaybackSession::new(self.options.initial_play_state());
        }

        self.session.mode = PlaybackMode::for_kind(source.kind());
        self.session.source = Some(source);
        self.session.error = None;
        self.load().await
    }

    /// Tear down the current pipeline and reload the same source in `mode`.
    ///
    /// Volume and the remembered play state carry over; position restarts
    /// at zero.
    pub async fn switch_mode(&mut self, mode: PlaybackMode) -> Result<(), PlaybackError> {
        if self.session.state == PlayerState::Closed {
            return Err(PlaybackError::NoSource);
        }
        let Some(source) = self.session.source.clone() else {
            return Err(PlaybackError::NoSource);
        };
        if self.session.mode == mode && self.pipeline.is_some() {
            return Ok(());
        }

        tracing::info!(from = %self.session.mode, to = %mode, "Switching playback mode");
        self.detach().await;
        self.session.mode = mode;
        self.session.source = Some(source.with_kind(mode.media_kind()));
        self.load().await
    }

    pub async fn close(&mut self) {
        self.detach().await;
        self.session.state = PlayerState::Closed;
        tracing::info!(session = %self.session.id, "Playback session closed");
    }

    pub async fn handle_event(&mut self, event: PipelineEvent) {
        if self.pipeline.is_none() || matches!(self.session.state, PlayerState::Idle | PlayerState::Closed) {
            tracing::trace!(?event, "Ignoring event without an attached pipeline");
            return;
        }

        match event {
            PipelineEvent::Ready { duration } => {
                if self.session.state != PlayerState::Loading {
                    return;
                }
                self.session.duration = if duration.is_finite() { duration.max(0.0) } else { 0.0 };
                match self.session.play_state {
                    PlayState::Playing => self.surface.play(),
                    PlayState::Paused => self.surface.pause(),
                }
                self.session.state = self.session.play_state.as_state();
                tracing::debug!(duration = self.session.duration, state = ?self.session.state, "Pipeline ready");
            }
            PipelineEvent::Playing => self.reconcile(PlayState::Playing),
            PipelineEvent::Paused => self.reconcile(PlayState::Paused),
            PipelineEvent::TimeUpdate(position) => {
                if self.session.state != PlayerState::Loading {
                    self.session.current_time = self.session.clamp_time(position);
                }
            }
            PipelineEvent::SeekSettled(position) => {
                if self.session.state == PlayerState::Seeking {
                    self.session.current_time = self.session.clamp_time(position);
                    self.session.state = self.session.play_state.as_state();
                }
            }
            PipelineEvent::Error(error) => {
                self.fail(error).await;
            }
        }
    }

    /// Run a command; returns whether it was accepted.
    pub fn execute(&mut self, command: Command) -> bool {
        if !self.session.state.accepts_commands() {
            return false;
        }
        match command {
            Command::TogglePlay => self.toggle_play(),
            Command::ToggleFullscreen => self.toggle_fullscreen(),
            Command::SeekBy(delta) => {
                self.seek(self.session.current_time + delta);
            }
            Command::AdjustVolume(delta) => {
                self.set_volume(self.session.volume + delta);
            }
            Command::ToggleMute => {
                let target = if self.session.volume > 0.0 { 0.0 } else { 1.0 };
                self.set_volume(target);
            }
        }
        true
    }

    pub fn handle_key(&mut self, key: &str) -> bool {
        Command::from_key(key).is_some_and(|command| self.execute(command))
    }

    pub fn toggle_play(&mut self) {
        if !self.session.state.accepts_commands() {
            return;
        }
        let next = self.session.play_state.toggled();
        match next {
            PlayState::Playing => self.surface.play(),
            PlayState::Paused => self.surface.pause(),
        }
        self.session.play_state = next;
        if self.session.state != PlayerState::Seeking {
            self.session.state = next.as_state();
        }
    }

    /// Seek to `position`, clamped to the media's duration. Returns the
    /// clamped target, or `None` when the session cannot seek.
    pub fn seek(&mut self, position: f64) -> Option<f64> {
        if !self.session.state.accepts_commands() {
            return None;
        }
        let target = self.session.clamp_time(position);
        self.session.current_time = target;
        self.session.state = PlayerState::Seeking;
        self.surface.seek(target);
        Some(target)
    }

    /// Set the volume, clamped to `[0, 1]`. Refused only once closed.
    pub fn set_volume(&mut self, volume: f64) -> bool {
        if self.session.state == PlayerState::Closed {
            return false;
        }
        let volume = clamp_volume(volume);
        self.session.volume = volume;
        self.surface.set_volume(volume);
        true
    }

    pub fn toggle_fullscreen(&mut self) {
        if !self.session.state.accepts_commands() {
            return;
        }
        self.session.fullscreen = !self.session.fullscreen;
        self.surface.set_fullscreen(self.session.fullscreen);
    }

    /// Follow what the pipeline actually did.
    fn reconcile(&mut self, reported: PlayState) {
        self.session.play_state = reported;
        if matches!(self.session.state, PlayerState::Playing | PlayerState::Paused) {
            self.session.state = reported.as_state();
        }
    }

    async fn load(&mut self) -> Result<(), PlaybackError> {
        let Some(source) = self.session.source.clone() else {
            return Err(PlaybackError::NoSource);
        };

        self.session.state = PlayerState::Loading;
        self.session.current_time = 0.0;
        self.session.duration = 0.0;
        self.generation.fetch_add(1, Ordering::AcqRel);

        let pipeline = match self.session.mode {
            PlaybackMode::Direct => {
                let url = self.resolver.direct_url(&source);
                Pipeline::Direct(DirectPipeline::attach(self.surface.clone(), &url))
            }
            PlaybackMode::Adaptive => {
                let manifest = match self.resolver.ensure_manifest(&source).await {
                    Ok(manifest) => manifest,
                    Err(e) => return Err(self.fail(e).await),
                };
                let mut adaptive = match AdaptivePipeline::attach(self.engine.clone(), manifest) {
                    Ok(adaptive) => adaptive,
                    Err(e) => return Err(self.fail(e).await),
                };

                let selector = self.options.adaptive_bitrate.then(|| {
                    let manifest = adaptive.manifest();
                    BitrateSelector::new(&manifest.variants, manifest.segment_duration_secs)
                });
                adaptive.set_sampler(MetricsSampler::start(
                    self.engine.clone(),
                    selector,
                    self.telemetry.clone(),
                    self.generation.clone(),
                    self.options.sample_interval,
                ));
                Pipeline::Adaptive(adaptive)
            }
        };

        self.surface.set_volume(self.session.volume);
        self.pipeline = Some(pipeline);
        tracing::info!(
            session = %self.session.id,
            source = %source.absolute_path().display(),
            mode = %self.session.mode,
            "Loading source"
        );
        Ok(())
    }

    async fn detach(&mut self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
        if let Some(pipeline) = self.pipeline.take() {
            pipeline.teardown().await;
        }
    }

    async fn fail(&mut self, error: PlaybackError) -> PlaybackError {
        tracing::warn!(session = %self.session.id, error = %error, "Playback failed");
        self.detach().await;
        self.session.state = PlayerState::Closed;
        self.session.error = Some(error.clone());
        error
    }
}
