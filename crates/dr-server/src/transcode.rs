//! Transcode orchestration: source file in, DASH manifest out.
//!
//! Each source maps to one output directory. A finished directory is reused
//! as long as its manifest is non-empty and the source has not changed since
//! it was encoded. Otherwise one encode runs in a background task; every
//! concurrent request for the same directory awaits that task's outcome
//! instead of starting another encoder writing into the same place.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::future::{BoxFuture, FutureExt, Shared};
use serde::Serialize;

use dr_av::{DashEncoder, DashSettings};
use dr_core::events::{EventBus, EventPayload};
use dr_core::manifest::{self, SourceStamp};
use dr_core::{Error, ManifestRef, MediaSource, Result, TranscodeJobId};

// ---------------------------------------------------------------------------
// Job registry
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
}

/// The latest encode attempt for one output directory.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscodeJob {
    pub id: TranscodeJobId,
    pub source_path: PathBuf,
    pub output_directory: PathBuf,
    pub status: JobStatus,
    pub manifest_path: Option<PathBuf>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TranscodeJob {
    fn new(source_path: PathBuf, output_directory: PathBuf) -> Self {
        let now = Utc::now();
        Self {
            id: TranscodeJobId::new(),
            source_path,
            output_directory,
            status: JobStatus::Pending,
            manifest_path: None,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }
}

// ---------------------------------------------------------------------------
// Shared outcome
// ---------------------------------------------------------------------------

/// Cloneable failure handed to every waiter of one encode.
#[derive(Debug, Clone)]
struct Failure {
    source_path: PathBuf,
    detail: String,
}

impl From<Failure> for Error {
    fn from(f: Failure) -> Self {
        Error::transcode_failed(f.source_path, f.detail)
    }
}

type Outcome = std::result::Result<ManifestRef, Failure>;
type InFlight = Shared<BoxFuture<'static, Outcome>>;

// ---------------------------------------------------------------------------
// TranscodeOrchestrator
// ---------------------------------------------------------------------------

pub struct TranscodeOrchestrator {
    output_root: PathBuf,
    settings: DashSettings,
    encoder: Arc<dyn DashEncoder>,
    events: Arc<EventBus>,
    /// At most one entry per output directory while its encode runs.
    in_flight: DashMap<PathBuf, InFlight>,
    jobs: DashMap<PathBuf, TranscodeJob>,
}

impl TranscodeOrchestrator {
    pub fn new(
        output_root: PathBuf,
        settings: DashSettings,
        encoder: Arc<dyn DashEncoder>,
        events: Arc<EventBus>,
    ) -> Self {
        Self {
            output_root,
            settings,
            encoder,
            events,
            in_flight: DashMap::new(),
            jobs: DashMap::new(),
        }
    }

    /// Directory holding the rendition of `source`.
    pub fn output_dir_for(&self, source: &Path) -> PathBuf {
        self.output_root.join(manifest::output_dir_name(source))
    }

    pub fn output_root(&self) -> &Path {
        &self.output_root
    }

    /// Return a manifest for `source`, encoding it first if needed.
    ///
    /// `source` must already have passed the sandbox. The encode itself runs
    /// on a spawned task, so dropping this future does not cancel it.
    pub async fn ensure_manifest(self: &Arc<Self>, source: &MediaSource) -> Result<ManifestRef> {
        let source_path = source.absolute_path().to_path_buf();
        if !tokio::fs::try_exists(&source_path).await.unwrap_or(false) {
            return Err(Error::not_found("file", source_path.display()));
        }

        let output_dir = self.output_dir_for(&source_path);

        if let Some(existing) = self.reusable(&source_path, &output_dir).await {
            tracing::debug!(
                source = %source_path.display(),
                manifest = %existing.url,
                "Reusing existing manifest"
            );
            return Ok(existing);
        }

        let in_flight = match self.in_flight.entry(output_dir.clone()) {
            Entry::Occupied(e) => {
                tracing::debug!(source = %source_path.display(), "Joining in-flight encode");
                e.get().clone()
            }
            Entry::Vacant(e) => {
                let job = TranscodeJob::new(source_path.clone(), output_dir.clone());
                let job_id = job.id;
                self.jobs.insert(output_dir.clone(), job);
                self.events.broadcast(EventPayload::TranscodeQueued {
                    job_id,
                    source: source_path.clone(),
                });

                let this = Arc::clone(self);
                let task_source = source_path.clone();
                let task_output = output_dir.clone();
                let handle = tokio::spawn(async move {
                    this.run_job(job_id, task_source, task_output).await
                });

                let join_source = source_path.clone();
                let shared = async move {
                    handle.await.unwrap_or_else(|e| {
                        Err(Failure {
                            source_path: join_source,
                            detail: format!("encode task aborted: {e}"),
                        })
                    })
                }
                .boxed()
                .shared();

                e.insert(shared.clone());
                shared
            }
        };

        in_flight.await.map_err(Error::from)
    }

    /// Snapshot of every known job, newest first.
    pub fn list_jobs(&self) -> Vec<TranscodeJob> {
        let mut jobs: Vec<TranscodeJob> = self.jobs.iter().map(|e| e.value().clone()).collect();
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        jobs
    }

    /// Number of encodes currently running.
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    /// An existing manifest that still matches the source on disk.
    async fn reusable(&self, source: &Path, output_dir: &Path) -> Option<ManifestRef> {
        let manifest_ref =
            ManifestRef::for_output_dir(output_dir, &self.settings.ladder, self.settings.segment_duration_secs);

        let manifest_path = manifest_ref.path.clone();
        let stamp_dir = output_dir.to_path_buf();
        let source_path = source.to_path_buf();
        let fresh = tokio::task::spawn_blocking(move || {
            is_fresh(&source_path, &stamp_dir, &manifest_path)
        })
        .await
        .unwrap_or(false);

        fresh.then_some(manifest_ref)
    }

    async fn run_job(
        self: Arc<Self>,
        job_id: TranscodeJobId,
        source: PathBuf,
        output_dir: PathBuf,
    ) -> Outcome {
        // Another job may have finished between the caller's fast path and
        // the in-flight insert.
        let result = match self.reusable(&source, &output_dir).await {
            Some(existing) => Ok(existing),
            None => self.encode_into(job_id, &source, &output_dir).await,
        };

        match &result {
            Ok(manifest_ref) => {
                self.update_job(&output_dir, |job| {
                    job.status = JobStatus::Succeeded;
                    job.manifest_path = Some(manifest_ref.path.clone());
                });
                self.events.broadcast(EventPayload::TranscodeCompleted {
                    job_id,
                    manifest_url: manifest_ref.url.clone(),
                });
                tracing::info!(
                    %job_id,
                    source = %source.display(),
                    manifest = %manifest_ref.path.display(),
                    "Transcode succeeded"
                );
            }
            Err(failure) => {
                self.update_job(&output_dir, |job| {
                    job.status = JobStatus::Failed;
                    job.error = Some(failure.detail.clone());
                });
                self.events.broadcast(EventPayload::TranscodeFailed {
                    job_id,
                    error: failure.detail.clone(),
                });
                tracing::warn!(
                    %job_id,
                    source = %source.display(),
                    output = %output_dir.display(),
                    error = %failure.detail,
                    "Transcode failed; partial output left in place"
                );
            }
        }

        self.in_flight.remove(&output_dir);
        result
    }

    async fn encode_into(
        &self,
        job_id: TranscodeJobId,
        source: &Path,
        output_dir: &Path,
    ) -> Outcome {
        let fail = |detail: String| Failure {
            source_path: source.to_path_buf(),
            detail,
        };

        // Old segments from a stale or failed run must not mix with new ones.
        if tokio::fs::try_exists(output_dir).await.unwrap_or(false) {
            tokio::fs::remove_dir_all(output_dir)
                .await
                .map_err(|e| fail(format!("cannot clear {}: {e}", output_dir.display())))?;
        }
        tokio::fs::create_dir_all(output_dir)
            .await
            .map_err(|e| fail(format!("cannot create {}: {e}", output_dir.display())))?;

        let stamp_source = source.to_path_buf();
        let stamp = tokio::task::spawn_blocking(move || SourceStamp::capture(&stamp_source))
            .await
            .map_err(|e| fail(format!("spawn_blocking join error: {e}")))?
            .map_err(|e| fail(e.to_string()))?;

        self.update_job(output_dir, |job| job.status = JobStatus::Running);
        self.events.broadcast(EventPayload::TranscodeStarted { job_id });

        self.encoder
            .encode(source, output_dir, &self.settings)
            .await
            .map_err(|e| fail(e.to_string()))?;

        let manifest_ref =
            ManifestRef::for_output_dir(output_dir, &self.settings.ladder, self.settings.segment_duration_secs);
        let manifest_path = manifest_ref.path.clone();
        let stamp_dir = output_dir.to_path_buf();
        tokio::task::spawn_blocking(move || {
            if !manifest::is_valid_manifest(&manifest_path) {
                return Err(format!(
                    "encoder exited successfully but {} is missing or empty",
                    manifest_path.display()
                ));
            }
            stamp.write(&stamp_dir).map_err(|e| e.to_string())
        })
        .await
        .map_err(|e| fail(format!("spawn_blocking join error: {e}")))?
        .map_err(fail)?;

        Ok(manifest_ref)
    }

    fn update_job(&self, output_dir: &Path, f: impl FnOnce(&mut TranscodeJob)) {
        if let Some(mut job) = self.jobs.get_mut(output_dir) {
            f(&mut job);
            job.updated_at = Utc::now();
        }
    }
}

/// Whether `output_dir` holds a non-empty manifest stamped with the current
/// revision of `source`.
fn is_fresh(source: &Path, output_dir: &Path, manifest_path: &Path) -> bool {
    if !manifest::is_valid_manifest(manifest_path) {
        return false;
    }
    let Some(stored) = SourceStamp::read(output_dir) else {
        return false;
    };
    let Ok(current) = SourceStamp::capture(source) else {
        return false;
    };
    if stored != current {
        tracing::info!(
            source = %source.display(),
            "Source changed since last encode; manifest is stale"
        );
        return false;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use dr_core::MediaKind;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Writes a small manifest after a delay, counting invocations.
    struct FakeEncoder {
        calls: AtomicUsize,
        delay: Duration,
        outcome: FakeOutcome,
    }

    #[derive(Clone, Copy)]
    enum FakeOutcome {
        Manifest,
        ExitFailure,
        NoManifest,
    }

    impl FakeEncoder {
        fn new(outcome: FakeOutcome) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                delay: Duration::from_millis(50),
                outcome,
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl DashEncoder for FakeEncoder {
        async fn encode(
            &self,
            _source: &Path,
            output_dir: &Path,
            _settings: &DashSettings,
        ) -> dr_core::Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            std::fs::write(output_dir.join("chunk-stream0-00001.m4s"), b"seg")?;
            match self.outcome {
                FakeOutcome::Manifest => {
                    std::fs::write(output_dir.join(manifest::MANIFEST_FILE), b"<MPD/>")?;
                    Ok(())
                }
                FakeOutcome::ExitFailure => {
                    Err(Error::tool("ffmpeg", "exited with status 1: Invalid data found"))
                }
                FakeOutcome::NoManifest => Ok(()),
            }
        }
    }

    struct Fixture {
        _dir: tempfile::TempDir,
        source: MediaSource,
        orchestrator: Arc<TranscodeOrchestrator>,
        encoder: Arc<FakeEncoder>,
        events: Arc<EventBus>,
    }

    fn fixture(outcome: FakeOutcome) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let media = dir.path().join("media");
        std::fs::create_dir_all(&media).unwrap();
        let path = media.join("movie.mp4");
        std::fs::write(&path, vec![7u8; 1024]).unwrap();

        let encoder = FakeEncoder::new(outcome);
        let events = Arc::new(EventBus::default());
        let orchestrator = Arc::new(TranscodeOrchestrator::new(
            dir.path().join("dash"),
            DashSettings::default(),
            encoder.clone(),
            events.clone(),
        ));

        Fixture {
            source: MediaSource::new(path.canonicalize().unwrap(), MediaKind::Adaptive),
            _dir: dir,
            orchestrator,
            encoder,
            events,
        }
    }

    #[tokio::test]
    async fn sequential_calls_encode_once() {
        let fx = fixture(FakeOutcome::Manifest);

        let first = fx.orchestrator.ensure_manifest(&fx.source).await.unwrap();
        let second = fx.orchestrator.ensure_manifest(&fx.source).await.unwrap();

        assert_eq!(fx.encoder.calls(), 1);
        assert_eq!(first, second);
        assert!(first.url.starts_with("/dash/movie-"));
        assert!(first.url.ends_with("/manifest.mpd"));
        assert_eq!(first.variants.len(), 3);
        assert_eq!(first.segment_duration_secs, 4);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_calls_share_one_encode() {
        let fx = fixture(FakeOutcome::Manifest);

        let mut handles = Vec::new();
        for _ in 0..8 {
            let orchestrator = fx.orchestrator.clone();
            let source = fx.source.clone();
            handles.push(tokio::spawn(async move {
                orchestrator.ensure_manifest(&source).await
            }));
        }

        let mut results = Vec::new();
        for h in handles {
            results.push(h.await.unwrap().unwrap());
        }

        assert_eq!(fx.encoder.calls(), 1);
        assert!(results.windows(2).all(|w| w[0] == w[1]));
        assert_eq!(fx.orchestrator.in_flight_count(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_callers_share_the_same_failure() {
        let fx = fixture(FakeOutcome::ExitFailure);

        let mut handles = Vec::new();
        for _ in 0..5 {
            let orchestrator = fx.orchestrator.clone();
            let source = fx.source.clone();
            handles.push(tokio::spawn(async move {
                orchestrator.ensure_manifest(&source).await
            }));
        }

        let mut messages = Vec::new();
        for h in handles {
            let err = h.await.unwrap().unwrap_err();
            assert!(matches!(err, Error::TranscodeFailed { .. }));
            messages.push(err.to_string());
        }

        assert_eq!(fx.encoder.calls(), 1);
        assert!(messages.windows(2).all(|w| w[0] == w[1]));
        assert!(messages[0].contains("Invalid data found"));
    }

    #[tokio::test]
    async fn failure_leaves_partial_output_and_retry_reencodes() {
        let fx = fixture(FakeOutcome::ExitFailure);

        let err = fx.orchestrator.ensure_manifest(&fx.source).await.unwrap_err();
        assert_eq!(err.http_status(), 500);

        let out = fx.orchestrator.output_dir_for(fx.source.absolute_path());
        assert!(out.join("chunk-stream0-00001.m4s").exists());

        let jobs = fx.orchestrator.list_jobs();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].status, JobStatus::Failed);
        assert!(jobs[0].error.as_deref().unwrap().contains("Invalid data"));

        let _ = fx.orchestrator.ensure_manifest(&fx.source).await.unwrap_err();
        assert_eq!(fx.encoder.calls(), 2);
    }

    #[tokio::test]
    async fn missing_manifest_after_success_is_a_failure() {
        let fx = fixture(FakeOutcome::NoManifest);

        let err = fx.orchestrator.ensure_manifest(&fx.source).await.unwrap_err();
        match err {
            Error::TranscodeFailed { detail, .. } => assert!(detail.contains("missing or empty")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn modified_source_is_reencoded() {
        let fx = fixture(FakeOutcome::Manifest);

        fx.orchestrator.ensure_manifest(&fx.source).await.unwrap();
        std::fs::write(fx.source.absolute_path(), vec![1u8; 2048]).unwrap();
        fx.orchestrator.ensure_manifest(&fx.source).await.unwrap();

        assert_eq!(fx.encoder.calls(), 2);
    }

    #[tokio::test]
    async fn missing_source_is_not_found() {
        let fx = fixture(FakeOutcome::Manifest);
        let ghost = MediaSource::new(
            fx.source.absolute_path().with_file_name("ghost.mp4"),
            MediaKind::Adaptive,
        );

        let err = fx.orchestrator.ensure_manifest(&ghost).await.unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
        assert_eq!(fx.encoder.calls(), 0);
    }

    #[tokio::test]
    async fn lifecycle_events_are_published() {
        let fx = fixture(FakeOutcome::Manifest);
        fx.orchestrator.ensure_manifest(&fx.source).await.unwrap();

        let kinds: Vec<&'static str> = fx
            .events
            .recent_events(10)
            .iter()
            .rev()
            .map(|e| match e.payload {
                EventPayload::TranscodeQueued { .. } => "queued",
                EventPayload::TranscodeStarted { .. } => "started",
                EventPayload::TranscodeCompleted { .. } => "completed",
                EventPayload::TranscodeFailed { .. } => "failed",
                EventPayload::ConfigReloaded { .. } => "config",
            })
            .collect();
        assert_eq!(kinds, vec!["queued", "started", "completed"]);

        let jobs = fx.orchestrator.list_jobs();
        assert_eq!(jobs[0].status, JobStatus::Succeeded);
        assert!(jobs[0].manifest_path.is_some());
    }

    #[tokio::test]
    async fn reusable_requires_a_matching_stamp() {
        let fx = fixture(FakeOutcome::Manifest);
        let source = fx.source.absolute_path();
        let out = fx.orchestrator.output_dir_for(source);

        assert!(fx.orchestrator.reusable(source, &out).await.is_none());

        let encoded = fx.orchestrator.ensure_manifest(&fx.source).await.unwrap();
        assert_eq!(fx.orchestrator.reusable(source, &out).await, Some(encoded));

        std::fs::remove_file(out.join(manifest::SOURCE_STAMP_FILE)).unwrap();
        assert!(fx.orchestrator.reusable(source, &out).await.is_none());
    }

    #[tokio::test]
    async fn queued_job_reuses_output_finished_meanwhile() {
        let fx = fixture(FakeOutcome::Manifest);
        fx.orchestrator.ensure_manifest(&fx.source).await.unwrap();

        // Drive the job directly, as a caller that lost the race would.
        let source = fx.source.absolute_path().to_path_buf();
        let out = fx.orchestrator.output_dir_for(&source);
        let outcome = fx
            .orchestrator
            .clone()
            .run_job(TranscodeJobId::new(), source, out)
            .await;

        assert!(outcome.is_ok());
        assert_eq!(fx.encoder.calls(), 1);
    }

    #[test]
    fn equal_stems_get_distinct_directories() {
        let fx = fixture(FakeOutcome::Manifest);
        let a = fx.orchestrator.output_dir_for(Path::new("/media/a/movie.mp4"));
        let b = fx.orchestrator.output_dir_for(Path::new("/media/b/movie.mp4"));
        assert_ne!(a, b);
        assert_eq!(a.parent(), Some(fx.orchestrator.output_root()));
    }
}
