//! Shared test harness for integration tests.
//!
//! Provides [`TestHarness`], which builds a full [`AppContext`] over a
//! temporary media root and output directory with a fake DASH encoder. The
//! [`TestHarness::with_server`] constructor starts Axum on a random port for
//! HTTP-level testing.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;

use dr_av::{DashEncoder, DashSettings, ToolRegistry};
use dr_core::config::Config;
use dr_core::manifest::MANIFEST_FILE;
use dr_server::context::AppContext;
use dr_server::router::build_router;

/// Encoder that writes a tiny manifest and one segment instead of running
/// ffmpeg.
pub struct FakeEncoder {
    calls: AtomicUsize,
    fail: AtomicBool,
    delay: Duration,
}

impl FakeEncoder {
    pub fn new(delay: Duration) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail: AtomicBool::new(false),
            delay,
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl DashEncoder for FakeEncoder {
    async fn encode(&self, _source: &Path, output_dir: &Path, _settings: &DashSettings) -> dr_core::Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        if self.fail.load(Ordering::SeqCst) {
            return Err(dr_core::Error::tool("ffmpeg", "exited with status 1: Invalid data found"));
        }
        std::fs::write(output_dir.join("init-stream0.m4s"), b"init")?;
        std::fs::write(output_dir.join(MANIFEST_FILE), b"<?xml version=\"1.0\"?><MPD/>")?;
        Ok(())
    }
}

/// Test harness wrapping a fully-constructed [`AppContext`].
pub struct TestHarness {
    pub ctx: AppContext,
    pub encoder: Arc<FakeEncoder>,
    media: TempDir,
    output: TempDir,
}

impl TestHarness {
    /// Harness with a media root and a fast fake encoder.
    pub fn new() -> Self {
        Self::with_encoder_delay(Duration::from_millis(20))
    }

    pub fn with_encoder_delay(delay: Duration) -> Self {
        let media = tempfile::tempdir().expect("failed to create media dir");
        let output = tempfile::tempdir().expect("failed to create output dir");

        let mut config = Config::default();
        config.library.media_root = Some(media.path().to_path_buf());
        config.transcode.output_dir = output.path().to_path_buf();

        let encoder = Arc::new(FakeEncoder::new(delay));
        let ctx = AppContext::new(
            config,
            None,
            Arc::new(ToolRegistry::default()),
            encoder.clone(),
        );

        Self {
            ctx,
            encoder,
            media,
            output,
        }
    }

    /// Start an Axum server on a random port and return the harness together
    /// with the bound socket address.
    pub async fn with_server() -> (Self, SocketAddr) {
        Self::serve(Self::new()).await
    }

    pub async fn serve(harness: Self) -> (Self, SocketAddr) {
        let app = build_router(harness.ctx.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind random port");
        let addr = listener.local_addr().expect("failed to get local addr");

        tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        (harness, addr)
    }

    pub fn media_root(&self) -> &Path {
        self.media.path()
    }

    pub fn output_root(&self) -> &Path {
        self.output.path()
    }

    /// Write a file under the media root, creating parent directories.
    pub fn write_media(&self, relative: &str, contents: &[u8]) -> PathBuf {
        let path = self.media.path().join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("failed to create media subdir");
        }
        std::fs::write(&path, contents).expect("failed to write media file");
        path
    }
}

/// `len` bytes with a recognizable pattern.
pub fn patterned_bytes(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}
