//! Locating playable URLs on the media server.

use async_trait::async_trait;
use reqwest::Url;
use serde::Deserialize;

use dr_core::{ManifestRef, MediaSource};

use crate::error::PlaybackError;

/// Where the session finds its bytes.
#[async_trait]
pub trait ManifestResolver: Send + Sync {
    /// Ask the server for a manifest, waiting out any encode in progress.
    async fn ensure_manifest(&self, source: &MediaSource) -> Result<ManifestRef, PlaybackError>;

    /// Progressive URL served by the range media server.
    fn direct_url(&self, source: &MediaSource) -> String;
}

/// Error body returned by the server on any failure.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
    code: String,
}

/// Resolver for a dashreel server reachable over HTTP.
#[derive(Debug, Clone)]
pub struct HttpManifestResolver {
    client: reqwest::Client,
    base: Url,
}

impl HttpManifestResolver {
    pub fn new(base_url: &str) -> Result<Self, PlaybackError> {
        let base = Url::parse(base_url)
            .map_err(|e| PlaybackError::Network(format!("invalid server URL '{base_url}': {e}")))?;
        Ok(Self::with_client(reqwest::Client::new(), base))
    }

    pub fn with_client(client: reqwest::Client, base: Url) -> Self {
        Self { client, base }
    }

    fn endpoint(&self, path: &str, source: &MediaSource) -> Url {
        let mut url = self.base.clone();
        url.set_path(path);
        url.query_pairs_mut()
            .clear()
            .append_pair("path", &source.absolute_path().to_string_lossy());
        url
    }
}

#[async_trait]
impl ManifestResolver for HttpManifestResolver {
    async fn ensure_manifest(&self, source: &MediaSource) -> Result<ManifestRef, PlaybackError> {
        let url = self.endpoint("/api/dash", source);
        tracing::debug!(url = %url, "Requesting manifest");

        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.json::<ErrorBody>().await.map_err(|_| {
                PlaybackError::manifest("http_error", format!("server returned {status}"))
            })?;
            return Err(PlaybackError::manifest(body.code, body.error));
        }

        let mut manifest: ManifestRef = response.json().await?;
        manifest.url = self
            .base
            .join(&manifest.url)
            .map_err(|e| PlaybackError::manifest("invalid_response", e.to_string()))?
            .to_string();
        Ok(manifest)
    }

    fn direct_url(&self, source: &MediaSource) -> String {
        self.endpoint("/api/video", source).to_string()
    }
}
