//! Service-oriented application context.
//!
//! [`AppContext`] is the central struct shared across all route handlers via
//! Axum state. It wraps immutable infrastructure (tools, orchestrator) in
//! `Arc`s and mutable runtime configuration in a [`ConfigStore`] with
//! hot-reload support.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;

use dr_av::{DashEncoder, DashSettings, ToolRegistry};
use dr_core::config::{Config, LibraryConfig};
use dr_core::events::{EventBus, EventPayload};
use dr_core::sandbox;

use crate::transcode::TranscodeOrchestrator;

// ---------------------------------------------------------------------------
// ConfigStore
// ---------------------------------------------------------------------------

/// Library settings that can change while the server runs.
///
/// The sandbox root is read from here on every request, never cached by
/// callers.
#[derive(Debug)]
pub struct ConfigStore {
    library: RwLock<LibraryConfig>,
    /// Path to the config file for reloads (None = nothing to reload from).
    config_path: Option<PathBuf>,
}

impl ConfigStore {
    pub fn new(config: &Config, config_path: Option<PathBuf>) -> Self {
        Self {
            library: RwLock::new(config.library.clone()),
            config_path,
        }
    }

    /// The configured media root as of now.
    pub fn media_root(&self) -> Option<PathBuf> {
        self.library.read().media_root.clone()
    }

    pub fn set_media_root(&self, root: Option<PathBuf>) {
        self.library.write().media_root = root;
    }

    /// Container extensions visible to listing.
    pub fn extensions(&self) -> Vec<String> {
        self.library.read().extensions.clone()
    }

    /// Validate `requested` against the current media root.
    pub fn sandbox(&self, requested: &Path) -> dr_core::Result<PathBuf> {
        sandbox::validate_in(self.media_root().as_deref(), requested)
    }

    /// Re-read the library section from the config file on disk.
    ///
    /// Returns `Ok(false)` when the store was built without a file.
    pub fn reload(&self) -> dr_core::Result<bool> {
        let Some(ref path) = self.config_path else {
            return Ok(false);
        };

        let config = Config::load(path)?;
        *self.library.write() = config.library;
        tracing::info!("Config reloaded from {}", path.display());
        Ok(true)
    }
}

// ---------------------------------------------------------------------------
// AppContext
// ---------------------------------------------------------------------------

/// Application context shared by all request handlers (via Axum state).
///
/// This is cheaply cloneable because it only holds `Arc`s.
#[derive(Clone)]
pub struct AppContext {
    /// Immutable application configuration snapshot.
    pub config: Arc<Config>,
    /// Mutable runtime configuration with hot-reload.
    pub config_store: Arc<ConfigStore>,
    pub event_bus: Arc<EventBus>,
    /// External tool registry.
    pub tools: Arc<ToolRegistry>,
    pub transcoder: Arc<TranscodeOrchestrator>,
}

impl AppContext {
    pub fn new(
        config: Config,
        config_path: Option<PathBuf>,
        tools: Arc<ToolRegistry>,
        encoder: Arc<dyn DashEncoder>,
    ) -> Self {
        let config_store = Arc::new(ConfigStore::new(&config, config_path));
        let event_bus = Arc::new(EventBus::default());
        let transcoder = Arc::new(TranscodeOrchestrator::new(
            config.transcode.output_dir.clone(),
            DashSettings::from_config(&config.transcode),
            encoder,
            event_bus.clone(),
        ));

        Self {
            config: Arc::new(config),
            config_store,
            event_bus,
            tools,
            transcoder,
        }
    }

    /// Reload runtime config and announce the new root.
    pub fn reload_config(&self) -> dr_core::Result<bool> {
        let reloaded = self.config_store.reload()?;
        if reloaded {
            self.event_bus.broadcast(EventPayload::ConfigReloaded {
                media_root: self.config_store.media_root(),
            });
        }
        Ok(reloaded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sandbox_reads_current_root() {
        let a = tempfile::tempdir().unwrap();
        let b = tempfile::tempdir().unwrap();
        std::fs::write(a.path().join("clip.mp4"), b"x").unwrap();

        let store = ConfigStore::new(&Config::default(), None);
        let err = store.sandbox(Path::new("clip.mp4")).unwrap_err();
        assert!(matches!(err, dr_core::Error::MisconfiguredRoot(_)));

        store.set_media_root(Some(a.path().to_path_buf()));
        let inside = store.sandbox(&a.path().join("clip.mp4")).unwrap();
        assert!(inside.ends_with("clip.mp4"));

        // Same absolute path is rejected once the root moves.
        store.set_media_root(Some(b.path().to_path_buf()));
        let err = store.sandbox(&a.path().join("clip.mp4")).unwrap_err();
        assert!(matches!(err, dr_core::Error::OutsideSandbox { .. }));
    }

    #[test]
    fn reload_without_path_is_noop() {
        let store = ConfigStore::new(&Config::default(), None);
        assert!(!store.reload().unwrap());
    }

    #[test]
    fn reload_picks_up_new_root() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{}").unwrap();

        let store = ConfigStore::new(&Config::default(), Some(path.clone()));
        assert!(store.media_root().is_none());

        let json = serde_json::json!({"library": {"media_root": dir.path()}});
        std::fs::write(&path, json.to_string()).unwrap();
        assert!(store.reload().unwrap());
        assert_eq!(store.media_root(), Some(dir.path().to_path_buf()));
    }

    #[test]
    fn reload_with_broken_file_keeps_previous_settings() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{not json").unwrap();

        let mut config = Config::default();
        config.library.media_root = Some(dir.path().to_path_buf());
        let store = ConfigStore::new(&config, Some(path));

        assert!(store.reload().is_err());
        assert_eq!(store.media_root(), Some(dir.path().to_path_buf()));
    }
}
