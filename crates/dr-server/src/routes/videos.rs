//! Flat list of the videos directly inside the media root.

use std::path::Path;

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use dr_core::media::{display_name, has_video_extension};
use dr_core::{sandbox, Error};

use crate::context::AppContext;
use crate::error::AppError;

#[derive(Debug, Serialize)]
pub struct VideoSummary {
    /// File name, unique within the root.
    pub id: String,
    pub title: String,
    pub path: String,
}

/// GET /api/videos
pub async fn list_videos(State(ctx): State<AppContext>) -> Result<Json<Vec<VideoSummary>>, AppError> {
    let root = ctx
        .config_store
        .media_root()
        .ok_or_else(|| Error::MisconfiguredRoot("media root is not set".into()))?;
    let root = sandbox::canonical_root(&root)?;
    let extensions = ctx.config_store.extensions();

    let videos = tokio::task::spawn_blocking(move || scan_videos(&root, &extensions))
        .await
        .map_err(|e| Error::Internal(format!("spawn_blocking join error: {e}")))??;

    Ok(Json(videos))
}

/// Allow-listed, non-hidden regular files in `root`, sorted by name.
pub fn scan_videos(root: &Path, extensions: &[String]) -> dr_core::Result<Vec<VideoSummary>> {
    let mut videos: Vec<VideoSummary> = std::fs::read_dir(root)?
        .flatten()
        .filter_map(|entry| {
            let id = entry.file_name().to_string_lossy().into_owned();
            let path = entry.path();
            let is_file = std::fs::metadata(&path).map(|m| m.is_file()).unwrap_or(false);
            if id.starts_with('.') || !is_file || !has_video_extension(&path, extensions) {
                return None;
            }
            Some(VideoSummary {
                title: display_name(&path),
                path: path.to_string_lossy().into_owned(),
                id,
            })
        })
        .collect();

    videos.sort_by(|a, b| a.id.cmp(&b.id));
    Ok(videos)
}
