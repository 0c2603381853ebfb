//! Adaptive rendition preparation and job listing.

use std::path::Path;

use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;

use dr_core::{Error, ManifestRef, MediaKind, MediaSource};

use crate::context::AppContext;
use crate::error::AppError;
use crate::transcode::TranscodeJob;

#[derive(Debug, Deserialize)]
pub struct DashQuery {
    pub path: Option<String>,
}

/// GET /api/dash?path=
///
/// Returns `{manifestUrl, variants, segmentDuration}` once the manifest
/// exists, encoding the source first if needed.
pub async fn prepare_dash(
    State(ctx): State<AppContext>,
    Query(params): Query<DashQuery>,
) -> Result<Json<ManifestRef>, AppError> {
    let requested = params
        .path
        .filter(|p| !p.trim().is_empty())
        .ok_or_else(|| Error::Validation("path is required".into()))?;

    let resolved = ctx.config_store.sandbox(Path::new(&requested))?;
    let is_file = tokio::fs::metadata(&resolved)
        .await
        .map(|m| m.is_file())
        .unwrap_or(false);
    if !is_file {
        return Err(Error::not_found("file", resolved.display()).into());
    }

    let source = MediaSource::new(resolved, MediaKind::Adaptive);
    let manifest = ctx.transcoder.ensure_manifest(&source).await?;
    Ok(Json(manifest))
}

/// GET /api/transcodes
pub async fn list_transcodes(State(ctx): State<AppContext>) -> Json<Vec<TranscodeJob>> {
    Json(ctx.transcoder.list_jobs())
}
