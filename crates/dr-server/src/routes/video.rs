//! Raw video streaming with byte-range support.

use std::path::Path;

use axum::extract::{Query, State};
use axum::http::{header, HeaderMap};
use axum::response::Response;
use serde::Deserialize;

use dr_core::Error;

use crate::context::AppContext;
use crate::error::AppError;
use crate::routes::streaming::serve_file_streaming;

#[derive(Debug, Deserialize)]
pub struct VideoQuery {
    pub path: Option<String>,
}

/// GET /api/video?path=
///
/// Streams the whole file, or the requested byte range.
pub async fn stream_video(
    State(ctx): State<AppContext>,
    Query(params): Query<VideoQuery>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let requested = params
        .path
        .filter(|p| !p.trim().is_empty())
        .ok_or_else(|| Error::Validation("path is required".into()))?;

    let resolved = ctx.config_store.sandbox(Path::new(&requested))?;

    let range_header = headers
        .get(header::RANGE)
        .and_then(|v| v.to_str().ok());

    tracing::debug!(
        path = %resolved.display(),
        range = range_header.unwrap_or("-"),
        "Streaming video"
    );

    Ok(serve_file_streaming(&resolved, range_header).await?)
}
