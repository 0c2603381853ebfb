//! Configuration route handlers.

use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};

use crate::context::AppContext;
use crate::error::AppError;

/// POST /api/config/reload
///
/// Re-reads the library section (media root, extensions) from disk. Takes
/// effect for the next request.
pub async fn reload_config(State(ctx): State<AppContext>) -> Result<Json<Value>, AppError> {
    let reloaded = ctx.reload_config()?;
    Ok(Json(json!({
        "status": if reloaded { "reloaded" } else { "skipped" },
        "mediaRoot": ctx.config_store.media_root(),
    })))
}

/// GET /api/config/validate
pub async fn validate_config(State(ctx): State<AppContext>) -> Json<Value> {
    let mut config = (*ctx.config).clone();
    config.library.media_root = ctx.config_store.media_root();
    config.library.extensions = ctx.config_store.extensions();
    let warnings = config.validate();
    Json(json!({
        "valid": warnings.is_empty(),
        "warnings": warnings,
    }))
}
