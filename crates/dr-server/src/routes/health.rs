//! Liveness probe.

use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};

use crate::context::AppContext;

/// GET /health
pub async fn health_check(State(ctx): State<AppContext>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "mediaRootConfigured": ctx.config_store.media_root().is_some(),
        "activeTranscodes": ctx.transcoder.in_flight_count(),
    }))
}
