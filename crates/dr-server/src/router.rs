//! Axum router construction.
//!
//! Builds the full application router with the API routes, static serving
//! of encoded renditions and the middleware layers.

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use dr_core::manifest::DASH_URL_PREFIX;

use crate::context::AppContext;
use crate::middleware::request_id::request_id_middleware;
use crate::routes;

/// Build the complete Axum router.
pub fn build_router(ctx: AppContext) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
        .expose_headers(Any);

    let api = Router::new()
        // Library
        .route("/directories", get(routes::browse::list_directory))
        .route("/videos", get(routes::videos::list_videos))
        // Playback
        .route("/video", get(routes::video::stream_video))
        .route("/dash", get(routes::dash::prepare_dash))
        .route("/transcodes", get(routes::dash::list_transcodes))
        // Config
        .route("/config/reload", post(routes::config::reload_config))
        .route("/config/validate", get(routes::config::validate_config))
        // Admin
        .route("/admin/tools", get(routes::admin::tools))
        .route("/admin/events", get(routes::admin::recent_events));

    // Manifests and segments, addressed as returned by /api/dash.
    let renditions = ServeDir::new(ctx.transcoder.output_root());

    Router::new()
        .route("/health", get(routes::health::health_check))
        .nest("/api", api)
        .nest_service(DASH_URL_PREFIX, renditions)
        .layer(middleware::from_fn(request_id_middleware))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(ctx)
}
