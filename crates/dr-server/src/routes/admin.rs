//! Operational endpoints: tool availability and recent events.

use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;

use dr_core::events::Event;

use crate::context::AppContext;

/// GET /api/admin/tools
pub async fn tools(State(ctx): State<AppContext>) -> Json<Vec<dr_av::ToolInfo>> {
    Json(ctx.tools.check_all())
}

#[derive(Debug, Deserialize)]
pub struct EventsQuery {
    pub limit: Option<usize>,
}

/// GET /api/admin/events?limit=
///
/// Most recent events first.
pub async fn recent_events(
    State(ctx): State<AppContext>,
    Query(params): Query<EventsQuery>,
) -> Json<Vec<Event>> {
    Json(ctx.event_bus.recent_events(params.limit.unwrap_or(50)))
}
