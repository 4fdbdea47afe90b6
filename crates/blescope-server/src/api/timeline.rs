//! Timeline API endpoint.

use axum::extract::State;
use axum::Json;
use blescope_core::TimelinePoint;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::state::AppState;

/// Active-count series of the most recent ticks.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TimelineResponse {
    /// Maximum number of retained points.
    #[schema(example = 60)]
    pub capacity: usize,

    /// One point per tick, oldest first.
    pub points: Vec<TimelinePoint>,
}

/// Active device count over time.
#[utoipa::path(
    get,
    path = "/api/timeline",
    tag = "devices",
    operation_id = "getTimeline",
    summary = "Get the active device count series",
    description = "Returns the number of live devices at each of the most recent \
        ticks, oldest first. Ticks where the feed was unavailable are included.",
    responses(
        (status = 200, description = "Timeline", body = TimelineResponse)
    )
)]
pub async fn get_timeline(State(state): State<AppState>) -> Json<TimelineResponse> {
    Json(TimelineResponse {
        capacity: state.timeline_capacity(),
        points: state.view().timeline.clone(),
    })
}
