use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use super::{ok, ApiResult};
use crate::models::{Actor, OrderStatusStep, StepDetails, TimelineEntry};
use crate::services::AppendOutcome;
use crate::AppState;

#[derive(Deserialize)]
pub struct AppendStep {
    pub status_id: i32,
    #[serde(flatten)]
    pub details: StepDetails,
}

pub async fn append(
    State(state): State<AppState>,
    actor: Actor,
    Path(order_id): Path<Uuid>,
    Json(body): Json<AppendStep>,
) -> ApiResult<AppendOutcome> {
    ok(state
        .services
        .tracking
        .append_step(order_id, &actor, body.status_id, body.details)
        .await?)
}

/// Timeline for anyone allowed to see the order.
pub async fn timeline(
    State(state): State<AppState>,
    actor: Actor,
    Path(order_id): Path<Uuid>,
) -> ApiResult<Vec<TimelineEntry>> {
    state.services.orders.get_order(&actor, order_id).await?;
    ok(state.services.tracking.timeline(order_id).await?)
}

pub async fn current(
    State(state): State<AppState>,
    actor: Actor,
    Path(order_id): Path<Uuid>,
) -> ApiResult<Option<OrderStatusStep>> {
    state.services.orders.get_order(&actor, order_id).await?;
    ok(state.services.tracking.current_step(order_id).await?)
}
