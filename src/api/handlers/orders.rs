use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use super::{ok, ApiResult};
use crate::models::{Actor, OrderStatus, OrderView};
use crate::services::NewOrder;
use crate::AppState;

#[derive(Deserialize)]
pub struct StatusChange {
    pub status: OrderStatus,
}

pub async fn create(
    State(state): State<AppState>,
    actor: Actor,
    Json(body): Json<NewOrder>,
) -> ApiResult<OrderView> {
    let order = state.services.orders.create_order(&actor, body).await?;
    ok(order.into())
}

pub async fn list(State(state): State<AppState>, actor: Actor) -> ApiResult<Vec<OrderView>> {
    let orders = state.services.orders.list_orders(&actor).await?;
    ok(orders.into_iter().map(OrderView::from).collect())
}

pub async fn detail(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> ApiResult<OrderView> {
    let order = state.services.orders.get_order(&actor, id).await?;
    ok(order.into())
}

pub async fn transition(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(body): Json<StatusChange>,
) -> ApiResult<OrderView> {
    let order = state
        .services
        .orders
        .transition_status(id, body.status, &actor)
        .await?;
    ok(order.into())
}
