use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use super::{ok, ApiResult};
use crate::models::{Actor, Message, ModerationDecision};
use crate::services::NewMessage;
use crate::AppState;

#[derive(Deserialize)]
pub struct ModerationBody {
    pub decision: ModerationDecision,
}

pub async fn send(
    State(state): State<AppState>,
    actor: Actor,
    Path(order_id): Path<Uuid>,
    Json(body): Json<NewMessage>,
) -> ApiResult<Message> {
    ok(state.services.messages.send(order_id, &actor, body).await?)
}

pub async fn thread(
    State(state): State<AppState>,
    actor: Actor,
    Path(order_id): Path<Uuid>,
) -> ApiResult<Vec<Message>> {
    ok(state.services.messages.visible_thread(order_id, &actor).await?)
}

pub async fn pending(State(state): State<AppState>, actor: Actor) -> ApiResult<Vec<Message>> {
    ok(state.services.messages.pending_queue(&actor).await?)
}

pub async fn moderate(
    State(state): State<AppState>,
    actor: Actor,
    Path(message_id): Path<Uuid>,
    Json(body): Json<ModerationBody>,
) -> ApiResult<Message> {
    ok(state
        .services
        .messages
        .moderate(message_id, body.decision, &actor)
        .await?)
}
