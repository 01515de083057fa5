use axum::extract::{Path, State};
use axum::Json;
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;

use super::{ok, ApiResult};
use crate::models::{Actor, Offer, OfferDecision, OfferResponse};
use crate::AppState;

#[derive(Deserialize)]
pub struct SubmitOffer {
    pub price: Decimal,
}

#[derive(Deserialize)]
pub struct DecisionBody {
    pub decision: OfferDecision,
}

pub async fn submit(
    State(state): State<AppState>,
    actor: Actor,
    Path(order_id): Path<Uuid>,
    Json(body): Json<SubmitOffer>,
) -> ApiResult<Offer> {
    ok(state
        .services
        .offers
        .submit_offer(order_id, &actor, body.price)
        .await?)
}

pub async fn list(
    State(state): State<AppState>,
    actor: Actor,
    Path(order_id): Path<Uuid>,
) -> ApiResult<Vec<Offer>> {
    ok(state.services.offers.list_offers(&actor, order_id).await?)
}

pub async fn respond(
    State(state): State<AppState>,
    actor: Actor,
    Path((order_id, offer_id)): Path<(Uuid, Uuid)>,
    Json(body): Json<OfferResponse>,
) -> ApiResult<Offer> {
    ok(state
        .services
        .offers
        .respond_to_offer(order_id, offer_id, &actor, body)
        .await?)
}

pub async fn decide(
    State(state): State<AppState>,
    actor: Actor,
    Path(offer_id): Path<Uuid>,
    Json(body): Json<DecisionBody>,
) -> ApiResult<Offer> {
    ok(state
        .services
        .offers
        .decide_offer(offer_id, &actor, body.decision)
        .await?)
}
