use axum::extract::{Path, Query, State};
use axum::Json;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{ok, ApiResult};
use crate::errors::{AppError, WorkflowError};
use crate::models::{Actor, LedgerMovement, LedgerPools, WalletSummary, WalletTransaction};
use crate::services::TransactionFilter;
use crate::AppState;

#[derive(Deserialize)]
pub struct PayoutBody {
    pub amount: Decimal,
}

#[derive(Serialize)]
pub struct SummaryResponse {
    #[serde(flatten)]
    pub summary: WalletSummary,
    /// Platform pools, admins only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pools: Option<LedgerPools>,
}

pub async fn list(
    State(state): State<AppState>,
    actor: Actor,
    Query(filter): Query<TransactionFilter>,
) -> ApiResult<Vec<WalletTransaction>> {
    ok(state.services.ledger.list_transactions(&actor, filter).await?)
}

pub async fn summary(
    State(state): State<AppState>,
    actor: Actor,
    Path(user_id): Path<Uuid>,
) -> ApiResult<SummaryResponse> {
    if !actor.is_admin() && actor.id != user_id {
        return Err(AppError::from(WorkflowError::forbidden(
            "wallet summaries are private",
        )));
    }

    let summary = state.services.ledger.summarize(user_id).await?;
    let pools = if actor.is_admin() {
        Some(state.services.ledger.pools().await?)
    } else {
        None
    };
    ok(SummaryResponse { summary, pools })
}

pub async fn payout(
    State(state): State<AppState>,
    actor: Actor,
    Json(body): Json<PayoutBody>,
) -> ApiResult<WalletTransaction> {
    ok(state.services.ledger.request_payout(&actor, body.amount).await?)
}

pub async fn release(
    State(state): State<AppState>,
    actor: Actor,
    Path(tx_id): Path<Uuid>,
) -> ApiResult<LedgerMovement> {
    ok(state.services.ledger.release(tx_id, &actor).await?)
}

pub async fn reverse(
    State(state): State<AppState>,
    actor: Actor,
    Path(tx_id): Path<Uuid>,
) -> ApiResult<LedgerMovement> {
    ok(state.services.ledger.reverse(tx_id, &actor).await?)
}

pub async fn mark_failed(
    State(state): State<AppState>,
    actor: Actor,
    Path(tx_id): Path<Uuid>,
) -> ApiResult<WalletTransaction> {
    ok(state.services.ledger.mark_failed(tx_id, &actor).await?)
}
