use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use uuid::Uuid;

use super::{ok, ApiResult};
use crate::errors::AppError;
use crate::models::Actor;
use crate::payments::signature::{SIGNATURE_HEADER, TIMESTAMP_HEADER};
use crate::services::{CaptureCallback, PaymentOutcome};
use crate::AppState;

pub async fn charge(
    State(state): State<AppState>,
    actor: Actor,
    Path(order_id): Path<Uuid>,
) -> ApiResult<PaymentOutcome> {
    ok(state.services.payments.charge(order_id, &actor).await?)
}

/// Processor webhook. Signed with `PAYMENT_WEBHOOK_SECRET` when configured.
pub async fn capture_callback(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<PaymentOutcome> {
    if let Some(signer) = &state.webhook_signer {
        let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());
        let (Some(timestamp), Some(signature)) = (header(TIMESTAMP_HEADER), header(SIGNATURE_HEADER))
        else {
            return Err(AppError::Unauthorized);
        };

        if let Err(e) = signer.verify(timestamp, &body, signature) {
            tracing::warn!(error = %e, "Rejected capture callback");
            return Err(AppError::Unauthorized);
        }
    }

    let callback: CaptureCallback = serde_json::from_slice(&body)
        .map_err(|e| AppError::BadRequest(format!("invalid capture payload: {e}")))?;

    ok(state.services.payments.capture_callback(callback).await?)
}
