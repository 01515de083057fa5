use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::models::{OrderStatus, TrackingStatus, TransactionStatus};

/// Typed failures of the order/offer/ledger workflow.
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("{entity} cannot move from {from} to {to}")]
    IllegalTransition {
        entity: &'static str,
        from: String,
        to: String,
    },

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("order {order_id} already has an accepted offer")]
    AlreadyAccepted { order_id: Uuid },

    #[error("order {order_id} is not open for offers (status {status})")]
    OrderClosed { order_id: Uuid, status: OrderStatus },

    #[error("ledger transaction {tx_id} cannot move from {from} to {to}")]
    InvalidLedgerTransition {
        tx_id: Uuid,
        from: TransactionStatus,
        to: TransactionStatus,
    },

    #[error("wallet {user_id} has {available} available, {requested} requested")]
    InsufficientFunds {
        user_id: Uuid,
        requested: Decimal,
        available: Decimal,
    },

    #[error("tracking step {attempted} is out of sequence, expected {expected}")]
    SkippedStep {
        expected: TrackingStatus,
        attempted: TrackingStatus,
    },

    #[error("payment processor failure: {0}")]
    ExternalPaymentFailure(String),

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

impl WorkflowError {
    pub fn validation(msg: impl Into<String>) -> Self {
        WorkflowError::Validation(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        WorkflowError::Forbidden(msg.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        WorkflowError::NotFound(what.into())
    }

    /// Stable machine-readable code for clients.
    pub fn code(&self) -> &'static str {
        match self {
            WorkflowError::Validation(_) => "validation_error",
            WorkflowError::IllegalTransition { .. } => "illegal_transition",
            WorkflowError::Forbidden(_) => "forbidden",
            WorkflowError::NotFound(_) => "not_found",
            WorkflowError::AlreadyAccepted { .. } => "already_accepted",
            WorkflowError::OrderClosed { .. } => "order_closed",
            WorkflowError::InvalidLedgerTransition { .. } => "invalid_ledger_transition",
            WorkflowError::InsufficientFunds { .. } => "insufficient_funds",
            WorkflowError::SkippedStep { .. } => "skipped_step",
            WorkflowError::ExternalPaymentFailure(_) => "external_payment_failure",
            WorkflowError::Storage(_) => "storage_error",
        }
    }

    /// True when repeating the same call may succeed. Everything else means
    /// the state already advanced (or never will) and the caller must re-fetch.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            WorkflowError::ExternalPaymentFailure(_) | WorkflowError::Storage(_)
        )
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error(transparent)]
    Workflow(#[from] WorkflowError),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

#[derive(Serialize)]
struct ErrorBody {
    success: bool,
    error: String,
    code: &'static str,
    retryable: bool,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, retryable, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", false, msg.clone()),
            AppError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, "bad_request", false, msg.clone())
            }
            AppError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "unauthorized",
                false,
                "Unauthorized".into(),
            ),
            AppError::Workflow(e) => {
                let status = match e {
                    WorkflowError::Validation(_) => StatusCode::BAD_REQUEST,
                    WorkflowError::Forbidden(_) => StatusCode::FORBIDDEN,
                    WorkflowError::NotFound(_) => StatusCode::NOT_FOUND,
                    WorkflowError::IllegalTransition { .. }
                    | WorkflowError::AlreadyAccepted { .. }
                    | WorkflowError::OrderClosed { .. }
                    | WorkflowError::InvalidLedgerTransition { .. }
                    | WorkflowError::InsufficientFunds { .. }
                    | WorkflowError::SkippedStep { .. } => StatusCode::CONFLICT,
                    WorkflowError::ExternalPaymentFailure(_) => StatusCode::BAD_GATEWAY,
                    WorkflowError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
                };
                let message = if let WorkflowError::Storage(inner) = e {
                    tracing::error!("Storage error: {inner:?}");
                    "Internal server error".to_string()
                } else {
                    e.to_string()
                };
                (status, e.code(), e.is_retryable(), message)
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    true,
                    "Internal server error".into(),
                )
            }
        };

        (
            status,
            Json(ErrorBody {
                success: false,
                error: message,
                code,
                retryable,
            }),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skipped_step_names_expected() {
        let err = WorkflowError::SkippedStep {
            expected: TrackingStatus::Received,
            attempted: TrackingStatus::Shipped,
        };
        let msg = err.to_string();
        assert!(msg.contains("expected received (6)"), "{msg}");
        assert!(!err.is_retryable());
    }

    #[test]
    fn conflict_statuses() {
        let resp = AppError::from(WorkflowError::AlreadyAccepted {
            order_id: Uuid::nil(),
        })
        .into_response();
        assert_eq!(resp.status(), StatusCode::CONFLICT);

        let resp =
            AppError::from(WorkflowError::ExternalPaymentFailure("timeout".into())).into_response();
        assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
    }
}
