use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::workflow::Adjustment;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("charge declined: {0}")]
    Declined(String),

    #[error("unexpected response: {0}")]
    Unexpected(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct ChargeRequest {
    pub order_id: Uuid,
    pub payer_id: Uuid,
    pub amount: Decimal,
    pub description: String,
}

/// What the processor reports back for a successful capture.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureReceipt {
    pub processor_ref: String,
    pub amount: Decimal,
    #[serde(default)]
    pub processor_fee: Decimal,
}

/// External payment processor.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn capture(&self, req: &ChargeRequest) -> Result<CaptureReceipt, GatewayError>;
}

#[derive(Debug, Deserialize)]
struct ChargeResponse {
    status: String,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    amount: Option<Decimal>,
    #[serde(default)]
    fee: Option<Decimal>,
    #[serde(default)]
    failure_reason: Option<String>,
}

/// JSON-over-HTTP processor client. Posts to `{base_url}/charges`.
#[derive(Debug, Clone)]
pub struct HttpGateway {
    http: Client,
    base_url: String,
    api_key: String,
}

impl HttpGateway {
    pub fn new(http: Client, base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }
}

#[async_trait]
impl PaymentGateway for HttpGateway {
    async fn capture(&self, req: &ChargeRequest) -> Result<CaptureReceipt, GatewayError> {
        let url = format!("{}/charges", self.base_url);
        let resp: ChargeResponse = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .header("Idempotency-Key", req.order_id.to_string())
            .json(req)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        match resp.status.as_str() {
            "succeeded" | "captured" => {
                let processor_ref = resp
                    .id
                    .ok_or_else(|| GatewayError::Unexpected("missing charge id".into()))?;
                Ok(CaptureReceipt {
                    processor_ref,
                    amount: resp.amount.unwrap_or(req.amount),
                    processor_fee: resp.fee.unwrap_or_default(),
                })
            }
            "declined" | "failed" => Err(GatewayError::Declined(
                resp.failure_reason.unwrap_or_else(|| resp.status.clone()),
            )),
            other => Err(GatewayError::Unexpected(format!("charge status {other:?}"))),
        }
    }
}

/// Local gateway used when no processor URL is configured. Every charge
/// succeeds with a synthetic reference and the configured fee rule.
#[derive(Debug, Clone)]
pub struct DryRunGateway {
    fee: Adjustment,
}

impl DryRunGateway {
    pub fn new(fee: Adjustment) -> Self {
        Self { fee }
    }
}

#[async_trait]
impl PaymentGateway for DryRunGateway {
    async fn capture(&self, req: &ChargeRequest) -> Result<CaptureReceipt, GatewayError> {
        let receipt = CaptureReceipt {
            processor_ref: format!("dry_{}", Uuid::new_v4().simple()),
            amount: req.amount,
            processor_fee: self.fee.apply(req.amount),
        };
        tracing::info!(
            order_id = %req.order_id,
            amount = %req.amount,
            fee = %receipt.processor_fee,
            processor_ref = %receipt.processor_ref,
            "[DRY-RUN] Would capture payment"
        );
        Ok(receipt)
    }
}
