use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OfferStatus {
    Pending,
    /// The shopper countered with a different price.
    InProgress,
    Accepted,
    Rejected,
    Cancelled,
    /// A sibling offer on the same order was accepted.
    Ignored,
}

impl OfferStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OfferStatus::Pending => "pending",
            OfferStatus::InProgress => "inprogress",
            OfferStatus::Accepted => "accepted",
            OfferStatus::Rejected => "rejected",
            OfferStatus::Cancelled => "cancelled",
            OfferStatus::Ignored => "ignored",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(OfferStatus::Pending),
            "inprogress" => Some(OfferStatus::InProgress),
            "accepted" => Some(OfferStatus::Accepted),
            "rejected" => Some(OfferStatus::Rejected),
            "cancelled" => Some(OfferStatus::Cancelled),
            "ignored" => Some(OfferStatus::Ignored),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, OfferStatus::Pending | OfferStatus::InProgress)
    }

    pub fn can_transition(&self, to: OfferStatus) -> bool {
        use OfferStatus::*;
        matches!(
            (self, to),
            (Pending, InProgress)
                | (InProgress, Pending)
                | (Pending | InProgress, Accepted)
                | (Pending | InProgress, Rejected)
                | (Pending | InProgress, Cancelled)
                | (Pending | InProgress, Ignored)
        )
    }
}

impl std::fmt::Display for OfferStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One shipper's bid against an order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Offer {
    pub id: Uuid,
    pub order_id: Uuid,
    pub shipper_id: Uuid,
    pub price: Decimal,
    pub status: OfferStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Shopper-side reaction to a bid before deciding on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum OfferResponse {
    Cancel,
    ProposePrice { price: Decimal },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OfferDecision {
    Accepted,
    Rejected,
}
