use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Fixed delivery-status sequence shown on the tracking drawer.
///
/// Steps up to `PaymentCompleted` are derived from the order workflow and
/// cannot be selected manually. `Cancelled` sits outside the sequence and is
/// only recorded when the order is cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackingStatus {
    Pending,
    OfferPlaced,
    OfferAccepted,
    PaymentPending,
    PaymentCompleted,
    Received,
    Processing,
    Shipped,
    InTransit,
    OutForDelivery,
    Delivered,
    Cancelled,
}

impl TrackingStatus {
    /// Ordered delivery sequence, excluding `Cancelled`.
    pub const SEQUENCE: [TrackingStatus; 11] = [
        TrackingStatus::Pending,
        TrackingStatus::OfferPlaced,
        TrackingStatus::OfferAccepted,
        TrackingStatus::PaymentPending,
        TrackingStatus::PaymentCompleted,
        TrackingStatus::Received,
        TrackingStatus::Processing,
        TrackingStatus::Shipped,
        TrackingStatus::InTransit,
        TrackingStatus::OutForDelivery,
        TrackingStatus::Delivered,
    ];

    pub fn id(&self) -> i32 {
        match self {
            TrackingStatus::Pending => 1,
            TrackingStatus::OfferPlaced => 2,
            TrackingStatus::OfferAccepted => 3,
            TrackingStatus::PaymentPending => 4,
            TrackingStatus::PaymentCompleted => 5,
            TrackingStatus::Received => 6,
            TrackingStatus::Processing => 7,
            TrackingStatus::Shipped => 8,
            TrackingStatus::InTransit => 9,
            TrackingStatus::OutForDelivery => 10,
            TrackingStatus::Delivered => 11,
            TrackingStatus::Cancelled => 99,
        }
    }

    pub fn from_id(id: i32) -> Option<Self> {
        if id == TrackingStatus::Cancelled.id() {
            return Some(TrackingStatus::Cancelled);
        }
        Self::SEQUENCE.iter().copied().find(|s| s.id() == id)
    }

    pub fn name(&self) -> &'static str {
        match self {
            TrackingStatus::Pending => "pending",
            TrackingStatus::OfferPlaced => "offer placed",
            TrackingStatus::OfferAccepted => "offer accepted",
            TrackingStatus::PaymentPending => "payment pending",
            TrackingStatus::PaymentCompleted => "payment completed",
            TrackingStatus::Received => "received",
            TrackingStatus::Processing => "processing",
            TrackingStatus::Shipped => "shipped",
            TrackingStatus::InTransit => "in transit",
            TrackingStatus::OutForDelivery => "out for delivery",
            TrackingStatus::Delivered => "delivered",
            TrackingStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_system_derived(&self) -> bool {
        matches!(
            self,
            TrackingStatus::Pending
                | TrackingStatus::OfferPlaced
                | TrackingStatus::OfferAccepted
                | TrackingStatus::PaymentPending
                | TrackingStatus::PaymentCompleted
                | TrackingStatus::Cancelled
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TrackingStatus::Delivered | TrackingStatus::Cancelled)
    }

    /// Next status in the sequence, `None` once terminal.
    pub fn successor(&self) -> Option<TrackingStatus> {
        let idx = Self::SEQUENCE.iter().position(|s| s == self)?;
        Self::SEQUENCE.get(idx + 1).copied()
    }
}

impl std::fmt::Display for TrackingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name(), self.id())
    }
}

/// One recorded node of an order's tracking history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderStatusStep {
    pub id: Uuid,
    pub order_id: Uuid,
    pub status: TrackingStatus,
    pub status_id: i32,
    pub status_name: String,
    pub completed: bool,
    pub tracking_number: Option<String>,
    pub remarks: Option<String>,
    pub files: Vec<String>,
    pub recorded_by: Uuid,
    pub completed_at: DateTime<Utc>,
}

/// Optional details a shipper attaches when advancing a step.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepDetails {
    pub tracking_number: Option<String>,
    pub remarks: Option<String>,
    #[serde(default)]
    pub files: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepState {
    Done,
    Current,
    Upcoming,
}

/// One row of the rendered tracking timeline.
#[derive(Debug, Clone, Serialize)]
pub struct TimelineEntry {
    pub status_id: i32,
    pub status_name: &'static str,
    pub state: StepState,
    pub manual: bool,
    pub step: Option<OrderStatusStep>,
}
