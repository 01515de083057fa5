use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::actor::Role;
use super::catalog::PaymentPlan;
use crate::workflow::pricing::{
    checked_totals, compute_totals, Adjustment, OrderTotals, ServiceCharge,
};

// ---------------------------------------------------------------------------
// Service type
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceType {
    /// Shopper already owns the goods and only needs them forwarded.
    ShipForMe,
    /// Shipper purchases the goods on the shopper's behalf.
    BuyForMe,
}

impl ServiceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceType::ShipForMe => "ship_for_me",
            ServiceType::BuyForMe => "buy_for_me",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "ship_for_me" => Some(ServiceType::ShipForMe),
            "buy_for_me" => Some(ServiceType::BuyForMe),
            _ => None,
        }
    }
}

impl std::fmt::Display for ServiceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Route
// ---------------------------------------------------------------------------

/// Country/state/city references for one leg of the route.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub country: Option<String>,
    pub state: Option<String>,
    pub city: Option<String>,
}

impl Location {
    pub fn is_complete(&self) -> bool {
        [&self.country, &self.state, &self.city]
            .iter()
            .all(|part| part.as_deref().is_some_and(|s| !s.trim().is_empty()))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    pub origin: Location,
    pub destination: Location,
}

impl Route {
    pub fn is_complete(&self) -> bool {
        self.origin.is_complete() && self.destination.is_complete()
    }
}

// ---------------------------------------------------------------------------
// Line items and services
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub title: String,
    pub unit_price: Decimal,
    pub unit_weight: Decimal,
    pub quantity: u32,
}

impl LineItem {
    /// `None` when the product does not fit in a `Decimal`.
    pub fn checked_subtotal(&self) -> Option<Decimal> {
        self.unit_price.checked_mul(Decimal::from(self.quantity))
    }
}

/// An add-on service attached to an order, priced from the catalog at
/// creation time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectedService {
    pub id: String,
    pub name: String,
    pub price: Decimal,
    pub required: bool,
}

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Open,
    OfferAccepted,
    PaymentPending,
    PaymentCompleted,
    InTransit,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Open => "open",
            OrderStatus::OfferAccepted => "offer_accepted",
            OrderStatus::PaymentPending => "payment_pending",
            OrderStatus::PaymentCompleted => "payment_completed",
            OrderStatus::InTransit => "in_transit",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "open" => Some(OrderStatus::Open),
            "offer_accepted" => Some(OrderStatus::OfferAccepted),
            "payment_pending" => Some(OrderStatus::PaymentPending),
            "payment_completed" => Some(OrderStatus::PaymentCompleted),
            "in_transit" => Some(OrderStatus::InTransit),
            "delivered" => Some(OrderStatus::Delivered),
            "cancelled" => Some(OrderStatus::Cancelled),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }

    /// Roles allowed to move an order along the `self -> to` edge.
    /// An empty slice means the edge does not exist.
    pub fn permitted_roles(&self, to: OrderStatus) -> &'static [Role] {
        use OrderStatus::*;

        const SYSTEM: &[Role] = &[Role::System];
        const REQUESTER_OR_ADMIN: &[Role] = &[Role::Shopper, Role::Admin];
        const ADMIN: &[Role] = &[Role::Admin];
        const SYSTEM_OR_ADMIN: &[Role] = &[Role::System, Role::Admin];

        match (self, to) {
            (Open, OfferAccepted) => SYSTEM,
            (OfferAccepted, PaymentPending) => SYSTEM,
            (PaymentPending, PaymentCompleted) => SYSTEM,
            (PaymentCompleted, InTransit) => SYSTEM,
            (InTransit, Delivered) => SYSTEM_OR_ADMIN,
            (Open | OfferAccepted | PaymentPending, Cancelled) => REQUESTER_OR_ADMIN,
            (PaymentCompleted | InTransit, Cancelled) => ADMIN,
            _ => &[],
        }
    }

    pub fn has_edge(&self, to: OrderStatus) -> bool {
        !self.permitted_roles(to).is_empty()
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Order aggregate
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub requester_id: Uuid,
    pub service_type: ServiceType,
    pub route: Route,
    pub line_items: Vec<LineItem>,
    pub services: Vec<SelectedService>,
    /// Payment plans in force when the order was created.
    pub payment_plans: Vec<PaymentPlan>,
    pub status: OrderStatus,
    pub accepted_offer_id: Option<Uuid>,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Totals are derived from the stored inputs on every call.
    pub fn totals(&self) -> OrderTotals {
        let (services, surcharges) = self.charges();
        compute_totals(self.service_type, &self.line_items, &services, &surcharges)
    }

    /// Totals, or `None` if they overflow.
    pub fn checked_totals(&self) -> Option<OrderTotals> {
        let (services, surcharges) = self.charges();
        checked_totals(self.service_type, &self.line_items, &services, &surcharges)
    }

    fn charges(&self) -> (Vec<ServiceCharge>, Vec<Adjustment>) {
        let services = self
            .services
            .iter()
            .map(|s| ServiceCharge {
                price: s.price,
                required: s.required,
                selected: true,
            })
            .collect();
        let surcharges = self.payment_plans.iter().map(|p| p.adjustment).collect();
        (services, surcharges)
    }

    /// Stamp a mutation: bump the version and the update time.
    pub fn touch(&mut self) {
        self.version += 1;
        self.updated_at = Utc::now();
    }
}

/// Read model returned to clients: the order plus its derived totals.
#[derive(Debug, Clone, Serialize)]
pub struct OrderView {
    #[serde(flatten)]
    pub order: Order,
    pub totals: OrderTotals,
}

impl From<Order> for OrderView {
    fn from(order: Order) -> Self {
        let totals = order.totals();
        Self { order, totals }
    }
}
