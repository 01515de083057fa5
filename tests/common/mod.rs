use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use uuid::Uuid;

use parcelhub::db::{MemoryStore, Store};
use parcelhub::models::{
    Actor, Catalog, LineItem, Location, Offer, OfferDecision, Order, Route, ServiceType,
};
use parcelhub::payments::{CaptureReceipt, ChargeRequest, DryRunGateway, GatewayError, PaymentGateway};
use parcelhub::services::{NewOrder, Services};
use parcelhub::workflow::Adjustment;

/// Services over a fresh in-memory store with a 10% commission.
#[allow(dead_code)]
pub fn services_with(gateway: Arc<dyn PaymentGateway>, timeout: Duration) -> (Services, Arc<dyn Store>) {
    let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
    let services = Services::new(
        store.clone(),
        Arc::new(Catalog::default()),
        Adjustment::Percent(Decimal::from(10)),
        gateway,
        timeout,
    );
    (services, store)
}

#[allow(dead_code)]
pub fn setup_services() -> Services {
    services_with(
        Arc::new(DryRunGateway::new(Adjustment::Percent(Decimal::from(3)))),
        Duration::from_secs(5),
    )
    .0
}

#[allow(dead_code)]
pub fn location(city: &str) -> Location {
    Location {
        country: Some("US".into()),
        state: Some("NY".into()),
        city: Some(city.into()),
    }
}

#[allow(dead_code)]
pub fn item(title: &str, unit_price: i64, quantity: u32) -> LineItem {
    LineItem {
        title: title.into(),
        unit_price: Decimal::from(unit_price),
        unit_weight: Decimal::ONE,
        quantity,
    }
}

/// Two items worth $25, required consolidation only, buy-for-me.
#[allow(dead_code)]
pub fn buy_for_me_order() -> NewOrder {
    NewOrder {
        service_type: ServiceType::BuyForMe,
        route: Route {
            origin: location("New York"),
            destination: location("Buffalo"),
        },
        line_items: vec![item("Sneakers", 10, 2), item("Socks", 5, 1)],
        selected_services: vec![],
    }
}

/// Create an order as `shopper` and place one offer from `shipper`.
#[allow(dead_code)]
pub async fn order_with_offer(
    services: &Services,
    shopper: &Actor,
    shipper: &Actor,
    price: i64,
) -> (Order, Offer) {
    let order = services
        .orders
        .create_order(shopper, buy_for_me_order())
        .await
        .expect("create order");
    let offer = services
        .offers
        .submit_offer(order.id, shipper, Decimal::from(price))
        .await
        .expect("submit offer");
    (order, offer)
}

/// Order through acceptance of one offer.
#[allow(dead_code)]
pub async fn accepted_order(services: &Services, shopper: &Actor, shipper: &Actor) -> (Order, Offer) {
    let (order, offer) = order_with_offer(services, shopper, shipper, 40).await;
    let offer = services
        .offers
        .decide_offer(offer.id, shopper, OfferDecision::Accepted)
        .await
        .expect("accept offer");
    (order, offer)
}

#[allow(dead_code)]
pub fn actors() -> (Actor, Actor, Actor) {
    (
        Actor::shopper(Uuid::new_v4()),
        Actor::shipper(Uuid::new_v4()),
        Actor::admin(Uuid::new_v4()),
    )
}

/// Gateway that always fails.
#[allow(dead_code)]
pub struct DecliningGateway;

#[async_trait]
impl PaymentGateway for DecliningGateway {
    async fn capture(&self, _req: &ChargeRequest) -> Result<CaptureReceipt, GatewayError> {
        Err(GatewayError::Declined("card declined".into()))
    }
}

/// Gateway that never answers within any reasonable timeout.
#[allow(dead_code)]
pub struct HangingGateway;

#[async_trait]
impl PaymentGateway for HangingGateway {
    async fn capture(&self, _req: &ChargeRequest) -> Result<CaptureReceipt, GatewayError> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Err(GatewayError::Unexpected("unreachable".into()))
    }
}

/// Gateway returning a fixed reference so replays can be exercised.
#[allow(dead_code)]
pub struct FixedRefGateway {
    pub processor_ref: String,
    pub fee: Decimal,
}

#[async_trait]
impl PaymentGateway for FixedRefGateway {
    async fn capture(&self, req: &ChargeRequest) -> Result<CaptureReceipt, GatewayError> {
        Ok(CaptureReceipt {
            processor_ref: self.processor_ref.clone(),
            amount: req.amount,
            processor_fee: self.fee,
        })
    }
}

/// Connect to the test database and run all migrations.
/// `None` when `TEST_DATABASE_URL` is not set.
#[allow(dead_code)]
pub async fn setup_test_db() -> Option<sqlx::PgPool> {
    let url = std::env::var("TEST_DATABASE_URL").ok()?;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&url)
        .await
        .expect("Failed to connect to test database");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run migrations");

    // Clean tables for test isolation
    for table in [
        "messages",
        "wallet_transactions",
        "order_status_steps",
        "offers",
        "orders",
    ] {
        sqlx::query(&format!("DELETE FROM {table}"))
            .execute(&pool)
            .await
            .ok();
    }

    Some(pool)
}
