use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

use crate::models::{LineItem, Order, OrderStatus, PaymentPlan, Route, SelectedService, ServiceType};

/// Database row for the orders table. Nested values live in JSONB columns.
#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: Uuid,
    requester_id: Uuid,
    service_type: String,
    route: Json<Route>,
    line_items: Json<Vec<LineItem>>,
    services: Json<Vec<SelectedService>>,
    payment_plans: Json<Vec<PaymentPlan>>,
    status: String,
    accepted_offer_id: Option<Uuid>,
    version: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<OrderRow> for Order {
    type Error = anyhow::Error;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        Ok(Order {
            id: row.id,
            requester_id: row.requester_id,
            service_type: ServiceType::from_str(&row.service_type)
                .ok_or_else(|| anyhow::anyhow!("unknown service type {:?}", row.service_type))?,
            route: row.route.0,
            line_items: row.line_items.0,
            services: row.services.0,
            payment_plans: row.payment_plans.0,
            status: OrderStatus::from_str(&row.status)
                .ok_or_else(|| anyhow::anyhow!("unknown order status {:?}", row.status))?,
            accepted_offer_id: row.accepted_offer_id,
            version: row.version,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

pub async fn insert_order(pool: &PgPool, order: &Order) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO orders (id, requester_id, service_type, route, line_items, services,
                            payment_plans, status, accepted_offer_id, version, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
        "#,
    )
    .bind(order.id)
    .bind(order.requester_id)
    .bind(order.service_type.as_str())
    .bind(Json(&order.route))
    .bind(Json(&order.line_items))
    .bind(Json(&order.services))
    .bind(Json(&order.payment_plans))
    .bind(order.status.as_str())
    .bind(order.accepted_offer_id)
    .bind(order.version)
    .bind(order.created_at)
    .bind(order.updated_at)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn get_order(pool: &PgPool, id: Uuid) -> anyhow::Result<Option<Order>> {
    let row = sqlx::query_as::<_, OrderRow>("SELECT * FROM orders WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?;

    row.map(Order::try_from).transpose()
}

pub async fn list_orders(pool: &PgPool) -> anyhow::Result<Vec<Order>> {
    let rows = sqlx::query_as::<_, OrderRow>("SELECT * FROM orders ORDER BY created_at DESC")
        .fetch_all(pool)
        .await?;

    rows.into_iter().map(Order::try_from).collect()
}

/// Persist status, accepted offer and version. Route, items and services are
/// immutable after creation.
pub async fn update_order<'e, E: PgExecutor<'e>>(exec: E, order: &Order) -> anyhow::Result<()> {
    let result = sqlx::query(
        r#"
        UPDATE orders
        SET status = $2, accepted_offer_id = $3, version = $4, updated_at = $5
        WHERE id = $1
        "#,
    )
    .bind(order.id)
    .bind(order.status.as_str())
    .bind(order.accepted_offer_id)
    .bind(order.version)
    .bind(order.updated_at)
    .execute(exec)
    .await?;

    if result.rows_affected() == 0 {
        anyhow::bail!("order {} does not exist", order.id);
    }
    Ok(())
}
