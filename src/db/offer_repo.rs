use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

use crate::models::{Offer, OfferStatus};

#[derive(Debug, sqlx::FromRow)]
struct OfferRow {
    id: Uuid,
    order_id: Uuid,
    shipper_id: Uuid,
    price: Decimal,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<OfferRow> for Offer {
    type Error = anyhow::Error;

    fn try_from(row: OfferRow) -> Result<Self, Self::Error> {
        Ok(Offer {
            id: row.id,
            order_id: row.order_id,
            shipper_id: row.shipper_id,
            price: row.price,
            status: OfferStatus::from_str(&row.status)
                .ok_or_else(|| anyhow::anyhow!("unknown offer status {:?}", row.status))?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

pub async fn insert_offer(pool: &PgPool, offer: &Offer) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO offers (id, order_id, shipper_id, price, status, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#,
    )
    .bind(offer.id)
    .bind(offer.order_id)
    .bind(offer.shipper_id)
    .bind(offer.price)
    .bind(offer.status.as_str())
    .bind(offer.created_at)
    .bind(offer.updated_at)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn get_offer(pool: &PgPool, id: Uuid) -> anyhow::Result<Option<Offer>> {
    let row = sqlx::query_as::<_, OfferRow>("SELECT * FROM offers WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?;

    row.map(Offer::try_from).transpose()
}

/// Update price and status of an existing offer.
pub async fn update_offer<'e, E: PgExecutor<'e>>(exec: E, offer: &Offer) -> anyhow::Result<()> {
    let result = sqlx::query(
        "UPDATE offers SET price = $2, status = $3, updated_at = $4 WHERE id = $1",
    )
    .bind(offer.id)
    .bind(offer.price)
    .bind(offer.status.as_str())
    .bind(offer.updated_at)
    .execute(exec)
    .await?;

    if result.rows_affected() == 0 {
        anyhow::bail!("offer {} does not exist", offer.id);
    }
    Ok(())
}

pub async fn get_offers_for_order(pool: &PgPool, order_id: Uuid) -> anyhow::Result<Vec<Offer>> {
    let rows = sqlx::query_as::<_, OfferRow>(
        "SELECT * FROM offers WHERE order_id = $1 ORDER BY created_at ASC, id ASC",
    )
    .bind(order_id)
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(Offer::try_from).collect()
}

pub async fn get_offers_by_shipper(pool: &PgPool, shipper_id: Uuid) -> anyhow::Result<Vec<Offer>> {
    let rows = sqlx::query_as::<_, OfferRow>(
        "SELECT * FROM offers WHERE shipper_id = $1 ORDER BY created_at DESC",
    )
    .bind(shipper_id)
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(Offer::try_from).collect()
}
