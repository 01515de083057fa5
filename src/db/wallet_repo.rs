use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{ServiceType, TransactionStatus, TransactionType, WalletTransaction};

#[derive(Debug, sqlx::FromRow)]
struct TransactionRow {
    id: Uuid,
    order_id: Option<Uuid>,
    user_id: Uuid,
    payer_id: Option<Uuid>,
    shipping_type: Option<String>,
    transaction_type: String,
    amount: Decimal,
    processor_fee: Decimal,
    commission_amount: Decimal,
    status: String,
    description: String,
    processor_ref: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<TransactionRow> for WalletTransaction {
    type Error = anyhow::Error;

    fn try_from(row: TransactionRow) -> Result<Self, Self::Error> {
        let shipping_type = row
            .shipping_type
            .as_deref()
            .map(|s| {
                ServiceType::from_str(s).ok_or_else(|| anyhow::anyhow!("unknown shipping type {s:?}"))
            })
            .transpose()?;

        Ok(WalletTransaction {
            id: row.id,
            order_id: row.order_id,
            user_id: row.user_id,
            payer_id: row.payer_id,
            shipping_type,
            transaction_type: TransactionType::from_str(&row.transaction_type).ok_or_else(|| {
                anyhow::anyhow!("unknown transaction type {:?}", row.transaction_type)
            })?,
            amount: row.amount,
            processor_fee: row.processor_fee,
            commission_amount: row.commission_amount,
            status: TransactionStatus::from_str(&row.status)
                .ok_or_else(|| anyhow::anyhow!("unknown transaction status {:?}", row.status))?,
            description: row.description,
            processor_ref: row.processor_ref,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

pub async fn insert_transaction(pool: &PgPool, tx: &WalletTransaction) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO wallet_transactions (id, order_id, user_id, payer_id, shipping_type,
                                         transaction_type, amount, processor_fee, commission_amount,
                                         status, description, processor_ref, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
        "#,
    )
    .bind(tx.id)
    .bind(tx.order_id)
    .bind(tx.user_id)
    .bind(tx.payer_id)
    .bind(tx.shipping_type.map(|s| s.as_str()))
    .bind(tx.transaction_type.as_str())
    .bind(tx.amount)
    .bind(tx.processor_fee)
    .bind(tx.commission_amount)
    .bind(tx.status.as_str())
    .bind(&tx.description)
    .bind(&tx.processor_ref)
    .bind(tx.created_at)
    .bind(tx.updated_at)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn get_transaction(pool: &PgPool, id: Uuid) -> anyhow::Result<Option<WalletTransaction>> {
    let row = sqlx::query_as::<_, TransactionRow>("SELECT * FROM wallet_transactions WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?;

    row.map(WalletTransaction::try_from).transpose()
}

pub async fn get_transaction_by_ref(
    pool: &PgPool,
    processor_ref: &str,
) -> anyhow::Result<Option<WalletTransaction>> {
    let row = sqlx::query_as::<_, TransactionRow>(
        "SELECT * FROM wallet_transactions WHERE processor_ref = $1",
    )
    .bind(processor_ref)
    .fetch_optional(pool)
    .await?;

    row.map(WalletTransaction::try_from).transpose()
}

/// Only the status column is ever updated; amounts are immutable.
pub async fn set_status(
    pool: &PgPool,
    id: Uuid,
    status: TransactionStatus,
) -> anyhow::Result<WalletTransaction> {
    let row = sqlx::query_as::<_, TransactionRow>(
        r#"
        UPDATE wallet_transactions
        SET status = $2, updated_at = $3
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(status.as_str())
    .bind(Utc::now())
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| anyhow::anyhow!("transaction {id} does not exist"))?;

    WalletTransaction::try_from(row)
}

pub async fn get_transactions(
    pool: &PgPool,
    user_id: Option<Uuid>,
) -> anyhow::Result<Vec<WalletTransaction>> {
    let rows = sqlx::query_as::<_, TransactionRow>(
        r#"
        SELECT * FROM wallet_transactions
        WHERE ($1::uuid IS NULL OR user_id = $1)
        ORDER BY created_at DESC
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(WalletTransaction::try_from).collect()
}

pub async fn get_transactions_for_order(
    pool: &PgPool,
    order_id: Uuid,
) -> anyhow::Result<Vec<WalletTransaction>> {
    let rows = sqlx::query_as::<_, TransactionRow>(
        "SELECT * FROM wallet_transactions WHERE order_id = $1 ORDER BY created_at ASC",
    )
    .bind(order_id)
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(WalletTransaction::try_from).collect()
}
