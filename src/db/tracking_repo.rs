use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{OrderStatusStep, TrackingStatus};

#[derive(Debug, sqlx::FromRow)]
struct StepRow {
    id: Uuid,
    order_id: Uuid,
    status_id: i32,
    status_name: String,
    completed: bool,
    tracking_number: Option<String>,
    remarks: Option<String>,
    files: Json<Vec<String>>,
    recorded_by: Uuid,
    completed_at: DateTime<Utc>,
}

impl TryFrom<StepRow> for OrderStatusStep {
    type Error = anyhow::Error;

    fn try_from(row: StepRow) -> Result<Self, Self::Error> {
        let status = TrackingStatus::from_id(row.status_id)
            .ok_or_else(|| anyhow::anyhow!("unknown tracking status id {}", row.status_id))?;

        Ok(OrderStatusStep {
            id: row.id,
            order_id: row.order_id,
            status,
            status_id: row.status_id,
            status_name: row.status_name,
            completed: row.completed,
            tracking_number: row.tracking_number,
            remarks: row.remarks,
            files: row.files.0,
            recorded_by: row.recorded_by,
            completed_at: row.completed_at,
        })
    }
}

/// Append a step. `(order_id, status_id)` is unique, so a duplicate append
/// fails instead of adding a second row.
pub async fn insert_step(pool: &PgPool, step: &OrderStatusStep) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO order_status_steps (id, order_id, status_id, status_name, completed,
                                        tracking_number, remarks, files, recorded_by, completed_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        "#,
    )
    .bind(step.id)
    .bind(step.order_id)
    .bind(step.status_id)
    .bind(&step.status_name)
    .bind(step.completed)
    .bind(&step.tracking_number)
    .bind(&step.remarks)
    .bind(Json(&step.files))
    .bind(step.recorded_by)
    .bind(step.completed_at)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn get_steps(pool: &PgPool, order_id: Uuid) -> anyhow::Result<Vec<OrderStatusStep>> {
    let rows = sqlx::query_as::<_, StepRow>(
        "SELECT * FROM order_status_steps WHERE order_id = $1 ORDER BY seq ASC",
    )
    .bind(order_id)
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(OrderStatusStep::try_from).collect()
}
