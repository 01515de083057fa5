use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{Attachment, Message, MessageStatus, Role};

#[derive(Debug, sqlx::FromRow)]
struct MessageRow {
    id: Uuid,
    order_id: Uuid,
    sender_id: Uuid,
    sender_role: String,
    receiver_id: Uuid,
    text: Option<String>,
    attachments: Json<Vec<Attachment>>,
    status: String,
    moderated_by: Option<Uuid>,
    moderated_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl TryFrom<MessageRow> for Message {
    type Error = anyhow::Error;

    fn try_from(row: MessageRow) -> Result<Self, Self::Error> {
        Ok(Message {
            id: row.id,
            order_id: row.order_id,
            sender_id: row.sender_id,
            sender_role: Role::from_client_str(&row.sender_role)
                .ok_or_else(|| anyhow::anyhow!("unknown sender role {:?}", row.sender_role))?,
            receiver_id: row.receiver_id,
            text: row.text,
            attachments: row.attachments.0,
            status: MessageStatus::from_str(&row.status)
                .ok_or_else(|| anyhow::anyhow!("unknown message status {:?}", row.status))?,
            moderated_by: row.moderated_by,
            moderated_at: row.moderated_at,
            created_at: row.created_at,
        })
    }
}

pub async fn insert_message(pool: &PgPool, message: &Message) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO messages (id, order_id, sender_id, sender_role, receiver_id, text,
                              attachments, status, moderated_by, moderated_at, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        "#,
    )
    .bind(message.id)
    .bind(message.order_id)
    .bind(message.sender_id)
    .bind(message.sender_role.as_str())
    .bind(message.receiver_id)
    .bind(&message.text)
    .bind(Json(&message.attachments))
    .bind(message.status.as_str())
    .bind(message.moderated_by)
    .bind(message.moderated_at)
    .bind(message.created_at)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn get_message(pool: &PgPool, id: Uuid) -> anyhow::Result<Option<Message>> {
    let row = sqlx::query_as::<_, MessageRow>("SELECT * FROM messages WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?;

    row.map(Message::try_from).transpose()
}

/// Record a moderation outcome.
pub async fn update_moderation(pool: &PgPool, message: &Message) -> anyhow::Result<()> {
    sqlx::query(
        "UPDATE messages SET status = $2, moderated_by = $3, moderated_at = $4 WHERE id = $1",
    )
    .bind(message.id)
    .bind(message.status.as_str())
    .bind(message.moderated_by)
    .bind(message.moderated_at)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn get_thread(pool: &PgPool, order_id: Uuid) -> anyhow::Result<Vec<Message>> {
    let rows = sqlx::query_as::<_, MessageRow>(
        "SELECT * FROM messages WHERE order_id = $1 ORDER BY created_at ASC, id ASC",
    )
    .bind(order_id)
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(Message::try_from).collect()
}

pub async fn get_pending(pool: &PgPool) -> anyhow::Result<Vec<Message>> {
    let rows = sqlx::query_as::<_, MessageRow>(
        "SELECT * FROM messages WHERE status = 'pending' ORDER BY created_at ASC",
    )
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(Message::try_from).collect()
}
