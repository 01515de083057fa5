pub mod memory;
pub mod message_repo;
pub mod offer_repo;
pub mod order_repo;
pub mod pg_store;
pub mod tracking_repo;
pub mod wallet_repo;

use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{
    Message, Offer, Order, OrderStatusStep, TransactionStatus, WalletTransaction,
};

pub use memory::MemoryStore;
pub use pg_store::PgStore;

pub async fn init_pool(database_url: &str) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await?;

    // Verify connectivity
    sqlx::query("SELECT 1").execute(&pool).await?;

    Ok(pool)
}

pub async fn run_migrations(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// Persistence seam for the workflow services.
///
/// Implementations only store and load; every invariant check happens in the
/// services while they hold the entity lock. Methods that touch several rows
/// (`save_order_with_offers`) must apply all writes or none.
#[async_trait]
pub trait Store: Send + Sync {
    async fn ping(&self) -> anyhow::Result<()>;

    // Orders
    async fn insert_order(&self, order: &Order) -> anyhow::Result<()>;
    async fn get_order(&self, id: Uuid) -> anyhow::Result<Option<Order>>;
    /// All orders, newest first.
    async fn list_orders(&self) -> anyhow::Result<Vec<Order>>;
    async fn save_order(&self, order: &Order) -> anyhow::Result<()>;
    async fn save_order_with_offers(&self, order: &Order, offers: &[Offer]) -> anyhow::Result<()>;

    // Offers
    async fn insert_offer(&self, offer: &Offer) -> anyhow::Result<()>;
    async fn get_offer(&self, id: Uuid) -> anyhow::Result<Option<Offer>>;
    async fn save_offer(&self, offer: &Offer) -> anyhow::Result<()>;
    /// Offers on an order, oldest first.
    async fn list_offers_for_order(&self, order_id: Uuid) -> anyhow::Result<Vec<Offer>>;
    async fn list_offers_by_shipper(&self, shipper_id: Uuid) -> anyhow::Result<Vec<Offer>>;

    // Tracking
    async fn insert_step(&self, step: &OrderStatusStep) -> anyhow::Result<()>;
    /// Steps of an order in the order they were recorded.
    async fn list_steps(&self, order_id: Uuid) -> anyhow::Result<Vec<OrderStatusStep>>;

    // Wallet ledger
    async fn insert_transaction(&self, tx: &WalletTransaction) -> anyhow::Result<()>;
    async fn get_transaction(&self, id: Uuid) -> anyhow::Result<Option<WalletTransaction>>;
    async fn find_transaction_by_ref(
        &self,
        processor_ref: &str,
    ) -> anyhow::Result<Option<WalletTransaction>>;
    async fn update_transaction_status(
        &self,
        id: Uuid,
        status: TransactionStatus,
    ) -> anyhow::Result<WalletTransaction>;
    /// Ledger entries, newest first; `None` lists every wallet.
    async fn list_transactions(
        &self,
        user_id: Option<Uuid>,
    ) -> anyhow::Result<Vec<WalletTransaction>>;
    async fn list_transactions_for_order(
        &self,
        order_id: Uuid,
    ) -> anyhow::Result<Vec<WalletTransaction>>;

    // Messages
    async fn insert_message(&self, message: &Message) -> anyhow::Result<()>;
    async fn get_message(&self, id: Uuid) -> anyhow::Result<Option<Message>>;
    async fn save_message(&self, message: &Message) -> anyhow::Result<()>;
    /// Thread of an order, oldest first.
    async fn list_messages(&self, order_id: Uuid) -> anyhow::Result<Vec<Message>>;
    /// Messages awaiting moderation, oldest first.
    async fn list_pending_messages(&self) -> anyhow::Result<Vec<Message>>;
}
