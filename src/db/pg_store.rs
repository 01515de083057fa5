use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::{message_repo, offer_repo, order_repo, tracking_repo, wallet_repo, Store};
use crate::models::{
    Message, Offer, Order, OrderStatusStep, TransactionStatus, WalletTransaction,
};

/// Postgres-backed store delegating to the `*_repo` query functions.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl Store for PgStore {
    async fn ping(&self) -> anyhow::Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn insert_order(&self, order: &Order) -> anyhow::Result<()> {
        order_repo::insert_order(&self.pool, order).await
    }

    async fn get_order(&self, id: Uuid) -> anyhow::Result<Option<Order>> {
        order_repo::get_order(&self.pool, id).await
    }

    async fn list_orders(&self) -> anyhow::Result<Vec<Order>> {
        order_repo::list_orders(&self.pool).await
    }

    async fn save_order(&self, order: &Order) -> anyhow::Result<()> {
        order_repo::update_order(&self.pool, order).await
    }

    async fn save_order_with_offers(&self, order: &Order, offers: &[Offer]) -> anyhow::Result<()> {
        let mut tx = self.pool.begin().await?;
        for offer in offers {
            offer_repo::update_offer(&mut *tx, offer).await?;
        }
        order_repo::update_order(&mut *tx, order).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn insert_offer(&self, offer: &Offer) -> anyhow::Result<()> {
        offer_repo::insert_offer(&self.pool, offer).await
    }

    async fn get_offer(&self, id: Uuid) -> anyhow::Result<Option<Offer>> {
        offer_repo::get_offer(&self.pool, id).await
    }

    async fn save_offer(&self, offer: &Offer) -> anyhow::Result<()> {
        offer_repo::update_offer(&self.pool, offer).await
    }

    async fn list_offers_for_order(&self, order_id: Uuid) -> anyhow::Result<Vec<Offer>> {
        offer_repo::get_offers_for_order(&self.pool, order_id).await
    }

    async fn list_offers_by_shipper(&self, shipper_id: Uuid) -> anyhow::Result<Vec<Offer>> {
        offer_repo::get_offers_by_shipper(&self.pool, shipper_id).await
    }

    async fn insert_step(&self, step: &OrderStatusStep) -> anyhow::Result<()> {
        tracking_repo::insert_step(&self.pool, step).await
    }

    async fn list_steps(&self, order_id: Uuid) -> anyhow::Result<Vec<OrderStatusStep>> {
        tracking_repo::get_steps(&self.pool, order_id).await
    }

    async fn insert_transaction(&self, tx: &WalletTransaction) -> anyhow::Result<()> {
        wallet_repo::insert_transaction(&self.pool, tx).await
    }

    async fn get_transaction(&self, id: Uuid) -> anyhow::Result<Option<WalletTransaction>> {
        wallet_repo::get_transaction(&self.pool, id).await
    }

    async fn find_transaction_by_ref(
        &self,
        processor_ref: &str,
    ) -> anyhow::Result<Option<WalletTransaction>> {
        wallet_repo::get_transaction_by_ref(&self.pool, processor_ref).await
    }

    async fn update_transaction_status(
        &self,
        id: Uuid,
        status: TransactionStatus,
    ) -> anyhow::Result<WalletTransaction> {
        wallet_repo::set_status(&self.pool, id, status).await
    }

    async fn list_transactions(
        &self,
        user_id: Option<Uuid>,
    ) -> anyhow::Result<Vec<WalletTransaction>> {
        wallet_repo::get_transactions(&self.pool, user_id).await
    }

    async fn list_transactions_for_order(
        &self,
        order_id: Uuid,
    ) -> anyhow::Result<Vec<WalletTransaction>> {
        wallet_repo::get_transactions_for_order(&self.pool, order_id).await
    }

    async fn insert_message(&self, message: &Message) -> anyhow::Result<()> {
        message_repo::insert_message(&self.pool, message).await
    }

    async fn get_message(&self, id: Uuid) -> anyhow::Result<Option<Message>> {
        message_repo::get_message(&self.pool, id).await
    }

    async fn save_message(&self, message: &Message) -> anyhow::Result<()> {
        message_repo::update_moderation(&self.pool, message).await
    }

    async fn list_messages(&self, order_id: Uuid) -> anyhow::Result<Vec<Message>> {
        message_repo::get_thread(&self.pool, order_id).await
    }

    async fn list_pending_messages(&self) -> anyhow::Result<Vec<Message>> {
        message_repo::get_pending(&self.pool).await
    }
}
