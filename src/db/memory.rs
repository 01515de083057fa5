use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::Store;
use crate::models::{
    Message, MessageStatus, Offer, Order, OrderStatusStep, TransactionStatus, WalletTransaction,
};

/// Process-local store used when no `DATABASE_URL` is configured and by the
/// test suite.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Tables>,
}

#[derive(Default)]
struct Tables {
    orders: HashMap<Uuid, Order>,
    offers: HashMap<Uuid, Offer>,
    steps: Vec<OrderStatusStep>,
    transactions: HashMap<Uuid, WalletTransaction>,
    messages: HashMap<Uuid, Message>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn missing(kind: &str, id: Uuid) -> anyhow::Error {
    anyhow::anyhow!("{kind} {id} does not exist")
}

#[async_trait]
impl Store for MemoryStore {
    async fn ping(&self) -> anyhow::Result<()> {
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Orders
    // -----------------------------------------------------------------------

    async fn insert_order(&self, order: &Order) -> anyhow::Result<()> {
        let mut t = self.inner.write().await;
        if t.orders.contains_key(&order.id) {
            anyhow::bail!("order {} already exists", order.id);
        }
        t.orders.insert(order.id, order.clone());
        Ok(())
    }

    async fn get_order(&self, id: Uuid) -> anyhow::Result<Option<Order>> {
        Ok(self.inner.read().await.orders.get(&id).cloned())
    }

    async fn list_orders(&self) -> anyhow::Result<Vec<Order>> {
        let t = self.inner.read().await;
        let mut orders: Vec<Order> = t.orders.values().cloned().collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(orders)
    }

    async fn save_order(&self, order: &Order) -> anyhow::Result<()> {
        let mut t = self.inner.write().await;
        let slot = t
            .orders
            .get_mut(&order.id)
            .ok_or_else(|| missing("order", order.id))?;
        *slot = order.clone();
        Ok(())
    }

    async fn save_order_with_offers(&self, order: &Order, offers: &[Offer]) -> anyhow::Result<()> {
        let mut t = self.inner.write().await;

        // Check everything first so a missing row leaves the tables untouched.
        if !t.orders.contains_key(&order.id) {
            return Err(missing("order", order.id));
        }
        if let Some(offer) = offers.iter().find(|o| !t.offers.contains_key(&o.id)) {
            return Err(missing("offer", offer.id));
        }

        t.orders.insert(order.id, order.clone());
        for offer in offers {
            t.offers.insert(offer.id, offer.clone());
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Offers
    // -----------------------------------------------------------------------

    async fn insert_offer(&self, offer: &Offer) -> anyhow::Result<()> {
        let mut t = self.inner.write().await;
        if t.offers.contains_key(&offer.id) {
            anyhow::bail!("offer {} already exists", offer.id);
        }
        t.offers.insert(offer.id, offer.clone());
        Ok(())
    }

    async fn get_offer(&self, id: Uuid) -> anyhow::Result<Option<Offer>> {
        Ok(self.inner.read().await.offers.get(&id).cloned())
    }

    async fn save_offer(&self, offer: &Offer) -> anyhow::Result<()> {
        let mut t = self.inner.write().await;
        let slot = t
            .offers
            .get_mut(&offer.id)
            .ok_or_else(|| missing("offer", offer.id))?;
        *slot = offer.clone();
        Ok(())
    }

    async fn list_offers_for_order(&self, order_id: Uuid) -> anyhow::Result<Vec<Offer>> {
        let t = self.inner.read().await;
        let mut offers: Vec<Offer> = t
            .offers
            .values()
            .filter(|o| o.order_id == order_id)
            .cloned()
            .collect();
        offers.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(offers)
    }

    async fn list_offers_by_shipper(&self, shipper_id: Uuid) -> anyhow::Result<Vec<Offer>> {
        let t = self.inner.read().await;
        let mut offers: Vec<Offer> = t
            .offers
            .values()
            .filter(|o| o.shipper_id == shipper_id)
            .cloned()
            .collect();
        offers.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(offers)
    }

    // -----------------------------------------------------------------------
    // Tracking
    // -----------------------------------------------------------------------

    async fn insert_step(&self, step: &OrderStatusStep) -> anyhow::Result<()> {
        let mut t = self.inner.write().await;
        if t
            .steps
            .iter()
            .any(|s| s.order_id == step.order_id && s.status == step.status)
        {
            anyhow::bail!(
                "step {} already recorded for order {}",
                step.status_id,
                step.order_id
            );
        }
        t.steps.push(step.clone());
        Ok(())
    }

    async fn list_steps(&self, order_id: Uuid) -> anyhow::Result<Vec<OrderStatusStep>> {
        let t = self.inner.read().await;
        Ok(t.steps
            .iter()
            .filter(|s| s.order_id == order_id)
            .cloned()
            .collect())
    }

    // -----------------------------------------------------------------------
    // Wallet ledger
    // -----------------------------------------------------------------------

    async fn insert_transaction(&self, tx: &WalletTransaction) -> anyhow::Result<()> {
        let mut t = self.inner.write().await;
        if let Some(reference) = &tx.processor_ref {
            if t
                .transactions
                .values()
                .any(|existing| existing.processor_ref.as_ref() == Some(reference))
            {
                anyhow::bail!("processor reference {reference} already recorded");
            }
        }
        t.transactions.insert(tx.id, tx.clone());
        Ok(())
    }

    async fn get_transaction(&self, id: Uuid) -> anyhow::Result<Option<WalletTransaction>> {
        Ok(self.inner.read().await.transactions.get(&id).cloned())
    }

    async fn find_transaction_by_ref(
        &self,
        processor_ref: &str,
    ) -> anyhow::Result<Option<WalletTransaction>> {
        let t = self.inner.read().await;
        Ok(t.transactions
            .values()
            .find(|tx| tx.processor_ref.as_deref() == Some(processor_ref))
            .cloned())
    }

    async fn update_transaction_status(
        &self,
        id: Uuid,
        status: TransactionStatus,
    ) -> anyhow::Result<WalletTransaction> {
        let mut t = self.inner.write().await;
        let tx = t
            .transactions
            .get_mut(&id)
            .ok_or_else(|| missing("transaction", id))?;
        tx.status = status;
        tx.updated_at = Utc::now();
        Ok(tx.clone())
    }

    async fn list_transactions(
        &self,
        user_id: Option<Uuid>,
    ) -> anyhow::Result<Vec<WalletTransaction>> {
        let t = self.inner.read().await;
        let mut txs: Vec<WalletTransaction> = t
            .transactions
            .values()
            .filter(|tx| user_id.map_or(true, |u| tx.user_id == u))
            .cloned()
            .collect();
        txs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(txs)
    }

    async fn list_transactions_for_order(
        &self,
        order_id: Uuid,
    ) -> anyhow::Result<Vec<WalletTransaction>> {
        let t = self.inner.read().await;
        let mut txs: Vec<WalletTransaction> = t
            .transactions
            .values()
            .filter(|tx| tx.order_id == Some(order_id))
            .cloned()
            .collect();
        txs.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(txs)
    }

    // -----------------------------------------------------------------------
    // Messages
    // -----------------------------------------------------------------------

    async fn insert_message(&self, message: &Message) -> anyhow::Result<()> {
        let mut t = self.inner.write().await;
        t.messages.insert(message.id, message.clone());
        Ok(())
    }

    async fn get_message(&self, id: Uuid) -> anyhow::Result<Option<Message>> {
        Ok(self.inner.read().await.messages.get(&id).cloned())
    }

    async fn save_message(&self, message: &Message) -> anyhow::Result<()> {
        let mut t = self.inner.write().await;
        let slot = t
            .messages
            .get_mut(&message.id)
            .ok_or_else(|| missing("message", message.id))?;
        *slot = message.clone();
        Ok(())
    }

    async fn list_messages(&self, order_id: Uuid) -> anyhow::Result<Vec<Message>> {
        let t = self.inner.read().await;
        let mut messages: Vec<Message> = t
            .messages
            .values()
            .filter(|m| m.order_id == order_id)
            .cloned()
            .collect();
        messages.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(messages)
    }

    async fn list_pending_messages(&self) -> anyhow::Result<Vec<Message>> {
        let t = self.inner.read().await;
        let mut messages: Vec<Message> = t
            .messages
            .values()
            .filter(|m| m.status == MessageStatus::Pending)
            .cloned()
            .collect();
        messages.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(messages)
    }
}
