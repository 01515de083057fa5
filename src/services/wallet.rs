use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;

use crate::db::Store;
use crate::errors::WorkflowError;
use crate::models::{
    Actor, BalanceDelta, LedgerMovement, LedgerPools, Role, ServiceType, TransactionStatus,
    TransactionType, WalletSummary, WalletTransaction,
};
use crate::workflow::{check_amount, Adjustment, KeyedLocks};

/// A processor capture to be booked as an escrowed credit for the payee.
#[derive(Debug, Clone)]
pub struct CaptureRequest {
    pub order_id: Uuid,
    pub payer_id: Uuid,
    pub payee_id: Uuid,
    pub shipping_type: ServiceType,
    pub amount: Decimal,
    pub processor_fee: Decimal,
    pub processor_ref: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TransactionFilter {
    pub user_id: Option<Uuid>,
    pub order_id: Option<Uuid>,
    pub status: Option<TransactionStatus>,
}

/// Append-mostly ledger. Entries are never edited apart from their status;
/// balances are derived from `completed` rows.
#[derive(Clone)]
pub struct WalletLedger {
    store: Arc<dyn Store>,
    locks: KeyedLocks,
    commission: Adjustment,
}

impl WalletLedger {
    pub fn new(store: Arc<dyn Store>, locks: KeyedLocks, commission: Adjustment) -> Self {
        Self {
            store,
            locks,
            commission,
        }
    }

    pub fn commission_rule(&self) -> &Adjustment {
        &self.commission
    }

    /// Book a capture as a `pending` credit. A repeated `processor_ref`
    /// returns the existing entry. Caller holds the order lock.
    pub async fn record_capture(
        &self,
        req: CaptureRequest,
        commission_rule: &Adjustment,
    ) -> Result<WalletTransaction, WorkflowError> {
        if req.processor_ref.trim().is_empty() {
            return Err(WorkflowError::validation("processor reference is required"));
        }
        if req.amount <= Decimal::ZERO {
            return Err(WorkflowError::validation("capture amount must be positive"));
        }
        check_amount("capture amount", req.amount)?;
        if req.processor_fee < Decimal::ZERO {
            return Err(WorkflowError::validation("processor fee cannot be negative"));
        }

        let commission = commission_rule.apply(req.amount);
        if commission < Decimal::ZERO {
            return Err(WorkflowError::validation("commission cannot be negative"));
        }
        if req.processor_fee + commission > req.amount {
            return Err(WorkflowError::validation(format!(
                "fee {} plus commission {} exceeds amount {}",
                req.processor_fee, commission, req.amount
            )));
        }

        if let Some(existing) = self.store.find_transaction_by_ref(&req.processor_ref).await? {
            tracing::info!(
                tx_id = %existing.id,
                processor_ref = %req.processor_ref,
                "Capture already recorded"
            );
            return Ok(existing);
        }

        let now = Utc::now();
        let tx = WalletTransaction {
            id: Uuid::new_v4(),
            order_id: Some(req.order_id),
            user_id: req.payee_id,
            payer_id: Some(req.payer_id),
            shipping_type: Some(req.shipping_type),
            transaction_type: TransactionType::Credit,
            amount: req.amount,
            processor_fee: req.processor_fee,
            commission_amount: commission,
            status: TransactionStatus::Pending,
            description: format!("Payment for order {}", req.order_id),
            processor_ref: Some(req.processor_ref),
            created_at: now,
            updated_at: now,
        };
        self.store.insert_transaction(&tx).await?;

        metrics::counter!("ledger_captures_total").increment(1);
        tracing::info!(
            tx_id = %tx.id,
            order_id = %req.order_id,
            payee = %tx.user_id,
            amount = %tx.amount,
            fee = %tx.processor_fee,
            commission = %tx.commission_amount,
            "Capture recorded"
        );

        Ok(tx)
    }

    /// Admin release of an escrowed entry to `completed`. A payout is
    /// re-checked against the wallet's balance at release time, so a credit
    /// reversed after the payout was queued leaves it unreleasable.
    pub async fn release(&self, tx_id: Uuid, actor: &Actor) -> Result<LedgerMovement, WorkflowError> {
        require_admin(actor, "release funds")?;
        let tx = self.move_status(tx_id, TransactionStatus::Completed).await?;
        let delta = BalanceDelta {
            user_id: tx.user_id,
            amount: tx.balance_effect(),
        };

        metrics::counter!("ledger_releases_total").increment(1);
        tracing::info!(tx_id = %tx_id, user_id = %delta.user_id, delta = %delta.amount, "Funds released");
        Ok(LedgerMovement {
            transaction: tx,
            delta,
        })
    }

    /// Admin reversal of a completed entry. Always the full amount.
    pub async fn reverse(&self, tx_id: Uuid, actor: &Actor) -> Result<LedgerMovement, WorkflowError> {
        require_admin(actor, "reverse funds")?;
        let tx = self.move_status(tx_id, TransactionStatus::Reversed).await?;
        let delta = BalanceDelta {
            user_id: tx.user_id,
            amount: -tx.balance_effect(),
        };

        metrics::counter!("ledger_reversals_total").increment(1);
        tracing::warn!(tx_id = %tx_id, user_id = %delta.user_id, delta = %delta.amount, "Funds reversed");
        Ok(LedgerMovement {
            transaction: tx,
            delta,
        })
    }

    pub async fn mark_failed(&self, tx_id: Uuid, actor: &Actor) -> Result<WalletTransaction, WorkflowError> {
        require_admin(actor, "fail transactions")?;
        let tx = self.move_status(tx_id, TransactionStatus::Failed).await?;
        tracing::info!(tx_id = %tx_id, "Transaction marked failed");
        Ok(tx)
    }

    /// Void every still-pending entry of a cancelled order.
    pub(crate) async fn fail_pending_for_order(
        &self,
        order_id: Uuid,
    ) -> Result<Vec<WalletTransaction>, WorkflowError> {
        let pending: Vec<Uuid> = self
            .store
            .list_transactions_for_order(order_id)
            .await?
            .into_iter()
            .filter(|tx| tx.status == TransactionStatus::Pending)
            .map(|tx| tx.id)
            .collect();

        let mut failed = Vec::with_capacity(pending.len());
        for tx_id in pending {
            failed.push(self.move_status(tx_id, TransactionStatus::Failed).await?);
        }
        Ok(failed)
    }

    /// Queue a withdrawal from the actor's own wallet as a `pending` debit.
    pub async fn request_payout(&self, actor: &Actor, amount: Decimal) -> Result<WalletTransaction, WorkflowError> {
        if actor.role == Role::System {
            return Err(WorkflowError::forbidden("system actor has no wallet"));
        }
        if amount <= Decimal::ZERO {
            return Err(WorkflowError::validation("payout amount must be positive"));
        }
        check_amount("payout amount", amount)?;

        let _guard = self.locks.lock(actor.id).await;

        let entries = self.store.list_transactions(Some(actor.id)).await?;
        let summary = summarize_entries(actor.id, &entries);
        let queued: Decimal = entries
            .iter()
            .filter(|tx| {
                tx.transaction_type == TransactionType::Debit
                    && tx.status == TransactionStatus::Pending
            })
            .map(|tx| tx.amount)
            .sum();

        let spendable = summary.available_balance - queued;
        if amount > spendable {
            return Err(WorkflowError::InsufficientFunds {
                user_id: actor.id,
                requested: amount,
                available: spendable,
            });
        }

        let now = Utc::now();
        let tx = WalletTransaction {
            id: Uuid::new_v4(),
            order_id: None,
            user_id: actor.id,
            payer_id: None,
            shipping_type: None,
            transaction_type: TransactionType::Debit,
            amount,
            processor_fee: Decimal::ZERO,
            commission_amount: Decimal::ZERO,
            status: TransactionStatus::Pending,
            description: "Payout request".to_string(),
            processor_ref: None,
            created_at: now,
            updated_at: now,
        };
        self.store.insert_transaction(&tx).await?;

        tracing::info!(tx_id = %tx.id, user_id = %actor.id, amount = %amount, "Payout requested");
        Ok(tx)
    }

    pub async fn summarize(&self, user_id: Uuid) -> Result<WalletSummary, WorkflowError> {
        let entries = self.store.list_transactions(Some(user_id)).await?;
        Ok(summarize_entries(user_id, &entries))
    }

    pub async fn pools(&self) -> Result<LedgerPools, WorkflowError> {
        let entries = self.store.list_transactions(None).await?;
        Ok(pool_entries(&entries))
    }

    pub async fn list_transactions(
        &self,
        actor: &Actor,
        filter: TransactionFilter,
    ) -> Result<Vec<WalletTransaction>, WorkflowError> {
        let user_id = if actor.is_admin() {
            filter.user_id
        } else {
            Some(actor.id)
        };

        let entries = self.store.list_transactions(user_id).await?;
        Ok(entries
            .into_iter()
            .filter(|tx| filter.order_id.map_or(true, |o| tx.order_id == Some(o)))
            .filter(|tx| filter.status.map_or(true, |s| tx.status == s))
            .collect())
    }

    /// Every status change locks the owning wallet, then the entry, so
    /// balance checks and payouts for one user never interleave.
    async fn move_status(
        &self,
        tx_id: Uuid,
        to: TransactionStatus,
    ) -> Result<WalletTransaction, WorkflowError> {
        let owner = self.load_transaction(tx_id).await?.user_id;
        let _wallet = self.locks.lock(owner).await;
        let _entry = self.locks.lock(tx_id).await;

        let tx = self.load_transaction(tx_id).await?;
        if !tx.status.can_transition(to) {
            return Err(WorkflowError::InvalidLedgerTransition {
                tx_id,
                from: tx.status,
                to,
            });
        }

        if to == TransactionStatus::Completed && tx.transaction_type == TransactionType::Debit {
            let entries = self.store.list_transactions(Some(owner)).await?;
            let available = summarize_entries(owner, &entries).available_balance;
            if tx.amount > available {
                tracing::warn!(
                    tx_id = %tx_id,
                    user_id = %owner,
                    amount = %tx.amount,
                    available = %available,
                    "Payout no longer funded"
                );
                return Err(WorkflowError::InsufficientFunds {
                    user_id: owner,
                    requested: tx.amount,
                    available,
                });
            }
        }

        Ok(self.store.update_transaction_status(tx_id, to).await?)
    }

    async fn load_transaction(&self, tx_id: Uuid) -> Result<WalletTransaction, WorkflowError> {
        self.store
            .get_transaction(tx_id)
            .await?
            .ok_or_else(|| WorkflowError::not_found(format!("transaction {tx_id}")))
    }
}

fn require_admin(actor: &Actor, action: &str) -> Result<(), WorkflowError> {
    if actor.is_admin() {
        Ok(())
    } else {
        Err(WorkflowError::forbidden(format!("only admins may {action}")))
    }
}

fn summarize_entries(user_id: Uuid, entries: &[WalletTransaction]) -> WalletSummary {
    let mut summary = WalletSummary {
        user_id,
        ..Default::default()
    };

    for tx in entries.iter().filter(|tx| tx.user_id == user_id) {
        match (tx.transaction_type, tx.status) {
            (TransactionType::Credit, TransactionStatus::Completed) => {
                summary.credits += tx.balance_effect();
            }
            (TransactionType::Credit, TransactionStatus::Pending) => {
                summary.pending_credits += tx.balance_effect();
            }
            (TransactionType::Debit, TransactionStatus::Completed) => {
                summary.debits += tx.amount;
            }
            _ => {}
        }
    }

    summary.available_balance = summary.credits - summary.debits;
    summary
}

fn pool_entries(entries: &[WalletTransaction]) -> LedgerPools {
    entries
        .iter()
        .filter(|tx| {
            tx.transaction_type == TransactionType::Credit
                && tx.status == TransactionStatus::Completed
        })
        .fold(LedgerPools::default(), |mut pools, tx| {
            pools.master += tx.amount;
            pools.commission += tx.commission_amount;
            pools.processor_fees += tx.processor_fee;
            pools
        })
}
