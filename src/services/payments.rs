use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::orders::apply_transition;
use super::tracking::TrackingService;
use super::wallet::{CaptureRequest, WalletLedger};
use crate::db::Store;
use crate::errors::WorkflowError;
use crate::models::{Actor, Offer, Order, OrderStatus, Role, TrackingStatus, WalletTransaction};
use crate::payments::{CaptureReceipt, ChargeRequest, PaymentGateway};
use crate::workflow::KeyedLocks;

/// Processor webhook payload reconciling an asynchronous capture.
#[derive(Debug, Clone, Deserialize)]
pub struct CaptureCallback {
    pub order_id: Uuid,
    pub amount: Decimal,
    pub processor_ref: String,
    #[serde(default)]
    pub processor_fee: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct PaymentOutcome {
    pub order: Order,
    pub transaction: WalletTransaction,
}

/// Drives `offer_accepted -> payment_pending -> payment_completed` around the
/// external processor and books the capture in the ledger.
#[derive(Clone)]
pub struct PaymentService {
    store: Arc<dyn Store>,
    locks: KeyedLocks,
    tracking: TrackingService,
    ledger: WalletLedger,
    gateway: Arc<dyn PaymentGateway>,
    timeout: Duration,
}

impl PaymentService {
    pub fn new(
        store: Arc<dyn Store>,
        locks: KeyedLocks,
        tracking: TrackingService,
        ledger: WalletLedger,
        gateway: Arc<dyn PaymentGateway>,
        timeout: Duration,
    ) -> Self {
        Self {
            store,
            locks,
            tracking,
            ledger,
            gateway,
            timeout,
        }
    }

    /// Accepted offer price plus the order's grand total.
    pub fn payable(order: &Order, offer: &Offer) -> Result<Decimal, WorkflowError> {
        order
            .checked_totals()
            .and_then(|totals| offer.price.checked_add(totals.grand_total))
            .ok_or_else(|| {
                WorkflowError::validation(format!(
                    "payable amount for order {} is out of range",
                    order.id
                ))
            })
    }

    /// Charge the requester for an order whose offer was accepted.
    ///
    /// A gateway error or timeout leaves the order in `payment_pending` and
    /// returns a retryable `ExternalPaymentFailure`.
    pub async fn charge(&self, order_id: Uuid, actor: &Actor) -> Result<PaymentOutcome, WorkflowError> {
        let _guard = self.locks.lock(order_id).await;
        let mut order = self.load_order(order_id).await?;

        if !(actor.role == Role::Shopper && actor.id == order.requester_id) {
            return Err(WorkflowError::forbidden("only the requester pays for an order"));
        }

        self.enter_payment_pending(&mut order).await?;
        let offer = self.accepted_offer(&order).await?;
        let amount = Self::payable(&order, &offer)?;

        let request = ChargeRequest {
            order_id,
            payer_id: order.requester_id,
            amount,
            description: format!("{} order {}", order.service_type, order_id),
        };

        let receipt = match tokio::time::timeout(self.timeout, self.gateway.capture(&request)).await {
            Ok(Ok(receipt)) => receipt,
            Ok(Err(e)) => {
                metrics::counter!("payment_failures_total", "reason" => "gateway").increment(1);
                tracing::warn!(order_id = %order_id, amount = %amount, error = %e, "Payment capture failed");
                return Err(WorkflowError::ExternalPaymentFailure(e.to_string()));
            }
            Err(_) => {
                metrics::counter!("payment_failures_total", "reason" => "timeout").increment(1);
                tracing::warn!(
                    order_id = %order_id,
                    amount = %amount,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "Payment capture timed out"
                );
                return Err(WorkflowError::ExternalPaymentFailure(format!(
                    "processor did not answer within {:?}",
                    self.timeout
                )));
            }
        };

        if receipt.amount != amount {
            tracing::error!(
                order_id = %order_id,
                expected = %amount,
                captured = %receipt.amount,
                "Processor captured an unexpected amount"
            );
            return Err(WorkflowError::ExternalPaymentFailure(format!(
                "captured {} but {} was due",
                receipt.amount, amount
            )));
        }

        let transaction = self.complete_payment(&mut order, &offer, receipt).await?;
        Ok(PaymentOutcome { order, transaction })
    }

    /// Idempotent webhook reconciliation. A reference that is already booked
    /// returns the existing entry without touching the order.
    ///
    /// A capture for an order cancelled while the charge was in flight is
    /// still booked, as a `failed` entry owed back to the payer.
    pub async fn capture_callback(&self, callback: CaptureCallback) -> Result<PaymentOutcome, WorkflowError> {
        let order_id = callback.order_id;
        let _guard = self.locks.lock(order_id).await;
        let mut order = self.load_order(order_id).await?;

        if let Some(existing) = self.store.find_transaction_by_ref(&callback.processor_ref).await? {
            if existing.order_id != Some(order_id) {
                return Err(WorkflowError::validation(format!(
                    "processor reference {} belongs to another order",
                    callback.processor_ref
                )));
            }
            tracing::info!(
                order_id = %order_id,
                processor_ref = %callback.processor_ref,
                "Capture callback already applied"
            );
            return Ok(PaymentOutcome {
                order,
                transaction: existing,
            });
        }

        if order.status == OrderStatus::Cancelled {
            return self.book_orphaned_capture(order, callback).await;
        }

        self.enter_payment_pending(&mut order).await?;
        let offer = self.accepted_offer(&order).await?;
        let amount = Self::payable(&order, &offer)?;
        if callback.amount != amount {
            return Err(WorkflowError::validation(format!(
                "captured amount {} does not match payable {}",
                callback.amount, amount
            )));
        }

        let receipt = CaptureReceipt {
            processor_ref: callback.processor_ref,
            amount: callback.amount,
            processor_fee: callback.processor_fee,
        };
        let transaction = self.complete_payment(&mut order, &offer, receipt).await?;
        Ok(PaymentOutcome { order, transaction })
    }

    /// `offer_accepted -> payment_pending`; a retry from `payment_pending`
    /// passes through unchanged.
    async fn enter_payment_pending(&self, order: &mut Order) -> Result<(), WorkflowError> {
        match order.status {
            OrderStatus::PaymentPending => Ok(()),
            OrderStatus::OfferAccepted => {
                apply_transition(order, OrderStatus::PaymentPending, &Actor::system())?;
                self.store.save_order(order).await?;
                self.tracking
                    .record_system_step(order.id, TrackingStatus::PaymentPending)
                    .await?;
                Ok(())
            }
            other => Err(WorkflowError::IllegalTransition {
                entity: "order",
                from: other.to_string(),
                to: OrderStatus::PaymentPending.to_string(),
            }),
        }
    }

    async fn complete_payment(
        &self,
        order: &mut Order,
        offer: &Offer,
        receipt: CaptureReceipt,
    ) -> Result<WalletTransaction, WorkflowError> {
        let capture = CaptureRequest {
            order_id: order.id,
            payer_id: order.requester_id,
            payee_id: offer.shipper_id,
            shipping_type: order.service_type,
            amount: receipt.amount,
            processor_fee: receipt.processor_fee,
            processor_ref: receipt.processor_ref,
        };
        let transaction = self
            .ledger
            .record_capture(capture, self.ledger.commission_rule())
            .await?;

        apply_transition(order, OrderStatus::PaymentCompleted, &Actor::system())?;
        self.store.save_order(order).await?;
        self.tracking
            .record_system_step(order.id, TrackingStatus::PaymentCompleted)
            .await?;

        metrics::counter!("payments_captured_total").increment(1);
        tracing::info!(
            order_id = %order.id,
            tx_id = %transaction.id,
            amount = %transaction.amount,
            "Payment captured"
        );
        Ok(transaction)
    }

    /// Book a capture for a cancelled order as a `failed` entry owed back to
    /// the payer. Caller holds the order lock.
    async fn book_orphaned_capture(
        &self,
        order: Order,
        callback: CaptureCallback,
    ) -> Result<PaymentOutcome, WorkflowError> {
        if order.accepted_offer_id.is_none() {
            return Err(WorkflowError::validation(format!(
                "order {} was cancelled before any offer was accepted",
                order.id
            )));
        }
        let offer = self.accepted_offer(&order).await?;

        let capture = CaptureRequest {
            order_id: order.id,
            payer_id: order.requester_id,
            payee_id: offer.shipper_id,
            shipping_type: order.service_type,
            amount: callback.amount,
            processor_fee: callback.processor_fee,
            processor_ref: callback.processor_ref,
        };
        let booked = self
            .ledger
            .record_capture(capture, self.ledger.commission_rule())
            .await?;
        let transaction = self
            .ledger
            .fail_pending_for_order(order.id)
            .await?
            .into_iter()
            .find(|tx| tx.id == booked.id)
            .unwrap_or(booked);

        metrics::counter!("captures_after_cancel_total").increment(1);
        tracing::error!(
            order_id = %order.id,
            tx_id = %transaction.id,
            amount = %transaction.amount,
            payer = %order.requester_id,
            "Capture arrived for a cancelled order, refund required"
        );
        Ok(PaymentOutcome { order, transaction })
    }

    async fn load_order(&self, order_id: Uuid) -> Result<Order, WorkflowError> {
        self.store
            .get_order(order_id)
            .await?
            .ok_or_else(|| WorkflowError::not_found(format!("order {order_id}")))
    }

    async fn accepted_offer(&self, order: &Order) -> Result<Offer, WorkflowError> {
        let offer_id = order.accepted_offer_id.ok_or_else(|| {
            anyhow::anyhow!("order {} is past bidding without an accepted offer", order.id)
        })?;
        self.store
            .get_offer(offer_id)
            .await?
            .ok_or_else(|| WorkflowError::not_found(format!("offer {offer_id}")))
    }
}
