use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use uuid::Uuid;

use super::orders::OrderService;
use super::tracking::TrackingService;
use crate::db::Store;
use crate::errors::WorkflowError;
use crate::models::{
    Actor, Offer, OfferDecision, OfferResponse, OfferStatus, Order, OrderStatus, Role,
    TrackingStatus,
};
use crate::workflow::{check_amount, KeyedLocks};

/// Bidding and negotiation between shippers and the requesting shopper.
///
/// Every mutation runs under the order's lock, so "at most one accepted
/// offer per order" holds for concurrent deciders: the first committer wins
/// and later attempts observe `AlreadyAccepted`.
#[derive(Clone)]
pub struct OfferService {
    store: Arc<dyn Store>,
    locks: KeyedLocks,
    tracking: TrackingService,
}

impl OfferService {
    pub fn new(store: Arc<dyn Store>, locks: KeyedLocks, tracking: TrackingService) -> Self {
        Self {
            store,
            locks,
            tracking,
        }
    }

    /// Place (or re-price) a shipper's bid on an open order.
    pub async fn submit_offer(
        &self,
        order_id: Uuid,
        shipper: &Actor,
        price: Decimal,
    ) -> Result<Offer, WorkflowError> {
        if shipper.role != Role::Shipper {
            return Err(WorkflowError::forbidden("only shippers submit offers"));
        }
        if price <= Decimal::ZERO {
            return Err(WorkflowError::validation("offer price must be positive"));
        }
        check_amount("offer price", price)?;

        let _guard = self.locks.lock(order_id).await;
        let order = self.load_order(order_id).await?;

        if order.requester_id == shipper.id {
            return Err(WorkflowError::forbidden("cannot bid on your own order"));
        }
        ensure_open(&order)?;

        let offers = self.store.list_offers_for_order(order_id).await?;
        let live = offers
            .iter()
            .find(|o| o.shipper_id == shipper.id && !o.status.is_terminal());

        let offer = match live {
            Some(existing) => {
                let mut offer = existing.clone();
                offer.price = price;
                offer.status = OfferStatus::Pending;
                offer.updated_at = Utc::now();
                self.store.save_offer(&offer).await?;
                tracing::info!(
                    offer_id = %offer.id,
                    order_id = %order_id,
                    price = %price,
                    "Offer re-priced"
                );
                offer
            }
            None => {
                let now = Utc::now();
                let offer = Offer {
                    id: Uuid::new_v4(),
                    order_id,
                    shipper_id: shipper.id,
                    price,
                    status: OfferStatus::Pending,
                    created_at: now,
                    updated_at: now,
                };
                self.store.insert_offer(&offer).await?;
                self.tracking
                    .record_system_step(order_id, TrackingStatus::OfferPlaced)
                    .await?;

                metrics::counter!("offers_submitted_total").increment(1);
                tracing::info!(
                    offer_id = %offer.id,
                    order_id = %order_id,
                    shipper = %shipper.id,
                    price = %price,
                    "Offer submitted"
                );
                offer
            }
        };

        Ok(offer)
    }

    /// Shopper counter-proposal or cancellation before a decision.
    /// The bidding shipper may also withdraw their own offer.
    pub async fn respond_to_offer(
        &self,
        order_id: Uuid,
        offer_id: Uuid,
        actor: &Actor,
        response: OfferResponse,
    ) -> Result<Offer, WorkflowError> {
        let _guard = self.locks.lock(order_id).await;
        let order = self.load_order(order_id).await?;
        let mut offer = self.load_offer(offer_id).await?;

        if offer.order_id != order_id {
            return Err(WorkflowError::not_found(format!("offer {offer_id}")));
        }

        let is_requester = actor.id == order.requester_id && actor.role == Role::Shopper;
        let is_bidder = actor.id == offer.shipper_id && actor.role == Role::Shipper;
        let allowed = match response {
            OfferResponse::Cancel => is_requester || is_bidder || actor.is_admin(),
            OfferResponse::ProposePrice { .. } => is_requester || actor.is_admin(),
        };
        if !allowed {
            return Err(WorkflowError::forbidden("not a party to this offer"));
        }

        ensure_open(&order)?;

        let to = match response {
            OfferResponse::Cancel => OfferStatus::Cancelled,
            OfferResponse::ProposePrice { price } => {
                if price <= Decimal::ZERO {
                    return Err(WorkflowError::validation("proposed price must be positive"));
                }
                check_amount("proposed price", price)?;
                OfferStatus::InProgress
            }
        };

        // Re-proposing on an offer already under negotiation only moves the price.
        let same_state = offer.status == OfferStatus::InProgress && to == OfferStatus::InProgress;
        if !same_state && !offer.status.can_transition(to) {
            return Err(illegal_offer_transition(&offer, to));
        }

        if let OfferResponse::ProposePrice { price } = response {
            offer.price = price;
        }
        offer.status = to;
        offer.updated_at = Utc::now();
        self.store.save_offer(&offer).await?;

        tracing::info!(
            offer_id = %offer.id,
            order_id = %order_id,
            status = %offer.status,
            price = %offer.price,
            "Offer response recorded"
        );
        Ok(offer)
    }

    /// Accept or reject a bid. Acceptance ignores every other live bid and
    /// closes the order for bidding in one write.
    pub async fn decide_offer(
        &self,
        offer_id: Uuid,
        actor: &Actor,
        decision: OfferDecision,
    ) -> Result<Offer, WorkflowError> {
        let order_id = self.load_offer(offer_id).await?.order_id;

        let _guard = self.locks.lock(order_id).await;
        // Re-read under the lock.
        let mut offer = self.load_offer(offer_id).await?;
        let mut order = self.load_order(order_id).await?;

        let is_requester = actor.role == Role::Shopper && actor.id == order.requester_id;
        if !is_requester && !actor.is_admin() {
            return Err(WorkflowError::forbidden("only the requester decides offers"));
        }

        let siblings = self.store.list_offers_for_order(order_id).await?;
        if siblings.iter().any(|o| o.status == OfferStatus::Accepted) {
            return Err(WorkflowError::AlreadyAccepted { order_id });
        }
        if order.status != OrderStatus::Open {
            return Err(match order.accepted_offer_id {
                Some(_) => WorkflowError::AlreadyAccepted { order_id },
                None => WorkflowError::OrderClosed {
                    order_id,
                    status: order.status,
                },
            });
        }

        let to = match decision {
            OfferDecision::Accepted => OfferStatus::Accepted,
            OfferDecision::Rejected => OfferStatus::Rejected,
        };
        if !offer.status.can_transition(to) {
            return Err(illegal_offer_transition(&offer, to));
        }

        let now = Utc::now();
        offer.status = to;
        offer.updated_at = now;

        match decision {
            OfferDecision::Rejected => {
                self.store.save_offer(&offer).await?;
                tracing::info!(offer_id = %offer_id, order_id = %order_id, "Offer rejected");
            }
            OfferDecision::Accepted => {
                let mut changed: Vec<Offer> = siblings
                    .into_iter()
                    .filter(|o| o.id != offer_id && !o.status.is_terminal())
                    .map(|mut o| {
                        o.status = OfferStatus::Ignored;
                        o.updated_at = now;
                        o
                    })
                    .collect();
                let ignored = changed.len();
                changed.push(offer.clone());

                OrderService::close_for_bidding(&mut order, offer_id)?;
                self.store.save_order_with_offers(&order, &changed).await?;
                self.tracking
                    .record_system_step(order_id, TrackingStatus::OfferAccepted)
                    .await?;

                metrics::counter!("offers_accepted_total").increment(1);
                tracing::info!(
                    offer_id = %offer_id,
                    order_id = %order_id,
                    shipper = %offer.shipper_id,
                    price = %offer.price,
                    ignored,
                    "Offer accepted"
                );
            }
        }

        Ok(offer)
    }

    /// Requester and admins see every bid; a shipper sees only their own.
    pub async fn list_offers(&self, actor: &Actor, order_id: Uuid) -> Result<Vec<Offer>, WorkflowError> {
        let order = self.load_order(order_id).await?;
        let offers = self.store.list_offers_for_order(order_id).await?;

        match actor.role {
            Role::Admin | Role::System => Ok(offers),
            Role::Shopper if actor.id == order.requester_id => Ok(offers),
            Role::Shopper => Err(WorkflowError::not_found(format!("order {order_id}"))),
            Role::Shipper => {
                let own: Vec<Offer> = offers
                    .into_iter()
                    .filter(|o| o.shipper_id == actor.id)
                    .collect();
                // Closed orders are only visible to shippers that bid on them.
                if own.is_empty() && order.status != OrderStatus::Open {
                    return Err(WorkflowError::not_found(format!("order {order_id}")));
                }
                Ok(own)
            }
        }
    }

    async fn load_order(&self, order_id: Uuid) -> Result<Order, WorkflowError> {
        self.store
            .get_order(order_id)
            .await?
            .ok_or_else(|| WorkflowError::not_found(format!("order {order_id}")))
    }

    async fn load_offer(&self, offer_id: Uuid) -> Result<Offer, WorkflowError> {
        self.store
            .get_offer(offer_id)
            .await?
            .ok_or_else(|| WorkflowError::not_found(format!("offer {offer_id}")))
    }
}

fn ensure_open(order: &Order) -> Result<(), WorkflowError> {
    if order.status == OrderStatus::Open {
        Ok(())
    } else {
        Err(WorkflowError::OrderClosed {
            order_id: order.id,
            status: order.status,
        })
    }
}

fn illegal_offer_transition(offer: &Offer, to: OfferStatus) -> WorkflowError {
    WorkflowError::IllegalTransition {
        entity: "offer",
        from: offer.status.to_string(),
        to: to.to_string(),
    }
}
