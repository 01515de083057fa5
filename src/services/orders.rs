use std::sync::Arc;

use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use super::tracking::TrackingService;
use super::wallet::WalletLedger;
use crate::db::Store;
use crate::errors::WorkflowError;
use crate::models::{
    Actor, Catalog, LineItem, Offer, OfferStatus, Order, OrderStatus, Role, Route,
    SelectedService, ServiceType, TrackingStatus,
};
use crate::workflow::{check_amount, KeyedLocks, MAX_QUANTITY};

/// Client payload for a new order. Services are referenced by catalog id.
#[derive(Debug, Clone, Deserialize)]
pub struct NewOrder {
    pub service_type: ServiceType,
    pub route: Route,
    #[serde(default)]
    pub line_items: Vec<LineItem>,
    #[serde(default)]
    pub selected_services: Vec<String>,
}

// ---------------------------------------------------------------------------
// Transition guard
// ---------------------------------------------------------------------------

/// Check the `order.status -> to` edge against the lifecycle table and the
/// actor's role. Shoppers may only act on their own orders.
pub fn check_transition(order: &Order, to: OrderStatus, actor: &Actor) -> Result<(), WorkflowError> {
    let roles = order.status.permitted_roles(to);

    if roles.is_empty() {
        return Err(WorkflowError::IllegalTransition {
            entity: "order",
            from: order.status.to_string(),
            to: to.to_string(),
        });
    }

    if !roles.contains(&actor.role) {
        return Err(WorkflowError::forbidden(format!(
            "{} may not move an order from {} to {}",
            actor.role, order.status, to
        )));
    }

    if actor.role == Role::Shopper && actor.id != order.requester_id {
        return Err(WorkflowError::forbidden("only the requester may change this order"));
    }

    Ok(())
}

/// Validate and apply a lifecycle transition in memory. Callers persist.
pub fn apply_transition(order: &mut Order, to: OrderStatus, actor: &Actor) -> Result<(), WorkflowError> {
    check_transition(order, to, actor)?;

    tracing::info!(
        order_id = %order.id,
        from = %order.status,
        to = %to,
        actor_role = %actor.role,
        "Order transition"
    );

    order.status = to;
    order.touch();
    Ok(())
}

// ---------------------------------------------------------------------------
// Service
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct OrderService {
    store: Arc<dyn Store>,
    catalog: Arc<Catalog>,
    locks: KeyedLocks,
    tracking: TrackingService,
    ledger: WalletLedger,
}

impl OrderService {
    pub fn new(
        store: Arc<dyn Store>,
        catalog: Arc<Catalog>,
        locks: KeyedLocks,
        tracking: TrackingService,
        ledger: WalletLedger,
    ) -> Self {
        Self {
            store,
            catalog,
            locks,
            tracking,
            ledger,
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Create an order in `open` and record the initial tracking step.
    pub async fn create_order(&self, actor: &Actor, input: NewOrder) -> Result<Order, WorkflowError> {
        if !matches!(actor.role, Role::Shopper | Role::Admin) {
            return Err(WorkflowError::forbidden("only shoppers create orders"));
        }

        validate_new_order(&input)?;

        let section = self.catalog.for_service_type(input.service_type);
        for id in &input.selected_services {
            if section.service(id).is_none() {
                return Err(WorkflowError::validation(format!(
                    "unknown service {id:?} for {}",
                    input.service_type
                )));
            }
        }

        // Required services are always attached; optional ones only when chosen.
        let services: Vec<SelectedService> = section
            .services
            .iter()
            .filter(|s| s.required || input.selected_services.contains(&s.id))
            .map(|s| SelectedService {
                id: s.id.clone(),
                name: s.name.clone(),
                price: s.price,
                required: s.required,
            })
            .collect();

        let now = Utc::now();
        let order = Order {
            id: Uuid::new_v4(),
            requester_id: actor.id,
            service_type: input.service_type,
            route: input.route,
            line_items: input.line_items,
            services,
            payment_plans: section.payment_plans.clone(),
            status: OrderStatus::Open,
            accepted_offer_id: None,
            version: 1,
            created_at: now,
            updated_at: now,
        };

        let totals = order
            .checked_totals()
            .ok_or_else(|| WorkflowError::validation("order totals are out of range"))?;

        let _guard = self.locks.lock(order.id).await;
        self.store.insert_order(&order).await?;
        self.tracking
            .record_system_step(order.id, TrackingStatus::Pending)
            .await?;

        metrics::counter!("orders_created_total", "service_type" => order.service_type.as_str())
            .increment(1);
        tracing::info!(
            order_id = %order.id,
            requester = %order.requester_id,
            service_type = %order.service_type,
            grand_total = %totals.grand_total,
            "Order created"
        );

        Ok(order)
    }

    pub async fn get_order(&self, actor: &Actor, id: Uuid) -> Result<Order, WorkflowError> {
        let order = self
            .store
            .get_order(id)
            .await?
            .ok_or_else(|| WorkflowError::not_found(format!("order {id}")))?;

        if !self.can_view(actor, &order).await? {
            // Hidden orders look missing rather than forbidden.
            return Err(WorkflowError::not_found(format!("order {id}")));
        }
        Ok(order)
    }

    /// Role-scoped listing: shoppers see their own orders, shippers see open
    /// orders plus those they bid on, admins see everything.
    pub async fn list_orders(&self, actor: &Actor) -> Result<Vec<Order>, WorkflowError> {
        let orders = self.store.list_orders().await?;

        let visible = match actor.role {
            Role::Admin | Role::System => orders,
            Role::Shopper => orders
                .into_iter()
                .filter(|o| o.requester_id == actor.id)
                .collect(),
            Role::Shipper => {
                let bid_on: Vec<Uuid> = self
                    .store
                    .list_offers_by_shipper(actor.id)
                    .await?
                    .into_iter()
                    .map(|o| o.order_id)
                    .collect();
                orders
                    .into_iter()
                    .filter(|o| o.status == OrderStatus::Open || bid_on.contains(&o.id))
                    .collect()
            }
        };

        Ok(visible)
    }

    async fn can_view(&self, actor: &Actor, order: &Order) -> Result<bool, WorkflowError> {
        Ok(match actor.role {
            Role::Admin | Role::System => true,
            Role::Shopper => order.requester_id == actor.id,
            Role::Shipper => {
                order.status == OrderStatus::Open
                    || self
                        .store
                        .list_offers_for_order(order.id)
                        .await?
                        .iter()
                        .any(|o| o.shipper_id == actor.id)
            }
        })
    }

    /// Client-driven lifecycle change (cancellation, admin delivery override).
    pub async fn transition_status(
        &self,
        order_id: Uuid,
        new_status: OrderStatus,
        actor: &Actor,
    ) -> Result<Order, WorkflowError> {
        let _guard = self.locks.lock(order_id).await;

        let mut order = self
            .store
            .get_order(order_id)
            .await?
            .ok_or_else(|| WorkflowError::not_found(format!("order {order_id}")))?;

        apply_transition(&mut order, new_status, actor)?;

        match new_status {
            OrderStatus::Cancelled => {
                let now = Utc::now();
                let withdrawn: Vec<Offer> = self
                    .store
                    .list_offers_for_order(order_id)
                    .await?
                    .into_iter()
                    .filter(|o| !o.status.is_terminal())
                    .map(|mut o| {
                        o.status = OfferStatus::Cancelled;
                        o.updated_at = now;
                        o
                    })
                    .collect();

                self.store.save_order_with_offers(&order, &withdrawn).await?;
                self.tracking
                    .record_system_step(order_id, TrackingStatus::Cancelled)
                    .await?;

                let voided = self.ledger.fail_pending_for_order(order_id).await?;
                tracing::info!(
                    order_id = %order_id,
                    offers_cancelled = withdrawn.len(),
                    captures_voided = voided.len(),
                    "Order cancelled"
                );
            }
            OrderStatus::Delivered => {
                self.store.save_order(&order).await?;
                self.tracking
                    .record_system_step(order_id, TrackingStatus::Delivered)
                    .await?;
            }
            _ => self.store.save_order(&order).await?,
        }

        Ok(order)
    }

    /// Flip an order out of bidding once `offer_id` has been accepted.
    /// The caller holds the order lock and persists the result together with
    /// the offer updates.
    pub fn close_for_bidding(order: &mut Order, offer_id: Uuid) -> Result<(), WorkflowError> {
        apply_transition(order, OrderStatus::OfferAccepted, &Actor::system())?;
        order.accepted_offer_id = Some(offer_id);
        Ok(())
    }
}

fn validate_new_order(input: &NewOrder) -> Result<(), WorkflowError> {
    if !input.route.origin.is_complete() {
        return Err(WorkflowError::validation(
            "origin needs country, state and city",
        ));
    }
    if !input.route.destination.is_complete() {
        return Err(WorkflowError::validation(
            "destination needs country, state and city",
        ));
    }

    if input.service_type == ServiceType::BuyForMe && input.line_items.is_empty() {
        return Err(WorkflowError::validation(
            "buy_for_me orders need at least one line item",
        ));
    }

    for (idx, item) in input.line_items.iter().enumerate() {
        if item.title.trim().is_empty() {
            return Err(WorkflowError::validation(format!("line item {idx} has no title")));
        }
        if item.quantity == 0 {
            return Err(WorkflowError::validation(format!(
                "line item {idx} has zero quantity"
            )));
        }
        if item.quantity > MAX_QUANTITY {
            return Err(WorkflowError::validation(format!(
                "line item {idx} quantity {} exceeds {MAX_QUANTITY}",
                item.quantity
            )));
        }
        check_amount(&format!("line item {idx} price"), item.unit_price)?;
        check_amount(&format!("line item {idx} weight"), item.unit_weight)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;
    use crate::models::Location;

    fn order_in(status: OrderStatus, requester: Uuid) -> Order {
        let now = Utc::now();
        Order {
            id: Uuid::new_v4(),
            requester_id: requester,
            service_type: ServiceType::ShipForMe,
            route: Route::default(),
            line_items: vec![],
            services: vec![],
            payment_plans: vec![],
            status,
            accepted_offer_id: None,
            version: 1,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn requester_can_cancel_open_order() {
        let shopper = Actor::shopper(Uuid::new_v4());
        let mut order = order_in(OrderStatus::Open, shopper.id);

        apply_transition(&mut order, OrderStatus::Cancelled, &shopper).unwrap();
        assert_eq!(order.status, OrderStatus::Cancelled);
        assert_eq!(order.version, 2);
    }

    #[test]
    fn other_shopper_is_forbidden() {
        let order = order_in(OrderStatus::Open, Uuid::new_v4());
        let stranger = Actor::shopper(Uuid::new_v4());

        let err = check_transition(&order, OrderStatus::Cancelled, &stranger).unwrap_err();
        assert!(matches!(err, WorkflowError::Forbidden(_)));
    }

    #[test]
    fn clients_cannot_drive_system_edges() {
        let shopper = Actor::shopper(Uuid::new_v4());
        let order = order_in(OrderStatus::Open, shopper.id);

        let err = check_transition(&order, OrderStatus::OfferAccepted, &shopper).unwrap_err();
        assert!(matches!(err, WorkflowError::Forbidden(_)));

        let err = check_transition(&order, OrderStatus::Delivered, &Actor::system()).unwrap_err();
        assert!(matches!(err, WorkflowError::IllegalTransition { .. }));
    }

    #[test]
    fn paid_orders_only_cancel_by_admin() {
        let shopper = Actor::shopper(Uuid::new_v4());
        let order = order_in(OrderStatus::PaymentCompleted, shopper.id);

        assert!(check_transition(&order, OrderStatus::Cancelled, &shopper).is_err());
        assert!(check_transition(&order, OrderStatus::Cancelled, &Actor::admin(Uuid::new_v4())).is_ok());
    }

    #[test]
    fn close_for_bidding_records_offer() {
        let mut order = order_in(OrderStatus::Open, Uuid::new_v4());
        let offer_id = Uuid::new_v4();

        OrderService::close_for_bidding(&mut order, offer_id).unwrap();
        assert_eq!(order.status, OrderStatus::OfferAccepted);
        assert_eq!(order.accepted_offer_id, Some(offer_id));

        let err = OrderService::close_for_bidding(&mut order, Uuid::new_v4()).unwrap_err();
        assert!(matches!(err, WorkflowError::IllegalTransition { .. }));
    }

    #[test]
    fn validation_rules() {
        let leg = Location {
            country: Some("US".into()),
            state: Some("CA".into()),
            city: Some("LA".into()),
        };
        let mut input = NewOrder {
            service_type: ServiceType::BuyForMe,
            route: Route {
                origin: leg.clone(),
                destination: leg,
            },
            line_items: vec![],
            selected_services: vec![],
        };
        assert!(matches!(
            validate_new_order(&input),
            Err(WorkflowError::Validation(_))
        ));

        input.service_type = ServiceType::ShipForMe;
        assert!(validate_new_order(&input).is_ok());

        input.route.origin.state = None;
        assert!(validate_new_order(&input).is_err());
    }

    #[test]
    fn line_item_bounds() {
        let leg = Location {
            country: Some("US".into()),
            state: Some("CA".into()),
            city: Some("LA".into()),
        };
        let item = LineItem {
            title: "Camera".into(),
            unit_price: Decimal::from(100),
            unit_weight: Decimal::ONE,
            quantity: 1,
        };
        let mut input = NewOrder {
            service_type: ServiceType::BuyForMe,
            route: Route {
                origin: leg.clone(),
                destination: leg,
            },
            line_items: vec![item.clone()],
            selected_services: vec![],
        };
        assert!(validate_new_order(&input).is_ok());

        input.line_items[0].unit_price = Decimal::MAX;
        assert!(matches!(validate_new_order(&input), Err(WorkflowError::Validation(_))));

        input.line_items[0] = LineItem {
            quantity: MAX_QUANTITY + 1,
            ..item
        };
        assert!(matches!(validate_new_order(&input), Err(WorkflowError::Validation(_))));
    }
}
