use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

use super::orders::apply_transition;
use crate::db::Store;
use crate::errors::WorkflowError;
use crate::models::{
    Actor, OrderStatus, OrderStatusStep, Role, StepDetails, StepState, TimelineEntry,
    TrackingStatus,
};
use crate::workflow::KeyedLocks;

/// Outcome of an append. Re-sending the current step is not an error.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", content = "step", rename_all = "snake_case")]
pub enum AppendOutcome {
    Appended(OrderStatusStep),
    Unchanged(OrderStatusStep),
}

impl AppendOutcome {
    pub fn step(&self) -> &OrderStatusStep {
        match self {
            AppendOutcome::Appended(s) | AppendOutcome::Unchanged(s) => s,
        }
    }
}

#[derive(Clone)]
pub struct TrackingService {
    store: Arc<dyn Store>,
    locks: KeyedLocks,
}

impl TrackingService {
    pub fn new(store: Arc<dyn Store>, locks: KeyedLocks) -> Self {
        Self { store, locks }
    }

    /// Manual status update from the accepted shipper or an admin.
    ///
    /// `status_id` must be the immediate successor of the latest completed
    /// step; re-sending the latest step is a no-op. Reaching `received` puts
    /// the order in transit, reaching `delivered` completes it.
    pub async fn append_step(
        &self,
        order_id: Uuid,
        actor: &Actor,
        status_id: i32,
        details: StepDetails,
    ) -> Result<AppendOutcome, WorkflowError> {
        let status = TrackingStatus::from_id(status_id)
            .ok_or_else(|| WorkflowError::validation(format!("unknown status id {status_id}")))?;

        let _guard = self.locks.lock(order_id).await;

        let mut order = self
            .store
            .get_order(order_id)
            .await?
            .ok_or_else(|| WorkflowError::not_found(format!("order {order_id}")))?;

        match actor.role {
            Role::Admin | Role::System => {}
            Role::Shipper => {
                let accepted_shipper = match order.accepted_offer_id {
                    Some(offer_id) => self.store.get_offer(offer_id).await?.map(|o| o.shipper_id),
                    None => None,
                };
                if accepted_shipper != Some(actor.id) {
                    return Err(WorkflowError::forbidden(
                        "only the accepted shipper may update tracking",
                    ));
                }
            }
            Role::Shopper => {
                return Err(WorkflowError::forbidden("shoppers cannot update tracking"));
            }
        }

        let steps = self.store.list_steps(order_id).await?;
        let current = latest_completed(&steps);

        if let Some(current) = current {
            if current.status == status {
                tracing::debug!(order_id = %order_id, status = %status, "Tracking step already current");
                return Ok(AppendOutcome::Unchanged(current.clone()));
            }
        }

        if status.is_system_derived() {
            return Err(WorkflowError::validation(format!(
                "{} is set by the workflow and cannot be selected",
                status.name()
            )));
        }

        ensure_successor(current.map(|s| s.status), status)?;

        // Order side effect first so a refused transition leaves no step behind.
        let order_effect = match status {
            TrackingStatus::Received => Some(OrderStatus::InTransit),
            TrackingStatus::Delivered => Some(OrderStatus::Delivered),
            _ => None,
        };
        if let Some(to) = order_effect {
            apply_transition(&mut order, to, &Actor::system())?;
        }

        let step = new_step(order_id, status, actor.id, details);
        self.store.insert_step(&step).await?;
        if order_effect.is_some() {
            self.store.save_order(&order).await?;
        }

        metrics::counter!("tracking_steps_total").increment(1);
        tracing::info!(
            order_id = %order_id,
            status = %status,
            tracking_number = ?step.tracking_number,
            "Tracking step appended"
        );

        Ok(AppendOutcome::Appended(step))
    }

    /// Record a workflow-derived step. Caller holds the order lock.
    /// Idempotent; `cancelled` may follow any non-terminal step.
    pub(crate) async fn record_system_step(
        &self,
        order_id: Uuid,
        status: TrackingStatus,
    ) -> Result<OrderStatusStep, WorkflowError> {
        let steps = self.store.list_steps(order_id).await?;
        let current = latest_completed(&steps);

        if let Some(current) = current {
            if current.status == status {
                return Ok(current.clone());
            }
        }

        if status == TrackingStatus::Cancelled {
            if let Some(current) = current.filter(|c| c.status.is_terminal()) {
                return Err(WorkflowError::IllegalTransition {
                    entity: "tracking",
                    from: current.status.to_string(),
                    to: status.to_string(),
                });
            }
        } else if status == TrackingStatus::Delivered {
            // Admin delivery override may skip the intermediate manual steps.
            if let Some(current) = current.filter(|c| c.status.is_terminal()) {
                return Err(WorkflowError::IllegalTransition {
                    entity: "tracking",
                    from: current.status.to_string(),
                    to: status.to_string(),
                });
            }
        } else {
            ensure_successor(current.map(|s| s.status), status)?;
        }

        let step = new_step(order_id, status, Actor::system().id, StepDetails::default());
        self.store.insert_step(&step).await?;
        tracing::debug!(order_id = %order_id, status = %status, "System tracking step recorded");
        Ok(step)
    }

    pub async fn current_step(&self, order_id: Uuid) -> Result<Option<OrderStatusStep>, WorkflowError> {
        let steps = self.store.list_steps(order_id).await?;
        Ok(latest_completed(&steps).cloned())
    }

    /// Full sequence annotated with done/current/upcoming for rendering.
    pub async fn timeline(&self, order_id: Uuid) -> Result<Vec<TimelineEntry>, WorkflowError> {
        let steps = self.store.list_steps(order_id).await?;
        let current = latest_completed(&steps).map(|s| s.status);

        let mut statuses: Vec<TrackingStatus> = TrackingStatus::SEQUENCE.to_vec();
        if current == Some(TrackingStatus::Cancelled) {
            statuses.push(TrackingStatus::Cancelled);
        }

        Ok(statuses
            .into_iter()
            .map(|status| {
                let step = steps.iter().find(|s| s.status == status && s.completed).cloned();
                let state = if Some(status) == current {
                    StepState::Current
                } else if step.is_some() {
                    StepState::Done
                } else {
                    StepState::Upcoming
                };
                TimelineEntry {
                    status_id: status.id(),
                    status_name: status.name(),
                    state,
                    manual: !status.is_system_derived(),
                    step,
                }
            })
            .collect())
    }
}

fn latest_completed(steps: &[OrderStatusStep]) -> Option<&OrderStatusStep> {
    steps.iter().rev().find(|s| s.completed)
}

fn ensure_successor(
    current: Option<TrackingStatus>,
    attempted: TrackingStatus,
) -> Result<(), WorkflowError> {
    let expected = match current {
        None => TrackingStatus::Pending,
        Some(current) => current.successor().ok_or_else(|| WorkflowError::IllegalTransition {
            entity: "tracking",
            from: current.to_string(),
            to: attempted.to_string(),
        })?,
    };

    if attempted != expected {
        return Err(WorkflowError::SkippedStep {
            expected,
            attempted,
        });
    }
    Ok(())
}

fn new_step(
    order_id: Uuid,
    status: TrackingStatus,
    recorded_by: Uuid,
    details: StepDetails,
) -> OrderStatusStep {
    OrderStatusStep {
        id: Uuid::new_v4(),
        order_id,
        status,
        status_id: status.id(),
        status_name: status.name().to_string(),
        completed: true,
        tracking_number: details.tracking_number.filter(|s| !s.trim().is_empty()),
        remarks: details.remarks.filter(|s| !s.trim().is_empty()),
        files: details.files,
        recorded_by,
        completed_at: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn successor_rules() {
        assert!(ensure_successor(None, TrackingStatus::Pending).is_ok());
        assert!(ensure_successor(Some(TrackingStatus::PaymentCompleted), TrackingStatus::Received).is_ok());

        match ensure_successor(Some(TrackingStatus::PaymentCompleted), TrackingStatus::Shipped) {
            Err(WorkflowError::SkippedStep { expected, attempted }) => {
                assert_eq!(expected, TrackingStatus::Received);
                assert_eq!(attempted, TrackingStatus::Shipped);
            }
            other => panic!("expected SkippedStep, got {other:?}"),
        }

        // Going backwards is also out of sequence.
        assert!(matches!(
            ensure_successor(Some(TrackingStatus::Shipped), TrackingStatus::Received),
            Err(WorkflowError::SkippedStep { .. })
        ));

        assert!(matches!(
            ensure_successor(Some(TrackingStatus::Delivered), TrackingStatus::Received),
            Err(WorkflowError::IllegalTransition { .. })
        ));
    }
}
