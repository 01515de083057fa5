use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::db::Store;
use crate::errors::WorkflowError;
use crate::models::{Actor, Attachment, Message, MessageStatus, ModerationDecision, Order, Role};
use crate::workflow::KeyedLocks;

#[derive(Debug, Clone, Deserialize)]
pub struct NewMessage {
    pub receiver_id: Uuid,
    pub text: Option<String>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

/// Order-scoped chat. Messages with attachments wait for admin approval
/// before the receiver can see them.
#[derive(Clone)]
pub struct MessageService {
    store: Arc<dyn Store>,
    locks: KeyedLocks,
}

impl MessageService {
    pub fn new(store: Arc<dyn Store>, locks: KeyedLocks) -> Self {
        Self { store, locks }
    }

    pub async fn send(
        &self,
        order_id: Uuid,
        sender: &Actor,
        input: NewMessage,
    ) -> Result<Message, WorkflowError> {
        let text = input
            .text
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());

        if text.is_none() && input.attachments.is_empty() {
            return Err(WorkflowError::validation(
                "message needs text or at least one attachment",
            ));
        }
        if let Some(bad) = input.attachments.iter().find(|a| !a.has_allowed_type()) {
            return Err(WorkflowError::validation(format!(
                "attachment type {:?} is not allowed",
                bad.mime_type
            )));
        }
        if input.attachments.iter().any(|a| a.file_path.trim().is_empty()) {
            return Err(WorkflowError::validation("attachment path is empty"));
        }
        if sender.id == input.receiver_id {
            return Err(WorkflowError::validation("cannot message yourself"));
        }

        let order = self.load_order(order_id).await?;
        let parties = self.parties(&order).await?;

        let from = parties.sender(sender);
        if from == Party::Outsider {
            return Err(WorkflowError::forbidden("sender is not part of this order"));
        }
        let to = parties.receiver(input.receiver_id);
        if to == Party::Outsider {
            return Err(WorkflowError::validation("receiver is not part of this order"));
        }
        if from == Party::Bidder && to == Party::Bidder {
            return Err(WorkflowError::forbidden(
                "shippers cannot message each other about an order",
            ));
        }

        let status = if input.attachments.is_empty() {
            MessageStatus::Approved
        } else {
            MessageStatus::Pending
        };

        let message = Message {
            id: Uuid::new_v4(),
            order_id,
            sender_id: sender.id,
            sender_role: sender.role,
            receiver_id: input.receiver_id,
            text,
            attachments: input.attachments,
            status,
            moderated_by: None,
            moderated_at: None,
            created_at: Utc::now(),
        };
        self.store.insert_message(&message).await?;

        metrics::counter!("messages_sent_total", "status" => status.as_str()).increment(1);
        tracing::info!(
            message_id = %message.id,
            order_id = %order_id,
            sender = %sender.id,
            attachments = message.attachments.len(),
            status = %status,
            "Message sent"
        );
        Ok(message)
    }

    /// Admin decision on a pending message. Decisions are final.
    pub async fn moderate(
        &self,
        message_id: Uuid,
        decision: ModerationDecision,
        moderator: &Actor,
    ) -> Result<Message, WorkflowError> {
        if !moderator.is_admin() {
            return Err(WorkflowError::forbidden("only admins moderate messages"));
        }

        let _guard = self.locks.lock(message_id).await;
        let mut message = self
            .store
            .get_message(message_id)
            .await?
            .ok_or_else(|| WorkflowError::not_found(format!("message {message_id}")))?;

        let to = MessageStatus::from(decision);
        if message.status != MessageStatus::Pending {
            return Err(WorkflowError::IllegalTransition {
                entity: "message",
                from: message.status.to_string(),
                to: to.to_string(),
            });
        }

        message.status = to;
        message.moderated_by = Some(moderator.id);
        message.moderated_at = Some(Utc::now());
        self.store.save_message(&message).await?;

        metrics::counter!("messages_moderated_total", "decision" => to.as_str()).increment(1);
        tracing::info!(
            message_id = %message_id,
            moderator = %moderator.id,
            decision = %to,
            "Message moderated"
        );
        Ok(message)
    }

    /// The thread as `viewer` may see it.
    pub async fn visible_thread(&self, order_id: Uuid, viewer: &Actor) -> Result<Vec<Message>, WorkflowError> {
        let order = self.load_order(order_id).await?;
        if self.parties(&order).await?.sender(viewer) == Party::Outsider {
            return Err(WorkflowError::not_found(format!("order {order_id}")));
        }

        let messages = self.store.list_messages(order_id).await?;
        Ok(filter_thread(messages, viewer))
    }

    pub async fn pending_queue(&self, actor: &Actor) -> Result<Vec<Message>, WorkflowError> {
        if !actor.is_admin() {
            return Err(WorkflowError::forbidden("only admins see the moderation queue"));
        }
        Ok(self.store.list_pending_messages().await?)
    }

    async fn load_order(&self, order_id: Uuid) -> Result<Order, WorkflowError> {
        self.store
            .get_order(order_id)
            .await?
            .ok_or_else(|| WorkflowError::not_found(format!("order {order_id}")))
    }

    async fn parties(&self, order: &Order) -> Result<Parties, WorkflowError> {
        let bidders = self
            .store
            .list_offers_for_order(order.id)
            .await?
            .into_iter()
            .map(|o| o.shipper_id)
            .collect();
        let thread = self.store.list_messages(order.id).await?;

        Ok(Parties {
            requester: order.requester_id,
            bidders,
            admins: thread_admins(&thread),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Party {
    Requester,
    Bidder,
    Admin,
    Outsider,
}

/// Who may talk on an order's thread. Conversations run between the
/// requester and each bidder, and between either of them and an admin.
struct Parties {
    requester: Uuid,
    bidders: HashSet<Uuid>,
    /// Admins that already acted on this thread. Receivers carry no role,
    /// so this is how an admin becomes addressable.
    admins: HashSet<Uuid>,
}

impl Parties {
    fn sender(&self, actor: &Actor) -> Party {
        match actor.role {
            Role::Admin => Party::Admin,
            Role::Shopper if actor.id == self.requester => Party::Requester,
            Role::Shipper if self.bidders.contains(&actor.id) => Party::Bidder,
            _ => Party::Outsider,
        }
    }

    fn receiver(&self, id: Uuid) -> Party {
        if id == self.requester {
            Party::Requester
        } else if self.bidders.contains(&id) {
            Party::Bidder
        } else if self.admins.contains(&id) {
            Party::Admin
        } else {
            Party::Outsider
        }
    }
}

fn thread_admins(thread: &[Message]) -> HashSet<Uuid> {
    thread
        .iter()
        .filter(|m| m.sender_role == Role::Admin)
        .map(|m| m.sender_id)
        .chain(thread.iter().filter_map(|m| m.moderated_by))
        .collect()
}

fn filter_thread(messages: Vec<Message>, viewer: &Actor) -> Vec<Message> {
    if matches!(viewer.role, Role::Admin | Role::System) {
        return messages;
    }

    messages
        .into_iter()
        .filter(|m| m.sender_id == viewer.id || m.receiver_id == viewer.id)
        .filter(|m| m.status != MessageStatus::Pending || m.sender_id == viewer.id)
        .map(|mut m| {
            if m.status == MessageStatus::Rejected && m.sender_id != viewer.id {
                m.attachments.clear();
            }
            m
        })
        .collect()
}
