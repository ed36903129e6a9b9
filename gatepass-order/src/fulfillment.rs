use async_trait::async_trait;
use chrono::Utc;
use gatepass_shared::models::events::{IssuedTicket, OrderConfirmedEvent, TicketCheckedInEvent};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Order, TicketInstance, TicketStatus};

/// Content of a ticket's QR code.
///
/// `instance_id` pins the code to one unit; codes carrying only
/// `ticket_id` and `order_id` are still accepted at the gate.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QrPayload {
    pub ticket_id: Uuid,
    pub order_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_id: Option<Uuid>,
}

impl QrPayload {
    pub fn for_ticket(order_id: Uuid, ticket: &TicketInstance) -> Self {
        Self {
            ticket_id: ticket.ticket_definition_id,
            order_id,
            instance_id: Some(ticket.id),
        }
    }

    pub fn encode(&self) -> String {
        let mut payload = serde_json::json!({
            "ticket_id": self.ticket_id,
            "order_id": self.order_id,
        });
        if let Some(instance_id) = self.instance_id {
            payload["instance_id"] = serde_json::json!(instance_id);
        }
        payload.to_string()
    }

    pub fn parse(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw.trim())
    }
}

/// Outbound notifications. The mail collaborator listens for confirmed
/// orders; delivery failures never undo the state change that caused them.
#[async_trait]
pub trait OrderNotifier: Send + Sync {
    async fn order_confirmed(
        &self,
        event: &OrderConfirmedEvent,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;

    async fn ticket_checked_in(
        &self,
        event: &TicketCheckedInEvent,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

/// Notifier for deployments without a message bus.
pub struct LogNotifier;

#[async_trait]
impl OrderNotifier for LogNotifier {
    async fn order_confirmed(
        &self,
        event: &OrderConfirmedEvent,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        tracing::info!(
            "Order {} confirmed with {} tickets",
            event.order_id,
            event.tickets.len()
        );
        Ok(())
    }

    async fn ticket_checked_in(
        &self,
        event: &TicketCheckedInEvent,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        tracing::info!("Ticket {} checked in", event.instance_id);
        Ok(())
    }
}

/// Snapshot of an order's issued tickets for the mailer.
pub fn confirmation_event(order: &Order) -> OrderConfirmedEvent {
    OrderConfirmedEvent {
        order_id: order.id,
        user_id: order.user_id,
        email: order.email.expose().clone(),
        total_amount: order.total_amount,
        tickets: order
            .tickets_in(TicketStatus::Valid)
            .map(|t| IssuedTicket {
                instance_id: t.id,
                ticket_definition_id: t.ticket_definition_id,
                session_id: t.session_id,
                qr_code: t.qr_code.clone(),
            })
            .collect(),
        timestamp: Utc::now().timestamp(),
    }
}
