use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Published once per order when settlement issues its tickets.
/// The mailer renders one QR image per entry in `tickets`.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct OrderConfirmedEvent {
    pub order_id: Uuid,
    pub user_id: Uuid,
    pub email: String,
    pub total_amount: i64,
    pub tickets: Vec<IssuedTicket>,
    pub timestamp: i64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct IssuedTicket {
    pub instance_id: Uuid,
    pub ticket_definition_id: Uuid,
    pub session_id: Uuid,
    pub qr_code: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TicketCheckedInEvent {
    pub order_id: Uuid,
    pub instance_id: Uuid,
    pub event_id: Uuid,
    pub session_id: Uuid,
    pub checked_in_at: i64,
}
