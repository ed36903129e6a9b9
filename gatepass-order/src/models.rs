use chrono::{DateTime, Utc};
use gatepass_shared::Masked;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Order status in the lifecycle
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Paid,
    Cancel,
    Failed,
    Refunded,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Paid => "paid",
            OrderStatus::Cancel => "cancel",
            OrderStatus::Failed => "failed",
            OrderStatus::Refunded => "refunded",
        }
    }

    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        matches!(
            (self, next),
            (OrderStatus::Pending, OrderStatus::Paid)
                | (OrderStatus::Pending, OrderStatus::Failed)
                | (OrderStatus::Pending, OrderStatus::Cancel)
                | (OrderStatus::Paid, OrderStatus::Refunded)
        )
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(OrderStatus::Pending),
            "paid" => Ok(OrderStatus::Paid),
            "cancel" => Ok(OrderStatus::Cancel),
            "failed" => Ok(OrderStatus::Failed),
            "refunded" => Ok(OrderStatus::Refunded),
            other => Err(format!("unknown order status: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    #[default]
    Gateway,
    Free,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Gateway => "gateway",
            PaymentMethod::Free => "free",
        }
    }
}

impl FromStr for PaymentMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "gateway" => Ok(PaymentMethod::Gateway),
            "free" => Ok(PaymentMethod::Free),
            other => Err(format!("unknown payment method: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RefundStatus {
    #[default]
    None,
    Pending,
    Refunded,
    Failed,
}

impl RefundStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RefundStatus::None => "none",
            RefundStatus::Pending => "pending",
            RefundStatus::Refunded => "refunded",
            RefundStatus::Failed => "failed",
        }
    }
}

impl FromStr for RefundStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(RefundStatus::None),
            "pending" => Ok(RefundStatus::Pending),
            "refunded" => Ok(RefundStatus::Refunded),
            "failed" => Ok(RefundStatus::Failed),
            other => Err(format!("unknown refund status: {}", other)),
        }
    }
}

/// Gateway-side facts about how the order was paid or refunded.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PaymentInfo {
    pub transaction_no: Option<String>,
    pub bank_code: Option<String>,
    pub pay_date: Option<String>,
    pub refund_status: RefundStatus,
    pub refund_txn_no: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TicketStatus {
    Pending,
    Valid,
    Used,
    Refunded,
}

impl TicketStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TicketStatus::Pending => "pending",
            TicketStatus::Valid => "valid",
            TicketStatus::Used => "used",
            TicketStatus::Refunded => "refunded",
        }
    }

    /// `used` and `refunded` never change again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TicketStatus::Used | TicketStatus::Refunded)
    }
}

impl fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TicketStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TicketStatus::Pending),
            "valid" => Ok(TicketStatus::Valid),
            "used" => Ok(TicketStatus::Used),
            "refunded" => Ok(TicketStatus::Refunded),
            other => Err(format!("unknown ticket status: {}", other)),
        }
    }
}

/// Instance moves made after settlement. Each one names its required prior
/// status, so stores can apply it as a compare-and-set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TicketTransition {
    /// valid → used, stamping the check-in time
    CheckIn { at: DateTime<Utc> },
    /// valid → refunded
    Refund,
}

impl TicketTransition {
    pub fn from_status(&self) -> TicketStatus {
        TicketStatus::Valid
    }

    pub fn to_status(&self) -> TicketStatus {
        match self {
            TicketTransition::CheckIn { .. } => TicketStatus::Used,
            TicketTransition::Refund => TicketStatus::Refunded,
        }
    }

    /// Applies the transition if `ticket` is in the expected prior status.
    pub fn apply(&self, ticket: &mut TicketInstance) -> bool {
        if ticket.status != self.from_status() {
            return false;
        }
        if let TicketTransition::CheckIn { at } = self {
            ticket.check_in_time.get_or_insert(*at);
        }
        ticket.status = self.to_status();
        true
    }
}

/// QR payload to attach to one pending instance when its order settles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Issuance {
    pub instance_id: Uuid,
    pub qr_code: String,
}

impl Issuance {
    /// pending → valid with this payload attached.
    pub fn apply(&self, ticket: &mut TicketInstance) -> bool {
        if ticket.id != self.instance_id || ticket.status != TicketStatus::Pending {
            return false;
        }
        ticket.qr_code = self.qr_code.clone();
        ticket.status = TicketStatus::Valid;
        true
    }
}

/// One individually redeemable unit. Lives inside exactly one order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TicketInstance {
    pub id: Uuid,
    pub ticket_definition_id: Uuid,
    pub session_id: Uuid,
    /// Snapshot at purchase time.
    pub price: i64,
    pub qr_code: String,
    pub status: TicketStatus,
    pub check_in_time: Option<DateTime<Utc>>,
}

impl TicketInstance {
    pub fn pending(ticket_definition_id: Uuid, session_id: Uuid, price: i64) -> Self {
        Self {
            id: Uuid::new_v4(),
            ticket_definition_id,
            session_id,
            price,
            qr_code: String::new(),
            status: TicketStatus::Pending,
            check_in_time: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub user_id: Uuid,
    pub email: Masked<String>,
    pub total_amount: i64,
    pub status: OrderStatus,
    pub payment_method: PaymentMethod,
    pub payment: PaymentInfo,
    pub tickets: Vec<TicketInstance>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    pub fn new(user_id: Uuid, email: String, payment_method: PaymentMethod) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            email: Masked::new(email),
            total_amount: 0,
            status: OrderStatus::Pending,
            payment_method,
            payment: PaymentInfo::default(),
            tickets: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Keeps `total_amount` equal to the sum of instance prices. Checkout
    /// rejects carts whose total overflows before building the order.
    pub fn add_ticket(&mut self, ticket: TicketInstance) {
        self.total_amount = self.total_amount.saturating_add(ticket.price);
        self.tickets.push(ticket);
        self.updated_at = Utc::now();
    }

    pub fn ticket(&self, instance_id: Uuid) -> Option<&TicketInstance> {
        self.tickets.iter().find(|t| t.id == instance_id)
    }

    pub fn tickets_in(&self, status: TicketStatus) -> impl Iterator<Item = &TicketInstance> {
        self.tickets.iter().filter(move |t| t.status == status)
    }

    pub fn is_free(&self) -> bool {
        self.total_amount == 0
    }
}
