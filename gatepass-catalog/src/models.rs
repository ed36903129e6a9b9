use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    Pending,
    Approved,
    Rejected,
    Cancel,
    Cancelled,
}

impl EventStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventStatus::Pending => "pending",
            EventStatus::Approved => "approved",
            EventStatus::Rejected => "rejected",
            EventStatus::Cancel => "cancel",
            EventStatus::Cancelled => "cancelled",
        }
    }
}

impl FromStr for EventStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(EventStatus::Pending),
            "approved" => Ok(EventStatus::Approved),
            "rejected" => Ok(EventStatus::Rejected),
            "cancel" => Ok(EventStatus::Cancel),
            "cancelled" => Ok(EventStatus::Cancelled),
            other => Err(format!("unknown event status: {}", other)),
        }
    }
}

/// Owned by the catalog subsystem; read-only here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub organizer_id: Uuid,
    pub title: String,
    pub status: EventStatus,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Active,
    Inactive,
    Cancel,
    Refunded,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Active => "active",
            SessionStatus::Inactive => "inactive",
            SessionStatus::Cancel => "cancel",
            SessionStatus::Refunded => "refunded",
        }
    }
}

impl FromStr for SessionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(SessionStatus::Active),
            "inactive" => Ok(SessionStatus::Inactive),
            "cancel" => Ok(SessionStatus::Cancel),
            "refunded" => Ok(SessionStatus::Refunded),
            other => Err(format!("unknown session status: {}", other)),
        }
    }
}

/// One showtime of an event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    pub event_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub status: SessionStatus,
}

impl Session {
    pub fn is_active(&self) -> bool {
        self.status == SessionStatus::Active
    }

    /// Inclusive on both ends.
    pub fn is_open_at(&self, now: DateTime<Utc>) -> bool {
        self.start_time <= now && now <= self.end_time
    }

    pub fn has_ended(&self, now: DateTime<Utc>) -> bool {
        self.end_time < now
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TicketDefinitionStatus {
    Available,
    Stopped,
}

impl TicketDefinitionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TicketDefinitionStatus::Available => "available",
            TicketDefinitionStatus::Stopped => "stopped",
        }
    }

    pub fn toggled(&self) -> Self {
        match self {
            TicketDefinitionStatus::Available => TicketDefinitionStatus::Stopped,
            TicketDefinitionStatus::Stopped => TicketDefinitionStatus::Available,
        }
    }
}

impl FromStr for TicketDefinitionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "available" => Ok(TicketDefinitionStatus::Available),
            "stopped" => Ok(TicketDefinitionStatus::Stopped),
            other => Err(format!("unknown ticket status: {}", other)),
        }
    }
}

impl fmt::Display for TicketDefinitionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Purchasable ticket tier attached to a session.
/// `sold_quantity` is credited by the order store when it settles an order,
/// in the same atomic step that issues the instances.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TicketDefinition {
    pub id: Uuid,
    pub session_id: Uuid,
    pub name: String,
    pub price: i64,
    pub ticket_quantity: i32,
    pub sold_quantity: i32,
    pub min_per_order: i32,
    pub max_per_order: i32,
    pub status: TicketDefinitionStatus,
}

impl TicketDefinition {
    pub fn remaining(&self) -> i32 {
        (self.ticket_quantity - self.sold_quantity).max(0)
    }

    pub fn is_available(&self) -> bool {
        self.status == TicketDefinitionStatus::Available
    }
}
