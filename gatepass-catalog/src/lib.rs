pub mod availability;
pub mod inventory;
pub mod models;
pub mod pricing;
pub mod repository;

use gatepass_core::StoreError;
use uuid::Uuid;

pub use availability::AvailabilityService;
pub use inventory::InMemoryCatalog;
pub use models::{
    Event, EventStatus, Session, SessionStatus, TicketDefinition, TicketDefinitionStatus,
};
pub use pricing::{LineQuote, PricingPolicy};
pub use repository::CatalogRepository;

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("Ticket definition not found: {0}")]
    TicketNotFound(Uuid),

    #[error("Session not found: {0}")]
    SessionNotFound(Uuid),

    #[error("Ticket {ticket_id} does not belong to session {session_id}")]
    SessionMismatch { ticket_id: Uuid, session_id: Uuid },

    #[error("Ticket {0} is not on sale")]
    TicketStopped(Uuid),

    #[error("Session {0} is not active")]
    SessionNotActive(Uuid),

    #[error("Invalid quantity: {0}")]
    InvalidQuantity(i32),

    #[error("Ticket {ticket_id}: {requested} per order is outside [{min}, {max}]")]
    QuantityOutOfBounds {
        ticket_id: Uuid,
        requested: i32,
        min: i32,
        max: i32,
    },

    #[error("Ticket {ticket_id}: requested {requested}, remaining {remaining}")]
    InsufficientStock {
        ticket_id: Uuid,
        requested: i32,
        remaining: i32,
    },

    #[error("Ticket {ticket_id}: declared price {declared}, current price {actual}")]
    PriceMismatch {
        ticket_id: Uuid,
        declared: i64,
        actual: i64,
    },

    #[error("Ticket {ticket_id}: quantity {requested} is below sold quantity {sold}")]
    QuantityBelowSold {
        ticket_id: Uuid,
        requested: i32,
        sold: i32,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl CatalogError {
    pub fn code(&self) -> &'static str {
        match self {
            CatalogError::TicketNotFound(_) => "ticket_not_found",
            CatalogError::SessionNotFound(_) => "session_not_found",
            CatalogError::SessionMismatch { .. } => "session_mismatch",
            CatalogError::TicketStopped(_) => "ticket_stopped",
            CatalogError::SessionNotActive(_) => "session_not_active",
            CatalogError::InvalidQuantity(_) => "invalid_quantity",
            CatalogError::QuantityOutOfBounds { .. } => "quantity_out_of_bounds",
            CatalogError::InsufficientStock { .. } => "insufficient_stock",
            CatalogError::PriceMismatch { .. } => "price_mismatch",
            CatalogError::QuantityBelowSold { .. } => "quantity_below_sold",
            CatalogError::Store(StoreError::Unavailable(_)) => "store_unavailable",
            CatalogError::Store(_) => "store_error",
        }
    }
}
