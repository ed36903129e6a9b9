use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Session, TicketDefinition};
use crate::CatalogError;

/// Priced, validated portion of a checkout for one ticket definition.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LineQuote {
    pub ticket_definition_id: Uuid,
    pub session_id: Uuid,
    pub unit_price: i64,
    pub quantity: i32,
}

impl LineQuote {
    /// `None` when the product does not fit in an `i64`.
    pub fn subtotal(&self) -> Option<i64> {
        self.unit_price.checked_mul(i64::from(self.quantity))
    }
}

/// Server-side checks applied to requested ticket lines.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PricingPolicy {
    /// When false, caller prices and quantities are taken as given.
    pub enforce_catalog: bool,
}

impl Default for PricingPolicy {
    fn default() -> Self {
        Self {
            enforce_catalog: true,
        }
    }
}

impl PricingPolicy {
    /// Validates one definition's total requested quantity against sale
    /// status, session state, per-order bounds and remaining stock, and
    /// re-prices it from the catalog.
    pub fn quote(
        &self,
        ticket: &TicketDefinition,
        session: &Session,
        quantity: i32,
        declared_unit_price: i64,
    ) -> Result<LineQuote, CatalogError> {
        if quantity <= 0 {
            return Err(CatalogError::InvalidQuantity(quantity));
        }

        if ticket.session_id != session.id {
            return Err(CatalogError::SessionMismatch {
                ticket_id: ticket.id,
                session_id: session.id,
            });
        }

        if !ticket.is_available() {
            return Err(CatalogError::TicketStopped(ticket.id));
        }

        if !session.is_active() {
            return Err(CatalogError::SessionNotActive(session.id));
        }

        if quantity < ticket.min_per_order || quantity > ticket.max_per_order {
            return Err(CatalogError::QuantityOutOfBounds {
                ticket_id: ticket.id,
                requested: quantity,
                min: ticket.min_per_order,
                max: ticket.max_per_order,
            });
        }

        if quantity > ticket.remaining() {
            return Err(CatalogError::InsufficientStock {
                ticket_id: ticket.id,
                requested: quantity,
                remaining: ticket.remaining(),
            });
        }

        if declared_unit_price != ticket.price {
            return Err(CatalogError::PriceMismatch {
                ticket_id: ticket.id,
                declared: declared_unit_price,
                actual: ticket.price,
            });
        }

        Ok(LineQuote {
            ticket_definition_id: ticket.id,
            session_id: session.id,
            unit_price: ticket.price,
            quantity,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{SessionStatus, TicketDefinitionStatus};
    use chrono::{Duration, Utc};

    fn fixture() -> (TicketDefinition, Session) {
        let session = Session {
            id: Uuid::new_v4(),
            event_id: Uuid::new_v4(),
            start_time: Utc::now() + Duration::days(7),
            end_time: Utc::now() + Duration::days(7) + Duration::hours(3),
            status: SessionStatus::Active,
        };
        let ticket = TicketDefinition {
            id: Uuid::new_v4(),
            session_id: session.id,
            name: "VIP".to_string(),
            price: 500_000,
            ticket_quantity: 10,
            sold_quantity: 8,
            min_per_order: 1,
            max_per_order: 4,
            status: TicketDefinitionStatus::Available,
        };
        (ticket, session)
    }

    #[test]
    fn test_subtotal_overflow_is_reported() {
        let quote = LineQuote {
            ticket_definition_id: Uuid::new_v4(),
            session_id: Uuid::new_v4(),
            unit_price: i64::MAX,
            quantity: 2,
        };
        assert_eq!(quote.subtotal(), None);
    }

    #[test]
    fn test_quote_uses_catalog_price() {
        let (ticket, session) = fixture();
        let quote = PricingPolicy::default().quote(&ticket, &session, 2, 500_000).unwrap();
        assert_eq!(quote.subtotal(), Some(1_000_000));
    }

    #[test]
    fn test_quote_rejects_stale_price() {
        let (ticket, session) = fixture();
        let err = PricingPolicy::default().quote(&ticket, &session, 1, 1).unwrap_err();
        assert!(matches!(err, CatalogError::PriceMismatch { actual: 500_000, .. }));
    }

    #[test]
    fn test_quote_enforces_bounds_and_stock() {
        let (ticket, session) = fixture();
        let policy = PricingPolicy::default();

        let err = policy.quote(&ticket, &session, 5, 500_000).unwrap_err();
        assert!(matches!(err, CatalogError::QuantityOutOfBounds { requested: 5, .. }));

        let err = policy.quote(&ticket, &session, 3, 500_000).unwrap_err();
        assert!(matches!(err, CatalogError::InsufficientStock { remaining: 2, .. }));

        let err = policy.quote(&ticket, &session, 0, 500_000).unwrap_err();
        assert!(matches!(err, CatalogError::InvalidQuantity(0)));
    }

    #[test]
    fn test_quote_rejects_stopped_ticket_and_foreign_session() {
        let (mut ticket, session) = fixture();
        ticket.status = TicketDefinitionStatus::Stopped;
        let err = PricingPolicy::default().quote(&ticket, &session, 1, 500_000).unwrap_err();
        assert!(matches!(err, CatalogError::TicketStopped(_)));

        let (ticket, mut other) = fixture();
        other.id = Uuid::new_v4();
        let err = PricingPolicy::default().quote(&ticket, &other, 1, 500_000).unwrap_err();
        assert!(matches!(err, CatalogError::SessionMismatch { .. }));
    }
}
