use gatepass_catalog::{CatalogRepository, EventStatus, SessionStatus};
use gatepass_core::{RetryPolicy, StoreError};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::models::{Order, OrderStatus, PaymentInfo, RefundStatus, TicketStatus, TicketTransition};
use crate::repository::OrderRepository;

#[derive(Debug, thiserror::Error)]
pub enum RefundError {
    #[error("Session not found: {0}")]
    SessionNotFound(Uuid),

    #[error("Event not found: {0}")]
    EventNotFound(Uuid),

    #[error("Session {session_id} is {status}, not cancelled")]
    SessionNotCancelled { session_id: Uuid, status: String },

    #[error("Event {event_id} is {status}, not cancelled")]
    EventNotCancelled { event_id: Uuid, status: String },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl RefundError {
    pub fn code(&self) -> &'static str {
        match self {
            RefundError::SessionNotFound(_) => "session_not_found",
            RefundError::EventNotFound(_) => "event_not_found",
            RefundError::SessionNotCancelled { .. } => "session_not_cancelled",
            RefundError::EventNotCancelled { .. } => "event_not_cancelled",
            RefundError::Store(StoreError::Unavailable(_)) => "store_unavailable",
            RefundError::Store(_) => "store_error",
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct RefundSummary {
    pub refunded_tickets: usize,
    pub refunded_orders: usize,
}

impl RefundSummary {
    fn absorb(&mut self, other: RefundSummary) {
        self.refunded_tickets += other.refunded_tickets;
        self.refunded_orders += other.refunded_orders;
    }
}

/// Voids tickets of cancelled sessions. Moving money back stays with the
/// gateway's refund flow: orders are only flagged with a pending refund.
/// Sold counters are left as they are.
pub struct RefundProcessor {
    orders: Arc<dyn OrderRepository>,
    catalog: Arc<dyn CatalogRepository>,
    retry: RetryPolicy,
}

impl RefundProcessor {
    pub fn new(
        orders: Arc<dyn OrderRepository>,
        catalog: Arc<dyn CatalogRepository>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            orders,
            catalog,
            retry,
        }
    }

    pub async fn refund_session(&self, session_id: Uuid) -> Result<RefundSummary, RefundError> {
        let session = self
            .retry
            .run("get_session", || self.catalog.get_session(session_id))
            .await?
            .ok_or(RefundError::SessionNotFound(session_id))?;

        if !matches!(session.status, SessionStatus::Cancel | SessionStatus::Refunded) {
            return Err(RefundError::SessionNotCancelled {
                session_id,
                status: session.status.as_str().to_string(),
            });
        }

        self.void_session(session_id).await
    }

    /// A cancelled event voids every one of its sessions.
    pub async fn refund_event(&self, event_id: Uuid) -> Result<RefundSummary, RefundError> {
        let event = self
            .retry
            .run("get_event", || self.catalog.get_event(event_id))
            .await?
            .ok_or(RefundError::EventNotFound(event_id))?;

        if !matches!(event.status, EventStatus::Cancel | EventStatus::Cancelled) {
            return Err(RefundError::EventNotCancelled {
                event_id,
                status: event.status.as_str().to_string(),
            });
        }

        let sessions = self
            .retry
            .run("list_event_sessions", || self.catalog.list_event_sessions(event_id))
            .await?;

        let mut summary = RefundSummary::default();
        for session in sessions {
            summary.absorb(self.void_session(session.id).await?);
        }
        tracing::info!(
            "Event {} refunded: {} tickets across {} orders",
            event_id,
            summary.refunded_tickets,
            summary.refunded_orders
        );
        Ok(summary)
    }

    async fn void_session(&self, session_id: Uuid) -> Result<RefundSummary, RefundError> {
        let orders = self
            .retry
            .run("list_session_orders", || self.orders.list_session_orders(session_id))
            .await?;

        let mut summary = RefundSummary::default();
        for order in orders {
            let mut voided = 0;
            let affected = order
                .tickets_in(TicketStatus::Valid)
                .filter(|t| t.session_id == session_id);
            for ticket in affected {
                let won = self
                    .retry
                    .run("transition_ticket", || {
                        self.orders
                            .transition_ticket(order.id, ticket.id, &TicketTransition::Refund)
                    })
                    .await?;
                if won {
                    voided += 1;
                }
            }
            if voided == 0 {
                continue;
            }
            summary.refunded_tickets += voided;

            if self.close_if_fully_refunded(order.id).await? {
                summary.refunded_orders += 1;
            }
        }

        tracing::info!(
            "Session {} voided {} tickets, {} orders fully refunded",
            session_id,
            summary.refunded_tickets,
            summary.refunded_orders
        );
        Ok(summary)
    }

    async fn close_if_fully_refunded(&self, order_id: Uuid) -> Result<bool, RefundError> {
        let Some(order) = self
            .retry
            .run("get_order", || self.orders.get_order(order_id))
            .await?
        else {
            return Ok(false);
        };
        if !is_fully_refunded(&order) {
            return Ok(false);
        }

        let payment = PaymentInfo {
            refund_status: RefundStatus::Pending,
            ..order.payment.clone()
        };
        Ok(self
            .retry
            .run("transition_order", || {
                self.orders.transition_order(
                    order_id,
                    OrderStatus::Paid,
                    OrderStatus::Refunded,
                    Some(&payment),
                )
            })
            .await?)
    }
}

fn is_fully_refunded(order: &Order) -> bool {
    order.status == OrderStatus::Paid
        && !order.tickets.is_empty()
        && order
            .tickets
            .iter()
            .all(|t| t.status == TicketStatus::Refunded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::Fixture;
    use gatepass_catalog::{Event, Session};

    async fn cancel_session(fixture: &Fixture, session: &Session) {
        let mut cancelled = session.clone();
        cancelled.status = SessionStatus::Cancel;
        fixture.catalog.insert_session(cancelled).await;
    }

    #[tokio::test]
    async fn test_cancelled_session_voids_valid_tickets() {
        let fixture = Fixture::new().await;
        let paid = fixture.paid_order(&fixture.future_ticket.clone(), 2).await;
        let pending = fixture.pending_order(&fixture.future_ticket.clone(), 1).await;
        cancel_session(&fixture, &fixture.future_session).await;

        let summary = fixture
            .refund_processor()
            .refund_session(fixture.future_session.id)
            .await
            .unwrap();
        assert_eq!(summary, RefundSummary { refunded_tickets: 2, refunded_orders: 1 });

        let refunded = fixture.order(paid.id).await;
        assert_eq!(refunded.status, OrderStatus::Refunded);
        assert_eq!(refunded.payment.refund_status, RefundStatus::Pending);
        assert!(refunded.tickets.iter().all(|t| t.status == TicketStatus::Refunded));

        let untouched = fixture.order(pending.id).await;
        assert_eq!(untouched.status, OrderStatus::Pending);
        assert_eq!(untouched.tickets[0].status, TicketStatus::Pending);

        // second run finds nothing left to void
        let again = fixture
            .refund_processor()
            .refund_session(fixture.future_session.id)
            .await
            .unwrap();
        assert_eq!(again, RefundSummary::default());
    }

    #[tokio::test]
    async fn test_used_tickets_keep_order_paid() {
        let fixture = Fixture::new().await;
        let order = fixture.paid_order(&fixture.open_ticket.clone(), 2).await;
        let qr = crate::fulfillment::QrPayload::for_ticket(order.id, &order.tickets[0]).encode();
        fixture
            .checkin_engine()
            .check_in_at(&qr, None, fixture.now)
            .await
            .unwrap();
        cancel_session(&fixture, &fixture.open_session).await;

        let summary = fixture
            .refund_processor()
            .refund_session(fixture.open_session.id)
            .await
            .unwrap();
        assert_eq!(summary, RefundSummary { refunded_tickets: 1, refunded_orders: 0 });

        let order = fixture.order(order.id).await;
        assert_eq!(order.status, OrderStatus::Paid);
        assert_eq!(order.tickets[0].status, TicketStatus::Used);
        assert_eq!(order.tickets[1].status, TicketStatus::Refunded);
    }

    #[tokio::test]
    async fn test_active_session_is_refused() {
        let fixture = Fixture::new().await;
        let err = fixture
            .refund_processor()
            .refund_session(fixture.open_session.id)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "session_not_cancelled");

        let err = fixture
            .refund_processor()
            .refund_session(Uuid::new_v4())
            .await
            .unwrap_err();
        assert_eq!(err.code(), "session_not_found");
    }

    #[tokio::test]
    async fn test_cancelled_event_voids_all_sessions() {
        let fixture = Fixture::new().await;
        let first = fixture.paid_order(&fixture.open_ticket.clone(), 1).await;
        let second = fixture.paid_order(&fixture.future_ticket.clone(), 3).await;

        let err = fixture
            .refund_processor()
            .refund_event(fixture.event.id)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "event_not_cancelled");

        fixture
            .catalog
            .insert_event(Event {
                status: EventStatus::Cancelled,
                ..fixture.event.clone()
            })
            .await;
        let summary = fixture
            .refund_processor()
            .refund_event(fixture.event.id)
            .await
            .unwrap();
        assert_eq!(summary, RefundSummary { refunded_tickets: 4, refunded_orders: 2 });
        assert_eq!(fixture.order(first.id).await.status, OrderStatus::Refunded);
        assert_eq!(fixture.order(second.id).await.status, OrderStatus::Refunded);
    }
}
