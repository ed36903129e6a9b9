use chrono::{DateTime, Utc};
use gatepass_catalog::{CatalogRepository, Session};
use gatepass_core::{RetryPolicy, StoreError};
use gatepass_shared::models::events::TicketCheckedInEvent;
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::fulfillment::{OrderNotifier, QrPayload};
use crate::models::{Order, TicketInstance, TicketStatus, TicketTransition};
use crate::repository::OrderRepository;

#[derive(Debug, thiserror::Error)]
pub enum CheckInError {
    #[error("Malformed QR payload: {0}")]
    InvalidPayload(String),

    #[error("Order not found: {0}")]
    OrderNotFound(Uuid),

    #[error("No ticket {0} in this order")]
    TicketNotFound(Uuid),

    #[error("Ticket belongs to event {actual}, scanner is set to {expected}")]
    EventMismatch { expected: Uuid, actual: Uuid },

    #[error("Ticket has not been paid for")]
    NotYetPaid,

    #[error("Ticket already checked in")]
    AlreadyUsed { checked_in_at: Option<DateTime<Utc>> },

    #[error("Ticket has been refunded")]
    Refunded,

    #[error("Event {0} has no session admitting guests")]
    NoEligibleSession(Uuid),

    #[error("Session {session_id} ended at {ended_at}")]
    SessionExpired {
        session_id: Uuid,
        ended_at: DateTime<Utc>,
    },

    #[error("Ticket is for session {ticket_session}, now admitting {eligible_session}")]
    WrongSession {
        ticket_session: Uuid,
        eligible_session: Uuid,
    },

    #[error("Session {session_id} admits guests between {start} and {end}")]
    OutsideWindow {
        session_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl CheckInError {
    pub fn code(&self) -> &'static str {
        match self {
            CheckInError::InvalidPayload(_) => "invalid_payload",
            CheckInError::OrderNotFound(_) => "order_not_found",
            CheckInError::TicketNotFound(_) => "ticket_not_found",
            CheckInError::EventMismatch { .. } => "event_mismatch",
            CheckInError::NotYetPaid => "not_yet_paid",
            CheckInError::AlreadyUsed { .. } => "already_used",
            CheckInError::Refunded => "refunded",
            CheckInError::NoEligibleSession(_) => "no_eligible_session",
            CheckInError::SessionExpired { .. } => "session_expired",
            CheckInError::WrongSession { .. } => "wrong_session",
            CheckInError::OutsideWindow { .. } => "outside_window",
            CheckInError::Store(StoreError::Unavailable(_)) => "store_unavailable",
            CheckInError::Store(_) => "store_error",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckInConfirmation {
    pub order_id: Uuid,
    pub instance_id: Uuid,
    pub event_id: Uuid,
    pub event_title: String,
    pub ticket_name: String,
    pub session_id: Uuid,
    pub session_start: DateTime<Utc>,
    pub session_end: DateTime<Utc>,
    pub checked_in_at: DateTime<Utc>,
}

/// Picks the session currently admitting guests: the active session open at
/// `now` with the earliest start, or failing that the soonest upcoming one.
pub fn select_eligible_session(sessions: &[Session], now: DateTime<Utc>) -> Option<&Session> {
    let active = || sessions.iter().filter(|s| s.is_active());

    active()
        .filter(|s| s.is_open_at(now))
        .min_by_key(|s| s.start_time)
        .or_else(|| {
            active()
                .filter(|s| s.start_time > now)
                .min_by_key(|s| s.start_time)
        })
}

pub struct CheckInEngine {
    orders: Arc<dyn OrderRepository>,
    catalog: Arc<dyn CatalogRepository>,
    notifier: Arc<dyn OrderNotifier>,
    retry: RetryPolicy,
}

impl CheckInEngine {
    pub fn new(
        orders: Arc<dyn OrderRepository>,
        catalog: Arc<dyn CatalogRepository>,
        notifier: Arc<dyn OrderNotifier>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            orders,
            catalog,
            notifier,
            retry,
        }
    }

    pub async fn check_in(
        &self,
        qr_payload: &str,
        event_id: Option<Uuid>,
    ) -> Result<CheckInConfirmation, CheckInError> {
        self.check_in_at(qr_payload, event_id, Utc::now()).await
    }

    pub async fn check_in_at(
        &self,
        qr_payload: &str,
        event_id: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> Result<CheckInConfirmation, CheckInError> {
        let payload =
            QrPayload::parse(qr_payload).map_err(|e| CheckInError::InvalidPayload(e.to_string()))?;

        let order = self
            .retry
            .run("get_order", || self.orders.get_order(payload.order_id))
            .await?
            .ok_or(CheckInError::OrderNotFound(payload.order_id))?;
        let ticket = locate_instance(&order, &payload)
            .ok_or(CheckInError::TicketNotFound(payload.ticket_id))?
            .clone();

        let session = self
            .retry
            .run("get_session", || self.catalog.get_session(ticket.session_id))
            .await?
            .ok_or(CheckInError::TicketNotFound(payload.ticket_id))?;
        let event = self
            .retry
            .run("get_event", || self.catalog.get_event(session.event_id))
            .await?
            .ok_or(CheckInError::TicketNotFound(payload.ticket_id))?;

        if let Some(expected) = event_id {
            if expected != event.id {
                return Err(CheckInError::EventMismatch {
                    expected,
                    actual: event.id,
                });
            }
        }

        match ticket.status {
            TicketStatus::Valid => {}
            TicketStatus::Pending => return Err(CheckInError::NotYetPaid),
            TicketStatus::Used => {
                return Err(CheckInError::AlreadyUsed {
                    checked_in_at: ticket.check_in_time,
                })
            }
            TicketStatus::Refunded => return Err(CheckInError::Refunded),
        }

        let sessions = self
            .retry
            .run("list_event_sessions", || self.catalog.list_event_sessions(event.id))
            .await?;
        let eligible = match select_eligible_session(&sessions, now) {
            Some(s) => s,
            None if session.has_ended(now) => {
                return Err(CheckInError::SessionExpired {
                    session_id: session.id,
                    ended_at: session.end_time,
                })
            }
            None => return Err(CheckInError::NoEligibleSession(event.id)),
        };

        if eligible.id != session.id {
            if session.has_ended(now) {
                return Err(CheckInError::SessionExpired {
                    session_id: session.id,
                    ended_at: session.end_time,
                });
            }
            return Err(CheckInError::WrongSession {
                ticket_session: session.id,
                eligible_session: eligible.id,
            });
        }

        if !eligible.is_open_at(now) {
            return Err(CheckInError::OutsideWindow {
                session_id: eligible.id,
                start: eligible.start_time,
                end: eligible.end_time,
            });
        }

        let transition = TicketTransition::CheckIn { at: now };
        let won = self
            .retry
            .run("transition_ticket", || {
                self.orders.transition_ticket(order.id, ticket.id, &transition)
            })
            .await?;
        if !won {
            tracing::warn!("Lost check-in race for ticket {} in order {}", ticket.id, order.id);
            let checked_in_at = self
                .retry
                .run("get_order", || self.orders.get_order(order.id))
                .await?
                .and_then(|o| o.ticket(ticket.id).and_then(|t| t.check_in_time));
            return Err(CheckInError::AlreadyUsed { checked_in_at });
        }

        tracing::info!(
            "Ticket {} checked in for session {} of event {}",
            ticket.id,
            session.id,
            event.id
        );

        let notice = TicketCheckedInEvent {
            order_id: order.id,
            instance_id: ticket.id,
            event_id: event.id,
            session_id: session.id,
            checked_in_at: now.timestamp(),
        };
        if let Err(e) = self.notifier.ticket_checked_in(&notice).await {
            tracing::error!("Failed to publish check-in of ticket {}: {}", ticket.id, e);
        }

        // The tier name is display-only; a deleted tier does not block entry.
        let ticket_name = self
            .retry
            .run("get_ticket_definition", || {
                self.catalog.get_ticket_definition(ticket.ticket_definition_id)
            })
            .await?
            .map(|t| t.name)
            .unwrap_or_default();

        Ok(CheckInConfirmation {
            order_id: order.id,
            instance_id: ticket.id,
            event_id: event.id,
            event_title: event.title,
            ticket_name,
            session_id: session.id,
            session_start: session.start_time,
            session_end: session.end_time,
            checked_in_at: now,
        })
    }
}

/// Pinned codes name their instance. Legacy codes only name the tier, so the
/// first still-valid unit of that tier is used, then any unit of it so the
/// status diagnosis still applies.
fn locate_instance<'a>(order: &'a Order, payload: &QrPayload) -> Option<&'a TicketInstance> {
    match payload.instance_id {
        Some(instance_id) => order
            .ticket(instance_id)
            .filter(|t| t.ticket_definition_id == payload.ticket_id),
        None => {
            let mut matching = order
                .tickets
                .iter()
                .filter(|t| t.ticket_definition_id == payload.ticket_id);
            let first = matching.clone().next();
            matching.find(|t| t.status == TicketStatus::Valid).or(first)
        }
    }
}
