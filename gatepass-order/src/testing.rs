//! Shared fixture for the service tests: one event with an ended, an open
//! and an upcoming session, each selling one ticket tier.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use gatepass_catalog::{
    Event, EventStatus, InMemoryCatalog, PricingPolicy, Session, SessionStatus, TicketDefinition,
    TicketDefinitionStatus,
};
use gatepass_core::RetryPolicy;
use gatepass_shared::models::events::{OrderConfirmedEvent, TicketCheckedInEvent};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use crate::checkin::CheckInEngine;
use crate::checkout::CheckoutService;
use crate::fulfillment::OrderNotifier;
use crate::manager::InMemoryOrderStore;
use crate::models::{Order, PaymentInfo, PaymentMethod, TicketInstance};
use crate::refund::RefundProcessor;
use crate::repository::OrderRepository;
use crate::settlement::SettlementHandler;

#[derive(Default)]
pub(crate) struct RecordingNotifier {
    confirmed: Mutex<Vec<OrderConfirmedEvent>>,
    checked_in: Mutex<Vec<TicketCheckedInEvent>>,
}

impl RecordingNotifier {
    pub fn confirmed(&self) -> Vec<OrderConfirmedEvent> {
        self.confirmed.lock().unwrap().clone()
    }

    pub fn checked_in(&self) -> Vec<TicketCheckedInEvent> {
        self.checked_in.lock().unwrap().clone()
    }
}

#[async_trait]
impl OrderNotifier for RecordingNotifier {
    async fn order_confirmed(
        &self,
        event: &OrderConfirmedEvent,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.confirmed.lock().unwrap().push(event.clone());
        Ok(())
    }

    async fn ticket_checked_in(
        &self,
        event: &TicketCheckedInEvent,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.checked_in.lock().unwrap().push(event.clone());
        Ok(())
    }
}

pub(crate) struct Fixture {
    pub orders: Arc<InMemoryOrderStore>,
    pub catalog: Arc<InMemoryCatalog>,
    pub notifier: Arc<RecordingNotifier>,
    pub now: DateTime<Utc>,
    pub event: Event,
    pub past_session: Session,
    pub open_session: Session,
    pub future_session: Session,
    pub past_ticket: TicketDefinition,
    pub open_ticket: TicketDefinition,
    pub future_ticket: TicketDefinition,
    pub free_ticket: TicketDefinition,
}

impl Fixture {
    pub async fn new() -> Self {
        let now = Utc::now();
        let catalog = Arc::new(InMemoryCatalog::new());

        let event = Event {
            id: Uuid::new_v4(),
            organizer_id: Uuid::new_v4(),
            title: "Summer Sound Festival".to_string(),
            status: EventStatus::Approved,
        };
        catalog.insert_event(event.clone()).await;

        let past_session = session(&event, now - Duration::days(1), Duration::hours(3));
        let open_session = session(&event, now - Duration::hours(1), Duration::hours(3));
        let future_session = session(&event, now + Duration::days(1), Duration::hours(3));
        for s in [&past_session, &open_session, &future_session] {
            catalog.insert_session(s.clone()).await;
        }

        let past_ticket = tier(&past_session, "Standard", 150_000);
        let open_ticket = tier(&open_session, "Standard", 200_000);
        let future_ticket = tier(&future_session, "Standard", 250_000);
        let free_ticket = tier(&open_session, "Community", 0);
        for t in [&past_ticket, &open_ticket, &future_ticket, &free_ticket] {
            catalog.insert_ticket_definition(t.clone()).await;
        }

        Self {
            orders: Arc::new(InMemoryOrderStore::new(catalog.clone())),
            catalog,
            notifier: Arc::new(RecordingNotifier::default()),
            now,
            event,
            past_session,
            open_session,
            future_session,
            past_ticket,
            open_ticket,
            future_ticket,
            free_ticket,
        }
    }

    pub fn checkout_service(&self) -> CheckoutService {
        CheckoutService::new(
            self.orders.clone(),
            self.catalog.clone(),
            PricingPolicy::default(),
            RetryPolicy::none(),
        )
    }

    pub fn settlement_handler(&self) -> SettlementHandler {
        SettlementHandler::new(self.orders.clone(), self.notifier.clone(), RetryPolicy::none())
    }

    pub fn checkin_engine(&self) -> CheckInEngine {
        CheckInEngine::new(
            self.orders.clone(),
            self.catalog.clone(),
            self.notifier.clone(),
            RetryPolicy::none(),
        )
    }

    pub fn refund_processor(&self) -> RefundProcessor {
        RefundProcessor::new(self.orders.clone(), self.catalog.clone(), RetryPolicy::none())
    }

    pub async fn order(&self, id: Uuid) -> Order {
        self.orders.get_order(id).await.unwrap().expect("order exists")
    }

    pub async fn ticket_definition(&self, id: Uuid) -> TicketDefinition {
        use gatepass_catalog::CatalogRepository;
        self.catalog
            .get_ticket_definition(id)
            .await
            .unwrap()
            .expect("ticket definition exists")
    }

    /// Stores a pending order directly, bypassing checkout validation.
    pub async fn pending_order(&self, ticket: &TicketDefinition, quantity: i32) -> Order {
        let method = if ticket.price == 0 {
            PaymentMethod::Free
        } else {
            PaymentMethod::Gateway
        };
        let mut order = Order::new(Uuid::new_v4(), "fan@example.com".to_string(), method);
        for _ in 0..quantity {
            order.add_ticket(TicketInstance::pending(ticket.id, ticket.session_id, ticket.price));
        }
        self.orders.create_order(&order).await.unwrap();
        order
    }

    /// A settled order whose instances are all valid.
    pub async fn paid_order(&self, ticket: &TicketDefinition, quantity: i32) -> Order {
        let order = self.pending_order(ticket, quantity).await;
        let handler = self.settlement_handler();
        if order.is_free() {
            handler.confirm_free_order(order.id).await.unwrap();
        } else {
            handler
                .on_gateway_success(order.id, PaymentInfo::default())
                .await
                .unwrap();
        }
        self.order(order.id).await
    }
}

fn session(event: &Event, start: DateTime<Utc>, length: Duration) -> Session {
    Session {
        id: Uuid::new_v4(),
        event_id: event.id,
        start_time: start,
        end_time: start + length,
        status: SessionStatus::Active,
    }
}

fn tier(session: &Session, name: &str, price: i64) -> TicketDefinition {
    TicketDefinition {
        id: Uuid::new_v4(),
        session_id: session.id,
        name: name.to_string(),
        price,
        ticket_quantity: 100,
        sold_quantity: 10,
        min_per_order: 1,
        max_per_order: 4,
        status: TicketDefinitionStatus::Available,
    }
}
