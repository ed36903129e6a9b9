use async_trait::async_trait;
use gatepass_core::StoreResult;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::{Event, Session, TicketDefinition, TicketDefinitionStatus};
use crate::repository::CatalogRepository;

#[derive(Default)]
struct CatalogState {
    events: HashMap<Uuid, Event>,
    sessions: HashMap<Uuid, Session>,
    tickets: HashMap<Uuid, TicketDefinition>,
}

/// In-memory catalog for tests and local runs. Every write happens under
/// one lock, so counter updates and guarded edits are atomic.
#[derive(Default)]
pub struct InMemoryCatalog {
    state: RwLock<CatalogState>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_event(&self, event: Event) {
        self.state.write().await.events.insert(event.id, event);
    }

    pub async fn insert_session(&self, session: Session) {
        self.state.write().await.sessions.insert(session.id, session);
    }

    pub async fn insert_ticket_definition(&self, ticket: TicketDefinition) {
        self.state.write().await.tickets.insert(ticket.id, ticket);
    }

    /// `sold_quantity += by`. Returns the new value, `None` if the definition
    /// does not exist.
    pub async fn increment_sold(&self, id: Uuid, by: i32) -> Option<i32> {
        let mut state = self.state.write().await;
        state.tickets.get_mut(&id).map(|ticket| {
            ticket.sold_quantity = ticket.sold_quantity.saturating_add(by);
            ticket.sold_quantity
        })
    }
}

#[async_trait]
impl CatalogRepository for InMemoryCatalog {
    async fn get_event(&self, id: Uuid) -> StoreResult<Option<Event>> {
        Ok(self.state.read().await.events.get(&id).cloned())
    }

    async fn get_session(&self, id: Uuid) -> StoreResult<Option<Session>> {
        Ok(self.state.read().await.sessions.get(&id).cloned())
    }

    async fn list_event_sessions(&self, event_id: Uuid) -> StoreResult<Vec<Session>> {
        let state = self.state.read().await;
        let mut sessions: Vec<Session> = state
            .sessions
            .values()
            .filter(|s| s.event_id == event_id)
            .cloned()
            .collect();
        sessions.sort_by_key(|s| s.start_time);
        Ok(sessions)
    }

    async fn get_ticket_definition(&self, id: Uuid) -> StoreResult<Option<TicketDefinition>> {
        Ok(self.state.read().await.tickets.get(&id).cloned())
    }

    async fn update_ticket_quantity(&self, id: Uuid, quantity: i32) -> StoreResult<bool> {
        let mut state = self.state.write().await;
        match state.tickets.get_mut(&id) {
            Some(ticket) if ticket.sold_quantity <= quantity => {
                ticket.ticket_quantity = quantity;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn update_ticket_status(
        &self,
        id: Uuid,
        status: TicketDefinitionStatus,
    ) -> StoreResult<bool> {
        let mut state = self.state.write().await;
        Ok(state
            .tickets
            .get_mut(&id)
            .map(|ticket| ticket.status = status)
            .is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn ticket(quantity: i32, sold: i32) -> TicketDefinition {
        TicketDefinition {
            id: Uuid::new_v4(),
            session_id: Uuid::new_v4(),
            name: "Standard".to_string(),
            price: 200_000,
            ticket_quantity: quantity,
            sold_quantity: sold,
            min_per_order: 1,
            max_per_order: 10,
            status: TicketDefinitionStatus::Available,
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_increments_are_not_lost() {
        let catalog = Arc::new(InMemoryCatalog::new());
        let def = ticket(1000, 0);
        let id = def.id;
        catalog.insert_ticket_definition(def).await;

        let mut handles = Vec::new();
        for _ in 0..50 {
            let catalog = catalog.clone();
            handles.push(tokio::spawn(async move {
                catalog.increment_sold(id, 1).await;
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let stored = catalog.get_ticket_definition(id).await.unwrap().unwrap();
        assert_eq!(stored.sold_quantity, 50);
    }

    #[tokio::test]
    async fn test_quantity_guard() {
        let catalog = InMemoryCatalog::new();
        let def = ticket(100, 40);
        let id = def.id;
        catalog.insert_ticket_definition(def).await;

        assert!(!catalog.update_ticket_quantity(id, 39).await.unwrap());
        assert!(catalog.update_ticket_quantity(id, 40).await.unwrap());
        assert!(!catalog.update_ticket_quantity(Uuid::new_v4(), 10).await.unwrap());

        let stored = catalog.get_ticket_definition(id).await.unwrap().unwrap();
        assert_eq!(stored.ticket_quantity, 40);
        assert_eq!(stored.remaining(), 0);
    }

    #[tokio::test]
    async fn test_increment_missing_definition() {
        let catalog = InMemoryCatalog::new();
        assert_eq!(catalog.increment_sold(Uuid::new_v4(), 1).await, None);
    }
}
