use async_trait::async_trait;
use gatepass_core::StoreResult;
use uuid::Uuid;

use crate::models::{Event, Session, TicketDefinition, TicketDefinitionStatus};

/// Read access to catalog reference data plus the few writes this core
/// is allowed to make on ticket definitions.
#[async_trait]
pub trait CatalogRepository: Send + Sync {
    async fn get_event(&self, id: Uuid) -> StoreResult<Option<Event>>;

    async fn get_session(&self, id: Uuid) -> StoreResult<Option<Session>>;

    /// All sessions of an event, any status, ordered by start time.
    async fn list_event_sessions(&self, event_id: Uuid) -> StoreResult<Vec<Session>>;

    async fn get_ticket_definition(&self, id: Uuid) -> StoreResult<Option<TicketDefinition>>;

    /// Sets `ticket_quantity` only when it is not below `sold_quantity`.
    /// Returns `false` when the guard fails or the definition is missing.
    async fn update_ticket_quantity(&self, id: Uuid, quantity: i32) -> StoreResult<bool>;

    async fn update_ticket_status(
        &self,
        id: Uuid,
        status: TicketDefinitionStatus,
    ) -> StoreResult<bool>;
}
