use gatepass_core::RetryPolicy;
use std::sync::Arc;
use uuid::Uuid;

use crate::models::{TicketDefinition, TicketDefinitionStatus};
use crate::repository::CatalogRepository;
use crate::CatalogError;

/// Administrative quantity and sale-status edits on ticket definitions.
pub struct AvailabilityService {
    catalog: Arc<dyn CatalogRepository>,
    retry: RetryPolicy,
}

impl AvailabilityService {
    pub fn new(catalog: Arc<dyn CatalogRepository>, retry: RetryPolicy) -> Self {
        Self { catalog, retry }
    }

    /// Never lets `ticket_quantity` drop below what has already been sold.
    pub async fn set_ticket_quantity(
        &self,
        ticket_id: Uuid,
        quantity: i32,
    ) -> Result<TicketDefinition, CatalogError> {
        if quantity < 0 {
            return Err(CatalogError::InvalidQuantity(quantity));
        }

        let updated = self
            .retry
            .run("update_ticket_quantity", || {
                self.catalog.update_ticket_quantity(ticket_id, quantity)
            })
            .await?;
        let ticket = self.load(ticket_id).await?;

        if !updated {
            return Err(CatalogError::QuantityBelowSold {
                ticket_id,
                requested: quantity,
                sold: ticket.sold_quantity,
            });
        }

        tracing::info!("Ticket {} quantity set to {}", ticket_id, quantity);
        Ok(ticket)
    }

    pub async fn set_ticket_status(
        &self,
        ticket_id: Uuid,
        status: TicketDefinitionStatus,
    ) -> Result<TicketDefinition, CatalogError> {
        let updated = self
            .retry
            .run("update_ticket_status", || {
                self.catalog.update_ticket_status(ticket_id, status)
            })
            .await?;
        if !updated {
            return Err(CatalogError::TicketNotFound(ticket_id));
        }

        tracing::info!("Ticket {} is now {}", ticket_id, status);
        self.load(ticket_id).await
    }

    /// available ⇄ stopped
    pub async fn toggle_ticket_status(
        &self,
        ticket_id: Uuid,
    ) -> Result<TicketDefinition, CatalogError> {
        let current = self.load(ticket_id).await?;
        self.set_ticket_status(ticket_id, current.status.toggled()).await
    }

    async fn load(&self, ticket_id: Uuid) -> Result<TicketDefinition, CatalogError> {
        self.retry
            .run("get_ticket_definition", || {
                self.catalog.get_ticket_definition(ticket_id)
            })
            .await?
            .ok_or(CatalogError::TicketNotFound(ticket_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::InMemoryCatalog;
    use crate::models::{Event, Session};
    use async_trait::async_trait;
    use gatepass_core::{StoreError, StoreResult};
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Reports the store unavailable for the first `outages` writes.
    struct Flapping {
        inner: InMemoryCatalog,
        outages: AtomicU32,
    }

    #[async_trait]
    impl CatalogRepository for Flapping {
        async fn get_event(&self, id: Uuid) -> StoreResult<Option<Event>> {
            self.inner.get_event(id).await
        }

        async fn get_session(&self, id: Uuid) -> StoreResult<Option<Session>> {
            self.inner.get_session(id).await
        }

        async fn list_event_sessions(&self, event_id: Uuid) -> StoreResult<Vec<Session>> {
            self.inner.list_event_sessions(event_id).await
        }

        async fn get_ticket_definition(&self, id: Uuid) -> StoreResult<Option<TicketDefinition>> {
            self.inner.get_ticket_definition(id).await
        }

        async fn update_ticket_quantity(&self, id: Uuid, quantity: i32) -> StoreResult<bool> {
            self.outage()?;
            self.inner.update_ticket_quantity(id, quantity).await
        }

        async fn update_ticket_status(
            &self,
            id: Uuid,
            status: TicketDefinitionStatus,
        ) -> StoreResult<bool> {
            self.outage()?;
            self.inner.update_ticket_status(id, status).await
        }
    }

    impl Flapping {
        fn outage(&self) -> StoreResult<()> {
            let left = self.outages.load(Ordering::SeqCst);
            if left > 0 {
                self.outages.store(left - 1, Ordering::SeqCst);
                return Err(StoreError::Unavailable("pool timed out".into()));
            }
            Ok(())
        }
    }

    async fn setup(sold: i32) -> (AvailabilityService, Uuid) {
        let catalog = Arc::new(InMemoryCatalog::new());
        let ticket = TicketDefinition {
            id: Uuid::new_v4(),
            session_id: Uuid::new_v4(),
            name: "Early bird".to_string(),
            price: 100_000,
            ticket_quantity: 50,
            sold_quantity: sold,
            min_per_order: 1,
            max_per_order: 5,
            status: TicketDefinitionStatus::Available,
        };
        let id = ticket.id;
        catalog.insert_ticket_definition(ticket).await;
        (AvailabilityService::new(catalog, RetryPolicy::none()), id)
    }

    #[tokio::test]
    async fn test_quantity_cannot_drop_below_sold() {
        let (service, id) = setup(20).await;

        let err = service.set_ticket_quantity(id, 19).await.unwrap_err();
        assert!(matches!(err, CatalogError::QuantityBelowSold { sold: 20, .. }));

        let ticket = service.set_ticket_quantity(id, 25).await.unwrap();
        assert_eq!(ticket.ticket_quantity, 25);
    }

    #[tokio::test]
    async fn test_quantity_on_missing_ticket() {
        let (service, _) = setup(0).await;
        let err = service.set_ticket_quantity(Uuid::new_v4(), 5).await.unwrap_err();
        assert!(matches!(err, CatalogError::TicketNotFound(_)));

        let (service, id) = setup(0).await;
        let err = service.set_ticket_quantity(id, -1).await.unwrap_err();
        assert!(matches!(err, CatalogError::InvalidQuantity(-1)));
    }

    #[tokio::test]
    async fn test_toggle_status() {
        let (service, id) = setup(0).await;

        let ticket = service.toggle_ticket_status(id).await.unwrap();
        assert_eq!(ticket.status, TicketDefinitionStatus::Stopped);

        let ticket = service.toggle_ticket_status(id).await.unwrap();
        assert_eq!(ticket.status, TicketDefinitionStatus::Available);
    }

    #[tokio::test]
    async fn test_edits_retry_transient_outages() {
        let ticket = TicketDefinition {
            id: Uuid::new_v4(),
            session_id: Uuid::new_v4(),
            name: "General".to_string(),
            price: 80_000,
            ticket_quantity: 50,
            sold_quantity: 5,
            min_per_order: 1,
            max_per_order: 5,
            status: TicketDefinitionStatus::Available,
        };
        let id = ticket.id;
        let inner = InMemoryCatalog::new();
        inner.insert_ticket_definition(ticket).await;
        let catalog = Arc::new(Flapping {
            inner,
            outages: AtomicU32::new(2),
        });
        let retry = RetryPolicy {
            max_attempts: 3,
            base_delay_ms: 1,
        };

        let service = AvailabilityService::new(catalog.clone(), retry);
        let ticket = service.set_ticket_quantity(id, 60).await.unwrap();
        assert_eq!(ticket.ticket_quantity, 60);

        catalog.outages.store(5, Ordering::SeqCst);
        let err = service.toggle_ticket_status(id).await.unwrap_err();
        assert_eq!(err.code(), "store_unavailable");
    }
}
