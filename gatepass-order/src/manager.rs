use async_trait::async_trait;
use chrono::Utc;
use gatepass_catalog::InMemoryCatalog;
use gatepass_core::StoreResult;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::{Issuance, Order, OrderStatus, PaymentInfo, TicketTransition};
use crate::repository::OrderRepository;

/// In-memory order store. Each compare-and-set runs under the write lock,
/// which makes it atomic with respect to every other reader and writer.
/// Settlement credits sales on the catalog it shares with checkout while
/// that lock is still held; the catalog never takes the order lock.
pub struct InMemoryOrderStore {
    orders: RwLock<HashMap<Uuid, Order>>,
    catalog: Arc<InMemoryCatalog>,
}

impl InMemoryOrderStore {
    pub fn new(catalog: Arc<InMemoryCatalog>) -> Self {
        Self {
            orders: RwLock::new(HashMap::new()),
            catalog,
        }
    }
}

#[async_trait]
impl OrderRepository for InMemoryOrderStore {
    async fn create_order(&self, order: &Order) -> StoreResult<Uuid> {
        self.orders.write().await.insert(order.id, order.clone());
        Ok(order.id)
    }

    async fn get_order(&self, id: Uuid) -> StoreResult<Option<Order>> {
        Ok(self.orders.read().await.get(&id).cloned())
    }

    async fn list_user_orders(&self, user_id: Uuid) -> StoreResult<Vec<Order>> {
        let orders = self.orders.read().await;
        let mut matching: Vec<Order> = orders
            .values()
            .filter(|o| o.user_id == user_id)
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(matching)
    }

    async fn list_session_orders(&self, session_id: Uuid) -> StoreResult<Vec<Order>> {
        let orders = self.orders.read().await;
        Ok(orders
            .values()
            .filter(|o| o.tickets.iter().any(|t| t.session_id == session_id))
            .cloned()
            .collect())
    }

    async fn transition_order(
        &self,
        id: Uuid,
        from: OrderStatus,
        to: OrderStatus,
        payment: Option<&PaymentInfo>,
    ) -> StoreResult<bool> {
        let mut orders = self.orders.write().await;
        let Some(order) = orders.get_mut(&id) else {
            return Ok(false);
        };

        if order.status != from {
            return Ok(false);
        }

        order.status = to;
        if let Some(payment) = payment {
            order.payment = payment.clone();
        }
        order.updated_at = Utc::now();
        Ok(true)
    }

    async fn settle_order(
        &self,
        id: Uuid,
        payment: Option<&PaymentInfo>,
        issue: &[Issuance],
    ) -> StoreResult<bool> {
        let mut orders = self.orders.write().await;
        let Some(order) = orders.get_mut(&id) else {
            return Ok(false);
        };
        if order.status != OrderStatus::Pending {
            return Ok(false);
        }

        let mut credits: Vec<Uuid> = Vec::with_capacity(issue.len());
        for issuance in issue {
            if let Some(ticket) = order.tickets.iter_mut().find(|t| t.id == issuance.instance_id) {
                if issuance.apply(ticket) {
                    credits.push(ticket.ticket_definition_id);
                }
            }
        }
        for definition_id in credits {
            if self.catalog.increment_sold(definition_id, 1).await.is_none() {
                tracing::warn!(
                    "Ticket definition {} missing while settling order {}",
                    definition_id,
                    id
                );
            }
        }

        order.status = OrderStatus::Paid;
        if let Some(payment) = payment {
            order.payment = payment.clone();
        }
        order.updated_at = Utc::now();
        Ok(true)
    }

    async fn transition_ticket(
        &self,
        order_id: Uuid,
        instance_id: Uuid,
        transition: &TicketTransition,
    ) -> StoreResult<bool> {
        let mut orders = self.orders.write().await;
        let Some(order) = orders.get_mut(&order_id) else {
            return Ok(false);
        };

        let applied = order
            .tickets
            .iter_mut()
            .find(|t| t.id == instance_id)
            .map(|ticket| transition.apply(ticket))
            .unwrap_or(false);

        if applied {
            order.updated_at = Utc::now();
        }
        Ok(applied)
    }
}
