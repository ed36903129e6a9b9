use async_trait::async_trait;
use gatepass_core::StoreResult;
use uuid::Uuid;

use crate::models::{Issuance, Order, OrderStatus, PaymentInfo, TicketTransition};

/// Persistence for order aggregates. Status writes are compare-and-set:
/// they return `false`, and change nothing, when the stored status is no
/// longer the expected one.
#[async_trait]
pub trait OrderRepository: Send + Sync {
    async fn create_order(&self, order: &Order) -> StoreResult<Uuid>;

    async fn get_order(&self, id: Uuid) -> StoreResult<Option<Order>>;

    /// Newest first.
    async fn list_user_orders(&self, user_id: Uuid) -> StoreResult<Vec<Order>>;

    /// Orders holding at least one instance for the session.
    async fn list_session_orders(&self, session_id: Uuid) -> StoreResult<Vec<Order>>;

    /// `from → to`; replaces the payment record when `payment` is given.
    async fn transition_order(
        &self,
        id: Uuid,
        from: OrderStatus,
        to: OrderStatus,
        payment: Option<&PaymentInfo>,
    ) -> StoreResult<bool>;

    /// Settles a pending order as one atomic step: `pending → paid`
    /// (recording `payment` when given), each issuance applied as
    /// `pending → valid`, and one sale credited to the ticket definition of
    /// every instance issued. Either all of it happens or none of it does.
    /// Returns `false` when the order is missing or no longer pending.
    async fn settle_order(
        &self,
        id: Uuid,
        payment: Option<&PaymentInfo>,
        issue: &[Issuance],
    ) -> StoreResult<bool>;

    /// Check-in and refund moves. Issuance goes through `settle_order` so
    /// that sales are credited with it.
    async fn transition_ticket(
        &self,
        order_id: Uuid,
        instance_id: Uuid,
        transition: &TicketTransition,
    ) -> StoreResult<bool>;
}
