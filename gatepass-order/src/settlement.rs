use gatepass_core::{RetryPolicy, StoreError};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::fulfillment::{confirmation_event, OrderNotifier, QrPayload};
use crate::models::{Issuance, Order, OrderStatus, PaymentInfo, TicketStatus};
use crate::repository::OrderRepository;

/// Result shape returned to the gateway return page and the free-order flow.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum SettlementOutcome {
    Success {
        #[serde(rename = "orderId")]
        order_id: Uuid,
    },
    Failed {
        code: String,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum SettlementError {
    #[error("Order not found: {0}")]
    OrderNotFound(Uuid),

    #[error("Order {order_id} has total {total_amount} and is not free")]
    NotFree { order_id: Uuid, total_amount: i64 },

    #[error("Order {order_id}: invalid transition from {from} to {to}")]
    InvalidTransition {
        order_id: Uuid,
        from: OrderStatus,
        to: OrderStatus,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl SettlementError {
    pub fn code(&self) -> &'static str {
        match self {
            SettlementError::OrderNotFound(_) => "order_not_found",
            SettlementError::NotFree { .. } => "not_free",
            SettlementError::InvalidTransition { .. } => "invalid_transition",
            SettlementError::Store(StoreError::Unavailable(_)) => "store_unavailable",
            SettlementError::Store(_) => "store_error",
        }
    }
}

/// Finalizes payment outcomes. Every entry point may be invoked repeatedly
/// for the same order: settlement is a single compare-and-set on the pending
/// order that issues the instances and credits their sales together, so a
/// second delivery finds the order already paid and changes nothing.
pub struct SettlementHandler {
    orders: Arc<dyn OrderRepository>,
    notifier: Arc<dyn OrderNotifier>,
    retry: RetryPolicy,
}

impl SettlementHandler {
    pub fn new(
        orders: Arc<dyn OrderRepository>,
        notifier: Arc<dyn OrderNotifier>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            orders,
            notifier,
            retry,
        }
    }

    /// Verified gateway success (response code "00").
    pub async fn on_gateway_success(
        &self,
        order_id: Uuid,
        payment: PaymentInfo,
    ) -> Result<SettlementOutcome, SettlementError> {
        let order = self.load(order_id).await?;
        self.settle(order, Some(payment)).await
    }

    pub async fn on_gateway_failure(
        &self,
        order_id: Uuid,
        code: &str,
    ) -> Result<SettlementOutcome, SettlementError> {
        let order = self.load(order_id).await?;

        match order.status {
            OrderStatus::Failed => {}
            OrderStatus::Pending => {
                let moved = self
                    .retry
                    .run("transition_order", || {
                        self.orders.transition_order(
                            order_id,
                            OrderStatus::Pending,
                            OrderStatus::Failed,
                            None,
                        )
                    })
                    .await?;
                if moved {
                    tracing::info!("Order {} marked failed, gateway code {}", order_id, code);
                } else {
                    self.ensure_status(order_id, OrderStatus::Failed).await?;
                }
            }
            other => {
                return Err(SettlementError::InvalidTransition {
                    order_id,
                    from: other,
                    to: OrderStatus::Failed,
                })
            }
        }

        Ok(SettlementOutcome::Failed {
            code: code.to_string(),
        })
    }

    /// Issues tickets for a zero-total order without the gateway.
    pub async fn confirm_free_order(
        &self,
        order_id: Uuid,
    ) -> Result<SettlementOutcome, SettlementError> {
        let order = self.load(order_id).await?;
        if !order.is_free() {
            return Err(SettlementError::NotFree {
                order_id,
                total_amount: order.total_amount,
            });
        }
        self.settle(order, None).await
    }

    async fn settle(
        &self,
        order: Order,
        payment: Option<PaymentInfo>,
    ) -> Result<SettlementOutcome, SettlementError> {
        let order_id = order.id;
        if order.status != OrderStatus::Pending {
            return settled_outcome(order_id, order.status);
        }

        let issue: Vec<Issuance> = order
            .tickets_in(TicketStatus::Pending)
            .map(|ticket| Issuance {
                instance_id: ticket.id,
                qr_code: QrPayload::for_ticket(order_id, ticket).encode(),
            })
            .collect();

        let won = self
            .retry
            .run("settle_order", || {
                self.orders.settle_order(order_id, payment.as_ref(), &issue)
            })
            .await?;
        if !won {
            // a concurrent delivery settled it, or the order moved elsewhere
            let current = self.load(order_id).await?;
            return settled_outcome(order_id, current.status);
        }

        tracing::info!("Order {} paid, issued {} tickets", order_id, issue.len());
        let settled = self.load(order_id).await?;
        if let Err(e) = self.notifier.order_confirmed(&confirmation_event(&settled)).await {
            tracing::error!("Failed to publish confirmation for order {}: {}", order_id, e);
        }

        Ok(SettlementOutcome::Success { order_id })
    }

    /// After a lost compare-and-set: fine if a concurrent call reached the
    /// same status, an invalid transition otherwise.
    async fn ensure_status(
        &self,
        order_id: Uuid,
        target: OrderStatus,
    ) -> Result<(), SettlementError> {
        let current = self.load(order_id).await?.status;
        if current == target {
            Ok(())
        } else {
            Err(SettlementError::InvalidTransition {
                order_id,
                from: current,
                to: target,
            })
        }
    }

    async fn load(&self, order_id: Uuid) -> Result<Order, SettlementError> {
        self.retry
            .run("get_order", || self.orders.get_order(order_id))
            .await?
            .ok_or(SettlementError::OrderNotFound(order_id))
    }
}

/// Answer for a success delivery on an order that is no longer pending.
/// Paid and refunded orders were settled once already; cancelled and failed
/// orders never were, so crediting them now would be wrong.
fn settled_outcome(
    order_id: Uuid,
    status: OrderStatus,
) -> Result<SettlementOutcome, SettlementError> {
    match status {
        OrderStatus::Paid => Ok(SettlementOutcome::Success { order_id }),
        OrderStatus::Refunded => {
            tracing::warn!("Late success delivery for refunded order {}, ignored", order_id);
            Ok(SettlementOutcome::Success { order_id })
        }
        other => {
            tracing::warn!("Late success delivery for {} order {}, refused", other, order_id);
            Err(SettlementError::InvalidTransition {
                order_id,
                from: other,
                to: OrderStatus::Paid,
            })
        }
    }
}
