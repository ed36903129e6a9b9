use gatepass_catalog::{CatalogError, CatalogRepository, LineQuote, PricingPolicy};
use gatepass_core::{RetryPolicy, StoreError};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::models::{Order, PaymentMethod, TicketInstance};
use crate::repository::OrderRepository;

/// Hard ceiling on instances per order, applied before any catalog lookup.
pub const MAX_TICKETS_PER_ORDER: i64 = 100;

/// One requested ticket line as sent by the storefront.
#[derive(Debug, Clone, Deserialize)]
pub struct TicketLine {
    pub ticket_id: Uuid,
    pub session_id: Uuid,
    pub price: i64,
    pub quantity: i32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutRequest {
    pub user_id: Uuid,
    pub email: String,
    pub tickets: Vec<TicketLine>,
    pub total_amount: i64,
    #[serde(default)]
    pub payment_method: PaymentMethod,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CheckoutReceipt {
    #[serde(rename = "orderId")]
    pub order_id: Uuid,
    pub total_amount: i64,
}

#[derive(Debug, thiserror::Error)]
pub enum CheckoutError {
    #[error("Order has no ticket lines")]
    EmptyOrder,

    #[error("Contact email is missing or malformed")]
    InvalidEmail,

    #[error("Invalid quantity {0} on ticket line")]
    InvalidQuantity(i32),

    #[error("Invalid price {0} on ticket line")]
    InvalidPrice(i64),

    #[error("Order asks for {requested} tickets, at most {max} allowed")]
    TooManyTickets { requested: i64, max: i64 },

    #[error("Declared total {declared} does not match computed total {computed}")]
    TotalMismatch { declared: i64, computed: i64 },

    #[error("Order total does not fit the amount range")]
    TotalOverflow,

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl CheckoutError {
    pub fn code(&self) -> &'static str {
        match self {
            CheckoutError::EmptyOrder => "empty_order",
            CheckoutError::InvalidEmail => "invalid_email",
            CheckoutError::InvalidQuantity(_) => "invalid_quantity",
            CheckoutError::InvalidPrice(_) => "invalid_price",
            CheckoutError::TooManyTickets { .. } => "too_many_tickets",
            CheckoutError::TotalMismatch { .. } => "total_mismatch",
            CheckoutError::TotalOverflow => "total_overflow",
            CheckoutError::Catalog(e) => e.code(),
            CheckoutError::Store(StoreError::Unavailable(_)) => "store_unavailable",
            CheckoutError::Store(_) => "store_error",
        }
    }
}

/// Expands a cart into a pending order with one instance per unit.
pub struct CheckoutService {
    orders: Arc<dyn OrderRepository>,
    catalog: Arc<dyn CatalogRepository>,
    policy: PricingPolicy,
    retry: RetryPolicy,
}

impl CheckoutService {
    pub fn new(
        orders: Arc<dyn OrderRepository>,
        catalog: Arc<dyn CatalogRepository>,
        policy: PricingPolicy,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            orders,
            catalog,
            policy,
            retry,
        }
    }

    pub async fn checkout(
        &self,
        request: CheckoutRequest,
    ) -> Result<CheckoutReceipt, CheckoutError> {
        if request.tickets.is_empty() {
            return Err(CheckoutError::EmptyOrder);
        }
        if !request.email.contains('@') {
            return Err(CheckoutError::InvalidEmail);
        }
        let mut units: i64 = 0;
        for line in &request.tickets {
            if line.quantity <= 0 {
                return Err(CheckoutError::InvalidQuantity(line.quantity));
            }
            if line.price < 0 {
                return Err(CheckoutError::InvalidPrice(line.price));
            }
            units = units.saturating_add(i64::from(line.quantity));
        }
        if units > MAX_TICKETS_PER_ORDER {
            return Err(CheckoutError::TooManyTickets {
                requested: units,
                max: MAX_TICKETS_PER_ORDER,
            });
        }

        let quotes = if self.policy.enforce_catalog {
            self.quote_lines(&request.tickets).await?
        } else {
            request
                .tickets
                .iter()
                .map(|line| LineQuote {
                    ticket_definition_id: line.ticket_id,
                    session_id: line.session_id,
                    unit_price: line.price,
                    quantity: line.quantity,
                })
                .collect()
        };

        let computed = quotes
            .iter()
            .try_fold(0i64, |total, quote| quote.subtotal()?.checked_add(total))
            .ok_or(CheckoutError::TotalOverflow)?;
        if computed != request.total_amount {
            return Err(CheckoutError::TotalMismatch {
                declared: request.total_amount,
                computed,
            });
        }

        let mut order = Order::new(request.user_id, request.email, request.payment_method);
        for quote in &quotes {
            for _ in 0..quote.quantity {
                order.add_ticket(TicketInstance::pending(
                    quote.ticket_definition_id,
                    quote.session_id,
                    quote.unit_price,
                ));
            }
        }

        let order_id = self
            .retry
            .run("create_order", || self.orders.create_order(&order))
            .await?;

        tracing::info!(
            "Order {} created for {} with {} tickets, total {}",
            order_id,
            order.email,
            order.tickets.len(),
            order.total_amount
        );

        Ok(CheckoutReceipt {
            order_id,
            total_amount: order.total_amount,
        })
    }

    /// Re-prices lines from the catalog. Lines for the same definition are
    /// merged so per-order bounds and stock apply to their combined quantity.
    async fn quote_lines(&self, lines: &[TicketLine]) -> Result<Vec<LineQuote>, CheckoutError> {
        let mut groups: Vec<(&TicketLine, i32)> = Vec::new();
        for line in lines {
            match groups.iter_mut().find(|(first, _)| first.ticket_id == line.ticket_id) {
                Some((first, quantity)) => {
                    if first.session_id != line.session_id {
                        return Err(CatalogError::SessionMismatch {
                            ticket_id: line.ticket_id,
                            session_id: line.session_id,
                        }
                        .into());
                    }
                    if first.price != line.price {
                        return Err(CatalogError::PriceMismatch {
                            ticket_id: line.ticket_id,
                            declared: line.price,
                            actual: first.price,
                        }
                        .into());
                    }
                    // saturates into the per-order bound check
                    *quantity = quantity.saturating_add(line.quantity);
                }
                None => groups.push((line, line.quantity)),
            }
        }

        let mut quotes = Vec::with_capacity(groups.len());
        for (line, quantity) in groups {
            let ticket = self
                .retry
                .run("get_ticket_definition", || {
                    self.catalog.get_ticket_definition(line.ticket_id)
                })
                .await?
                .ok_or(CatalogError::TicketNotFound(line.ticket_id))?;

            let session = self
                .retry
                .run("get_session", || self.catalog.get_session(line.session_id))
                .await?
                .ok_or(CatalogError::SessionNotFound(line.session_id))?;

            quotes.push(self.policy.quote(&ticket, &session, quantity, line.price)?);
        }
        Ok(quotes)
    }
}
