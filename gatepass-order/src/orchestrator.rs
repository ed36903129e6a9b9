use chrono::Utc;
use gatepass_core::{PaymentError, PaymentGateway, PaymentRequest, QueryParams, RetryPolicy};
use std::sync::Arc;
use uuid::Uuid;

use crate::models::{Order, OrderStatus, PaymentInfo};
use crate::repository::OrderRepository;
use crate::settlement::{SettlementError, SettlementHandler, SettlementOutcome};

#[derive(Debug, thiserror::Error)]
pub enum CallbackError {
    #[error(transparent)]
    Payment(#[from] PaymentError),

    #[error(transparent)]
    Settlement(#[from] SettlementError),
}

impl CallbackError {
    pub fn code(&self) -> &'static str {
        match self {
            CallbackError::Payment(e) => e.code(),
            CallbackError::Settlement(e) => e.code(),
        }
    }
}

/// Drives one order through the hosted payment page: builds the signed
/// redirect and turns the verified return into a settlement.
pub struct PaymentOrchestrator {
    gateway: Arc<dyn PaymentGateway>,
    orders: Arc<dyn OrderRepository>,
    settlement: Arc<SettlementHandler>,
    retry: RetryPolicy,
}

impl PaymentOrchestrator {
    pub fn new(
        gateway: Arc<dyn PaymentGateway>,
        orders: Arc<dyn OrderRepository>,
        settlement: Arc<SettlementHandler>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            gateway,
            orders,
            settlement,
            retry,
        }
    }

    /// `amount` is in whole currency units and must equal the stored total;
    /// the gateway receives it ×100.
    pub async fn create_payment_url(
        &self,
        order_id: Uuid,
        amount: i64,
        client_ip: &str,
    ) -> Result<String, PaymentError> {
        let order = self.load(order_id).await?;

        if order.status != OrderStatus::Pending {
            return Err(PaymentError::NotPayable {
                order_id,
                status: order.status.to_string(),
            });
        }
        if amount != order.total_amount {
            tracing::warn!(
                "Payment URL for order {} requested with amount {}, total is {}",
                order_id,
                amount,
                order.total_amount
            );
            return Err(PaymentError::AmountMismatch {
                expected: order.total_amount,
                declared: amount,
            });
        }

        let url = self.gateway.build_payment_url(&PaymentRequest {
            order_id,
            amount,
            client_ip: client_ip.to_string(),
            created_at: Utc::now(),
        });
        tracing::info!("Payment URL issued for order {}", order_id);
        Ok(url)
    }

    /// Handles the gateway's return redirect. Deliveries may repeat; the
    /// settlement handler makes the repeat a no-op.
    pub async fn handle_return(
        &self,
        params: &QueryParams,
    ) -> Result<SettlementOutcome, CallbackError> {
        let callback = self.gateway.verify_callback(params)?;
        let order = self.load(callback.order_id).await?;

        let expected = order.total_amount * 100;
        if callback.amount_minor != expected {
            tracing::warn!(
                "Callback for order {} declares {}, expected {}",
                order.id,
                callback.amount_minor,
                expected
            );
            return Err(PaymentError::AmountMismatch {
                expected,
                declared: callback.amount_minor,
            }
            .into());
        }

        if !callback.is_success() {
            return Ok(self
                .settlement
                .on_gateway_failure(order.id, &callback.response_code)
                .await?);
        }

        let payment = PaymentInfo {
            transaction_no: callback.transaction_no,
            bank_code: callback.bank_code,
            pay_date: callback.pay_date,
            ..PaymentInfo::default()
        };
        Ok(self.settlement.on_gateway_success(order.id, payment).await?)
    }

    async fn load(&self, order_id: Uuid) -> Result<Order, PaymentError> {
        self.retry
            .run("get_order", || self.orders.get_order(order_id))
            .await?
            .ok_or(PaymentError::OrderNotFound(order_id))
    }
}
