use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use gatepass_core::QueryParams;
use gatepass_order::SettlementOutcome;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::middleware::ClientIp;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct PaymentUrlQuery {
    #[serde(rename = "orderId")]
    pub order_id: Uuid,
    pub amount: i64,
}

#[derive(Debug, Serialize)]
pub struct PaymentUrlResponse {
    #[serde(rename = "paymentUrl")]
    pub payment_url: String,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/payment/create-payment-url", get(create_payment_url))
        .route("/payment/vnpay-return", get(vnpay_return))
}

/// GET /payment/create-payment-url?orderId&amount
pub async fn create_payment_url(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    Query(query): Query<PaymentUrlQuery>,
) -> Result<Json<PaymentUrlResponse>, AppError> {
    let payment_url = state
        .payments
        .create_payment_url(query.order_id, query.amount, &ip)
        .await?;
    Ok(Json(PaymentUrlResponse { payment_url }))
}

/// GET /payment/vnpay-return?<gateway params>
pub async fn vnpay_return(
    State(state): State<AppState>,
    Query(params): Query<QueryParams>,
) -> Result<Json<SettlementOutcome>, AppError> {
    let outcome = state.payments.handle_return(&params).await.map_err(|e| {
        tracing::warn!(
            txn_ref = params.get("vnp_TxnRef").map(String::as_str).unwrap_or(""),
            "Gateway return rejected: {}",
            e
        );
        e
    })?;
    Ok(Json(outcome))
}
