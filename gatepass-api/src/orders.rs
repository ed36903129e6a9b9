use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Extension, Json, Router,
};
use gatepass_order::{CheckoutReceipt, CheckoutRequest, Order};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::middleware::CustomerClaims;
use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ConfirmFreeRequest {
    #[serde(rename = "orderId")]
    pub order_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct ConfirmFreeResponse {
    pub success: bool,
}

/// Buyers list their own orders; only admins may name another `user_id`.
#[derive(Debug, Deserialize)]
pub struct ListOrdersQuery {
    pub user_id: Option<Uuid>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/order/create", post(create_order))
        .route("/order/confirm-free", post(confirm_free_order))
}

/// Lookups that expose QR credentials; mounted behind customer auth.
pub fn buyer_routes() -> Router<AppState> {
    Router::new()
        .route("/orders", get(list_orders))
        .route("/orders/{id}", get(get_order))
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /order/create
pub async fn create_order(
    State(state): State<AppState>,
    Json(req): Json<CheckoutRequest>,
) -> Result<Json<CheckoutReceipt>, AppError> {
    let receipt = state.checkout.checkout(req).await.map_err(|e| {
        tracing::warn!("Checkout rejected: {}", e);
        e
    })?;
    Ok(Json(receipt))
}

/// POST /order/confirm-free
pub async fn confirm_free_order(
    State(state): State<AppState>,
    Json(req): Json<ConfirmFreeRequest>,
) -> Result<Json<ConfirmFreeResponse>, AppError> {
    state.settlement.confirm_free_order(req.order_id).await?;
    Ok(Json(ConfirmFreeResponse { success: true }))
}

/// GET /orders/{id}
pub async fn get_order(
    State(state): State<AppState>,
    Extension(claims): Extension<CustomerClaims>,
    Path(order_id): Path<Uuid>,
) -> Result<Json<Order>, AppError> {
    let order = state
        .retry
        .run("get_order", || state.orders.get_order(order_id))
        .await?
        .ok_or_else(|| AppError::NotFound {
            code: "order_not_found",
            message: format!("Order not found: {}", order_id),
        })?;

    if !claims.may_read(order.user_id) {
        tracing::warn!("User {} denied access to order {}", claims.sub, order_id);
        return Err(AppError::Forbidden(format!("Order {} belongs to another buyer", order_id)));
    }

    tracing::debug!("Order {} fetched for {:?}", order.id, order.email);
    Ok(Json(order))
}

/// GET /orders, GET /orders?user_id= (admin)
pub async fn list_orders(
    State(state): State<AppState>,
    Extension(claims): Extension<CustomerClaims>,
    Query(query): Query<ListOrdersQuery>,
) -> Result<Json<Vec<Order>>, AppError> {
    let user_id = query.user_id.unwrap_or(claims.sub);
    if !claims.may_read(user_id) {
        return Err(AppError::Forbidden("Cannot list another buyer's orders".to_string()));
    }

    let orders = state
        .retry
        .run("list_user_orders", || state.orders.list_user_orders(user_id))
        .await?;
    Ok(Json(orders))
}
