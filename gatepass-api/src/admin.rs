use axum::{
    extract::{Path, State},
    Json,
};
use gatepass_catalog::{TicketDefinition, TicketDefinitionStatus};
use gatepass_order::RefundSummary;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct UpdateQuantityRequest {
    pub ticket_quantity: i32,
}

/// Without `status` the current one is toggled.
#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: Option<TicketDefinitionStatus>,
}

/// PUT /admin/ticket-definitions/{id}/quantity
pub async fn update_ticket_quantity(
    State(state): State<AppState>,
    Path(ticket_id): Path<Uuid>,
    Json(req): Json<UpdateQuantityRequest>,
) -> Result<Json<TicketDefinition>, AppError> {
    let ticket = state
        .availability
        .set_ticket_quantity(ticket_id, req.ticket_quantity)
        .await?;
    Ok(Json(ticket))
}

/// PUT /admin/ticket-definitions/{id}/status
pub async fn update_ticket_status(
    State(state): State<AppState>,
    Path(ticket_id): Path<Uuid>,
    Json(req): Json<UpdateStatusRequest>,
) -> Result<Json<TicketDefinition>, AppError> {
    let ticket = match req.status {
        Some(status) => state.availability.set_ticket_status(ticket_id, status).await?,
        None => state.availability.toggle_ticket_status(ticket_id).await?,
    };
    Ok(Json(ticket))
}

/// POST /admin/sessions/{id}/refund
pub async fn refund_session(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<RefundSummary>, AppError> {
    Ok(Json(state.refunds.refund_session(session_id).await?))
}

/// POST /admin/events/{id}/refund
pub async fn refund_event(
    State(state): State<AppState>,
    Path(event_id): Path<Uuid>,
) -> Result<Json<RefundSummary>, AppError> {
    Ok(Json(state.refunds.refund_event(event_id).await?))
}
