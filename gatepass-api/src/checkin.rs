use axum::{extract::State, Extension, Json};
use gatepass_order::CheckInConfirmation;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::AppError;
use crate::middleware::StaffClaims;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CheckInRequest {
    pub qr_payload: String,
    pub event_id: Option<Uuid>,
}

/// POST /checkin
pub async fn check_in(
    State(state): State<AppState>,
    Extension(claims): Extension<StaffClaims>,
    Json(req): Json<CheckInRequest>,
) -> Result<Json<CheckInConfirmation>, AppError> {
    let event_id = req.event_id.or(claims.event_id);

    let confirmation = state
        .checkin
        .check_in(&req.qr_payload, event_id)
        .await
        .map_err(|e| {
            tracing::warn!("Check-in refused at gate of {}: {}", claims.sub, e);
            e
        })?;
    Ok(Json(confirmation))
}
