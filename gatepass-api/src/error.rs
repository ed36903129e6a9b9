use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use gatepass_catalog::CatalogError;
use gatepass_core::{PaymentError, StoreError};
use gatepass_order::{
    CallbackError, CheckInError, CheckoutError, RefundError, SettlementError,
};
use serde_json::json;

/// Domain failures carried to the HTTP edge. `code` is the stable,
/// machine-readable kind; `message` is for humans.
#[derive(Debug)]
pub enum AppError {
    Validation { code: &'static str, message: String },
    NotFound { code: &'static str, message: String },
    Conflict { code: &'static str, message: String },
    Forbidden(String),
    Unavailable(String),
    Internal(String),
}

impl AppError {
    pub fn from_code(code: &'static str, message: String) -> Self {
        match code {
            "order_not_found" | "ticket_not_found" | "session_not_found" | "event_not_found" => {
                AppError::NotFound { code, message }
            }
            "already_used" | "refunded" | "not_yet_paid" | "wrong_session" | "session_expired"
            | "outside_window" | "no_eligible_session" | "event_mismatch"
            | "invalid_transition" | "not_payable" | "insufficient_stock"
            | "quantity_out_of_bounds" | "quantity_below_sold" | "ticket_stopped"
            | "session_not_active" | "session_not_cancelled" | "event_not_cancelled" => {
                AppError::Conflict { code, message }
            }
            "store_unavailable" => AppError::Unavailable(message),
            "store_error" => AppError::Internal(message),
            _ => AppError::Validation { code, message },
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        AppError::Validation {
            code: "bad_request",
            message: message.into(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            AppError::Validation { code, message } => (StatusCode::BAD_REQUEST, code, message),
            AppError::NotFound { code, message } => (StatusCode::NOT_FOUND, code, message),
            AppError::Conflict { code, message } => (StatusCode::CONFLICT, code, message),
            AppError::Forbidden(message) => (StatusCode::FORBIDDEN, "forbidden", message),
            AppError::Unavailable(msg) => {
                tracing::error!("Store unavailable: {}", msg);
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "store_unavailable",
                    "Service temporarily unavailable".to_string(),
                )
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal Server Error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal",
                    "Internal Server Error".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": code,
            "message": message,
        }));

        (status, body).into_response()
    }
}

macro_rules! coded_error {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for AppError {
                fn from(err: $ty) -> Self {
                    AppError::from_code(err.code(), err.to_string())
                }
            }
        )*
    };
}

coded_error!(
    CatalogError,
    CheckoutError,
    PaymentError,
    CallbackError,
    SettlementError,
    CheckInError,
    RefundError,
);

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Unavailable(msg) => AppError::Unavailable(msg),
            other => AppError::Internal(other.to_string()),
        }
    }
}
