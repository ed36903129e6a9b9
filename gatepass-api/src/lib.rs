use axum::{
    http::Method,
    routing::{post, put},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod admin;
pub mod checkin;
pub mod error;
pub mod middleware;
pub mod orders;
pub mod payments;
pub mod state;

pub use error::AppError;
pub use state::{AppState, AuthConfig};

pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
            axum::http::header::USER_AGENT,
        ]);

    let buyer = orders::buyer_routes().route_layer(axum::middleware::from_fn_with_state(
        state.clone(),
        middleware::customer_auth_middleware,
    ));

    let staff = Router::new()
        .route("/checkin", post(checkin::check_in))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::staff_auth_middleware,
        ));

    let admin = Router::new()
        .route(
            "/admin/ticket-definitions/{id}/quantity",
            put(admin::update_ticket_quantity),
        )
        .route(
            "/admin/ticket-definitions/{id}/status",
            put(admin::update_ticket_status),
        )
        .route("/admin/sessions/{id}/refund", post(admin::refund_session))
        .route("/admin/events/{id}/refund", post(admin::refund_event))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::admin_auth_middleware,
        ));

    Router::new()
        .merge(orders::routes())
        .merge(payments::routes())
        .merge(buyer)
        .merge(staff)
        .merge(admin)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::rate_limit_middleware,
        ))
        .with_state(state)
}
