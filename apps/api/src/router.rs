use std::sync::Arc;

use axum::{routing::get, Router};

use availability_cell::router::availability_routes;
use booking_cell::router::appointment_routes;
use payment_cell::router::payment_routes;
use shared_store::AppState;
use wallet_cell::router::wallet_routes;

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(|| async { "MediBook API is running!" }))
        .nest("/api/availability", availability_routes(state.clone()))
        .nest("/api/appointments", appointment_routes(state.clone()))
        .nest("/api/wallet", wallet_routes(state.clone()))
        .nest("/api/payments", payment_routes(state.clone()))
}
