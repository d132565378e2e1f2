use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use shared_store::AppState;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn payment_routes(state: Arc<AppState>) -> Router {
    let protected_routes = Router::new()
        .route("/top-up", post(handlers::top_up))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    // The processor calls back without a session; these stay public and
    // trust nothing but the checksum.
    let callback_routes = Router::new()
        .route("/gateway/callback", get(handlers::gateway_callback))
        .route(
            "/gateway/appointment-callback",
            get(handlers::appointment_callback),
        );

    Router::new()
        .merge(protected_routes)
        .merge(callback_routes)
        .with_state(state)
}
