use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use shared_utils::extractor::auth_middleware;

use crate::handlers::{self, TimelineState};

pub fn timeline_routes(state: Arc<TimelineState>) -> Router {
    Router::new()
        .route("/", get(handlers::get_timeline))
        .route("/events", post(handlers::record_event))
        .route("/hooks/appointments", post(handlers::appointment_hook))
        .layer(middleware::from_fn_with_state(state.config.clone(), auth_middleware))
        .with_state(state)
}
