use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use shared_utils::extractor::auth_middleware;

use crate::handlers::{self, DoctorState};

pub fn doctor_routes(state: Arc<DoctorState>) -> Router {
    Router::new()
        .route("/", get(handlers::list_doctors))
        .route("/recommend-specialty", post(handlers::recommend_specialty))
        .route("/{doctor_id}", get(handlers::get_doctor))
        .route(
            "/{doctor_id}/availability",
            get(handlers::get_availability).put(handlers::set_availability),
        )
        .route("/{doctor_id}/slots", get(handlers::get_slots))
        .layer(middleware::from_fn_with_state(state.config.clone(), auth_middleware))
        .with_state(state)
}
