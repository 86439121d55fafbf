use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use shared_utils::extractor::auth_middleware;

use crate::handlers::{self, ReportState};

pub fn report_routes(state: Arc<ReportState>) -> Router {
    Router::new()
        .route("/", post(handlers::generate_report))
        .route("/{report_id}", get(handlers::get_report))
        .route("/{report_id}/send", post(handlers::send_report))
        .route("/{report_id}/prescription", post(handlers::redraft_prescription))
        .route("/patients/{patient_id}", get(handlers::get_patient_reports))
        .route("/doctors/{doctor_id}", get(handlers::get_doctor_reports))
        .layer(middleware::from_fn_with_state(state.config.clone(), auth_middleware))
        .with_state(state)
}
