use axum::{routing::get, Router};

use appointment_cell::router::appointment_routes;
use doctor_cell::router::doctor_routes;
use report_cell::router::report_routes;
use timeline_cell::router::timeline_routes;

use crate::state::AppServices;

pub fn create_router(services: &AppServices) -> Router {
    Router::new()
        .route("/", get(|| async { "MediFlow API is running!" }))
        .nest("/doctors", doctor_routes(services.doctor.clone()))
        .nest("/appointments", appointment_routes(services.appointment.clone()))
        .nest("/timeline", timeline_routes(services.timeline.clone()))
        .nest("/reports", report_routes(services.report.clone()))
}
