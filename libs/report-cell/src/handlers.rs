use std::sync::Arc;

use axum::{
    extract::{Extension, Path, State},
    Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use appointment_cell::models::Actor;
use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::{GenerateReportRequest, Report, SendReportRequest};
use crate::services::ReportCoordinator;

pub struct ReportState {
    pub config: Arc<AppConfig>,
    pub coordinator: Arc<ReportCoordinator>,
}

/// Backend callers act as the system; everyone else acts as a doctor and is checked downstream.
fn acting_as(user: &User) -> Result<Actor, AppError> {
    if user.is_service() {
        Ok(Actor::System)
    } else {
        Ok(Actor::Doctor(user.uuid()?))
    }
}

fn ensure_can_view(user: &User, report: &Report) -> Result<(), AppError> {
    let user_id = user.uuid()?;
    if user.is_service() || user_id == report.patient_id || user_id == report.doctor_id {
        Ok(())
    } else {
        Err(AppError::Authorization("Not authorized to view this report".to_string()))
    }
}

#[axum::debug_handler]
pub async fn generate_report(
    State(state): State<Arc<ReportState>>,
    Extension(user): Extension<User>,
    Json(request): Json<GenerateReportRequest>,
) -> Result<Json<Value>, AppError> {
    let report = state.coordinator.generate(&request, acting_as(&user)?).await?;

    Ok(Json(json!({
        "success": true,
        "report": report
    })))
}

#[axum::debug_handler]
pub async fn get_report(
    State(state): State<Arc<ReportState>>,
    Path(report_id): Path<Uuid>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let report = state.coordinator.get(report_id).await?;
    ensure_can_view(&user, &report)?;
    Ok(Json(json!(report)))
}

#[axum::debug_handler]
pub async fn get_patient_reports(
    State(state): State<Arc<ReportState>>,
    Path(patient_id): Path<Uuid>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let user_id = user.uuid()?;
    let mut reports = state.coordinator.list_for_patient(patient_id).await?;

    // Doctors see only the reports they wrote for this patient.
    if !user.is_service() && user_id != patient_id {
        reports.retain(|r| r.doctor_id == user_id);
        if reports.is_empty() {
            return Err(AppError::Authorization("Not authorized to view these reports".to_string()));
        }
    }

    Ok(Json(json!({
        "reports": reports,
        "total": reports.len()
    })))
}

#[axum::debug_handler]
pub async fn get_doctor_reports(
    State(state): State<Arc<ReportState>>,
    Path(doctor_id): Path<Uuid>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    if !user.is_service() && user.uuid()? != doctor_id {
        return Err(AppError::Authorization("Not authorized to view these reports".to_string()));
    }

    let reports = state.coordinator.list_for_doctor(doctor_id).await?;

    Ok(Json(json!({
        "reports": reports,
        "total": reports.len()
    })))
}

#[axum::debug_handler]
pub async fn send_report(
    State(state): State<Arc<ReportState>>,
    Path(report_id): Path<Uuid>,
    Extension(user): Extension<User>,
    Json(request): Json<SendReportRequest>,
) -> Result<Json<Value>, AppError> {
    let sent = state
        .coordinator
        .mark_sent(report_id, request.channel, request.recipient_id, user.uuid()?)
        .await?;

    Ok(Json(json!({
        "success": true,
        "message": sent.message,
        "report": sent.report
    })))
}

#[axum::debug_handler]
pub async fn redraft_prescription(
    State(state): State<Arc<ReportState>>,
    Path(report_id): Path<Uuid>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let report = state.coordinator.redraft_prescription(report_id, acting_as(&user)?).await?;

    Ok(Json(json!({
        "success": true,
        "report": report
    })))
}
