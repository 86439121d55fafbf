use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use serde_json::{json, Value};
use tracing::warn;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::{Actor, Appointment, AppointmentListQuery, BookAppointmentRequest};
use crate::services::registry::parse_status_filter;
use crate::services::{AppointmentRegistry, OutboxRelay};

pub struct AppointmentState {
    pub config: Arc<AppConfig>,
    pub registry: Arc<AppointmentRegistry>,
    /// When present, transitions push pending events through before responding.
    pub relay: Option<Arc<OutboxRelay>>,
}

impl AppointmentState {
    async fn flush_outbox(&self) {
        if let Some(relay) = &self.relay {
            if let Err(e) = relay.drain().await {
                // The background relay will pick the events up again.
                warn!("Immediate outbox drain failed: {}", e);
            }
        }
    }
}

fn ensure_participant(user: &User, appointment: &Appointment) -> Result<(), AppError> {
    let user_id = user.uuid()?;
    if user.is_service() || user_id == appointment.patient_id || user_id == appointment.doctor_id {
        Ok(())
    } else {
        Err(AppError::Authorization("Not authorized to view this appointment".to_string()))
    }
}

#[axum::debug_handler]
pub async fn book_appointment(
    State(state): State<Arc<AppointmentState>>,
    Extension(user): Extension<User>,
    Json(request): Json<BookAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let patient_id = user.uuid()?;
    let appointment = state.registry.request_appointment(patient_id, request).await?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
        "message": "Appointment requested, awaiting doctor confirmation"
    })))
}

#[axum::debug_handler]
pub async fn get_appointment(
    State(state): State<Arc<AppointmentState>>,
    Path(appointment_id): Path<Uuid>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let appointment = state.registry.get(appointment_id).await?;
    ensure_participant(&user, &appointment)?;
    Ok(Json(json!(appointment)))
}

#[axum::debug_handler]
pub async fn confirm_appointment(
    State(state): State<Arc<AppointmentState>>,
    Path(appointment_id): Path<Uuid>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let appointment = state.registry.confirm(appointment_id, user.uuid()?).await?;
    state.flush_outbox().await;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment
    })))
}

#[axum::debug_handler]
pub async fn reject_appointment(
    State(state): State<Arc<AppointmentState>>,
    Path(appointment_id): Path<Uuid>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let appointment = state.registry.reject(appointment_id, user.uuid()?).await?;
    state.flush_outbox().await;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment
    })))
}

#[axum::debug_handler]
pub async fn cancel_appointment(
    State(state): State<Arc<AppointmentState>>,
    Path(appointment_id): Path<Uuid>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let user_id = user.uuid()?;
    let current = state.registry.get(appointment_id).await?;

    let actor = if user_id == current.doctor_id {
        Actor::Doctor(user_id)
    } else {
        Actor::Patient(user_id)
    };

    let appointment = state.registry.cancel(appointment_id, actor).await?;
    state.flush_outbox().await;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment
    })))
}

/// Completion is driven by backend processes, not end users.
#[axum::debug_handler]
pub async fn complete_appointment(
    State(state): State<Arc<AppointmentState>>,
    Path(appointment_id): Path<Uuid>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    if !user.is_service() {
        return Err(AppError::Authorization("Only the system may complete appointments".to_string()));
    }

    let appointment = state.registry.complete(appointment_id).await?;
    state.flush_outbox().await;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment
    })))
}

#[axum::debug_handler]
pub async fn get_patient_appointments(
    State(state): State<Arc<AppointmentState>>,
    Path(patient_id): Path<Uuid>,
    Query(query): Query<AppointmentListQuery>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    if !user.is_service() && user.uuid()? != patient_id {
        return Err(AppError::Authorization("Not authorized to view these appointments".to_string()));
    }

    let status = parse_status_filter(query.status.as_deref())?;
    let appointments = state.registry.list_by_patient(patient_id, status).await?;

    Ok(Json(json!({
        "appointments": appointments,
        "total": appointments.len()
    })))
}

#[axum::debug_handler]
pub async fn get_doctor_appointments(
    State(state): State<Arc<AppointmentState>>,
    Path(doctor_id): Path<Uuid>,
    Query(query): Query<AppointmentListQuery>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    if !user.is_service() && user.uuid()? != doctor_id {
        return Err(AppError::Authorization("Not authorized to view these appointments".to_string()));
    }

    let status = parse_status_filter(query.status.as_deref())?;
    let appointments = state.registry.list_by_doctor(doctor_id, status).await?;

    Ok(Json(json!({
        "appointments": appointments,
        "total": appointments.len()
    })))
}
