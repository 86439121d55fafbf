use std::sync::Arc;

use axum::{
    extract::{Extension, State},
    Json,
};
use serde_json::{json, Value};
use tracing::debug;

use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::{AppointmentHook, NewTimelineEvent};
use crate::services::TimelineProjector;

pub struct TimelineState {
    pub config: Arc<AppConfig>,
    pub projector: Arc<TimelineProjector>,
}

#[axum::debug_handler]
pub async fn get_timeline(
    State(state): State<Arc<TimelineState>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let events = state.projector.list(user.uuid()?).await?;

    Ok(Json(json!({
        "events": events,
        "total": events.len()
    })))
}

#[axum::debug_handler]
pub async fn record_event(
    State(state): State<Arc<TimelineState>>,
    Extension(user): Extension<User>,
    Json(request): Json<NewTimelineEvent>,
) -> Result<Json<Value>, AppError> {
    let event = state.projector.record_event(user.uuid()?, request).await?;

    Ok(Json(json!({
        "success": true,
        "event": event
    })))
}

/// Database trigger entry point for appointment row changes.
#[axum::debug_handler]
pub async fn appointment_hook(
    State(state): State<Arc<TimelineState>>,
    Extension(user): Extension<User>,
    Json(hook): Json<AppointmentHook>,
) -> Result<Json<Value>, AppError> {
    if !user.is_service() {
        return Err(AppError::Authorization("Only backend triggers may call this hook".to_string()));
    }

    if hook.change != "UPDATE" {
        return Ok(Json(json!({ "message": "No action needed for non-update events" })));
    }

    if hook.record.status != "confirmed" {
        debug!("Ignoring appointment {} in status {}", hook.record.appointment.id, hook.record.status);
        return Ok(Json(json!({
            "message": format!("Appointment {} requires no timeline entry", hook.record.status)
        })));
    }

    let created = state.projector.on_appointment_confirmed(&hook.record.appointment).await?;

    Ok(Json(json!({
        "success": true,
        "created": created.is_some(),
        "event": created
    })))
}
