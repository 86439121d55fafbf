use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use chrono::NaiveDate;
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::{Availability, DaySlots, DoctorListQuery, RecommendSpecialtyRequest, SlotQuery};
use crate::services::{AvailabilityService, SpecialtyRecommender};

pub struct DoctorState {
    pub config: Arc<AppConfig>,
    pub availability: Arc<AvailabilityService>,
    pub recommender: Arc<SpecialtyRecommender>,
}

#[axum::debug_handler]
pub async fn list_doctors(
    State(state): State<Arc<DoctorState>>,
    Query(query): Query<DoctorListQuery>,
) -> Result<Json<Value>, AppError> {
    let specialty = query.specialty.as_deref().filter(|s| !s.is_empty());
    let doctors = state.availability.list_doctors(specialty).await?;

    Ok(Json(json!({
        "doctors": doctors,
        "total": doctors.len()
    })))
}

#[axum::debug_handler]
pub async fn get_doctor(
    State(state): State<Arc<DoctorState>>,
    Path(doctor_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let doctor = state.availability.get_doctor(doctor_id).await?;
    Ok(Json(json!(doctor)))
}

#[axum::debug_handler]
pub async fn get_availability(
    State(state): State<Arc<DoctorState>>,
    Path(doctor_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let availability = state.availability.get_availability(doctor_id).await?;

    Ok(Json(json!({
        "doctor_id": doctor_id,
        "availability": availability
    })))
}

/// Body is the `{ "working_hours": { ... } }` document. Parse failures are
/// reported as validation errors instead of axum's generic 422.
#[axum::debug_handler]
pub async fn set_availability(
    State(state): State<Arc<DoctorState>>,
    Path(doctor_id): Path<Uuid>,
    Extension(user): Extension<User>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, AppError> {
    let acting_doctor_id = user.uuid()?;

    let availability: Availability = serde_json::from_value(body)
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let saved = state
        .availability
        .set_availability(doctor_id, acting_doctor_id, availability)
        .await?;

    Ok(Json(json!({
        "success": true,
        "availability": saved
    })))
}

#[axum::debug_handler]
pub async fn get_slots(
    State(state): State<Arc<DoctorState>>,
    Path(doctor_id): Path<Uuid>,
    Query(query): Query<SlotQuery>,
) -> Result<Json<Value>, AppError> {
    let slots = state.availability.offerable_slots(doctor_id, query.date).await?;
    Ok(Json(slots_body(doctor_id, query.date, &slots)))
}

#[axum::debug_handler]
pub async fn recommend_specialty(
    State(state): State<Arc<DoctorState>>,
    Json(request): Json<RecommendSpecialtyRequest>,
) -> Result<Json<Value>, AppError> {
    let recommendation = state.recommender.recommend(&request.symptoms).await?;
    Ok(Json(json!({ "recommendation": recommendation })))
}

fn slots_body(doctor_id: Uuid, date: NaiveDate, slots: &DaySlots) -> Value {
    match slots {
        DaySlots::Unavailable => json!({
            "doctor_id": doctor_id,
            "date": date,
            "available": false,
            "slots": [],
            "message": "Not available on this day"
        }),
        DaySlots::Slots(times) => json!({
            "doctor_id": doctor_id,
            "date": date,
            "available": true,
            "slots": times.iter().map(|t| t.format("%H:%M").to_string()).collect::<Vec<_>>()
        }),
    }
}
