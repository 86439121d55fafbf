use std::sync::Arc;

use chrono::{NaiveDate, NaiveTime, Utc};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use doctor_cell::services::AvailabilityService;
use shared_config::BookingPolicy;

use crate::models::{
    Actor, Appointment, AppointmentError, AppointmentFilter, AppointmentStatus, BookAppointmentRequest,
    StatusChange, Transition,
};
use crate::services::lifecycle::{authorize, next_status};
use crate::services::store::AppointmentStore;

/// Owns appointment creation and every status change.
pub struct AppointmentRegistry {
    store: Arc<dyn AppointmentStore>,
    availability: Arc<AvailabilityService>,
    policy: BookingPolicy,
}

impl AppointmentRegistry {
    pub fn new(store: Arc<dyn AppointmentStore>, availability: Arc<AvailabilityService>, policy: BookingPolicy) -> Self {
        Self { store, availability, policy }
    }

    /// Creates a Pending appointment for an offered, future slot.
    #[instrument(skip(self, request), fields(doctor_id = %request.doctor_id))]
    pub async fn request_appointment(
        &self,
        patient_id: Uuid,
        request: BookAppointmentRequest,
    ) -> Result<Appointment, AppointmentError> {
        let doctor_id = parse_uuid("doctor_id", &request.doctor_id)?;
        let date = parse_date(&request.date)?;
        let slot = parse_slot(&request.slot)?;

        let scheduled_at = date.and_time(slot).and_utc();
        if scheduled_at <= Utc::now() {
            return Err(AppointmentError::Validation(
                "Appointment time must be in the future".to_string(),
            ));
        }

        if !self.availability.is_offerable(doctor_id, date, slot).await? {
            warn!("Rejected booking for {} at {}: slot not offered", doctor_id, scheduled_at);
            return Err(AppointmentError::SlotNotOffered {
                slot: format!("{} {}", date, slot.format("%H:%M")),
            });
        }

        let now = Utc::now();
        let appointment = Appointment {
            id: Uuid::new_v4(),
            patient_id,
            doctor_id,
            scheduled_at,
            issue: non_blank(request.issue),
            notes: non_blank(request.notes),
            status: AppointmentStatus::Pending,
            version: 1,
            created_at: now,
            updated_at: now,
        };

        let created = self.store.insert(&appointment, self.policy).await?;
        info!("Appointment {} requested by patient {}", created.id, patient_id);
        Ok(created)
    }

    pub async fn confirm(&self, appointment_id: Uuid, acting_doctor_id: Uuid) -> Result<Appointment, AppointmentError> {
        self.apply(appointment_id, Transition::Confirm, Actor::Doctor(acting_doctor_id)).await
    }

    pub async fn reject(&self, appointment_id: Uuid, acting_doctor_id: Uuid) -> Result<Appointment, AppointmentError> {
        self.apply(appointment_id, Transition::Reject, Actor::Doctor(acting_doctor_id)).await
    }

    pub async fn complete(&self, appointment_id: Uuid) -> Result<Appointment, AppointmentError> {
        self.apply(appointment_id, Transition::Complete, Actor::System).await
    }

    pub async fn cancel(&self, appointment_id: Uuid, actor: Actor) -> Result<Appointment, AppointmentError> {
        self.apply(appointment_id, Transition::Cancel, actor).await
    }

    pub async fn get(&self, appointment_id: Uuid) -> Result<Appointment, AppointmentError> {
        self.store.get(appointment_id).await?.ok_or(AppointmentError::NotFound)
    }

    pub async fn list_by_patient(
        &self,
        patient_id: Uuid,
        status: Option<AppointmentStatus>,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        self.store
            .list(&AppointmentFilter { patient_id: Some(patient_id), doctor_id: None, status })
            .await
    }

    pub async fn list_by_doctor(
        &self,
        doctor_id: Uuid,
        status: Option<AppointmentStatus>,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        self.store
            .list(&AppointmentFilter { patient_id: None, doctor_id: Some(doctor_id), status })
            .await
    }

    #[instrument(skip(self))]
    async fn apply(&self, appointment_id: Uuid, action: Transition, actor: Actor) -> Result<Appointment, AppointmentError> {
        let current = self.get(appointment_id).await?;

        authorize(&current, action, actor)?;
        let to = next_status(current.status, action)?;

        let change = StatusChange {
            appointment_id,
            expected_version: current.version,
            to,
            require_free_slot: to == AppointmentStatus::Confirmed && self.policy == BookingPolicy::SoftHold,
        };

        match self.store.transition(&change).await {
            Ok(updated) => {
                info!("Appointment {} {} -> {} by {}", appointment_id, current.status, updated.status, actor);
                Ok(updated)
            }
            Err(AppointmentError::ConcurrentModification) => {
                debug!("Lost race on appointment {} ({})", appointment_id, action);
                Err(self.describe_lost_race(appointment_id, action).await)
            }
            Err(e) => Err(e),
        }
    }

    /// The loser of a race is told what the winner did when that can be read back.
    async fn describe_lost_race(&self, appointment_id: Uuid, action: Transition) -> AppointmentError {
        match self.store.get(appointment_id).await {
            Ok(Some(latest)) if next_status(latest.status, action).is_err() => {
                AppointmentError::InvalidStatusTransition { from: latest.status, action }
            }
            _ => AppointmentError::ConcurrentModification,
        }
    }
}

pub fn parse_status_filter(value: Option<&str>) -> Result<Option<AppointmentStatus>, AppointmentError> {
    value
        .filter(|s| !s.is_empty())
        .map(str::parse::<AppointmentStatus>)
        .transpose()
}

fn parse_uuid(field: &str, value: &str) -> Result<Uuid, AppointmentError> {
    if value.trim().is_empty() {
        return Err(AppointmentError::Validation(format!("{} is required", field)));
    }
    Uuid::parse_str(value.trim())
        .map_err(|_| AppointmentError::Validation(format!("{} is not a valid id", field)))
}

fn parse_date(value: &str) -> Result<NaiveDate, AppointmentError> {
    if value.trim().is_empty() {
        return Err(AppointmentError::Validation("date is required".to_string()));
    }
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|_| AppointmentError::Validation(format!("Invalid date '{}', expected YYYY-MM-DD", value)))
}

fn parse_slot(value: &str) -> Result<NaiveTime, AppointmentError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(AppointmentError::Validation("slot is required".to_string()));
    }
    if value.len() != 5 {
        return Err(AppointmentError::Validation(format!("Invalid slot '{}', expected HH:MM", value)));
    }
    NaiveTime::parse_from_str(value, "%H:%M")
        .map_err(|_| AppointmentError::Validation(format!("Invalid slot '{}', expected HH:MM", value)))
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn slot_parsing_is_strict() {
        assert_eq!(parse_slot("10:00").unwrap(), NaiveTime::from_hms_opt(10, 0, 0).unwrap());
        assert_matches!(parse_slot("10am"), Err(AppointmentError::Validation(_)));
        assert_matches!(parse_slot("9:00"), Err(AppointmentError::Validation(_)));
        assert_matches!(parse_slot(""), Err(AppointmentError::Validation(_)));
    }

    #[test]
    fn missing_identifiers_are_validation_errors() {
        assert_matches!(parse_uuid("doctor_id", ""), Err(AppointmentError::Validation(_)));
        assert_matches!(parse_uuid("doctor_id", "not-a-uuid"), Err(AppointmentError::Validation(_)));
        assert_matches!(parse_date("07/01/2030"), Err(AppointmentError::Validation(_)));
    }

    #[test]
    fn status_filter_parsing() {
        assert_eq!(parse_status_filter(None).unwrap(), None);
        assert_eq!(parse_status_filter(Some("")).unwrap(), None);
        assert_eq!(parse_status_filter(Some("confirmed")).unwrap(), Some(AppointmentStatus::Confirmed));
        assert!(parse_status_filter(Some("rescheduled")).is_err());
    }
}
