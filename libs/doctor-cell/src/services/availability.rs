use std::sync::Arc;

use chrono::{NaiveDate, NaiveTime};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::models::{Availability, DaySlots, Doctor, DoctorError};
use crate::services::slots::offerable_slots;
use crate::services::store::DoctorStore;

/// Doctor directory plus the availability read/edit paths.
pub struct AvailabilityService {
    store: Arc<dyn DoctorStore>,
}

impl AvailabilityService {
    pub fn new(store: Arc<dyn DoctorStore>) -> Self {
        Self { store }
    }

    pub async fn list_doctors(&self, specialty: Option<&str>) -> Result<Vec<Doctor>, DoctorError> {
        debug!("Listing doctors, specialty: {:?}", specialty);
        self.store.list(specialty).await
    }

    pub async fn get_doctor(&self, doctor_id: Uuid) -> Result<Doctor, DoctorError> {
        self.store.get(doctor_id).await?.ok_or(DoctorError::NotFound)
    }

    /// `Ok(None)` means the doctor exists but never published a schedule.
    pub async fn get_availability(&self, doctor_id: Uuid) -> Result<Option<Availability>, DoctorError> {
        let doctor = self.get_doctor(doctor_id).await?;
        Ok(doctor.schedule()?.cloned())
    }

    /// Only the owning doctor may replace their schedule.
    #[instrument(skip(self, availability))]
    pub async fn set_availability(
        &self,
        doctor_id: Uuid,
        acting_doctor_id: Uuid,
        availability: Availability,
    ) -> Result<Availability, DoctorError> {
        if doctor_id != acting_doctor_id {
            warn!("Doctor {} attempted to edit availability of {}", acting_doctor_id, doctor_id);
            return Err(DoctorError::NotOwner);
        }

        if !self.store.save_availability(doctor_id, &availability).await? {
            return Err(DoctorError::NotFound);
        }

        info!("Availability updated for doctor {}", doctor_id);
        Ok(availability)
    }

    pub async fn offerable_slots(&self, doctor_id: Uuid, date: NaiveDate) -> Result<DaySlots, DoctorError> {
        let doctor = self.get_doctor(doctor_id).await?;
        let slots = offerable_slots(date, doctor.schedule()?);
        debug!("Doctor {} on {}: {:?}", doctor_id, date, slots);
        Ok(slots)
    }

    pub async fn is_offerable(&self, doctor_id: Uuid, date: NaiveDate, time: NaiveTime) -> Result<bool, DoctorError> {
        Ok(self.offerable_slots(doctor_id, date).await?.contains(time))
    }
}
