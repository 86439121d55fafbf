#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{Datelike, NaiveDate, Utc, Weekday};
use serde_json::json;
use uuid::Uuid;

use appointment_cell::models::{AppointmentEvent, BookAppointmentRequest};
use appointment_cell::services::{AppointmentEventHandler, AppointmentRegistry, InMemoryAppointmentStore};
use doctor_cell::models::Doctor;
use doctor_cell::services::{AvailabilityService, InMemoryDoctorStore};
use shared_config::BookingPolicy;
use shared_models::error::AppError;

pub fn next_monday() -> NaiveDate {
    let mut day = Utc::now().date_naive().succ_opt().unwrap();
    while day.weekday() != Weekday::Mon {
        day = day.succ_opt().unwrap();
    }
    day
}

pub fn monday_doctor(id: Uuid) -> Doctor {
    Doctor {
        id,
        first_name: Some("Ada".to_string()),
        last_name: Some("Okafor".to_string()),
        specialty: "Cardiology".to_string(),
        qualification: Some("MBBS".to_string()),
        experience_years: Some(12),
        availability: Some(
            serde_json::from_value(json!({ "working_hours": { "monday": ["09:00-17:00"] } })).unwrap(),
        ),
        availability_error: None,
    }
}

pub fn booking(doctor_id: Uuid, slot: &str) -> BookAppointmentRequest {
    BookAppointmentRequest {
        doctor_id: doctor_id.to_string(),
        date: next_monday().format("%Y-%m-%d").to_string(),
        slot: slot.to_string(),
        issue: Some("Chest tightness".to_string()),
        notes: Some("Worse when climbing stairs".to_string()),
    }
}

pub struct Fixture {
    pub doctor_id: Uuid,
    pub store: Arc<InMemoryAppointmentStore>,
    pub registry: Arc<AppointmentRegistry>,
}

pub fn fixture(policy: BookingPolicy) -> Fixture {
    let doctor_id = Uuid::new_v4();
    let doctors = Arc::new(InMemoryDoctorStore::with_doctors([monday_doctor(doctor_id)]));
    let availability = Arc::new(AvailabilityService::new(doctors));
    let store = Arc::new(InMemoryAppointmentStore::new());
    let registry = Arc::new(AppointmentRegistry::new(store.clone(), availability, policy));
    Fixture { doctor_id, store, registry }
}

/// Records events; optionally fails the first `failures` deliveries.
#[derive(Default)]
pub struct RecordingHandler {
    pub seen: Mutex<Vec<AppointmentEvent>>,
    pub failures: Mutex<usize>,
}

impl RecordingHandler {
    pub fn failing(times: usize) -> Self {
        Self { seen: Mutex::new(Vec::new()), failures: Mutex::new(times) }
    }

    pub fn count(&self) -> usize {
        self.seen.lock().unwrap().len()
    }
}

#[async_trait]
impl AppointmentEventHandler for RecordingHandler {
    fn name(&self) -> &'static str {
        "recording"
    }

    async fn handle(&self, event: &AppointmentEvent) -> Result<(), AppError> {
        let mut failures = self.failures.lock().unwrap();
        if *failures > 0 {
            *failures -= 1;
            return Err(AppError::Persistence("projection store unavailable".to_string()));
        }
        drop(failures);
        self.seen.lock().unwrap().push(event.clone());
        Ok(())
    }
}
