#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Datelike, NaiveDate, Utc, Weekday};
use serde_json::json;
use uuid::Uuid;

use appointment_cell::models::BookAppointmentRequest;
use doctor_cell::models::Doctor;
use doctor_cell::services::{AvailabilityService, InMemoryDoctorStore};
use timeline_cell::models::TimelineError;
use timeline_cell::services::{InMemoryTimelineStore, ReportLookup, TimelineProjector};

pub fn next_monday() -> NaiveDate {
    let mut day = Utc::now().date_naive().succ_opt().unwrap();
    while day.weekday() != Weekday::Mon {
        day = day.succ_opt().unwrap();
    }
    day
}

pub fn doctor(id: Uuid) -> Doctor {
    Doctor {
        id,
        first_name: Some("Ada".to_string()),
        last_name: Some("Okafor".to_string()),
        specialty: "Cardiology".to_string(),
        qualification: None,
        experience_years: None,
        availability: Some(
            serde_json::from_value(json!({ "working_hours": { "monday": ["09:00-17:00"] } })).unwrap(),
        ),
        availability_error: None,
    }
}

pub fn booking(doctor_id: Uuid, slot: &str, issue: Option<&str>) -> BookAppointmentRequest {
    BookAppointmentRequest {
        doctor_id: doctor_id.to_string(),
        date: next_monday().format("%Y-%m-%d").to_string(),
        slot: slot.to_string(),
        issue: issue.map(str::to_string),
        notes: None,
    }
}

#[derive(Default)]
pub struct FixedReports {
    pub by_appointment: HashMap<Uuid, Uuid>,
}

#[async_trait]
impl ReportLookup for FixedReports {
    async fn report_for_appointment(&self, appointment_id: Uuid) -> Result<Option<Uuid>, TimelineError> {
        Ok(self.by_appointment.get(&appointment_id).copied())
    }
}

pub struct Fixture {
    pub doctor_id: Uuid,
    pub availability: Arc<AvailabilityService>,
    pub timeline: Arc<InMemoryTimelineStore>,
    pub projector: Arc<TimelineProjector>,
}

pub fn fixture_with_reports(reports: FixedReports) -> Fixture {
    let doctor_id = Uuid::new_v4();
    let availability = Arc::new(AvailabilityService::new(Arc::new(InMemoryDoctorStore::with_doctors([
        doctor(doctor_id),
    ]))));
    let timeline = Arc::new(InMemoryTimelineStore::new());
    let projector = Arc::new(TimelineProjector::new(timeline.clone(), availability.clone(), Arc::new(reports)));
    Fixture { doctor_id, availability, timeline, projector }
}

pub fn fixture() -> Fixture {
    fixture_with_reports(FixedReports::default())
}
