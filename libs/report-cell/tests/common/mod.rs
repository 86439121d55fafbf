#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{Datelike, NaiveDate, Utc, Weekday};
use serde_json::json;
use uuid::Uuid;

use appointment_cell::models::BookAppointmentRequest;
use appointment_cell::services::{AppointmentRegistry, InMemoryAppointmentStore};
use doctor_cell::models::Doctor;
use doctor_cell::services::{AvailabilityService, InMemoryDoctorStore};
use report_cell::models::{Channel, Contact, PatientContext, Report, ReportError};
use report_cell::services::{InMemoryPatientContext, InMemoryReportStore, NotificationDispatcher, ReportCoordinator};
use shared_ai::{AiError, CompletionClient, CompletionRequest};
use shared_config::{BookingPolicy, DraftFailurePolicy};
use timeline_cell::services::{InMemoryTimelineStore, TimelineProjector};

pub const SUMMARY: &str = "S: Sore throat for 3 days, no fever.\nO: Mild pharyngeal erythema.\nA: Viral pharyngitis.\nP: Rest and fluids.";
pub const PRESCRIPTION: &str = "Advisory only, requires doctor approval: ibuprofen 400 mg every 8 hours for 3 days.";

pub enum Reply {
    Text(&'static str),
    Fail,
    Hang,
}

/// Answers completions from a fixed script, recording every request.
#[derive(Default)]
pub struct ScriptedAi {
    replies: Mutex<VecDeque<Reply>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedAi {
    pub fn new(replies: Vec<Reply>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn push(&self, reply: Reply) {
        self.replies.lock().unwrap().push_back(reply);
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionClient for ScriptedAi {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, AiError> {
        self.requests.lock().unwrap().push(request.clone());
        let reply = self.replies.lock().unwrap().pop_front();
        match reply {
            Some(Reply::Text(text)) => Ok(text.to_string()),
            Some(Reply::Fail) => Err(AiError::Timeout { attempts: 3 }),
            Some(Reply::Hang) => std::future::pending().await,
            None => Err(AiError::MalformedResponse("no scripted reply".to_string())),
        }
    }
}

/// Dispatcher that always fails, for delivery error paths.
pub struct BrokenDispatcher;

#[async_trait]
impl NotificationDispatcher for BrokenDispatcher {
    async fn dispatch(&self, _report: &Report, _channel: Channel, _recipient: &Contact) -> Result<(), ReportError> {
        Err(ReportError::Dispatch("smtp unreachable".to_string()))
    }
}

pub fn next_monday() -> NaiveDate {
    let mut day = Utc::now().date_naive().succ_opt().unwrap();
    while day.weekday() != Weekday::Mon {
        day = day.succ_opt().unwrap();
    }
    day
}

pub fn booking(doctor_id: Uuid, slot: &str) -> BookAppointmentRequest {
    BookAppointmentRequest {
        doctor_id: doctor_id.to_string(),
        date: next_monday().format("%Y-%m-%d").to_string(),
        slot: slot.to_string(),
        issue: Some("Sore throat".to_string()),
        notes: None,
    }
}

fn doctor(id: Uuid) -> Doctor {
    Doctor {
        id,
        first_name: Some("Ada".to_string()),
        last_name: Some("Okafor".to_string()),
        specialty: "General Practice".to_string(),
        qualification: None,
        experience_years: Some(12),
        availability: Some(
            serde_json::from_value(json!({ "working_hours": { "monday": ["09:00-17:00"] } })).unwrap(),
        ),
        availability_error: None,
    }
}

pub struct Fixture {
    pub doctor_id: Uuid,
    pub patient_id: Uuid,
    pub appointment_id: Uuid,
    pub ai: Arc<ScriptedAi>,
    pub registry: Arc<AppointmentRegistry>,
    pub reports: Arc<InMemoryReportStore>,
    pub patients: Arc<InMemoryPatientContext>,
    pub timeline: Arc<TimelineProjector>,
    pub coordinator: Arc<ReportCoordinator>,
}

pub struct FixtureBuilder {
    replies: Vec<Reply>,
    policy: DraftFailurePolicy,
    dispatcher: Option<Arc<dyn NotificationDispatcher>>,
}

pub fn fixture(replies: Vec<Reply>) -> FixtureBuilder {
    FixtureBuilder {
        replies,
        policy: DraftFailurePolicy::Abort,
        dispatcher: None,
    }
}

impl FixtureBuilder {
    pub fn keep_summary(mut self) -> Self {
        self.policy = DraftFailurePolicy::KeepSummary;
        self
    }

    pub fn dispatcher(mut self, dispatcher: Arc<dyn NotificationDispatcher>) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }

    /// Seeds a doctor, a patient with a confirmed appointment, and wires the coordinator.
    pub async fn build(self) -> Fixture {
        let doctor_id = Uuid::new_v4();
        let patient_id = Uuid::new_v4();

        let availability = Arc::new(AvailabilityService::new(Arc::new(InMemoryDoctorStore::with_doctors([
            doctor(doctor_id),
        ]))));
        let registry = Arc::new(AppointmentRegistry::new(
            Arc::new(InMemoryAppointmentStore::new()),
            availability.clone(),
            BookingPolicy::Exclusive,
        ));
        let appointment = registry.request_appointment(patient_id, booking(doctor_id, "10:00")).await.unwrap();
        registry.confirm(appointment.id, doctor_id).await.unwrap();

        let patients = Arc::new(InMemoryPatientContext::new());
        patients
            .insert_context(
                patient_id,
                PatientContext {
                    first_name: Some("Sam".to_string()),
                    last_name: Some("Lee".to_string()),
                    ..Default::default()
                },
            )
            .await;
        patients
            .insert_contact(Contact {
                id: patient_id,
                first_name: Some("Sam".to_string()),
                last_name: Some("Lee".to_string()),
                email: Some("sam@example.com".to_string()),
                phone: None,
            })
            .await;

        let reports = Arc::new(InMemoryReportStore::new());
        let timeline = Arc::new(TimelineProjector::new(
            Arc::new(InMemoryTimelineStore::new()),
            availability.clone(),
            reports.clone(),
        ));
        let ai = Arc::new(ScriptedAi::new(self.replies));

        let mut coordinator = ReportCoordinator::new(
            ai.clone(),
            registry.clone(),
            availability,
            patients.clone(),
            reports.clone(),
            timeline.clone(),
        )
        .with_draft_failure_policy(self.policy);
        if let Some(dispatcher) = self.dispatcher {
            coordinator = coordinator.with_dispatcher(dispatcher);
        }

        Fixture {
            doctor_id,
            patient_id,
            appointment_id: appointment.id,
            ai,
            registry,
            reports,
            patients,
            timeline,
            coordinator: Arc::new(coordinator),
        }
    }
}
