use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use appointment_cell::models::{AppointmentEvent, AppointmentEventKind};
use appointment_cell::services::AppointmentEventHandler;
use doctor_cell::models::DoctorError;
use doctor_cell::services::AvailabilityService;
use shared_models::error::AppError;

use crate::models::{ConfirmedAppointment, EventKind, GeneratedReport, NewTimelineEvent, TimelineError, TimelineEvent};
use crate::services::store::TimelineStore;

/// Finds the visit report already written for an appointment, if any.
#[async_trait]
pub trait ReportLookup: Send + Sync {
    async fn report_for_appointment(&self, appointment_id: Uuid) -> Result<Option<Uuid>, TimelineError>;
}

/// For deployments without a report store.
pub struct NoReports;

#[async_trait]
impl ReportLookup for NoReports {
    async fn report_for_appointment(&self, _appointment_id: Uuid) -> Result<Option<Uuid>, TimelineError> {
        Ok(None)
    }
}

/// Sole writer of timeline events.
pub struct TimelineProjector {
    store: Arc<dyn TimelineStore>,
    doctors: Arc<AvailabilityService>,
    reports: Arc<dyn ReportLookup>,
}

impl TimelineProjector {
    pub fn new(store: Arc<dyn TimelineStore>, doctors: Arc<AvailabilityService>, reports: Arc<dyn ReportLookup>) -> Self {
        Self { store, doctors, reports }
    }

    /// Appends the `appointment` entry for a confirmed appointment. Redelivery of
    /// the same confirmation returns `Ok(None)` and writes nothing.
    #[instrument(skip(self, appointment), fields(appointment_id = %appointment.id))]
    pub async fn on_appointment_confirmed(
        &self,
        appointment: &ConfirmedAppointment,
    ) -> Result<Option<TimelineEvent>, TimelineError> {
        let (doctor_name, specialty) = match self.doctors.get_doctor(appointment.doctor_id).await {
            Ok(doctor) => (doctor.full_name(), doctor.specialty),
            Err(DoctorError::NotFound) => {
                warn!("Doctor {} not found, projecting with placeholder name", appointment.doctor_id);
                ("Unknown Unknown".to_string(), "General Medicine".to_string())
            }
            Err(e) => return Err(e.into()),
        };

        let report_id = self.reports.report_for_appointment(appointment.id).await?;

        let event = TimelineEvent {
            id: Uuid::new_v4(),
            user_id: appointment.patient_id,
            date: appointment.scheduled_at,
            title: format!("Appointment with Dr. {}", doctor_name),
            description: Some(format!(
                "Confirmed appointment with {} specialist. Issue: {}",
                specialty,
                appointment.issue.as_deref().filter(|i| !i.trim().is_empty()).unwrap_or("Not specified")
            )),
            kind: EventKind::Appointment,
            related_file_url: None,
            report_id,
            source_appointment_id: Some(appointment.id),
            source_report_id: None,
            created_at: Utc::now(),
        };

        if self.store.append(&event).await? {
            info!("Timeline entry added for patient {}", appointment.patient_id);
            Ok(Some(event))
        } else {
            debug!("Appointment {} already on timeline", appointment.id);
            Ok(None)
        }
    }

    /// Appends a `visit` entry pointing at a freshly persisted report.
    pub async fn on_report_generated(&self, report: &GeneratedReport) -> Result<Option<TimelineEvent>, TimelineError> {
        let event = TimelineEvent {
            id: Uuid::new_v4(),
            user_id: report.patient_id,
            date: report.created_at,
            title: report.title.clone(),
            description: Some(format!("Visit report from Dr. {}", report.doctor_name)),
            kind: EventKind::Visit,
            related_file_url: None,
            report_id: Some(report.report_id),
            source_appointment_id: None,
            source_report_id: Some(report.report_id),
            created_at: Utc::now(),
        };

        if self.store.append(&event).await? {
            info!("Visit report {} added to timeline", report.report_id);
            Ok(Some(event))
        } else {
            Ok(None)
        }
    }

    /// Patient-authored entries skip the appointment path entirely.
    pub async fn record_event(&self, user_id: Uuid, new_event: NewTimelineEvent) -> Result<TimelineEvent, TimelineError> {
        let title = new_event.title.trim();
        if title.is_empty() {
            return Err(TimelineError::Validation("title is required".to_string()));
        }

        let event = TimelineEvent {
            id: Uuid::new_v4(),
            user_id,
            date: new_event.date,
            title: title.to_string(),
            description: new_event.description.filter(|d| !d.trim().is_empty()),
            kind: new_event.kind,
            related_file_url: new_event.related_file_url,
            report_id: None,
            source_appointment_id: None,
            source_report_id: None,
            created_at: Utc::now(),
        };

        self.store.append(&event).await?;
        debug!("Recorded {} event for user {}", event.kind, user_id);
        Ok(event)
    }

    pub async fn list(&self, user_id: Uuid) -> Result<Vec<TimelineEvent>, TimelineError> {
        self.store.list(user_id).await
    }
}

#[async_trait]
impl AppointmentEventHandler for TimelineProjector {
    fn name(&self) -> &'static str {
        "timeline"
    }

    async fn handle(&self, event: &AppointmentEvent) -> Result<(), AppError> {
        if event.kind != AppointmentEventKind::Confirmed {
            return Ok(());
        }
        self.on_appointment_confirmed(&ConfirmedAppointment::from(&event.snapshot))
            .await
            .map(|_| ())
            .map_err(AppError::from)
    }
}
