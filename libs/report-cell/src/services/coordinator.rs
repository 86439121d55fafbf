use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use appointment_cell::models::{Actor, AppointmentStatus};
use appointment_cell::services::AppointmentRegistry;
use doctor_cell::models::DoctorError;
use doctor_cell::services::AvailabilityService;
use shared_ai::CompletionClient;
use shared_config::DraftFailurePolicy;
use timeline_cell::models::GeneratedReport;
use timeline_cell::services::TimelineProjector;

use crate::models::{Channel, GenerateReportRequest, Report, ReportError, SentReport};
use crate::services::context::PatientContextSource;
use crate::services::dispatch::{LoggingDispatcher, NotificationDispatcher};
use crate::services::prompts;
use crate::services::store::ReportStore;

/// Turns a consultation transcription into a persisted visit report.
///
/// The pipeline runs context, summary, prescription draft, then persistence, in
/// that order. Nothing is written until both AI steps are settled, so a caller
/// that drops the future part-way leaves no report behind.
pub struct ReportCoordinator {
    ai: Arc<dyn CompletionClient>,
    appointments: Arc<AppointmentRegistry>,
    doctors: Arc<AvailabilityService>,
    patients: Arc<dyn PatientContextSource>,
    store: Arc<dyn ReportStore>,
    timeline: Arc<TimelineProjector>,
    dispatcher: Arc<dyn NotificationDispatcher>,
    draft_failure: DraftFailurePolicy,
}

impl ReportCoordinator {
    pub fn new(
        ai: Arc<dyn CompletionClient>,
        appointments: Arc<AppointmentRegistry>,
        doctors: Arc<AvailabilityService>,
        patients: Arc<dyn PatientContextSource>,
        store: Arc<dyn ReportStore>,
        timeline: Arc<TimelineProjector>,
    ) -> Self {
        Self {
            ai,
            appointments,
            doctors,
            patients,
            store,
            timeline,
            dispatcher: Arc::new(LoggingDispatcher),
            draft_failure: DraftFailurePolicy::Abort,
        }
    }

    pub fn with_dispatcher(mut self, dispatcher: Arc<dyn NotificationDispatcher>) -> Self {
        self.dispatcher = dispatcher;
        self
    }

    pub fn with_draft_failure_policy(mut self, policy: DraftFailurePolicy) -> Self {
        self.draft_failure = policy;
        self
    }

    #[instrument(skip(self, request), fields(appointment_id = %request.appointment_id))]
    pub async fn generate(&self, request: &GenerateReportRequest, actor: Actor) -> Result<Report, ReportError> {
        let transcription = request.transcription.trim();
        if transcription.is_empty() {
            return Err(ReportError::Validation("transcription is required".to_string()));
        }

        let appointment = self.appointments.get(request.appointment_id).await?;
        ensure_doctor(appointment.doctor_id, actor)?;
        if !matches!(appointment.status, AppointmentStatus::Confirmed | AppointmentStatus::Completed) {
            warn!("Refusing report for {} appointment {}", appointment.status, appointment.id);
            return Err(ReportError::AppointmentNotReportable { status: appointment.status });
        }

        let doctor = self.doctor_label(appointment.doctor_id).await?;
        let context = self.patients.context(appointment.patient_id).await?;
        debug!(
            "Context for patient {}: {} conditions, {} medications, {} allergies",
            appointment.patient_id,
            context.conditions.len(),
            context.medications.len(),
            context.allergies.len()
        );

        let summary_request = prompts::summary_request(&context, &doctor, request.notes.as_deref(), transcription);
        let visit_summary = self.ai.complete(&summary_request).await.map_err(|e| {
            error!("Visit summary failed for appointment {}: {}", appointment.id, e);
            ReportError::Summary(e)
        })?;

        let prescription_request = prompts::prescription_request(&context, &visit_summary);
        let prescription = match self.ai.complete(&prescription_request).await {
            Ok(text) => Some(text),
            Err(e) => match self.draft_failure {
                DraftFailurePolicy::Abort => {
                    error!("Prescription draft failed for appointment {}: {}", appointment.id, e);
                    return Err(ReportError::Prescription(e));
                }
                DraftFailurePolicy::KeepSummary => {
                    warn!("Prescription draft failed, keeping summary-only report: {}", e);
                    None
                }
            },
        };

        let now = Utc::now();
        let patient_name = context.full_name();
        let report = Report {
            id: Uuid::new_v4(),
            appointment_id: Some(appointment.id),
            doctor_id: appointment.doctor_id,
            patient_id: appointment.patient_id,
            title: prompts::report_title(&patient_name, now.date_naive()),
            content: prompts::report_content(now.date_naive(), &patient_name, &doctor, &visit_summary),
            visit_summary,
            prescription,
            is_sent: false,
            created_at: now,
            updated_at: now,
        };

        let report = self.store.insert(&report).await?;
        info!("Report {} generated for appointment {}", report.id, appointment.id);

        self.announce(&report, &doctor).await;
        Ok(report)
    }

    /// Re-runs the drafting step for a report persisted without a prescription.
    #[instrument(skip(self))]
    pub async fn redraft_prescription(&self, report_id: Uuid, actor: Actor) -> Result<Report, ReportError> {
        let report = self.get(report_id).await?;
        ensure_doctor(report.doctor_id, actor)?;
        if !report.awaiting_prescription() {
            return Err(ReportError::PrescriptionPresent);
        }

        let context = self.patients.context(report.patient_id).await?;
        let request = prompts::prescription_request(&context, &report.visit_summary);
        let prescription = self.ai.complete(&request).await.map_err(ReportError::Prescription)?;

        let updated = self
            .store
            .set_prescription(report_id, &prescription)
            .await?
            .ok_or(ReportError::NotFound)?;
        info!("Prescription drafted for report {}", report_id);
        Ok(updated)
    }

    /// Delivers the report and flips `is_sent`. A failed delivery leaves the report untouched.
    #[instrument(skip(self))]
    pub async fn mark_sent(
        &self,
        report_id: Uuid,
        channel: Channel,
        recipient_id: Uuid,
        sender_id: Uuid,
    ) -> Result<SentReport, ReportError> {
        let report = self.get(report_id).await?;
        if report.doctor_id != sender_id {
            return Err(ReportError::NotReportDoctor);
        }

        let recipient = self
            .patients
            .contact(recipient_id)
            .await?
            .ok_or(ReportError::RecipientNotFound)?;

        self.dispatcher.dispatch(&report, channel, &recipient).await.map_err(|e| match e {
            ReportError::Validation(_) | ReportError::Dispatch(_) => e,
            other => ReportError::Dispatch(other.to_string()),
        })?;

        let report = self.store.mark_sent(report_id).await?.ok_or(ReportError::NotFound)?;
        info!("Report {} sent via {}", report_id, channel);

        Ok(SentReport {
            report,
            message: format!("Report sent via {} to {}", channel, recipient.name()),
        })
    }

    pub async fn get(&self, report_id: Uuid) -> Result<Report, ReportError> {
        self.store.get(report_id).await?.ok_or(ReportError::NotFound)
    }

    pub async fn list_for_patient(&self, patient_id: Uuid) -> Result<Vec<Report>, ReportError> {
        self.store.list_for_patient(patient_id).await
    }

    pub async fn list_for_doctor(&self, doctor_id: Uuid) -> Result<Vec<Report>, ReportError> {
        self.store.list_for_doctor(doctor_id).await
    }

    async fn doctor_label(&self, doctor_id: Uuid) -> Result<String, ReportError> {
        match self.doctors.get_doctor(doctor_id).await {
            Ok(doctor) => Ok(doctor.display_name()),
            Err(DoctorError::NotFound) => Ok("Dr. Specialist".to_string()),
            Err(e) => Err(e.into()),
        }
    }

    /// The report stands even if the timeline write fails; the entry is keyed on
    /// the report id so a later retry cannot duplicate it.
    async fn announce(&self, report: &Report, doctor: &str) {
        let generated = GeneratedReport {
            report_id: report.id,
            patient_id: report.patient_id,
            doctor_name: doctor.trim_start_matches("Dr. ").to_string(),
            title: report.title.clone(),
            created_at: report.created_at,
        };
        if let Err(e) = self.timeline.on_report_generated(&generated).await {
            warn!("Report {} persisted but timeline entry failed: {}", report.id, e);
        }
    }
}

fn ensure_doctor(doctor_id: Uuid, actor: Actor) -> Result<(), ReportError> {
    match actor {
        Actor::System => Ok(()),
        Actor::Doctor(id) if id == doctor_id => Ok(()),
        _ => Err(ReportError::NotReportDoctor),
    }
}
