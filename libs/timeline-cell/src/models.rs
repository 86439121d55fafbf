use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use appointment_cell::models::Appointment;
use doctor_cell::models::DoctorError;
use shared_models::error::AppError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Prescription,
    Lab,
    Visit,
    Medicine,
    Alert,
    Appointment,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            EventKind::Prescription => "prescription",
            EventKind::Lab => "lab",
            EventKind::Visit => "visit",
            EventKind::Medicine => "medicine",
            EventKind::Alert => "alert",
            EventKind::Appointment => "appointment",
        };
        f.write_str(label)
    }
}

/// One dated entry in a patient's medical history. Never updated once written.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TimelineEvent {
    pub id: Uuid,
    pub user_id: Uuid,
    pub date: DateTime<Utc>,
    pub title: String,
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub kind: EventKind,
    #[serde(default)]
    pub related_file_url: Option<String>,
    /// Non-owning pointer to a visit report.
    #[serde(default)]
    pub report_id: Option<Uuid>,
    /// Dedupe key for projected appointment entries, unique per user.
    #[serde(default)]
    pub source_appointment_id: Option<Uuid>,
    /// Dedupe key for projected visit entries, unique per user.
    #[serde(default)]
    pub source_report_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// Patient-authored entry.
#[derive(Debug, Clone, Deserialize)]
pub struct NewTimelineEvent {
    pub date: DateTime<Utc>,
    pub title: String,
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub related_file_url: Option<String>,
}

/// The slice of an appointment the projector needs.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ConfirmedAppointment {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub scheduled_at: DateTime<Utc>,
    #[serde(default)]
    pub issue: Option<String>,
}

impl From<&Appointment> for ConfirmedAppointment {
    fn from(appointment: &Appointment) -> Self {
        Self {
            id: appointment.id,
            patient_id: appointment.patient_id,
            doctor_id: appointment.doctor_id,
            scheduled_at: appointment.scheduled_at,
            issue: appointment.issue.clone(),
        }
    }
}

/// Row-change notification: `{ "type": "UPDATE", "record": { ... } }`.
#[derive(Debug, Clone, Deserialize)]
pub struct AppointmentHook {
    #[serde(rename = "type")]
    pub change: String,
    pub record: AppointmentHookRecord,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppointmentHookRecord {
    pub status: String,
    #[serde(flatten)]
    pub appointment: ConfirmedAppointment,
}

/// A persisted visit report, as announced to the timeline.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedReport {
    pub report_id: Uuid,
    pub patient_id: Uuid,
    pub doctor_name: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Error)]
pub enum TimelineError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    Doctor(#[from] DoctorError),

    #[error("Report lookup failed: {0}")]
    ReportLookup(String),

    #[error("Timeline store failure: {0}")]
    Store(String),
}

impl From<TimelineError> for AppError {
    fn from(err: TimelineError) -> Self {
        let message = err.to_string();
        match err {
            TimelineError::Validation(_) => AppError::Validation(message),
            TimelineError::Doctor(inner) => inner.into(),
            TimelineError::ReportLookup(_) | TimelineError::Store(_) => AppError::Persistence(message),
        }
    }
}
