use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use appointment_cell::models::{AppointmentError, AppointmentStatus};
use doctor_cell::models::DoctorError;
use shared_ai::AiError;
use shared_models::error::AppError;

// ==============================================================================
// REPORT
// ==============================================================================

/// A visit report. Written once by the coordinator; afterwards only the
/// prescription (when it was left out) and `is_sent` change.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Report {
    pub id: Uuid,
    pub appointment_id: Option<Uuid>,
    pub doctor_id: Uuid,
    pub patient_id: Uuid,
    pub title: String,
    pub content: String,
    pub visit_summary: String,
    /// `None` only when drafting failed under the keep-summary policy.
    pub prescription: Option<String>,
    #[serde(default)]
    pub is_sent: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Report {
    pub fn awaiting_prescription(&self) -> bool {
        self.prescription.is_none()
    }
}

/// Read-only medical context fed into the prompts. Missing data is empty, never an error.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PatientContext {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub conditions: Vec<String>,
    pub medications: Vec<String>,
    pub allergies: Vec<String>,
}

impl PatientContext {
    pub fn full_name(&self) -> String {
        let name = format!(
            "{} {}",
            self.first_name.as_deref().unwrap_or(""),
            self.last_name.as_deref().unwrap_or("")
        );
        match name.trim() {
            "" => "Patient".to_string(),
            trimmed => trimmed.to_string(),
        }
    }
}

/// Where a report can be delivered.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    pub id: Uuid,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

impl Contact {
    pub fn name(&self) -> String {
        format!(
            "{} {}",
            self.first_name.as_deref().unwrap_or(""),
            self.last_name.as_deref().unwrap_or("")
        )
        .trim()
        .to_string()
    }

    pub fn address_for(&self, channel: Channel) -> Option<&str> {
        let address = match channel {
            Channel::Email => self.email.as_deref(),
            Channel::Whatsapp => self.phone.as_deref(),
        };
        address.filter(|a| !a.trim().is_empty())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Email,
    Whatsapp,
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Channel::Email => write!(f, "email"),
            Channel::Whatsapp => write!(f, "whatsapp"),
        }
    }
}

impl FromStr for Channel {
    type Err = ReportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "email" => Ok(Channel::Email),
            "whatsapp" => Ok(Channel::Whatsapp),
            other => Err(ReportError::Validation(format!("Unknown delivery channel: {}", other))),
        }
    }
}

// ==============================================================================
// REQUEST TYPES
// ==============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct GenerateReportRequest {
    pub appointment_id: Uuid,
    pub transcription: String,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SendReportRequest {
    pub channel: Channel,
    pub recipient_id: Uuid,
}

/// Outcome of a successful dispatch.
#[derive(Debug, Clone, Serialize)]
pub struct SentReport {
    pub report: Report,
    pub message: String,
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Report not found")]
    NotFound,

    #[error("Recipient not found")]
    RecipientNotFound,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Cannot write a report for a {status} appointment")]
    AppointmentNotReportable { status: AppointmentStatus },

    #[error("Report already has a prescription draft")]
    PrescriptionPresent,

    #[error("Only the appointment's doctor may do this")]
    NotReportDoctor,

    #[error("Visit summary generation failed: {0}")]
    Summary(AiError),

    #[error("Prescription drafting failed: {0}")]
    Prescription(AiError),

    #[error("Report delivery failed: {0}")]
    Dispatch(String),

    #[error(transparent)]
    Appointment(#[from] AppointmentError),

    #[error(transparent)]
    Doctor(#[from] DoctorError),

    #[error("Patient context unavailable: {0}")]
    Context(String),

    #[error("Report store failure: {0}")]
    Store(String),
}

impl From<ReportError> for AppError {
    fn from(err: ReportError) -> Self {
        let message = err.to_string();
        match err {
            ReportError::NotFound | ReportError::RecipientNotFound => AppError::NotFound(message),
            ReportError::Validation(_) => AppError::Validation(message),
            ReportError::AppointmentNotReportable { .. } | ReportError::PrescriptionPresent => {
                AppError::StateConflict(message)
            }
            ReportError::NotReportDoctor => AppError::Authorization(message),
            ReportError::Summary(_) | ReportError::Prescription(_) | ReportError::Dispatch(_) => {
                AppError::ExternalService(message)
            }
            ReportError::Appointment(inner) => inner.into(),
            ReportError::Doctor(inner) => inner.into(),
            ReportError::Context(_) | ReportError::Store(_) => AppError::Persistence(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn patient_name_falls_back_when_profile_is_blank() {
        let context = PatientContext::default();
        assert_eq!(context.full_name(), "Patient");

        let context = PatientContext {
            first_name: Some("Sam".to_string()),
            last_name: None,
            ..Default::default()
        };
        assert_eq!(context.full_name(), "Sam");
    }

    #[test]
    fn channel_picks_matching_address() {
        let contact = Contact {
            id: Uuid::new_v4(),
            first_name: Some("Sam".to_string()),
            last_name: Some("Lee".to_string()),
            email: Some("sam@example.com".to_string()),
            phone: Some("  ".to_string()),
        };
        assert_eq!(contact.address_for(Channel::Email), Some("sam@example.com"));
        assert_eq!(contact.address_for(Channel::Whatsapp), None);
        assert_eq!(contact.name(), "Sam Lee");
    }

    #[test]
    fn channel_parses_case_insensitively() {
        assert_eq!("WhatsApp".parse::<Channel>().unwrap(), Channel::Whatsapp);
        assert!("fax".parse::<Channel>().is_err());
    }

    #[test]
    fn ai_failures_surface_as_external_service() {
        let err: AppError = ReportError::Summary(AiError::Timeout { attempts: 3 }).into();
        assert!(matches!(err, AppError::ExternalService(_)));
    }
}
