use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use doctor_cell::models::DoctorError;
use shared_models::error::AppError;

// ==============================================================================
// APPOINTMENT
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Appointment {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub scheduled_at: DateTime<Utc>,
    pub issue: Option<String>,
    pub notes: Option<String>,
    pub status: AppointmentStatus,
    /// Bumped on every status change; writers must present the version they read.
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Appointment {
    /// Whether this appointment currently holds its (doctor, time) slot.
    pub fn holds_slot(&self) -> bool {
        matches!(self.status, AppointmentStatus::Pending | AppointmentStatus::Confirmed)
    }

    pub fn same_slot(&self, other: &Appointment) -> bool {
        self.doctor_id == other.doctor_id && self.scheduled_at == other.scheduled_at
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum AppointmentStatus {
    Pending,
    Confirmed,
    Completed,
    Canceled,
}

impl AppointmentStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, AppointmentStatus::Completed | AppointmentStatus::Canceled)
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentStatus::Pending => write!(f, "pending"),
            AppointmentStatus::Confirmed => write!(f, "confirmed"),
            AppointmentStatus::Completed => write!(f, "completed"),
            AppointmentStatus::Canceled => write!(f, "canceled"),
        }
    }
}

impl FromStr for AppointmentStatus {
    type Err = AppointmentError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "pending" => Ok(AppointmentStatus::Pending),
            "confirmed" => Ok(AppointmentStatus::Confirmed),
            "completed" => Ok(AppointmentStatus::Completed),
            "canceled" => Ok(AppointmentStatus::Canceled),
            other => Err(AppointmentError::Validation(format!("Unknown appointment status '{}'", other))),
        }
    }
}

/// Actions that move an appointment through its lifecycle.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Transition {
    Confirm,
    Reject,
    Complete,
    Cancel,
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transition::Confirm => write!(f, "confirm"),
            Transition::Reject => write!(f, "reject"),
            Transition::Complete => write!(f, "complete"),
            Transition::Cancel => write!(f, "cancel"),
        }
    }
}

/// Who is asking for a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Actor {
    Doctor(Uuid),
    Patient(Uuid),
    System,
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Actor::Doctor(id) => write!(f, "doctor {}", id),
            Actor::Patient(id) => write!(f, "patient {}", id),
            Actor::System => write!(f, "system"),
        }
    }
}

// ==============================================================================
// OUTBOX EVENTS
// ==============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AppointmentEventKind {
    Confirmed,
    Canceled,
    Completed,
}

impl AppointmentEventKind {
    pub fn for_status(status: AppointmentStatus) -> Option<Self> {
        match status {
            AppointmentStatus::Confirmed => Some(AppointmentEventKind::Confirmed),
            AppointmentStatus::Canceled => Some(AppointmentEventKind::Canceled),
            AppointmentStatus::Completed => Some(AppointmentEventKind::Completed),
            AppointmentStatus::Pending => None,
        }
    }
}

/// Written in the same unit of work as the status change it describes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppointmentEvent {
    pub id: Uuid,
    pub appointment_id: Uuid,
    pub kind: AppointmentEventKind,
    pub snapshot: Appointment,
    pub occurred_at: DateTime<Utc>,
    #[serde(default)]
    pub delivered_at: Option<DateTime<Utc>>,
}

impl AppointmentEvent {
    pub fn new(kind: AppointmentEventKind, snapshot: Appointment) -> Self {
        Self {
            id: Uuid::new_v4(),
            appointment_id: snapshot.id,
            kind,
            occurred_at: snapshot.updated_at,
            snapshot,
            delivered_at: None,
        }
    }
}

/// A version-checked status change, applied together with its outbox event.
#[derive(Debug, Clone)]
pub struct StatusChange {
    pub appointment_id: Uuid,
    pub expected_version: i64,
    pub to: AppointmentStatus,
    /// Fail with `SlotTaken` if another appointment already confirmed this slot.
    pub require_free_slot: bool,
}

// ==============================================================================
// REQUESTS & QUERIES
// ==============================================================================

/// Booking form as submitted. Everything is a string so malformed input is
/// reported as a validation error rather than a deserialization failure.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BookAppointmentRequest {
    #[serde(default)]
    pub doctor_id: String,
    /// `YYYY-MM-DD`
    #[serde(default)]
    pub date: String,
    /// `HH:MM`
    #[serde(default)]
    pub slot: String,
    pub issue: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppointmentListQuery {
    pub status: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct AppointmentFilter {
    pub patient_id: Option<Uuid>,
    pub doctor_id: Option<Uuid>,
    pub status: Option<AppointmentStatus>,
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Debug, Error)]
pub enum AppointmentError {
    #[error("Appointment not found")]
    NotFound,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("{slot} is not an offered slot for this doctor")]
    SlotNotOffered { slot: String },

    #[error("Appointment slot not available")]
    SlotTaken,

    #[error("Cannot {action} an appointment that is {from}")]
    InvalidStatusTransition {
        from: AppointmentStatus,
        action: Transition,
    },

    #[error("Appointment was modified concurrently, reload and retry")]
    ConcurrentModification,

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error(transparent)]
    Doctor(#[from] DoctorError),

    #[error("Appointment store failure: {0}")]
    Store(String),
}

impl From<AppointmentError> for AppError {
    fn from(err: AppointmentError) -> Self {
        let message = err.to_string();
        match err {
            AppointmentError::NotFound => AppError::NotFound(message),
            AppointmentError::Validation(_) | AppointmentError::SlotNotOffered { .. } => {
                AppError::Validation(message)
            }
            AppointmentError::SlotTaken
            | AppointmentError::InvalidStatusTransition { .. }
            | AppointmentError::ConcurrentModification => AppError::StateConflict(message),
            AppointmentError::Unauthorized(_) => AppError::Authorization(message),
            AppointmentError::Doctor(inner) => inner.into(),
            AppointmentError::Store(_) => AppError::Persistence(message),
        }
    }
}
