use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Method;
use serde_json::json;
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

use shared_config::BookingPolicy;
use shared_database::{SupabaseClient, SupabaseError};

use crate::models::{
    Appointment, AppointmentError, AppointmentEvent, AppointmentEventKind, AppointmentFilter,
    AppointmentStatus, StatusChange,
};

#[async_trait]
pub trait AppointmentStore: Send + Sync {
    /// Inserts a new appointment, enforcing the booking policy for its slot
    /// in the same critical section as the write.
    async fn insert(&self, appointment: &Appointment, policy: BookingPolicy) -> Result<Appointment, AppointmentError>;

    async fn get(&self, appointment_id: Uuid) -> Result<Option<Appointment>, AppointmentError>;

    /// Applies a status change if `expected_version` is still current and records
    /// the matching outbox event in the same unit of work.
    async fn transition(&self, change: &StatusChange) -> Result<Appointment, AppointmentError>;

    /// Newest first.
    async fn list(&self, filter: &AppointmentFilter) -> Result<Vec<Appointment>, AppointmentError>;
}

/// Read side of the transactional outbox.
#[async_trait]
pub trait EventOutbox: Send + Sync {
    /// Undelivered events, oldest first.
    async fn pending(&self, limit: usize) -> Result<Vec<AppointmentEvent>, AppointmentError>;

    async fn acknowledge(&self, event_id: Uuid) -> Result<(), AppointmentError>;
}

// ==============================================================================
// IN-MEMORY
// ==============================================================================

#[derive(Default)]
struct Tables {
    appointments: HashMap<Uuid, Appointment>,
    /// Undelivered events only; acknowledging removes them.
    outbox: VecDeque<AppointmentEvent>,
}

/// A single mutex over both tables gives every write the atomicity of one transaction.
#[derive(Default)]
pub struct InMemoryAppointmentStore {
    tables: Mutex<Tables>,
}

impl InMemoryAppointmentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Events written but not yet acknowledged, oldest first.
    pub async fn outbox_snapshot(&self) -> Vec<AppointmentEvent> {
        self.tables.lock().await.outbox.iter().cloned().collect()
    }
}

#[async_trait]
impl AppointmentStore for InMemoryAppointmentStore {
    async fn insert(&self, appointment: &Appointment, policy: BookingPolicy) -> Result<Appointment, AppointmentError> {
        let mut tables = self.tables.lock().await;

        let taken = tables.appointments.values().any(|existing| {
            existing.same_slot(appointment)
                && match policy {
                    BookingPolicy::Exclusive => existing.holds_slot(),
                    BookingPolicy::SoftHold => existing.status == AppointmentStatus::Confirmed,
                }
        });
        if taken {
            return Err(AppointmentError::SlotTaken);
        }

        tables.appointments.insert(appointment.id, appointment.clone());
        Ok(appointment.clone())
    }

    async fn get(&self, appointment_id: Uuid) -> Result<Option<Appointment>, AppointmentError> {
        Ok(self.tables.lock().await.appointments.get(&appointment_id).cloned())
    }

    async fn transition(&self, change: &StatusChange) -> Result<Appointment, AppointmentError> {
        let mut tables = self.tables.lock().await;

        let current = tables
            .appointments
            .get(&change.appointment_id)
            .cloned()
            .ok_or(AppointmentError::NotFound)?;

        if current.version != change.expected_version {
            return Err(AppointmentError::ConcurrentModification);
        }

        if change.require_free_slot {
            let slot_confirmed = tables.appointments.values().any(|other| {
                other.id != current.id
                    && other.same_slot(&current)
                    && other.status == AppointmentStatus::Confirmed
            });
            if slot_confirmed {
                return Err(AppointmentError::SlotTaken);
            }
        }

        let mut updated = current;
        updated.status = change.to;
        updated.version += 1;
        updated.updated_at = Utc::now();

        tables.appointments.insert(updated.id, updated.clone());
        if let Some(kind) = AppointmentEventKind::for_status(change.to) {
            tables.outbox.push_back(AppointmentEvent::new(kind, updated.clone()));
        }

        Ok(updated)
    }

    async fn list(&self, filter: &AppointmentFilter) -> Result<Vec<Appointment>, AppointmentError> {
        let tables = self.tables.lock().await;
        let mut rows: Vec<Appointment> = tables
            .appointments
            .values()
            .filter(|a| filter.patient_id.map_or(true, |id| a.patient_id == id))
            .filter(|a| filter.doctor_id.map_or(true, |id| a.doctor_id == id))
            .filter(|a| filter.status.map_or(true, |s| a.status == s))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rows)
    }
}

#[async_trait]
impl EventOutbox for InMemoryAppointmentStore {
    async fn pending(&self, limit: usize) -> Result<Vec<AppointmentEvent>, AppointmentError> {
        let tables = self.tables.lock().await;
        Ok(tables.outbox.iter().take(limit).cloned().collect())
    }

    async fn acknowledge(&self, event_id: Uuid) -> Result<(), AppointmentError> {
        let mut tables = self.tables.lock().await;
        if let Some(position) = tables.outbox.iter().position(|e| e.id == event_id) {
            tables.outbox.remove(position);
        }
        Ok(())
    }
}

// ==============================================================================
// SUPABASE
// ==============================================================================

/// Booking and transitions go through Postgres functions so that the slot check,
/// the version check and the outbox insert share one transaction:
///
/// - `request_appointment(p_appointment jsonb, p_exclusive bool)`
/// - `transition_appointment(p_id uuid, p_expected_version bigint, p_status text, p_require_free_slot bool)`
///
/// Both raise `PT409` (`slot_taken` / `version_conflict`) and `PT404`, which PostgREST
/// turns into the matching HTTP status.
pub struct SupabaseAppointmentStore {
    supabase: Arc<SupabaseClient>,
}

impl SupabaseAppointmentStore {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }
}

fn map_error(err: SupabaseError) -> AppointmentError {
    match &err {
        SupabaseError::Api { body, .. } if err.is_conflict() && body.contains("slot_taken") => {
            AppointmentError::SlotTaken
        }
        _ if err.is_conflict() => AppointmentError::ConcurrentModification,
        _ if err.is_not_found() => AppointmentError::NotFound,
        _ => AppointmentError::Store(err.to_string()),
    }
}

#[async_trait]
impl AppointmentStore for SupabaseAppointmentStore {
    async fn insert(&self, appointment: &Appointment, policy: BookingPolicy) -> Result<Appointment, AppointmentError> {
        debug!("Requesting appointment {} via rpc", appointment.id);
        self.supabase
            .rpc(
                "request_appointment",
                json!({
                    "p_appointment": appointment,
                    "p_exclusive": policy == BookingPolicy::Exclusive,
                }),
            )
            .await
            .map_err(map_error)
    }

    async fn get(&self, appointment_id: Uuid) -> Result<Option<Appointment>, AppointmentError> {
        let path = format!("/rest/v1/appointments?id=eq.{}", appointment_id);
        self.supabase.select_one(&path).await.map_err(map_error)
    }

    async fn transition(&self, change: &StatusChange) -> Result<Appointment, AppointmentError> {
        debug!(
            "Transitioning appointment {} to {} (version {})",
            change.appointment_id, change.to, change.expected_version
        );
        self.supabase
            .rpc(
                "transition_appointment",
                json!({
                    "p_id": change.appointment_id,
                    "p_expected_version": change.expected_version,
                    "p_status": change.to,
                    "p_require_free_slot": change.require_free_slot,
                }),
            )
            .await
            .map_err(map_error)
    }

    async fn list(&self, filter: &AppointmentFilter) -> Result<Vec<Appointment>, AppointmentError> {
        let mut query_parts = vec!["order=created_at.desc".to_string()];
        if let Some(patient_id) = filter.patient_id {
            query_parts.push(format!("patient_id=eq.{}", patient_id));
        }
        if let Some(doctor_id) = filter.doctor_id {
            query_parts.push(format!("doctor_id=eq.{}", doctor_id));
        }
        if let Some(status) = filter.status {
            query_parts.push(format!("status=eq.{}", status));
        }

        let path = format!("/rest/v1/appointments?{}", query_parts.join("&"));
        self.supabase.select(&path).await.map_err(map_error)
    }
}

#[async_trait]
impl EventOutbox for SupabaseAppointmentStore {
    async fn pending(&self, limit: usize) -> Result<Vec<AppointmentEvent>, AppointmentError> {
        let path = format!(
            "/rest/v1/appointment_events?delivered_at=is.null&order=occurred_at.asc&limit={}",
            limit
        );
        self.supabase.select(&path).await.map_err(map_error)
    }

    async fn acknowledge(&self, event_id: Uuid) -> Result<(), AppointmentError> {
        let path = format!("/rest/v1/appointment_events?id=eq.{}", event_id);
        let _: Vec<serde_json::Value> = self
            .supabase
            .write(Method::PATCH, &path, json!({ "delivered_at": Utc::now() }), &[])
            .await
            .map_err(map_error)?;
        Ok(())
    }
}
