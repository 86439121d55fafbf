use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Method;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use shared_database::{SupabaseClient, SupabaseError};
use timeline_cell::models::TimelineError;
use timeline_cell::services::ReportLookup;

use crate::models::{Report, ReportError};

#[async_trait]
pub trait ReportStore: Send + Sync {
    async fn insert(&self, report: &Report) -> Result<Report, ReportError>;

    async fn get(&self, report_id: Uuid) -> Result<Option<Report>, ReportError>;

    /// Most recent report written for the appointment.
    async fn latest_for_appointment(&self, appointment_id: Uuid) -> Result<Option<Report>, ReportError>;

    /// Newest first.
    async fn list_for_patient(&self, patient_id: Uuid) -> Result<Vec<Report>, ReportError>;

    /// Newest first.
    async fn list_for_doctor(&self, doctor_id: Uuid) -> Result<Vec<Report>, ReportError>;

    async fn set_prescription(&self, report_id: Uuid, prescription: &str) -> Result<Option<Report>, ReportError>;

    async fn mark_sent(&self, report_id: Uuid) -> Result<Option<Report>, ReportError>;
}

#[derive(Default)]
pub struct InMemoryReportStore {
    reports: RwLock<Vec<Report>>,
}

impl InMemoryReportStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn matching(&self, keep: impl Fn(&Report) -> bool) -> Vec<Report> {
        let mut rows: Vec<Report> = self.reports.read().await.iter().filter(|r| keep(r)).cloned().collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        rows
    }

    async fn update(&self, report_id: Uuid, apply: impl FnOnce(&mut Report)) -> Option<Report> {
        let mut reports = self.reports.write().await;
        let report = reports.iter_mut().find(|r| r.id == report_id)?;
        apply(report);
        report.updated_at = Utc::now();
        Some(report.clone())
    }
}

#[async_trait]
impl ReportStore for InMemoryReportStore {
    async fn insert(&self, report: &Report) -> Result<Report, ReportError> {
        self.reports.write().await.push(report.clone());
        Ok(report.clone())
    }

    async fn get(&self, report_id: Uuid) -> Result<Option<Report>, ReportError> {
        Ok(self.reports.read().await.iter().find(|r| r.id == report_id).cloned())
    }

    async fn latest_for_appointment(&self, appointment_id: Uuid) -> Result<Option<Report>, ReportError> {
        Ok(self
            .matching(|r| r.appointment_id == Some(appointment_id))
            .await
            .into_iter()
            .next())
    }

    async fn list_for_patient(&self, patient_id: Uuid) -> Result<Vec<Report>, ReportError> {
        Ok(self.matching(|r| r.patient_id == patient_id).await)
    }

    async fn list_for_doctor(&self, doctor_id: Uuid) -> Result<Vec<Report>, ReportError> {
        Ok(self.matching(|r| r.doctor_id == doctor_id).await)
    }

    async fn set_prescription(&self, report_id: Uuid, prescription: &str) -> Result<Option<Report>, ReportError> {
        Ok(self
            .update(report_id, |r| r.prescription = Some(prescription.to_string()))
            .await)
    }

    async fn mark_sent(&self, report_id: Uuid) -> Result<Option<Report>, ReportError> {
        Ok(self.update(report_id, |r| r.is_sent = true).await)
    }
}

#[async_trait]
impl ReportLookup for InMemoryReportStore {
    async fn report_for_appointment(&self, appointment_id: Uuid) -> Result<Option<Uuid>, TimelineError> {
        let latest = self
            .latest_for_appointment(appointment_id)
            .await
            .map_err(|e| TimelineError::ReportLookup(e.to_string()))?;
        Ok(latest.map(|r| r.id))
    }
}

pub struct SupabaseReportStore {
    supabase: Arc<SupabaseClient>,
}

impl SupabaseReportStore {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    async fn patch(&self, report_id: Uuid, body: serde_json::Value) -> Result<Option<Report>, ReportError> {
        let path = format!("/rest/v1/reports?id=eq.{}", report_id);
        let mut rows: Vec<Report> = self
            .supabase
            .write(Method::PATCH, &path, body, &[])
            .await
            .map_err(store_error)?;
        Ok(rows.pop())
    }
}

fn store_error(err: SupabaseError) -> ReportError {
    ReportError::Store(err.to_string())
}

#[derive(Deserialize)]
struct ReportIdRow {
    id: Uuid,
}

#[async_trait]
impl ReportStore for SupabaseReportStore {
    async fn insert(&self, report: &Report) -> Result<Report, ReportError> {
        debug!("Persisting report {} for patient {}", report.id, report.patient_id);
        let mut rows: Vec<Report> = self
            .supabase
            .write(Method::POST, "/rest/v1/reports", json!(report), &[])
            .await
            .map_err(store_error)?;
        rows.pop()
            .ok_or_else(|| ReportError::Store("Insert returned no report".to_string()))
    }

    async fn get(&self, report_id: Uuid) -> Result<Option<Report>, ReportError> {
        self.supabase
            .select_one(&format!("/rest/v1/reports?id=eq.{}", report_id))
            .await
            .map_err(store_error)
    }

    async fn latest_for_appointment(&self, appointment_id: Uuid) -> Result<Option<Report>, ReportError> {
        self.supabase
            .select_one(&format!(
                "/rest/v1/reports?appointment_id=eq.{}&order=created_at.desc&limit=1",
                appointment_id
            ))
            .await
            .map_err(store_error)
    }

    async fn list_for_patient(&self, patient_id: Uuid) -> Result<Vec<Report>, ReportError> {
        self.supabase
            .select(&format!("/rest/v1/reports?patient_id=eq.{}&order=created_at.desc", patient_id))
            .await
            .map_err(store_error)
    }

    async fn list_for_doctor(&self, doctor_id: Uuid) -> Result<Vec<Report>, ReportError> {
        self.supabase
            .select(&format!("/rest/v1/reports?doctor_id=eq.{}&order=created_at.desc", doctor_id))
            .await
            .map_err(store_error)
    }

    async fn set_prescription(&self, report_id: Uuid, prescription: &str) -> Result<Option<Report>, ReportError> {
        self.patch(
            report_id,
            json!({ "prescription": prescription, "updated_at": Utc::now() }),
        )
        .await
    }

    async fn mark_sent(&self, report_id: Uuid) -> Result<Option<Report>, ReportError> {
        self.patch(report_id, json!({ "is_sent": true, "updated_at": Utc::now() })).await
    }
}

#[async_trait]
impl ReportLookup for SupabaseReportStore {
    async fn report_for_appointment(&self, appointment_id: Uuid) -> Result<Option<Uuid>, TimelineError> {
        let row: Option<ReportIdRow> = self
            .supabase
            .select_one(&format!(
                "/rest/v1/reports?appointment_id=eq.{}&select=id&order=created_at.desc&limit=1",
                appointment_id
            ))
            .await
            .map_err(|e| TimelineError::ReportLookup(e.to_string()))?;
        Ok(row.map(|r| r.id))
    }
}
