use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Method;
use serde_json::json;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use shared_database::{SupabaseClient, SupabaseError};

use crate::models::{TimelineError, TimelineEvent};

#[async_trait]
pub trait TimelineStore: Send + Sync {
    /// Appends an event. When the event carries a source key and an event with the
    /// same (user, source) already exists, nothing is written and `false` is returned.
    async fn append(&self, event: &TimelineEvent) -> Result<bool, TimelineError>;

    /// Newest first.
    async fn list(&self, user_id: Uuid) -> Result<Vec<TimelineEvent>, TimelineError>;
}

#[derive(Default)]
pub struct InMemoryTimelineStore {
    events: RwLock<Vec<TimelineEvent>>,
}

impl InMemoryTimelineStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn same_source(a: &TimelineEvent, b: &TimelineEvent) -> bool {
    if a.user_id != b.user_id {
        return false;
    }
    let appointment_dup = a.source_appointment_id.is_some() && a.source_appointment_id == b.source_appointment_id;
    let report_dup = a.source_report_id.is_some() && a.source_report_id == b.source_report_id;
    appointment_dup || report_dup
}

#[async_trait]
impl TimelineStore for InMemoryTimelineStore {
    async fn append(&self, event: &TimelineEvent) -> Result<bool, TimelineError> {
        let mut events = self.events.write().await;
        if events.iter().any(|existing| same_source(event, existing)) {
            return Ok(false);
        }
        events.push(event.clone());
        Ok(true)
    }

    async fn list(&self, user_id: Uuid) -> Result<Vec<TimelineEvent>, TimelineError> {
        let mut rows: Vec<TimelineEvent> = self
            .events
            .read()
            .await
            .iter()
            .filter(|e| e.user_id == user_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.date.cmp(&a.date).then(b.created_at.cmp(&a.created_at)));
        Ok(rows)
    }
}

/// `medical_events` carries unique indexes on `(user_id, source_appointment_id)`
/// and `(user_id, source_report_id)`; duplicates are dropped server-side.
pub struct SupabaseTimelineStore {
    supabase: Arc<SupabaseClient>,
}

impl SupabaseTimelineStore {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }
}

const IGNORE_DUPLICATES: &[&str] = &["resolution=ignore-duplicates"];
const NO_PREFERENCES: &[&str] = &[];

fn store_error(err: SupabaseError) -> TimelineError {
    TimelineError::Store(err.to_string())
}

#[async_trait]
impl TimelineStore for SupabaseTimelineStore {
    async fn append(&self, event: &TimelineEvent) -> Result<bool, TimelineError> {
        let conflict_target = if event.source_appointment_id.is_some() {
            Some("user_id,source_appointment_id")
        } else if event.source_report_id.is_some() {
            Some("user_id,source_report_id")
        } else {
            None
        };

        let (path, prefer) = match conflict_target {
            Some(columns) => (
                format!("/rest/v1/medical_events?on_conflict={}", columns),
                IGNORE_DUPLICATES,
            ),
            None => ("/rest/v1/medical_events".to_string(), NO_PREFERENCES),
        };

        debug!("Appending {} event for user {}", event.kind, event.user_id);
        let inserted: Vec<serde_json::Value> = self
            .supabase
            .write(Method::POST, &path, json!(event), prefer)
            .await
            .map_err(store_error)?;

        Ok(!inserted.is_empty())
    }

    async fn list(&self, user_id: Uuid) -> Result<Vec<TimelineEvent>, TimelineError> {
        let path = format!(
            "/rest/v1/medical_events?user_id=eq.{}&order=date.desc,created_at.desc",
            user_id
        );
        self.supabase.select(&path).await.map_err(store_error)
    }
}
