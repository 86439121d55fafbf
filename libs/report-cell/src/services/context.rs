use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use shared_database::{SupabaseClient, SupabaseError};

use crate::models::{Contact, PatientContext, ReportError};

/// Read-only patient data used by the report pipeline.
#[async_trait]
pub trait PatientContextSource: Send + Sync {
    /// Active conditions, active medications and allergies. Unknown patients get an empty context.
    async fn context(&self, patient_id: Uuid) -> Result<PatientContext, ReportError>;

    async fn contact(&self, user_id: Uuid) -> Result<Option<Contact>, ReportError>;
}

#[derive(Default)]
pub struct InMemoryPatientContext {
    contexts: RwLock<HashMap<Uuid, PatientContext>>,
    contacts: RwLock<HashMap<Uuid, Contact>>,
}

impl InMemoryPatientContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_context(&self, patient_id: Uuid, context: PatientContext) {
        self.contexts.write().await.insert(patient_id, context);
    }

    pub async fn insert_contact(&self, contact: Contact) {
        self.contacts.write().await.insert(contact.id, contact);
    }
}

#[async_trait]
impl PatientContextSource for InMemoryPatientContext {
    async fn context(&self, patient_id: Uuid) -> Result<PatientContext, ReportError> {
        Ok(self.contexts.read().await.get(&patient_id).cloned().unwrap_or_default())
    }

    async fn contact(&self, user_id: Uuid) -> Result<Option<Contact>, ReportError> {
        Ok(self.contacts.read().await.get(&user_id).cloned())
    }
}

#[derive(Deserialize)]
struct NamedRow {
    name: String,
}

#[derive(Deserialize)]
struct ProfileRow {
    first_name: Option<String>,
    last_name: Option<String>,
}

pub struct SupabasePatientContext {
    supabase: Arc<SupabaseClient>,
}

impl SupabasePatientContext {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    async fn names(&self, path: String) -> Result<Vec<String>, SupabaseError> {
        let rows: Vec<NamedRow> = self.supabase.select(&path).await?;
        Ok(rows.into_iter().map(|r| r.name).collect())
    }
}

fn context_error(err: SupabaseError) -> ReportError {
    ReportError::Context(err.to_string())
}

#[async_trait]
impl PatientContextSource for SupabasePatientContext {
    async fn context(&self, patient_id: Uuid) -> Result<PatientContext, ReportError> {
        debug!("Gathering report context for patient {}", patient_id);

        let profile_path = format!("/rest/v1/profiles?id=eq.{}&select=first_name,last_name", patient_id);
        let profile = self.supabase.select_one::<ProfileRow>(&profile_path);
        let conditions = self.names(format!(
            "/rest/v1/medical_conditions?user_id=eq.{}&is_active=eq.true&select=name",
            patient_id
        ));
        let medications = self.names(format!(
            "/rest/v1/medications?user_id=eq.{}&is_active=eq.true&select=name",
            patient_id
        ));
        let allergies = self.names(format!("/rest/v1/allergies?user_id=eq.{}&select=name", patient_id));

        let (profile, conditions, medications, allergies) =
            tokio::try_join!(profile, conditions, medications, allergies).map_err(context_error)?;

        let (first_name, last_name) = profile.map(|p| (p.first_name, p.last_name)).unwrap_or_default();

        Ok(PatientContext {
            first_name,
            last_name,
            conditions,
            medications,
            allergies,
        })
    }

    async fn contact(&self, user_id: Uuid) -> Result<Option<Contact>, ReportError> {
        self.supabase
            .select_one(&format!(
                "/rest/v1/profiles?id=eq.{}&select=id,first_name,last_name,email,phone",
                user_id
            ))
            .await
            .map_err(context_error)
    }
}
