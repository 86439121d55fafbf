use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Method;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::RwLock;
use tracing::{debug, warn};
use uuid::Uuid;

use shared_database::{SupabaseClient, SupabaseError};

use crate::models::{Availability, Doctor, DoctorError};

#[async_trait]
pub trait DoctorStore: Send + Sync {
    async fn list(&self, specialty: Option<&str>) -> Result<Vec<Doctor>, DoctorError>;

    async fn get(&self, doctor_id: Uuid) -> Result<Option<Doctor>, DoctorError>;

    /// Replaces the whole availability document. Returns `false` for an unknown doctor.
    async fn save_availability(&self, doctor_id: Uuid, availability: &Availability) -> Result<bool, DoctorError>;
}

#[derive(Default)]
pub struct InMemoryDoctorStore {
    doctors: RwLock<HashMap<Uuid, Doctor>>,
}

impl InMemoryDoctorStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_doctors(doctors: impl IntoIterator<Item = Doctor>) -> Self {
        Self {
            doctors: RwLock::new(doctors.into_iter().map(|d| (d.id, d)).collect()),
        }
    }

    pub async fn insert(&self, doctor: Doctor) {
        self.doctors.write().await.insert(doctor.id, doctor);
    }
}

#[async_trait]
impl DoctorStore for InMemoryDoctorStore {
    async fn list(&self, specialty: Option<&str>) -> Result<Vec<Doctor>, DoctorError> {
        let doctors = self.doctors.read().await;
        let mut matching: Vec<Doctor> = doctors
            .values()
            .filter(|d| specialty.map_or(true, |s| d.specialty == s))
            .cloned()
            .collect();
        matching.sort_by(|a, b| a.full_name().cmp(&b.full_name()));
        Ok(matching)
    }

    async fn get(&self, doctor_id: Uuid) -> Result<Option<Doctor>, DoctorError> {
        Ok(self.doctors.read().await.get(&doctor_id).cloned())
    }

    async fn save_availability(&self, doctor_id: Uuid, availability: &Availability) -> Result<bool, DoctorError> {
        let mut doctors = self.doctors.write().await;
        match doctors.get_mut(&doctor_id) {
            Some(doctor) => {
                doctor.availability = Some(availability.clone());
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

/// Reads from the `doctor_directory` view (doctors joined with profile names)
/// and writes availability to `doctors`.
pub struct SupabaseDoctorStore {
    supabase: Arc<SupabaseClient>,
}

impl SupabaseDoctorStore {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }
}

const DIRECTORY_COLUMNS: &str = "id,first_name,last_name,specialty,qualification,experience_years,availability";

fn store_error(err: SupabaseError) -> DoctorError {
    DoctorError::Store(err.to_string())
}

/// Directory row with the schedule left undecoded, so one bad document
/// only flags its own doctor.
#[derive(Debug, Deserialize)]
struct DirectoryRow {
    id: Uuid,
    #[serde(default)]
    first_name: Option<String>,
    #[serde(default)]
    last_name: Option<String>,
    specialty: String,
    #[serde(default)]
    qualification: Option<String>,
    #[serde(default)]
    experience_years: Option<i32>,
    #[serde(default)]
    availability: Option<Value>,
}

impl From<DirectoryRow> for Doctor {
    fn from(row: DirectoryRow) -> Self {
        let (availability, availability_error) = match row.availability {
            None | Some(Value::Null) => (None, None),
            Some(raw) => match serde_json::from_value::<Availability>(raw) {
                Ok(parsed) => (Some(parsed), None),
                Err(e) => {
                    warn!("Doctor {} has an unreadable schedule: {}", row.id, e);
                    (None, Some(e.to_string()))
                }
            },
        };

        Doctor {
            id: row.id,
            first_name: row.first_name,
            last_name: row.last_name,
            specialty: row.specialty,
            qualification: row.qualification,
            experience_years: row.experience_years,
            availability,
            availability_error,
        }
    }
}

#[async_trait]
impl DoctorStore for SupabaseDoctorStore {
    async fn list(&self, specialty: Option<&str>) -> Result<Vec<Doctor>, DoctorError> {
        let mut path = format!("/rest/v1/doctor_directory?select={}&order=last_name.asc", DIRECTORY_COLUMNS);
        if let Some(specialty) = specialty {
            path.push_str(&format!("&specialty=eq.{}", urlencoding::encode(specialty)));
        }

        debug!("Listing doctors (specialty filter: {:?})", specialty);
        let rows: Vec<DirectoryRow> = self.supabase.select(&path).await.map_err(store_error)?;
        Ok(rows.into_iter().map(Doctor::from).collect())
    }

    async fn get(&self, doctor_id: Uuid) -> Result<Option<Doctor>, DoctorError> {
        let path = format!(
            "/rest/v1/doctor_directory?select={}&id=eq.{}",
            DIRECTORY_COLUMNS, doctor_id
        );
        let row: Option<DirectoryRow> = self.supabase.select_one(&path).await.map_err(store_error)?;
        Ok(row.map(Doctor::from))
    }

    async fn save_availability(&self, doctor_id: Uuid, availability: &Availability) -> Result<bool, DoctorError> {
        let path = format!("/rest/v1/doctors?id=eq.{}", doctor_id);
        let body = json!({ "availability": availability });

        let updated: Vec<serde_json::Value> = self
            .supabase
            .write(Method::PATCH, &path, body, &[])
            .await
            .map_err(store_error)?;

        Ok(!updated.is_empty())
    }
}
