use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use shared_ai::{CompletionClient, CompletionRequest};

use crate::models::{DoctorError, SpecialtyRecommendation};
use crate::services::store::DoctorStore;

const RECOMMENDER_PROMPT: &str = "You are a medical triage assistant. Given a patient's description of \
their symptoms, answer with the single most appropriate medical specialty to consult, \
chosen from the list provided. Reply with the specialty name only, no punctuation or explanation.";

/// Suggests which specialty a patient should book from a free-text symptom description.
pub struct SpecialtyRecommender {
    ai: Arc<dyn CompletionClient>,
    store: Arc<dyn DoctorStore>,
}

impl SpecialtyRecommender {
    pub fn new(ai: Arc<dyn CompletionClient>, store: Arc<dyn DoctorStore>) -> Self {
        Self { ai, store }
    }

    #[instrument(skip(self, symptoms))]
    pub async fn recommend(&self, symptoms: &str) -> Result<SpecialtyRecommendation, DoctorError> {
        let symptoms = symptoms.trim();
        if symptoms.is_empty() {
            return Ok(SpecialtyRecommendation::AllSpecialties);
        }

        let specialties = self.known_specialties().await?;
        if specialties.is_empty() {
            debug!("No doctors listed, skipping recommendation");
            return Ok(SpecialtyRecommendation::AllSpecialties);
        }

        let request = CompletionRequest::new(
            RECOMMENDER_PROMPT,
            format!(
                "Available specialties: {}\n\nSymptoms: {}",
                specialties.join(", "),
                symptoms
            ),
        )
        .max_tokens(20);

        let label = self
            .ai
            .complete(&request)
            .await
            .map_err(|e| DoctorError::Recommendation(e.to_string()))?;

        let recommendation = match_specialty(&label, &specialties);
        match &recommendation {
            SpecialtyRecommendation::Specialty(s) => info!("Recommended specialty: {}", s),
            SpecialtyRecommendation::AllSpecialties => {
                warn!("AI label '{}' matched no listed specialty", label)
            }
        }
        Ok(recommendation)
    }

    async fn known_specialties(&self) -> Result<Vec<String>, DoctorError> {
        let mut specialties: Vec<String> = self
            .store
            .list(None)
            .await?
            .into_iter()
            .map(|d| d.specialty)
            .collect();
        specialties.sort();
        specialties.dedup();
        Ok(specialties)
    }
}

/// Case-insensitive match of the AI label against the known specialty names.
pub fn match_specialty(label: &str, specialties: &[String]) -> SpecialtyRecommendation {
    let label = label
        .trim()
        .trim_matches(|c: char| c.is_ascii_punctuation() || c.is_whitespace())
        .to_lowercase();

    specialties
        .iter()
        .find(|s| s.to_lowercase() == label)
        .map(|s| SpecialtyRecommendation::Specialty(s.clone()))
        .unwrap_or(SpecialtyRecommendation::AllSpecialties)
}
