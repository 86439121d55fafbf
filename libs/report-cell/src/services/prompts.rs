use chrono::NaiveDate;

use shared_ai::CompletionRequest;

use crate::models::PatientContext;

pub const SUMMARY_SYSTEM_PROMPT: &str =
    "You are an AI medical scribe that writes concise visit summaries in SOAP format.";

pub const PRESCRIPTION_SYSTEM_PROMPT: &str = "You are an AI medical assistant suggesting possible \
prescription options. Every suggestion is advisory: state clearly that the treating doctor must \
review and approve any medication before it is given.";

const SUMMARY_MAX_TOKENS: u32 = 1000;
const PRESCRIPTION_MAX_TOKENS: u32 = 500;

fn listed(items: &[String]) -> String {
    if items.is_empty() {
        "None reported".to_string()
    } else {
        items.join(", ")
    }
}

fn patient_block(context: &PatientContext) -> String {
    format!(
        "Patient Information:\n- Name: {}\n- Known Conditions: {}\n- Current Medications: {}\n- Allergies: {}",
        context.full_name(),
        listed(&context.conditions),
        listed(&context.medications),
        listed(&context.allergies)
    )
}

/// Step 2: transcription and notes into a SOAP summary.
pub fn summary_request(
    context: &PatientContext,
    doctor: &str,
    notes: Option<&str>,
    transcription: &str,
) -> CompletionRequest {
    let notes = notes.map(str::trim).filter(|n| !n.is_empty()).unwrap_or("None");
    let user = format!(
        "Using the consultation transcription and notes below, write a professional visit summary \
in SOAP format (Subjective, Objective, Assessment, Plan). Keep only medically relevant information.\n\n\
{}\n\nAttending: {}\n\nDoctor Notes: {}\n\nConsultation Transcription:\n{}",
        patient_block(context),
        doctor,
        notes,
        transcription.trim()
    );

    CompletionRequest::new(SUMMARY_SYSTEM_PROMPT, user).max_tokens(SUMMARY_MAX_TOKENS)
}

/// Step 3: the summary into advisory prescription suggestions.
pub fn prescription_request(context: &PatientContext, visit_summary: &str) -> CompletionRequest {
    let user = format!(
        "From the visit summary and patient information below, suggest prescription options if any \
are appropriate, or state plainly that no medication is needed. Give dosage, frequency and duration \
for each suggestion and avoid anything the patient is allergic to.\n\n{}\n\nVisit Summary:\n{}\n\n\
Answer in a structured format.",
        patient_block(context),
        visit_summary
    );

    CompletionRequest::new(PRESCRIPTION_SYSTEM_PROMPT, user).max_tokens(PRESCRIPTION_MAX_TOKENS)
}

pub fn report_title(patient_name: &str, date: NaiveDate) -> String {
    format!("Visit Report: {} - {}", patient_name, date.format("%Y-%m-%d"))
}

/// Markdown body stored as the report content.
pub fn report_content(date: NaiveDate, patient_name: &str, doctor: &str, visit_summary: &str) -> String {
    format!(
        "# Medical Visit Report\n\n\
**Date:** {}\n\
**Patient:** {}\n\
**Doctor:** {}\n\n\
## Summary\n{}\n\n\
## Notes\n\
Generated from the doctor-patient consultation. The treating provider should review it for accuracy.\n",
        date.format("%Y-%m-%d"),
        patient_name,
        doctor,
        visit_summary.trim()
    )
}
