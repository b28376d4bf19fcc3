use async_trait::async_trait;
use std::fmt::{self, Write};

use careplan_shared::Masked;

/// Structured clinical input handed to the drafting service.
#[derive(Clone)]
pub struct ClinicalInput {
    pub patient_first_name: Masked<String>,
    pub patient_last_name: Masked<String>,
    pub patient_mrn: String,
    pub primary_diagnosis: String,
    pub additional_diagnoses: Vec<String>,
    pub medication_name: String,
    pub medication_history: Vec<String>,
    pub patient_records: Masked<String>,
}

impl fmt::Debug for ClinicalInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClinicalInput")
            .field("patient_mrn", &self.patient_mrn)
            .field("primary_diagnosis", &self.primary_diagnosis)
            .field("medication_name", &self.medication_name)
            .field("additional_diagnoses", &self.additional_diagnoses.len())
            .field("medication_history", &self.medication_history.len())
            .finish_non_exhaustive()
    }
}

/// Drafting errors. Callers treat every variant as the same failure class.
#[derive(Debug, thiserror::Error)]
pub enum DraftError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("http error: {0}")]
    Http(String),
    #[error("response error: {0}")]
    Response(String),
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Text-generation service that turns clinical input into a care-plan document.
#[async_trait]
pub trait CarePlanDrafter: Send + Sync {
    async fn draft(&self, input: &ClinicalInput) -> Result<String, DraftError>;
}

pub const SYSTEM_PROMPT: &str = "You are an expert clinical pharmacist with 15+ years of experience in \
specialty pharmacy, Medicare Part D documentation and pharmaceutical reporting.
You write OFFICIAL MEDICAL DOCUMENTATION, not conversational replies.
Rules:
- Output ONLY the care plan document.
- Start with the patient demographics header.
- Include all 6 required sections.
- End with the provider signature block.
- Never add closing offers such as \"If you want...\", \"I will prepare...\" or \"Let me know...\".
- Never address the reader directly.
The document must be final and ready for regulatory submission and clinical use.";

fn join_or_none(items: &[String]) -> String {
    if items.is_empty() {
        "None".to_string()
    } else {
        items.join(", ")
    }
}

/// Builds the user prompt for a care-plan request.
pub fn build_prompt(input: &ClinicalInput) -> String {
    let mut prompt = String::new();
    prompt.push_str(
        "You are an expert clinical pharmacist creating a comprehensive care plan for specialty pharmacy use.\n\n",
    );
    prompt.push_str("**PATIENT INFORMATION:**\n");
    let _ = writeln!(
        prompt,
        "Name: {} {}",
        input.patient_first_name.expose(),
        input.patient_last_name.expose()
    );
    let _ = writeln!(prompt, "MRN: {}", input.patient_mrn);
    let _ = writeln!(prompt, "Primary Diagnosis: {}", input.primary_diagnosis);
    let _ = writeln!(
        prompt,
        "Additional Diagnoses: {}",
        join_or_none(&input.additional_diagnoses)
    );
    let _ = writeln!(prompt, "Current Medication: {}", input.medication_name);
    let _ = writeln!(
        prompt,
        "Medication History: {}",
        join_or_none(&input.medication_history)
    );
    prompt.push_str("\n**CLINICAL RECORDS:**\n");
    prompt.push_str(input.patient_records.expose());
    prompt.push_str("\n\n");
    prompt.push_str(
        "**TASK:** Generate a comprehensive pharmacist care plan that meets Medicare documentation \
requirements and pharma reporting standards.\n\n",
    );
    prompt.push_str(
        "**START WITH A PATIENT HEADER:**\n\
[First Name] [Last Name] — Comprehensive Pharmacist Care Plan (Specialty Pharmacy)\n\
MRN, DOB, sex and weight (from the records), primary diagnosis with ICD-10 code, additional \
diagnoses with ICD-10 codes, current specialty medication, date of plan, prepared by.\n\n",
    );
    prompt.push_str("**THEN THESE NUMBERED SECTIONS:**\n");
    prompt.push_str(
        "1) PROBLEM LIST / Drug Therapy Problems: current therapy-related problems, \
drug-drug interactions and contraindications, priority safety concerns.\n",
    );
    prompt.push_str(
        "2) SMART GOALS: clinical, safety (numeric thresholds) and quality-of-life goals.\n",
    );
    prompt.push_str(
        "3) PHARMACIST INTERVENTIONS / PLAN: therapy verification and optimization, monitoring, \
patient education, coordination with providers.\n",
    );
    prompt.push_str(
        "4) MONITORING PLAN & LAB SCHEDULE: baseline, during treatment, lab timing, escalation \
thresholds, follow-up, contingency plans.\n",
    );
    prompt.push_str(
        "5) DOCUMENTATION / REPORTING: lot numbers, adverse event reporting, provider \
communication, record keeping.\n",
    );
    prompt.push_str(
        "6) SUMMARY: clinical impression, expected course, next steps.\n\n",
    );
    prompt.push_str(
        "**END THE DOCUMENT WITH:**\n\
Provider signature:\n\
[Clinical Pharmacist — Name, Credentials]\n\
Date: [current date in YYYY-MM-DD format]\n\n",
    );
    prompt.push_str(
        "**DOCUMENT ENDING RULES:**\n\
- The document MUST end with the provider signature block.\n\
- One optional \"Addendum: Quick-reference escalation thresholds\" section may follow the signature.\n\
- Do NOT add conversational text after the signature and do NOT offer additional materials.\n",
    );
    prompt
}
