use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Patient, Provider};

/// A specialty-medication order. Immutable once recorded, except for the
/// care-plan fields which are filled in once after drafting succeeds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Order {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub provider_id: Uuid,
    pub primary_diagnosis: String,
    pub additional_diagnoses: Vec<String>,
    pub medication_name: String,
    pub medication_history: Vec<String>,
    pub patient_records: String,
    pub care_plan: Option<String>,
    pub care_plan_generated_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Order {
    pub fn new(
        patient_id: Uuid,
        provider_id: Uuid,
        primary_diagnosis: String,
        medication_name: String,
        patient_records: String,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            patient_id,
            provider_id,
            primary_diagnosis,
            additional_diagnoses: Vec::new(),
            medication_name,
            medication_history: Vec::new(),
            patient_records,
            care_plan: None,
            care_plan_generated_at: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_additional_diagnoses(mut self, diagnoses: Vec<String>) -> Self {
        self.additional_diagnoses = diagnoses;
        self
    }

    pub fn with_medication_history(mut self, history: Vec<String>) -> Self {
        self.medication_history = history;
        self
    }

    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    /// An empty string does not count as a generated plan.
    pub fn has_care_plan(&self) -> bool {
        self.care_plan.as_deref().is_some_and(|p| !p.is_empty())
    }

    pub fn care_plan_length(&self) -> usize {
        self.care_plan.as_deref().map(|p| p.chars().count()).unwrap_or(0)
    }

    /// True if the order carries `code` as primary or additional diagnosis.
    pub fn has_diagnosis(&self, code: &str) -> bool {
        self.primary_diagnosis == code || self.additional_diagnoses.iter().any(|d| d == code)
    }
}

/// Read model: an order joined with its patient and provider.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderDetails {
    pub order: Order,
    pub patient: Patient,
    pub provider: Provider,
}

impl std::fmt::Display for OrderDetails {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Order {} - {} - {}",
            self.order.id, self.patient, self.order.medication_name
        )
    }
}
