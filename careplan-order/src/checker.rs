use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

use careplan_core::{EntityStore, StoreResult};

use crate::submission::OrderSubmission;

/// Trailing window for the duplicate-order rule.
pub const RECENT_ORDER_WINDOW_HOURS: i64 = 24;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FindingKind {
    DuplicatePatient,
    DuplicatePatientNameMismatch,
    DuplicateProviderNpiNameMismatch,
    DuplicateProviderNpiMismatch,
    PotentialDuplicateOrder,
}

/// A single conflict between a submission and stored records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    #[serde(rename = "type")]
    pub kind: FindingKind,
    pub severity: Severity,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub existing_record: Option<serde_json::Value>,
}

impl Finding {
    fn warning(kind: FindingKind, message: String, existing_record: serde_json::Value) -> Self {
        Self {
            kind,
            severity: Severity::Warning,
            message,
            existing_record: Some(existing_record),
        }
    }

    fn error(kind: FindingKind, message: String, existing_record: serde_json::Value) -> Self {
        Self {
            kind,
            severity: Severity::Error,
            message,
            existing_record: Some(existing_record),
        }
    }

    pub fn is_blocking(&self) -> bool {
        self.severity == Severity::Error
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub warnings: Vec<Finding>,
    pub errors: Vec<Finding>,
    pub message: String,
}

impl ValidationReport {
    pub fn from_findings(findings: Vec<Finding>) -> Self {
        let (errors, warnings): (Vec<_>, Vec<_>) =
            findings.into_iter().partition(Finding::is_blocking);

        let message = if !errors.is_empty() {
            format!(
                "Validation failed: {} error(s) found that must be resolved",
                errors.len()
            )
        } else if !warnings.is_empty() {
            format!(
                "Validation passed with {} warning(s) requiring confirmation",
                warnings.len()
            )
        } else {
            "Validation passed".to_string()
        };

        Self {
            valid: errors.is_empty(),
            warnings,
            errors,
            message,
        }
    }

    pub fn has_findings(&self) -> bool {
        !self.warnings.is_empty() || !self.errors.is_empty()
    }
}

/// Cross-entity integrity rules run against the store before anything is written.
#[derive(Clone)]
pub struct DuplicateChecker {
    store: Arc<dyn EntityStore>,
}

impl DuplicateChecker {
    pub fn new(store: Arc<dyn EntityStore>) -> Self {
        Self { store }
    }

    pub async fn check_duplicate_patient(
        &self,
        mrn: &str,
        first_name: &str,
        last_name: &str,
    ) -> StoreResult<Option<Finding>> {
        let Some(existing) = self.store.get_patient_by_mrn(mrn).await? else {
            return Ok(None);
        };

        let finding = if existing.name_matches(first_name, last_name) {
            Finding::warning(
                FindingKind::DuplicatePatient,
                format!("Patient MRN {} already exists in system", mrn),
                existing.snapshot(),
            )
        } else {
            Finding::error(
                FindingKind::DuplicatePatientNameMismatch,
                format!(
                    "Patient MRN {} already exists with different name: {} {}",
                    mrn, existing.first_name, existing.last_name
                ),
                existing.snapshot(),
            )
        };
        Ok(Some(finding))
    }

    /// Both lookups always run; a store that already violates the NPI/name
    /// pairing can produce two errors.
    pub async fn check_duplicate_provider(
        &self,
        provider_name: &str,
        npi: &str,
    ) -> StoreResult<Vec<Finding>> {
        let mut findings = Vec::new();

        if let Some(by_npi) = self.store.get_provider_by_npi(npi).await? {
            if !by_npi.name_matches(provider_name) {
                findings.push(Finding::error(
                    FindingKind::DuplicateProviderNpiNameMismatch,
                    format!(
                        "NPI {} already exists with provider name: '{}'. You are submitting a different name: '{}'. \
NPI has a one-to-one relationship with provider - this is a critical data integrity issue for pharma reporting.",
                        npi, by_npi.name, provider_name
                    ),
                    by_npi.snapshot(),
                ));
            }
        }

        if let Some(by_name) = self.store.get_provider_by_name_ci(provider_name).await? {
            if by_name.npi != npi {
                findings.push(Finding::error(
                    FindingKind::DuplicateProviderNpiMismatch,
                    format!(
                        "Provider '{}' already exists with NPI: {}. You are submitting a different NPI: {}. \
Each provider must have exactly one NPI - this is a critical data integrity issue for pharma reporting.",
                        provider_name, by_name.npi, npi
                    ),
                    by_name.snapshot(),
                ));
            }
        }

        Ok(findings)
    }

    pub async fn check_duplicate_order(
        &self,
        mrn: &str,
        medication_name: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<Finding>> {
        let Some(patient) = self.store.get_patient_by_mrn(mrn).await? else {
            return Ok(None);
        };

        let since = now - Duration::hours(RECENT_ORDER_WINDOW_HOURS);
        let recent = self
            .store
            .find_recent_orders(patient.id, medication_name, since)
            .await?;
        if recent.is_empty() {
            return Ok(None);
        }

        let ids: Vec<String> = recent.iter().map(|o| o.id.to_string()).collect();
        let orders: Vec<serde_json::Value> = recent
            .iter()
            .map(|o| {
                json!({
                    "order_id": o.id,
                    "medication_name": o.medication_name,
                    "primary_diagnosis": o.primary_diagnosis,
                    "created_at": o.created_at.to_rfc3339(),
                })
            })
            .collect();

        Ok(Some(Finding::warning(
            FindingKind::PotentialDuplicateOrder,
            format!(
                "Similar order found for this patient and medication within the last 24 hours. Order ID(s): {}",
                ids.join(", ")
            ),
            json!({ "orders": orders, "count": recent.len() }),
        )))
    }

    pub async fn validate(&self, submission: &OrderSubmission) -> StoreResult<ValidationReport> {
        self.validate_at(submission, Utc::now()).await
    }

    /// Runs every rule in order and classifies the findings.
    pub async fn validate_at(
        &self,
        submission: &OrderSubmission,
        now: DateTime<Utc>,
    ) -> StoreResult<ValidationReport> {
        let mut findings = Vec::new();

        if let Some(f) = self
            .check_duplicate_patient(
                &submission.patient_mrn,
                &submission.patient_first_name,
                &submission.patient_last_name,
            )
            .await?
        {
            findings.push(f);
        }

        findings.extend(
            self.check_duplicate_provider(&submission.provider_name, &submission.provider_npi)
                .await?,
        );

        if let Some(f) = self
            .check_duplicate_order(&submission.patient_mrn, &submission.medication_name, now)
            .await?
        {
            findings.push(f);
        }

        let report = ValidationReport::from_findings(findings);
        tracing::info!(
            mrn = %submission.patient_mrn,
            npi = %submission.provider_npi,
            warnings = report.warnings.len(),
            errors = report.errors.len(),
            "Duplicate check complete"
        );
        Ok(report)
    }
}
