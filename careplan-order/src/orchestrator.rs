use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use careplan_core::{CarePlanDrafter, DraftError, EntityStore, StoreError};
use careplan_shared::{Masked, Order, Patient, Provider};

use crate::checker::{DuplicateChecker, ValidationReport};
use crate::cleanup::clean_care_plan;
use crate::submission::{FieldErrors, OrderSubmission};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CarePlanResult {
    pub care_plan: String,
    pub order_id: Uuid,
}

#[derive(Debug, Error)]
pub enum SubmissionError {
    #[error("Invalid submission: {0}")]
    Invalid(FieldErrors),
    #[error("{}", .0.message)]
    Rejected(ValidationReport),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("Failed to generate care plan: {source}")]
    Drafting {
        order_id: Uuid,
        #[source]
        source: DraftError,
    },
}

/// Drives a submission from shape validation through care-plan drafting.
///
/// Orders only survive if a care plan was drafted and attached; any failure
/// after the order row exists deletes it again.
pub struct OrderSubmissionOrchestrator {
    store: Arc<dyn EntityStore>,
    drafter: Arc<dyn CarePlanDrafter>,
    checker: DuplicateChecker,
}

impl OrderSubmissionOrchestrator {
    pub fn new(store: Arc<dyn EntityStore>, drafter: Arc<dyn CarePlanDrafter>) -> Self {
        let checker = DuplicateChecker::new(store.clone());
        Self {
            store,
            drafter,
            checker,
        }
    }

    pub fn checker(&self) -> &DuplicateChecker {
        &self.checker
    }

    /// Shape validation plus duplicate checks, without writing anything.
    pub async fn validate(
        &self,
        submission: OrderSubmission,
    ) -> Result<ValidationReport, SubmissionError> {
        let submission = submission
            .into_validated()
            .map_err(SubmissionError::Invalid)?;
        Ok(self.checker.validate(&submission).await?)
    }

    pub async fn submit(
        &self,
        submission: OrderSubmission,
    ) -> Result<CarePlanResult, SubmissionError> {
        let submission = submission.into_validated().map_err(|errors| {
            tracing::warn!(fields = %errors, "Submission failed shape validation");
            SubmissionError::Invalid(errors)
        })?;

        let report = self.checker.validate(&submission).await?;
        if !report.valid {
            tracing::warn!(
                mrn = %submission.patient_mrn,
                errors = report.errors.len(),
                "Submission rejected by duplicate check"
            );
            return Err(SubmissionError::Rejected(report));
        }

        let patient = self.upsert_patient(&submission).await?;
        let provider = self.upsert_provider(&submission).await?;

        let order = Order::new(
            patient.id,
            provider.id,
            submission.primary_diagnosis.clone(),
            submission.medication_name.clone(),
            submission.patient_records.clone(),
        )
        .with_additional_diagnoses(submission.additional_diagnoses.clone())
        .with_medication_history(submission.medication_history.clone());
        let order_id = self.store.create_order(&order).await?;
        tracing::info!(
            %order_id,
            mrn = %patient.mrn,
            medication = %order.medication_name,
            "Order created"
        );

        let input = submission.to_clinical_input();
        let draft = match self.drafter.draft(&input).await {
            Ok(text) => text,
            Err(source) => {
                tracing::error!(%order_id, error = %source, "Care plan drafting failed");
                self.rollback(order_id).await?;
                return Err(SubmissionError::Drafting { order_id, source });
            }
        };

        let care_plan = clean_care_plan(&draft);
        if let Err(e) = self
            .store
            .attach_care_plan(order_id, &care_plan, Utc::now())
            .await
        {
            tracing::error!(%order_id, error = %e, "Failed to store care plan");
            self.rollback(order_id).await?;
            return Err(e.into());
        }

        tracing::info!(%order_id, length = care_plan.chars().count(), "Care plan generated");
        Ok(CarePlanResult {
            care_plan,
            order_id,
        })
    }

    async fn upsert_patient(&self, submission: &OrderSubmission) -> Result<Patient, StoreError> {
        let first = &submission.patient_first_name;
        let last = &submission.patient_last_name;

        match self.store.get_patient_by_mrn(&submission.patient_mrn).await? {
            Some(mut patient) => {
                if patient.first_name != *first || patient.last_name != *last {
                    tracing::info!(
                        mrn = %patient.mrn,
                        name = %Masked::new(format!("{} {}", first, last)),
                        "Updating patient name"
                    );
                    self.store
                        .update_patient_name(patient.id, first, last)
                        .await?;
                    patient.first_name = first.clone();
                    patient.last_name = last.clone();
                }
                Ok(patient)
            }
            None => {
                let patient =
                    Patient::new(submission.patient_mrn.clone(), first.clone(), last.clone());
                self.store.create_patient(&patient).await?;
                tracing::info!(mrn = %patient.mrn, "New patient created");
                Ok(patient)
            }
        }
    }

    async fn upsert_provider(&self, submission: &OrderSubmission) -> Result<Provider, StoreError> {
        let name = &submission.provider_name;

        match self.store.get_provider_by_npi(&submission.provider_npi).await? {
            Some(mut provider) => {
                if provider.name != *name {
                    tracing::info!(
                        npi = %provider.npi,
                        old = %provider.name,
                        new = %name,
                        "Updating provider name"
                    );
                    self.store.update_provider_name(provider.id, name).await?;
                    provider.name = name.clone();
                }
                Ok(provider)
            }
            None => {
                let provider = Provider::new(submission.provider_npi.clone(), name.clone());
                self.store.create_provider(&provider).await?;
                tracing::info!(npi = %provider.npi, "New provider created");
                Ok(provider)
            }
        }
    }

    async fn rollback(&self, order_id: Uuid) -> Result<(), StoreError> {
        match self.store.delete_order(order_id).await {
            Ok(removed) => {
                tracing::info!(%order_id, removed, "Order deleted after care plan failure");
                Ok(())
            }
            Err(e) => {
                tracing::error!(%order_id, error = %e, "Rollback failed; order left without care plan");
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checker::FindingKind;
    use crate::submission::sample;
    use async_trait::async_trait;
    use careplan_core::{
        ClinicalInput, OrderFilter, OrderRepository, PatientRepository, ProviderRepository,
        StoreResult,
    };
    use careplan_shared::OrderDetails;
    use careplan_store::InMemoryEntityStore;
    use chrono::{DateTime, Duration};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StubDrafter {
        text: String,
        calls: AtomicUsize,
    }

    impl StubDrafter {
        fn new(text: &str) -> Arc<Self> {
            Arc::new(Self {
                text: text.to_string(),
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl CarePlanDrafter for StubDrafter {
        async fn draft(&self, input: &ClinicalInput) -> Result<String, DraftError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            assert_eq!(input.patient_mrn, "123456");
            Ok(self.text.clone())
        }
    }

    struct FailingDrafter;

    #[async_trait]
    impl CarePlanDrafter for FailingDrafter {
        async fn draft(&self, _input: &ClinicalInput) -> Result<String, DraftError> {
            Err(DraftError::Http("connection refused".into()))
        }
    }

    #[derive(Clone, Copy, PartialEq)]
    enum Fault {
        /// Attaching a care plan fails.
        Attach,
        /// Creating a patient hits a uniqueness race.
        PatientConflict,
    }

    /// Delegates to the in-memory store, failing one operation.
    struct FaultyStore {
        inner: InMemoryEntityStore,
        fault: Fault,
    }

    impl FaultyStore {
        fn new(fault: Fault) -> Arc<Self> {
            Arc::new(Self {
                inner: InMemoryEntityStore::new(),
                fault,
            })
        }
    }

    #[async_trait]
    impl PatientRepository for FaultyStore {
        async fn get_patient_by_mrn(&self, mrn: &str) -> StoreResult<Option<Patient>> {
            self.inner.get_patient_by_mrn(mrn).await
        }
        async fn create_patient(&self, patient: &Patient) -> StoreResult<()> {
            if self.fault == Fault::PatientConflict {
                return Err(StoreError::Conflict(format!("MRN {} already exists", patient.mrn)));
            }
            self.inner.create_patient(patient).await
        }
        async fn update_patient_name(&self, id: Uuid, first: &str, last: &str) -> StoreResult<()> {
            self.inner.update_patient_name(id, first, last).await
        }
    }

    #[async_trait]
    impl ProviderRepository for FaultyStore {
        async fn get_provider_by_npi(&self, npi: &str) -> StoreResult<Option<Provider>> {
            self.inner.get_provider_by_npi(npi).await
        }
        async fn get_provider_by_name_ci(&self, name: &str) -> StoreResult<Option<Provider>> {
            self.inner.get_provider_by_name_ci(name).await
        }
        async fn create_provider(&self, provider: &Provider) -> StoreResult<()> {
            self.inner.create_provider(provider).await
        }
        async fn update_provider_name(&self, id: Uuid, name: &str) -> StoreResult<()> {
            self.inner.update_provider_name(id, name).await
        }
    }

    #[async_trait]
    impl OrderRepository for FaultyStore {
        async fn create_order(&self, order: &Order) -> StoreResult<Uuid> {
            self.inner.create_order(order).await
        }
        async fn get_order(&self, id: Uuid) -> StoreResult<Option<OrderDetails>> {
            self.inner.get_order(id).await
        }
        async fn find_recent_orders(
            &self,
            patient_id: Uuid,
            medication_name: &str,
            created_after: DateTime<Utc>,
        ) -> StoreResult<Vec<Order>> {
            self.inner.find_recent_orders(patient_id, medication_name, created_after).await
        }
        async fn attach_care_plan(&self, id: Uuid, plan: &str, at: DateTime<Utc>) -> StoreResult<()> {
            if self.fault == Fault::Attach {
                return Err(StoreError::Backend("disk full".into()));
            }
            self.inner.attach_care_plan(id, plan, at).await
        }
        async fn delete_order(&self, id: Uuid) -> StoreResult<bool> {
            self.inner.delete_order(id).await
        }
        async fn list_orders(&self, skip: i64, limit: i64) -> StoreResult<Vec<OrderDetails>> {
            self.inner.list_orders(skip, limit).await
        }
        async fn query_orders(&self, filter: &OrderFilter) -> StoreResult<Vec<OrderDetails>> {
            self.inner.query_orders(filter).await
        }
    }

    const DRAFT: &str = "Care Plan\nProvider signature:\nDate: 2025-01-15\nWould you like me to add more?";

    #[tokio::test]
    async fn test_submit_creates_order_with_clean_plan() {
        let store = Arc::new(InMemoryEntityStore::new());
        let drafter = StubDrafter::new(DRAFT);
        let orch = OrderSubmissionOrchestrator::new(store.clone(), drafter.clone());

        let result = orch.submit(sample()).await.unwrap();
        assert_eq!(result.care_plan, "Care Plan\nProvider signature:\nDate: 2025-01-15");
        assert_eq!(drafter.calls.load(Ordering::SeqCst), 1);

        let details = store.get_order(result.order_id).await.unwrap().unwrap();
        assert_eq!(details.order.care_plan.as_deref(), Some(result.care_plan.as_str()));
        assert!(details.order.care_plan_generated_at.is_some());
        assert_eq!(details.order.additional_diagnoses, vec!["I10".to_string()]);
        assert_eq!(details.patient.mrn, "123456");
        assert_eq!(details.provider.npi, "1234567890");
    }

    #[tokio::test]
    async fn test_drafting_failure_leaves_no_order() {
        let store = Arc::new(InMemoryEntityStore::new());
        let orch = OrderSubmissionOrchestrator::new(store.clone(), Arc::new(FailingDrafter));

        let err = orch.submit(sample()).await.unwrap_err();
        assert!(matches!(err, SubmissionError::Drafting { .. }));
        assert_eq!(
            err.to_string(),
            "Failed to generate care plan: http error: connection refused"
        );
        assert_eq!(store.order_count().unwrap(), 0);
        // patient and provider upserts are not rolled back
        assert_eq!(store.patient_count().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_attach_failure_rolls_back() {
        let store = FaultyStore::new(Fault::Attach);
        let orch = OrderSubmissionOrchestrator::new(store.clone(), StubDrafter::new(DRAFT));

        let err = orch.submit(sample()).await.unwrap_err();
        assert!(matches!(err, SubmissionError::Store(StoreError::Backend(_))));
        assert_eq!(store.inner.order_count().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_upsert_race_is_store_conflict() {
        let store = FaultyStore::new(Fault::PatientConflict);
        let drafter = StubDrafter::new(DRAFT);
        let orch = OrderSubmissionOrchestrator::new(store.clone(), drafter.clone());

        // The checker saw no patient, so this is not reported as a duplicate.
        let err = orch.submit(sample()).await.unwrap_err();
        assert!(matches!(err, SubmissionError::Store(StoreError::Conflict(_))));
        assert_eq!(store.inner.order_count().unwrap(), 0);
        assert_eq!(drafter.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_shape_errors_skip_store_and_drafter() {
        let store = Arc::new(InMemoryEntityStore::new());
        let drafter = StubDrafter::new(DRAFT);
        let orch = OrderSubmissionOrchestrator::new(store.clone(), drafter.clone());

        let mut bad = sample();
        bad.patient_mrn = "12AB56".into();
        let err = orch.submit(bad).await.unwrap_err();
        match err {
            SubmissionError::Invalid(errors) => assert!(errors.get("patient_mrn").is_some()),
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(drafter.calls.load(Ordering::SeqCst), 0);
        assert_eq!(store.patient_count().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_blocking_error_prevents_upsert() {
        let store = Arc::new(InMemoryEntityStore::new());
        let existing = Patient::new("123456".into(), "Jane".into(), "Smith".into());
        store.create_patient(&existing).await.unwrap();
        let drafter = StubDrafter::new(DRAFT);
        let orch = OrderSubmissionOrchestrator::new(store.clone(), drafter.clone());

        let err = orch.submit(sample()).await.unwrap_err();
        match err {
            SubmissionError::Rejected(report) => {
                assert!(!report.valid);
                assert_eq!(report.errors[0].kind, FindingKind::DuplicatePatientNameMismatch);
            }
            other => panic!("unexpected error: {:?}", other),
        }
        let stored = store.get_patient_by_mrn("123456").await.unwrap().unwrap();
        assert_eq!(stored.first_name, "Jane");
        assert_eq!(store.provider_count().unwrap(), 0);
        assert_eq!(drafter.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_case_drift_corrects_names() {
        let store = Arc::new(InMemoryEntityStore::new());
        store
            .create_patient(&Patient::new("123456".into(), "JOHN".into(), "doe".into()))
            .await
            .unwrap();
        store
            .create_provider(&Provider::new("1234567890".into(), "dr. alice johnson".into()))
            .await
            .unwrap();
        let orch = OrderSubmissionOrchestrator::new(store.clone(), StubDrafter::new(DRAFT));

        orch.submit(sample()).await.unwrap();

        let patient = store.get_patient_by_mrn("123456").await.unwrap().unwrap();
        assert_eq!(patient.full_name(), "John Doe");
        let provider = store.get_provider_by_npi("1234567890").await.unwrap().unwrap();
        assert_eq!(provider.name, "Dr. Alice Johnson");
        assert_eq!(store.patient_count().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_warnings_do_not_block() {
        let store = Arc::new(InMemoryEntityStore::new());
        let orch = OrderSubmissionOrchestrator::new(store.clone(), StubDrafter::new(DRAFT));
        orch.submit(sample()).await.unwrap();

        let report = orch.validate(sample()).await.unwrap();
        assert!(report.valid);
        let kinds: Vec<_> = report.warnings.iter().map(|w| w.kind).collect();
        assert_eq!(
            kinds,
            vec![FindingKind::DuplicatePatient, FindingKind::PotentialDuplicateOrder]
        );

        orch.submit(sample()).await.unwrap();
        assert_eq!(store.order_count().unwrap(), 2);
    }

    #[tokio::test]
    async fn test_validate_window_uses_evaluation_time() {
        let store = Arc::new(InMemoryEntityStore::new());
        let orch = OrderSubmissionOrchestrator::new(store.clone(), StubDrafter::new(DRAFT));
        orch.submit(sample()).await.unwrap();

        let later = Utc::now() + Duration::hours(25);
        let report = orch.checker().validate_at(&sample(), later).await.unwrap();
        assert_eq!(report.warnings.len(), 1);
        assert_eq!(report.warnings[0].kind, FindingKind::DuplicatePatient);
    }
}
