use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use careplan_shared::{Order, OrderDetails, Patient, Provider};

use crate::StoreResult;

/// Repository trait for patient data access
#[async_trait]
pub trait PatientRepository: Send + Sync {
    async fn get_patient_by_mrn(&self, mrn: &str) -> StoreResult<Option<Patient>>;

    /// Fails with `StoreError::Conflict` if the MRN is already taken.
    async fn create_patient(&self, patient: &Patient) -> StoreResult<()>;

    async fn update_patient_name(
        &self,
        id: Uuid,
        first_name: &str,
        last_name: &str,
    ) -> StoreResult<()>;
}

/// Repository trait for provider data access
#[async_trait]
pub trait ProviderRepository: Send + Sync {
    async fn get_provider_by_npi(&self, npi: &str) -> StoreResult<Option<Provider>>;

    /// Case-insensitive name lookup. Returns the oldest match if the store
    /// already holds several providers with the same name.
    async fn get_provider_by_name_ci(&self, name: &str) -> StoreResult<Option<Provider>>;

    /// Fails with `StoreError::Conflict` if the NPI is already taken.
    async fn create_provider(&self, provider: &Provider) -> StoreResult<()>;

    async fn update_provider_name(&self, id: Uuid, name: &str) -> StoreResult<()>;
}

/// Repository trait for order data access
#[async_trait]
pub trait OrderRepository: Send + Sync {
    async fn create_order(&self, order: &Order) -> StoreResult<Uuid>;

    async fn get_order(&self, id: Uuid) -> StoreResult<Option<OrderDetails>>;

    /// Orders for a patient with exactly this medication name, created at or
    /// after `created_after`.
    async fn find_recent_orders(
        &self,
        patient_id: Uuid,
        medication_name: &str,
        created_after: DateTime<Utc>,
    ) -> StoreResult<Vec<Order>>;

    /// Sets the care-plan fields. They can only be set once; a second call
    /// fails with `StoreError::Conflict`.
    async fn attach_care_plan(
        &self,
        id: Uuid,
        care_plan: &str,
        generated_at: DateTime<Utc>,
    ) -> StoreResult<()>;

    /// Returns whether a row was removed.
    async fn delete_order(&self, id: Uuid) -> StoreResult<bool>;

    /// Newest first.
    async fn list_orders(&self, skip: i64, limit: i64) -> StoreResult<Vec<OrderDetails>>;

    /// Newest first.
    async fn query_orders(&self, filter: &OrderFilter) -> StoreResult<Vec<OrderDetails>>;
}

/// Everything the checker and orchestrator need from persistence.
pub trait EntityStore: PatientRepository + ProviderRepository + OrderRepository {}

impl<T> EntityStore for T where T: PatientRepository + ProviderRepository + OrderRepository {}

/// Filters applied to order exports and statistics.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrderFilter {
    /// Inclusive lower bound on `created_at`.
    pub created_from: Option<DateTime<Utc>>,
    /// Exclusive upper bound on `created_at`.
    pub created_before: Option<DateTime<Utc>>,
    pub provider_npi: Option<String>,
    /// Matches primary or additional diagnoses.
    pub diagnosis: Option<String>,
    pub care_plan_only: bool,
}

impl OrderFilter {
    pub fn matches(&self, details: &OrderDetails) -> bool {
        let order = &details.order;
        if let Some(from) = self.created_from {
            if order.created_at < from {
                return false;
            }
        }
        if let Some(before) = self.created_before {
            if order.created_at >= before {
                return false;
            }
        }
        if let Some(npi) = &self.provider_npi {
            if &details.provider.npi != npi {
                return false;
            }
        }
        if let Some(code) = &self.diagnosis {
            if !order.has_diagnosis(code) {
                return false;
            }
        }
        !self.care_plan_only || order.has_care_plan()
    }

    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}
