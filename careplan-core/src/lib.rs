pub mod drafting;
pub mod repository;

pub use drafting::{CarePlanDrafter, ClinicalInput, DraftError};
pub use repository::{EntityStore, OrderFilter, OrderRepository, PatientRepository, ProviderRepository};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Store lookup failed: {0}")]
    Backend(String),
}

pub type StoreResult<T> = Result<T, StoreError>;
