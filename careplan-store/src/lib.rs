pub mod app_config;
pub mod database;
pub mod drafter;
pub mod memory_store;
pub mod order_repo;
pub mod patient_repo;
pub mod provider_repo;

pub use database::{DbClient, PgEntityStore};
pub use drafter::{HttpCarePlanDrafter, LazyCarePlanDrafter};
pub use memory_store::InMemoryEntityStore;
