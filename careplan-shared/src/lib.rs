pub mod models;
pub mod pii;

pub use models::{Order, OrderDetails, Patient, Provider};
pub use pii::Masked;
