mod order;
mod patient;
mod provider;

pub use order::{Order, OrderDetails};
pub use patient::Patient;
pub use provider::Provider;
