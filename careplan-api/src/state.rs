use std::sync::Arc;

use careplan_core::{CarePlanDrafter, EntityStore};
use careplan_order::OrderSubmissionOrchestrator;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn EntityStore>,
    pub orchestrator: Arc<OrderSubmissionOrchestrator>,
}

impl AppState {
    pub fn new(store: Arc<dyn EntityStore>, drafter: Arc<dyn CarePlanDrafter>) -> Self {
        let orchestrator = OrderSubmissionOrchestrator::new(store.clone(), drafter);
        Self {
            store,
            orchestrator: Arc::new(orchestrator),
        }
    }
}
