pub mod checker;
pub mod cleanup;
pub mod orchestrator;
pub mod submission;

pub use checker::{DuplicateChecker, Finding, FindingKind, Severity, ValidationReport};
pub use cleanup::clean_care_plan;
pub use orchestrator::{CarePlanResult, OrderSubmissionOrchestrator, SubmissionError};
pub use submission::{FieldErrors, OrderSubmission};
