// Bulk state transitions with per-item failure reporting

pub mod orchestrator;
pub mod types;

pub use orchestrator::BulkOrchestrator;
pub use types::{bulk_trail_key, BulkOperationResult, BulkSummary, FailedUpdate};
