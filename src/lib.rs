// Product Workflow - concurrency and state-transition control for product approval
// This exposes the core components for embedding and integration tests

pub mod audit;
pub mod bulk;
pub mod clock;
pub mod config;
pub mod coordinator;
pub mod delegation;
pub mod locking;
pub mod notifications;
pub mod store;
pub mod telemetry;
pub mod workflows;

// Re-export key types for easy access
pub use audit::{
    AuditAction, AuditEntryDraft, AuditError, AuditTrailEntry, AuditTrailRecorder, ChangeReason,
    ChangeReasonKind, FieldChange,
};
pub use bulk::{bulk_trail_key, BulkOperationResult, BulkOrchestrator, BulkSummary, FailedUpdate};
pub use clock::{Clock, ManualClock, SharedClock, SystemClock};
pub use config::{config, init_config, WorkflowConfig};
pub use coordinator::{WorkflowCoordinator, WorkflowCoordinatorBuilder};
pub use delegation::{
    Availability, DelegationError, DelegationResolver, DelegationWindow, OverdueReview,
    ReviewerAvailability, StaticAvailability, VacationDelegation,
};
pub use locking::{
    AcquireOutcome, AcquireRequest, DenialReason, EditingLock, EditingSession, LockManager,
    LockType, SessionInvalidReason, SessionMetadata, SessionValidation, SweepReport,
};
pub use notifications::{ReassignmentEvent, TracingObserver, TransitionEvent, WorkflowObserver};
pub use store::{AuditStore, InMemoryAuditStore, InMemoryWorkflowStore, StoreError, WorkflowStore};
pub use telemetry::{create_workflow_span, generate_correlation_id, init_telemetry, shutdown_telemetry};
pub use workflows::{
    Actor, HistoryEntry, TransitionEngine, TransitionOutcome, TransitionPolicy, TransitionRequest,
    UserRole, WorkflowError, WorkflowProduct, WorkflowState,
};
