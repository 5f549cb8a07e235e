// Product workflow model and the transition engine

pub mod errors;
pub mod policy;
pub mod state_machine;
pub mod types;

pub use errors::WorkflowError;
pub use policy::TransitionPolicy;
pub use state_machine::{
    ReassignmentOutcome, TransitionEngine, TransitionOutcome, TransitionRequest,
};
pub use types::{Actor, HistoryEntry, UserRole, WorkflowProduct, WorkflowState};
