// Immutable audit trail for every workflow mutation

pub mod recorder;
pub mod types;

pub use recorder::{AuditError, AuditTrailRecorder};
pub use types::{
    AuditAction, AuditEntryDraft, AuditTrailEntry, ChangeReason, ChangeReasonKind, FieldChange,
    CHANGE_REASON_VERSION,
};
