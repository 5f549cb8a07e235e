use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::workflows::UserRole;

/// Schema version written into every [`ChangeReason`]
pub const CHANGE_REASON_VERSION: u16 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    StateChange,
    ReviewerAssignment,
    BulkOperation,
    SessionForceRelease,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeReasonKind {
    UserComment,
    BulkTransition,
    BulkReassignment,
    VacationDelegation,
    AdminOverride,
}

/// Why a mutation happened, in a form that stays machine-parseable
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeReason {
    pub version: u16,
    pub kind: ChangeReasonKind,
    pub note: Option<String>,
}

impl ChangeReason {
    pub fn new(kind: ChangeReasonKind, note: Option<String>) -> Self {
        Self {
            version: CHANGE_REASON_VERSION,
            kind,
            note,
        }
    }

    pub fn comment(note: impl Into<String>) -> Self {
        Self::new(ChangeReasonKind::UserComment, Some(note.into()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldChange {
    pub field: String,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
}

impl FieldChange {
    pub fn new(
        field: impl Into<String>,
        old_value: Option<String>,
        new_value: Option<String>,
    ) -> Self {
        Self {
            field: field.into(),
            old_value,
            new_value,
        }
    }
}

/// A stored, immutable audit record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditTrailEntry {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub action: AuditAction,
    pub user_id: String,
    pub user_role: UserRole,
    pub product_id: String,
    pub reason: Option<ChangeReason>,
    pub changes: Vec<FieldChange>,
}

impl AuditTrailEntry {
    pub fn change_for(&self, field: &str) -> Option<&FieldChange> {
        self.changes.iter().find(|change| change.field == field)
    }
}

/// Audit content supplied by callers; id and timestamp are assigned on append
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditEntryDraft {
    pub action: AuditAction,
    pub user_id: String,
    pub user_role: UserRole,
    pub reason: Option<ChangeReason>,
    pub changes: Vec<FieldChange>,
}

impl AuditEntryDraft {
    pub fn new(action: AuditAction, user_id: impl Into<String>, user_role: UserRole) -> Self {
        Self {
            action,
            user_id: user_id.into(),
            user_role,
            reason: None,
            changes: Vec::new(),
        }
    }

    pub fn with_reason(mut self, reason: Option<ChangeReason>) -> Self {
        self.reason = reason;
        self
    }

    pub fn with_change(mut self, change: FieldChange) -> Self {
        self.changes.push(change);
        self
    }
}
