use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::workflows::{UserRole, WorkflowState};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockType {
    Edit,
    Review,
    Admin,
}

impl LockType {
    /// Admin role wins, then a product under review, otherwise plain editing
    pub fn for_request(role: UserRole, state: WorkflowState) -> Self {
        if role.is_admin() {
            LockType::Admin
        } else if state == WorkflowState::Review {
            LockType::Review
        } else {
            LockType::Edit
        }
    }
}

/// Client details attached to a session at acquisition time
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionMetadata {
    pub client: Option<String>,
    pub note: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditingSession {
    pub session_id: String,
    pub product_id: String,
    pub user_id: String,
    pub user_role: UserRole,
    pub started_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub lock_type: LockType,
    pub is_active: bool,
    pub metadata: Option<SessionMetadata>,
}

impl EditingSession {
    pub fn idle_for(&self, now: DateTime<Utc>) -> Duration {
        now.signed_duration_since(self.last_activity)
    }

    pub fn is_idle_expired(&self, now: DateTime<Utc>, idle_timeout: Duration) -> bool {
        self.idle_for(now) > idle_timeout
    }

    /// Active and not yet past the idle timeout
    pub fn is_live(&self, now: DateTime<Utc>, idle_timeout: Duration) -> bool {
        self.is_active && !self.is_idle_expired(now, idle_timeout)
    }
}

/// Hard exclusivity marker; expires on `expires_at` whatever the activity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditingLock {
    pub product_id: String,
    pub locked_by: String,
    pub lock_type: LockType,
    pub locked_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl EditingLock {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcquireRequest {
    pub product_id: String,
    pub user_id: String,
    pub user_role: UserRole,
    pub current_workflow_state: WorkflowState,
    pub metadata: Option<SessionMetadata>,
}

impl AcquireRequest {
    pub fn new(
        product_id: impl Into<String>,
        user_id: impl Into<String>,
        user_role: UserRole,
        current_workflow_state: WorkflowState,
    ) -> Self {
        Self {
            product_id: product_id.into(),
            user_id: user_id.into(),
            user_role,
            current_workflow_state,
            metadata: None,
        }
    }

    pub fn with_metadata(mut self, metadata: SessionMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenialReason {
    LockedByOther,
    SessionConflict,
    SessionLimitExceeded,
}

impl DenialReason {
    pub fn code(&self) -> &'static str {
        match self {
            DenialReason::LockedByOther => "LOCKED_BY_OTHER",
            DenialReason::SessionConflict => "SESSION_CONFLICT",
            DenialReason::SessionLimitExceeded => "SESSION_LIMIT_EXCEEDED",
        }
    }
}

/// Why an acquisition was refused, with enough context to tell the user who holds it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockDenial {
    pub reason: DenialReason,
    pub message: String,
    pub conflicting_session: Option<EditingSession>,
    pub conflicting_lock: Option<EditingLock>,
}

impl LockDenial {
    pub fn conflicting_user(&self) -> Option<&str> {
        self.conflicting_lock
            .as_ref()
            .map(|lock| lock.locked_by.as_str())
            .or_else(|| {
                self.conflicting_session
                    .as_ref()
                    .map(|session| session.user_id.as_str())
            })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AcquireOutcome {
    Granted {
        session_id: String,
        lock_type: LockType,
        /// An existing session of the same user was extended instead of created
        renewed: bool,
    },
    Denied(LockDenial),
}

impl AcquireOutcome {
    pub fn is_granted(&self) -> bool {
        matches!(self, AcquireOutcome::Granted { .. })
    }

    pub fn session_id(&self) -> Option<&str> {
        match self {
            AcquireOutcome::Granted { session_id, .. } => Some(session_id),
            AcquireOutcome::Denied(_) => None,
        }
    }

    pub fn denial(&self) -> Option<&LockDenial> {
        match self {
            AcquireOutcome::Granted { .. } => None,
            AcquireOutcome::Denied(denial) => Some(denial),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionInvalidReason {
    NotFound,
    Inactive,
    WrongUser,
    WrongProduct,
    IdleTimeout,
}

impl SessionInvalidReason {
    pub fn code(&self) -> &'static str {
        match self {
            SessionInvalidReason::NotFound => "NOT_FOUND",
            SessionInvalidReason::Inactive => "SESSION_INACTIVE",
            SessionInvalidReason::WrongUser => "SESSION_WRONG_USER",
            SessionInvalidReason::WrongProduct => "SESSION_WRONG_PRODUCT",
            SessionInvalidReason::IdleTimeout => "SESSION_IDLE_TIMEOUT",
        }
    }
}

impl fmt::Display for SessionInvalidReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            SessionInvalidReason::NotFound => "session not found",
            SessionInvalidReason::Inactive => "session has ended",
            SessionInvalidReason::WrongUser => "session belongs to another user",
            SessionInvalidReason::WrongProduct => "session is for another product",
            SessionInvalidReason::IdleTimeout => "session expired after inactivity",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionValidation {
    Valid { should_renew: bool },
    Invalid { reason: SessionInvalidReason },
}

impl SessionValidation {
    pub fn is_valid(&self) -> bool {
        matches!(self, SessionValidation::Valid { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForceReleaseReport {
    pub product_id: String,
    pub released_by: String,
    pub sessions_terminated: Vec<EditingSession>,
    pub lock_cleared: Option<EditingLock>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepReport {
    /// Sessions that went past the idle timeout
    pub expired_sessions: usize,
    /// Locks past their hard expiry
    pub expired_locks: usize,
    /// Already-ended sessions removed from the table
    pub purged_sessions: usize,
}

impl SweepReport {
    pub fn is_empty(&self) -> bool {
        self.expired_sessions == 0 && self.expired_locks == 0 && self.purged_sessions == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lock_type_derivation() {
        assert_eq!(
            LockType::for_request(UserRole::Admin, WorkflowState::Review),
            LockType::Admin
        );
        assert_eq!(
            LockType::for_request(UserRole::Reviewer, WorkflowState::Review),
            LockType::Review
        );
        assert_eq!(
            LockType::for_request(UserRole::Reviewer, WorkflowState::Draft),
            LockType::Edit
        );
    }

    #[test]
    fn lock_expires_exactly_at_deadline() {
        let now = Utc::now();
        let lock = EditingLock {
            product_id: "p1".into(),
            locked_by: "r1".into(),
            lock_type: LockType::Review,
            locked_at: now,
            expires_at: now + Duration::hours(2),
        };

        assert!(!lock.is_expired(now + Duration::minutes(119)));
        assert!(lock.is_expired(now + Duration::hours(2)));
    }

    #[test]
    fn conflicting_user_prefers_lock_owner() {
        let now = Utc::now();
        let denial = LockDenial {
            reason: DenialReason::LockedByOther,
            message: String::new(),
            conflicting_session: None,
            conflicting_lock: Some(EditingLock {
                product_id: "p1".into(),
                locked_by: "r1".into(),
                lock_type: LockType::Review,
                locked_at: now,
                expires_at: now,
            }),
        };

        assert_eq!(denial.conflicting_user(), Some("r1"));
        assert_eq!(denial.reason.code(), "LOCKED_BY_OTHER");
    }
}
