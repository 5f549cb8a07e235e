// Transition engine: the only writer of product history.
// It performs no locking of its own; exclusivity is the lock manager's concern.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::errors::WorkflowError;
use super::policy::TransitionPolicy;
use super::types::{Actor, UserRole, WorkflowProduct, WorkflowState};
use crate::audit::{
    AuditAction, AuditEntryDraft, AuditTrailEntry, AuditTrailRecorder, ChangeReason,
    ChangeReasonKind, FieldChange,
};
use crate::clock::SharedClock;
use crate::notifications::{ReassignmentEvent, TransitionEvent, WorkflowObserver};
use crate::store::WorkflowStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionRequest {
    pub product_id: String,
    pub new_state: WorkflowState,
    pub actor: Actor,
    pub comment: Option<String>,
    pub reason_kind: ChangeReasonKind,
}

impl TransitionRequest {
    /// Request attributed to an `Editor` with a plain user comment reason
    pub fn new(
        product_id: impl Into<String>,
        new_state: WorkflowState,
        user_id: impl Into<String>,
    ) -> Self {
        Self {
            product_id: product_id.into(),
            new_state,
            actor: Actor::new(user_id, UserRole::Editor),
            comment: None,
            reason_kind: ChangeReasonKind::UserComment,
        }
    }

    pub fn with_role(mut self, role: UserRole) -> Self {
        self.actor.role = role;
        self
    }

    pub fn with_comment(mut self, comment: Option<impl Into<String>>) -> Self {
        self.comment = comment.map(Into::into);
        self
    }

    pub fn with_reason_kind(mut self, kind: ChangeReasonKind) -> Self {
        self.reason_kind = kind;
        self
    }

    fn audit_reason(&self) -> Option<ChangeReason> {
        match (&self.comment, self.reason_kind) {
            (Some(note), kind) => Some(ChangeReason::new(kind, Some(note.clone()))),
            (None, ChangeReasonKind::UserComment) => None,
            (None, kind) => Some(ChangeReason::new(kind, None)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionOutcome {
    pub product_id: String,
    pub previous_state: WorkflowState,
    pub new_state: WorkflowState,
    pub history_len: usize,
    pub audit_entry_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReassignmentOutcome {
    pub product_id: String,
    pub previous_reviewer: Option<String>,
    pub new_reviewer: String,
    pub audit_entry_id: String,
}

/// Moves products between workflow states.
///
/// Each successful change is persisted first, then audited, then announced to
/// the registered observers. A rejected or failed save leaves no audit entry.
/// When the audit append fails after a save, the previous product version is
/// written back so no unaudited change stays in the store.
pub struct TransitionEngine {
    store: Arc<dyn WorkflowStore>,
    audit: Arc<AuditTrailRecorder>,
    clock: SharedClock,
    policy: TransitionPolicy,
    observers: Vec<Arc<dyn WorkflowObserver>>,
}

impl std::fmt::Debug for TransitionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransitionEngine")
            .field("policy", &self.policy)
            .field("observers", &self.observers.len())
            .field("clock", &self.clock)
            .finish_non_exhaustive()
    }
}

impl TransitionEngine {
    pub fn new(
        store: Arc<dyn WorkflowStore>,
        audit: Arc<AuditTrailRecorder>,
        clock: SharedClock,
    ) -> Self {
        Self {
            store,
            audit,
            clock,
            policy: TransitionPolicy::default(),
            observers: Vec::new(),
        }
    }

    pub fn with_policy(mut self, policy: TransitionPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn WorkflowObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    pub fn policy(&self) -> TransitionPolicy {
        self.policy
    }

    pub fn store(&self) -> &Arc<dyn WorkflowStore> {
        &self.store
    }

    pub fn audit(&self) -> &Arc<AuditTrailRecorder> {
        &self.audit
    }

    pub fn clock(&self) -> &SharedClock {
        &self.clock
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub async fn load(&self, product_id: &str) -> Result<WorkflowProduct, WorkflowError> {
        self.store
            .load(product_id)
            .await?
            .ok_or_else(|| WorkflowError::NotFound {
                product_id: product_id.to_string(),
            })
    }

    pub async fn transition(
        &self,
        product_id: &str,
        new_state: WorkflowState,
        user_id: &str,
        comment: Option<&str>,
    ) -> Result<TransitionOutcome, WorkflowError> {
        self.apply(TransitionRequest::new(product_id, new_state, user_id).with_comment(comment))
            .await
    }

    /// Same as [`transition`](Self::transition) with an explicit actor role for the audit entry
    pub async fn transition_as(
        &self,
        product_id: &str,
        new_state: WorkflowState,
        actor: &Actor,
        comment: Option<&str>,
    ) -> Result<TransitionOutcome, WorkflowError> {
        self.apply(
            TransitionRequest::new(product_id, new_state, actor.user_id.clone())
                .with_role(actor.role)
                .with_comment(comment),
        )
        .await
    }

    pub async fn apply(&self, request: TransitionRequest) -> Result<TransitionOutcome, WorkflowError> {
        let mut product = self.load(&request.product_id).await?;
        let original = product.clone();
        let previous_state = product.current_state;

        if !self.policy.allows(previous_state, request.new_state) {
            info!(
                product_id = %request.product_id,
                from = %previous_state,
                to = %request.new_state,
                user_id = %request.actor.user_id,
                "Transition refused by policy"
            );
            return Err(WorkflowError::InvalidTransition {
                product_id: request.product_id.clone(),
                from: previous_state,
                to: request.new_state,
            });
        }

        let now = self.clock.now();
        product.push_history(
            request.new_state,
            now,
            &request.actor.user_id,
            request.comment.clone(),
        );
        if request.new_state == WorkflowState::Rejected {
            product.rejection_reason = request.comment.clone();
        } else if previous_state == WorkflowState::Rejected {
            product.rejection_reason = None;
        }

        self.persist(&product).await?;

        let draft = AuditEntryDraft::new(
            AuditAction::StateChange,
            request.actor.user_id.clone(),
            request.actor.role,
        )
        .with_reason(request.audit_reason())
        .with_change(FieldChange::new(
            "current_state",
            Some(previous_state.to_string()),
            Some(request.new_state.to_string()),
        ));
        let entry = self.audit_or_restore(&original, draft).await?;

        info!(
            product_id = %product.id,
            from = %previous_state,
            to = %request.new_state,
            user_id = %request.actor.user_id,
            audit_entry_id = %entry.id,
            "Workflow transition recorded"
        );

        let event = TransitionEvent {
            product_id: product.id.clone(),
            previous_state,
            new_state: request.new_state,
            actor: request.actor,
            comment: request.comment,
            occurred_at: now,
        };
        for observer in &self.observers {
            observer.on_transition(event.clone()).await;
        }

        Ok(TransitionOutcome {
            product_id: product.id,
            previous_state,
            new_state: event.new_state,
            history_len: product.history.len(),
            audit_entry_id: entry.id,
        })
    }

    /// Point a product at a new reviewer and audit the change
    pub async fn assign_reviewer(
        &self,
        product_id: &str,
        reviewer_id: &str,
        actor: &Actor,
        reason: Option<ChangeReason>,
    ) -> Result<ReassignmentOutcome, WorkflowError> {
        let mut product = self.load(product_id).await?;
        let original = product.clone();
        let previous_reviewer = product.assigned_reviewer.replace(reviewer_id.to_string());

        self.persist(&product).await?;

        let draft = AuditEntryDraft::new(
            AuditAction::ReviewerAssignment,
            actor.user_id.clone(),
            actor.role,
        )
        .with_reason(reason)
        .with_change(FieldChange::new(
            "assigned_reviewer",
            previous_reviewer.clone(),
            Some(reviewer_id.to_string()),
        ));
        let entry = self.audit_or_restore(&original, draft).await?;

        debug!(
            product_id = %product_id,
            previous_reviewer = previous_reviewer.as_deref(),
            new_reviewer = %reviewer_id,
            "Reviewer assignment recorded"
        );

        let event = ReassignmentEvent {
            product_id: product_id.to_string(),
            previous_reviewer: previous_reviewer.clone(),
            new_reviewer: reviewer_id.to_string(),
            actor: actor.clone(),
            occurred_at: self.clock.now(),
        };
        for observer in &self.observers {
            observer.on_reviewer_assigned(event.clone()).await;
        }

        Ok(ReassignmentOutcome {
            product_id: product_id.to_string(),
            previous_reviewer,
            new_reviewer: reviewer_id.to_string(),
            audit_entry_id: entry.id,
        })
    }

    /// Append the audit entry for a change already saved; on failure put `original` back
    async fn audit_or_restore(
        &self,
        original: &WorkflowProduct,
        draft: AuditEntryDraft,
    ) -> Result<AuditTrailEntry, WorkflowError> {
        match self.audit.append(&original.id, draft).await {
            Ok(entry) => Ok(entry),
            Err(e) => {
                error!(
                    product_id = %original.id,
                    error = %e,
                    "Audit append failed, restoring previous product version"
                );
                if let Err(restore) = self.persist(original).await {
                    error!(
                        product_id = %original.id,
                        error = %restore,
                        "Failed to restore product after audit failure"
                    );
                }
                Err(e.into())
            }
        }
    }

    async fn persist(&self, product: &WorkflowProduct) -> Result<(), WorkflowError> {
        match self.store.save(product).await {
            Ok(true) => Ok(()),
            Ok(false) => {
                warn!(product_id = %product.id, "Store rejected product save");
                Err(WorkflowError::save_rejected(&product.id))
            }
            Err(e) => {
                error!(product_id = %product.id, error = %e, "Product save failed");
                Err(WorkflowError::SaveFailed {
                    product_id: product.id.clone(),
                    source: Some(e),
                })
            }
        }
    }
}
