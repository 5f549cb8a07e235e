//! Facade wiring the engine, lock manager, bulk orchestrator and delegation
//! resolver around one set of stores, one clock and one configuration.

use anyhow::Result;
use std::sync::Arc;
use tracing::{info, Instrument};

use crate::audit::{
    AuditAction, AuditEntryDraft, AuditTrailRecorder, ChangeReason, ChangeReasonKind, FieldChange,
};
use crate::bulk::BulkOrchestrator;
use crate::clock::{SharedClock, SystemClock};
use crate::config::WorkflowConfig;
use crate::delegation::{DelegationResolver, ReviewerAvailability, StaticAvailability};
use crate::locking::{
    AcquireOutcome, AcquireRequest, ForceReleaseReport, LockManager, SessionInvalidReason,
    SessionMetadata, SessionValidation,
};
use crate::notifications::WorkflowObserver;
use crate::store::{AuditStore, InMemoryAuditStore, InMemoryWorkflowStore, WorkflowStore};
use crate::telemetry::{create_workflow_span, generate_correlation_id};
use crate::workflows::{Actor, TransitionEngine, TransitionOutcome, WorkflowError, WorkflowState};

pub struct WorkflowCoordinator {
    config: WorkflowConfig,
    engine: Arc<TransitionEngine>,
    locks: Arc<LockManager>,
    bulk: Arc<BulkOrchestrator>,
    delegation: Arc<DelegationResolver>,
}

impl std::fmt::Debug for WorkflowCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowCoordinator")
            .field("engine", &self.engine)
            .field("locks", &self.locks)
            .finish_non_exhaustive()
    }
}

#[derive(Default)]
pub struct WorkflowCoordinatorBuilder {
    config: Option<WorkflowConfig>,
    store: Option<Arc<dyn WorkflowStore>>,
    audit_store: Option<Arc<dyn AuditStore>>,
    availability: Option<Arc<dyn ReviewerAvailability>>,
    clock: Option<SharedClock>,
    observers: Vec<Arc<dyn WorkflowObserver>>,
}

impl WorkflowCoordinatorBuilder {
    pub fn config(mut self, config: WorkflowConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn store(mut self, store: Arc<dyn WorkflowStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn audit_store(mut self, audit_store: Arc<dyn AuditStore>) -> Self {
        self.audit_store = Some(audit_store);
        self
    }

    pub fn availability(mut self, availability: Arc<dyn ReviewerAvailability>) -> Self {
        self.availability = Some(availability);
        self
    }

    pub fn clock(mut self, clock: SharedClock) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn observer(mut self, observer: Arc<dyn WorkflowObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    /// Assemble the services. Anything not supplied falls back to the
    /// in-memory stores, the system clock and everyone-available.
    pub fn build(self) -> Result<WorkflowCoordinator> {
        let config = self.config.unwrap_or_default();
        config.validate()?;

        let clock = self
            .clock
            .unwrap_or_else(|| Arc::new(SystemClock) as SharedClock);
        let store = self
            .store
            .unwrap_or_else(|| Arc::new(InMemoryWorkflowStore::new()) as Arc<dyn WorkflowStore>);
        let audit_store = self
            .audit_store
            .unwrap_or_else(|| Arc::new(InMemoryAuditStore::new()) as Arc<dyn AuditStore>);
        let availability = self.availability.unwrap_or_else(|| {
            Arc::new(StaticAvailability::new()) as Arc<dyn ReviewerAvailability>
        });

        let audit = Arc::new(AuditTrailRecorder::new(audit_store, clock.clone()));
        let engine = self.observers.into_iter().fold(
            TransitionEngine::new(store, audit, clock.clone())
                .with_policy(config.workflow.transition_policy),
            TransitionEngine::with_observer,
        );
        let engine = Arc::new(engine);

        let locks = Arc::new(LockManager::new(config.locking.clone(), clock));
        let bulk = Arc::new(
            BulkOrchestrator::new(engine.clone()).with_summary(config.bulk.record_summary),
        );
        let delegation = Arc::new(
            DelegationResolver::new(engine.clone(), availability)
                .with_overdue_threshold(config.delegation.overdue_review_threshold())
                .with_summary(config.bulk.record_summary),
        );

        info!(
            policy = ?config.workflow.transition_policy,
            idle_timeout_minutes = config.locking.idle_timeout_minutes,
            hard_lock_timeout_minutes = config.locking.hard_lock_timeout_minutes,
            "Workflow coordinator initialized"
        );

        Ok(WorkflowCoordinator {
            config,
            engine,
            locks,
            bulk,
            delegation,
        })
    }
}

impl WorkflowCoordinator {
    pub fn builder() -> WorkflowCoordinatorBuilder {
        WorkflowCoordinatorBuilder::default()
    }

    pub fn config(&self) -> &WorkflowConfig {
        &self.config
    }

    pub fn engine(&self) -> &Arc<TransitionEngine> {
        &self.engine
    }

    pub fn locks(&self) -> &Arc<LockManager> {
        &self.locks
    }

    pub fn bulk(&self) -> &Arc<BulkOrchestrator> {
        &self.bulk
    }

    pub fn delegation(&self) -> &Arc<DelegationResolver> {
        &self.delegation
    }

    pub async fn start(&self) {
        self.locks.start().await;
    }

    pub async fn stop(&self) {
        self.locks.stop().await;
    }

    /// Ask for an editing session on a product in its current workflow state
    pub async fn open_session(
        &self,
        product_id: &str,
        actor: &Actor,
        metadata: Option<SessionMetadata>,
    ) -> Result<AcquireOutcome, WorkflowError> {
        let product = self.engine.load(product_id).await?;
        let mut request = AcquireRequest::new(
            product_id,
            actor.user_id.clone(),
            actor.role,
            product.current_state,
        );
        request.metadata = metadata;
        Ok(self.locks.acquire(request).await)
    }

    /// Transition a product on behalf of the holder of a valid editing session
    pub async fn guarded_transition(
        &self,
        session_id: &str,
        user_id: &str,
        product_id: &str,
        new_state: WorkflowState,
        comment: Option<&str>,
    ) -> Result<TransitionOutcome, WorkflowError> {
        let correlation_id = generate_correlation_id();
        let span = create_workflow_span(
            "guarded_transition",
            Some(product_id),
            Some(user_id),
            Some(correlation_id.as_str()),
        );

        async {
            if let SessionValidation::Invalid { reason } =
                self.locks.validate(session_id, user_id).await
            {
                info!(session_id = %session_id, reason = reason.code(), "Guarded transition refused");
                return Err(WorkflowError::SessionInvalid { reason });
            }

            let session = self.locks.session(session_id).await.ok_or(
                WorkflowError::SessionInvalid {
                    reason: SessionInvalidReason::NotFound,
                },
            )?;
            if session.product_id != product_id {
                return Err(WorkflowError::SessionInvalid {
                    reason: SessionInvalidReason::WrongProduct,
                });
            }

            self.locks.renew(session_id).await;
            self.engine
                .transition_as(
                    product_id,
                    new_state,
                    &Actor::new(user_id, session.user_role),
                    comment,
                )
                .await
        }
        .instrument(span)
        .await
    }

    /// Clear every session and lock on a product and record who did it
    pub async fn force_release(
        &self,
        product_id: &str,
        actor: &Actor,
    ) -> Result<ForceReleaseReport, WorkflowError> {
        let report = self.locks.force_release(product_id, &actor.user_id).await;

        let terminated: Vec<&str> = report
            .sessions_terminated
            .iter()
            .map(|session| session.user_id.as_str())
            .collect();
        let draft = AuditEntryDraft::new(
            AuditAction::SessionForceRelease,
            actor.user_id.clone(),
            actor.role,
        )
        .with_reason(Some(ChangeReason::new(
            ChangeReasonKind::AdminOverride,
            Some(format!("terminated sessions of [{}]", terminated.join(","))),
        )))
        .with_change(FieldChange::new(
            "lock_owner",
            report.lock_cleared.as_ref().map(|lock| lock.locked_by.clone()),
            None,
        ))
        .with_change(FieldChange::new(
            "sessions_terminated",
            None,
            Some(report.sessions_terminated.len().to_string()),
        ));
        self.engine.audit().append(product_id, draft).await?;

        Ok(report)
    }
}
