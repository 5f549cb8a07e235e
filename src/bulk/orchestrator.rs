use std::sync::Arc;
use tracing::{error, info, warn, Instrument};

use super::types::{bulk_trail_key, BulkOperationResult, BulkTally};
use crate::audit::{AuditEntryDraft, AuditTrailRecorder, ChangeReasonKind};
use crate::telemetry::{create_workflow_span, generate_correlation_id};
use crate::workflows::{Actor, TransitionEngine, TransitionRequest, UserRole, WorkflowState};

/// Applies one transition to many products, item by item, without rollback
#[derive(Debug)]
pub struct BulkOrchestrator {
    engine: Arc<TransitionEngine>,
    record_summary: bool,
}

impl BulkOrchestrator {
    pub fn new(engine: Arc<TransitionEngine>) -> Self {
        Self {
            engine,
            record_summary: true,
        }
    }

    pub fn with_summary(mut self, record_summary: bool) -> Self {
        self.record_summary = record_summary;
        self
    }

    pub async fn bulk_transition<S: AsRef<str>>(
        &self,
        product_ids: &[S],
        new_state: WorkflowState,
        user_id: &str,
        comment: Option<&str>,
    ) -> BulkOperationResult {
        self.bulk_transition_as(
            product_ids,
            new_state,
            &Actor::new(user_id, UserRole::Editor),
            comment,
        )
        .await
    }

    pub async fn bulk_transition_as<S: AsRef<str>>(
        &self,
        product_ids: &[S],
        new_state: WorkflowState,
        actor: &Actor,
        comment: Option<&str>,
    ) -> BulkOperationResult {
        let batch_id = generate_correlation_id();
        let span = create_workflow_span(
            "bulk_transition",
            None,
            Some(actor.user_id.as_str()),
            Some(batch_id.as_str()),
        );

        async {
            let mut tally = BulkTally::new(batch_id.clone());

            for product_id in product_ids {
                let product_id = product_id.as_ref();
                let request = TransitionRequest::new(product_id, new_state, actor.user_id.clone())
                    .with_role(actor.role)
                    .with_comment(comment)
                    .with_reason_kind(ChangeReasonKind::BulkTransition);

                match self.engine.apply(request).await {
                    Ok(_) => tally.record_success(product_id),
                    Err(e) => {
                        warn!(
                            product_id = %product_id,
                            code = e.code(),
                            error = %e,
                            "Bulk transition item failed"
                        );
                        tally.record_failure(product_id, e);
                    }
                }
            }

            if self.record_summary && !tally.is_empty() {
                let draft = tally.summary_draft(
                    "bulk_transition",
                    new_state.as_str(),
                    actor,
                    ChangeReasonKind::BulkTransition,
                    comment,
                );
                record_bulk_summary(self.engine.audit(), tally.batch_id(), draft).await;
            }

            let result = tally.finish();
            info!(
                updated = result.updated_count,
                failed = result.failed_updates.len(),
                to = %new_state,
                "Bulk transition finished"
            );
            result
        }
        .instrument(span)
        .await
    }
}

/// Write a batch summary. A failure here is logged; the per-item work already happened.
pub(crate) async fn record_bulk_summary(
    audit: &AuditTrailRecorder,
    batch_id: &str,
    draft: AuditEntryDraft,
) {
    let trail_key = bulk_trail_key(batch_id);
    if let Err(e) = audit.append(&trail_key, draft).await {
        error!(batch_id = %batch_id, error = %e, "Failed to record bulk summary");
    }
}
