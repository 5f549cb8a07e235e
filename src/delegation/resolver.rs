use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn, Instrument};

use super::availability::ReviewerAvailability;
use super::types::{DelegationError, DelegationWindow, OverdueReview, VacationDelegation};
use crate::audit::{ChangeReason, ChangeReasonKind};
use crate::bulk::orchestrator::record_bulk_summary;
use crate::bulk::types::BulkTally;
use crate::bulk::BulkOperationResult;
use crate::telemetry::{create_workflow_span, generate_correlation_id};
use crate::workflows::{Actor, TransitionEngine, WorkflowState};

#[derive(Debug, Default)]
struct DelegationTables {
    backups: HashMap<String, String>,
    /// Registration order is significant: the first matching window wins
    windows: HashMap<String, Vec<DelegationWindow>>,
}

impl DelegationTables {
    fn resolve(&self, primary: &str, at: DateTime<Utc>) -> Option<String> {
        self.windows
            .get(primary)
            .and_then(|windows| windows.iter().find(|window| window.contains(at)))
            .map(|window| window.delegate_id.clone())
            .or_else(|| self.backups.get(primary).cloned())
    }
}

fn is_blank(id: &str) -> bool {
    id.trim().is_empty()
}

/// Works out who reviews on behalf of whom, and moves assignments accordingly
pub struct DelegationResolver {
    tables: RwLock<DelegationTables>,
    engine: Arc<TransitionEngine>,
    availability: Arc<dyn ReviewerAvailability>,
    overdue_threshold: Duration,
    record_summary: bool,
}

impl std::fmt::Debug for DelegationResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DelegationResolver")
            .field("overdue_threshold", &self.overdue_threshold)
            .field("record_summary", &self.record_summary)
            .finish_non_exhaustive()
    }
}

impl DelegationResolver {
    pub fn new(engine: Arc<TransitionEngine>, availability: Arc<dyn ReviewerAvailability>) -> Self {
        Self {
            tables: RwLock::new(DelegationTables::default()),
            engine,
            availability,
            overdue_threshold: Duration::days(3),
            record_summary: true,
        }
    }

    pub fn with_overdue_threshold(mut self, threshold: Duration) -> Self {
        self.overdue_threshold = threshold;
        self
    }

    pub fn with_summary(mut self, record_summary: bool) -> Self {
        self.record_summary = record_summary;
        self
    }

    pub async fn set_backup(&self, primary: &str, backup: &str) -> Result<(), DelegationError> {
        if is_blank(primary) || is_blank(backup) {
            return Err(DelegationError::InvalidBackupReviewer {
                primary: primary.to_string(),
                reason: "reviewer ids must not be empty".to_string(),
            });
        }
        if primary == backup {
            return Err(DelegationError::InvalidBackupReviewer {
                primary: primary.to_string(),
                reason: "a reviewer cannot back up themselves".to_string(),
            });
        }

        let previous = self
            .tables
            .write()
            .await
            .backups
            .insert(primary.to_string(), backup.to_string());
        info!(
            primary = %primary,
            backup = %backup,
            replaced = previous.as_deref(),
            "Backup reviewer set"
        );
        Ok(())
    }

    pub async fn remove_backup(&self, primary: &str) -> Option<String> {
        self.tables.write().await.backups.remove(primary)
    }

    pub async fn backup_for(&self, primary: &str) -> Option<String> {
        self.tables.read().await.backups.get(primary).cloned()
    }

    pub async fn set_window(
        &self,
        primary: &str,
        window: DelegationWindow,
    ) -> Result<(), DelegationError> {
        if window.end_at <= window.start_at {
            return Err(DelegationError::InvalidDelegationWindow {
                primary: primary.to_string(),
                reason: format!(
                    "window ends at {} which is not after its start {}",
                    window.end_at.to_rfc3339(),
                    window.start_at.to_rfc3339()
                ),
            });
        }
        if is_blank(&window.delegate_id) || is_blank(primary) {
            return Err(DelegationError::InvalidDelegationWindow {
                primary: primary.to_string(),
                reason: "reviewer ids must not be empty".to_string(),
            });
        }

        info!(
            primary = %primary,
            delegate = %window.delegate_id,
            start_at = %window.start_at,
            end_at = %window.end_at,
            "Delegation window registered"
        );
        self.tables
            .write()
            .await
            .windows
            .entry(primary.to_string())
            .or_default()
            .push(window);
        Ok(())
    }

    pub async fn windows_for(&self, primary: &str) -> Vec<DelegationWindow> {
        self.tables
            .read()
            .await
            .windows
            .get(primary)
            .cloned()
            .unwrap_or_default()
    }

    /// Drop every window of `primary`; returns how many were removed
    pub async fn clear_windows(&self, primary: &str) -> usize {
        self.tables
            .write()
            .await
            .windows
            .remove(primary)
            .map(|windows| windows.len())
            .unwrap_or(0)
    }

    /// Drop windows that ended at or before `at`
    pub async fn prune_expired_windows(&self, at: DateTime<Utc>) -> usize {
        let mut tables = self.tables.write().await;
        let mut pruned = 0;

        tables.windows.retain(|_, windows| {
            let before = windows.len();
            windows.retain(|window| !window.has_ended(at));
            pruned += before - windows.len();
            !windows.is_empty()
        });

        if pruned > 0 {
            info!(pruned, "Pruned ended delegation windows");
        }
        pruned
    }

    /// Reviewer acting for `primary` at `at`: a covering window first, then the backup
    pub async fn active_delegate(&self, primary: &str, at: DateTime<Utc>) -> Option<String> {
        self.tables.read().await.resolve(primary, at)
    }

    /// Move every product assigned to `from` over to `to`.
    ///
    /// Items fail independently. A summary entry is written under the batch
    /// trail key once at least one product was attempted.
    pub async fn bulk_reassign(
        &self,
        from: &str,
        to: &str,
        acting_user: &Actor,
        reason: Option<ChangeReason>,
    ) -> Result<BulkOperationResult, DelegationError> {
        if is_blank(from) || is_blank(to) {
            return Err(DelegationError::InvalidBackupReviewer {
                primary: from.to_string(),
                reason: "reviewer ids must not be empty".to_string(),
            });
        }
        if from == to {
            return Err(DelegationError::InvalidBackupReviewer {
                primary: from.to_string(),
                reason: "cannot reassign a reviewer to themselves".to_string(),
            });
        }

        let reason =
            reason.unwrap_or_else(|| ChangeReason::new(ChangeReasonKind::BulkReassignment, None));
        let batch_id = generate_correlation_id();
        let span = create_workflow_span(
            "bulk_reassign",
            None,
            Some(acting_user.user_id.as_str()),
            Some(batch_id.as_str()),
        );

        async {
            let assigned: Vec<String> = self
                .engine
                .store()
                .load_all()
                .await?
                .into_iter()
                .filter(|product| product.assigned_reviewer.as_deref() == Some(from))
                .map(|product| product.id)
                .collect();

            let mut tally = BulkTally::new(batch_id.clone());

            for product_id in &assigned {
                match self
                    .engine
                    .assign_reviewer(product_id, to, acting_user, Some(reason.clone()))
                    .await
                {
                    Ok(_) => tally.record_success(product_id),
                    Err(e) => {
                        warn!(
                            product_id = %product_id,
                            code = e.code(),
                            error = %e,
                            "Reviewer reassignment failed"
                        );
                        tally.record_failure(product_id, e);
                    }
                }
            }

            if self.record_summary && !tally.is_empty() {
                let draft = tally.summary_draft(
                    "bulk_reassign",
                    to,
                    acting_user,
                    reason.kind,
                    reason.note.as_deref(),
                );
                record_bulk_summary(self.engine.audit(), tally.batch_id(), draft).await;
            }

            let result = tally.finish();
            info!(
                from = %from,
                to = %to,
                reassigned = result.updated_count,
                failed = result.failed_updates.len(),
                "Bulk reviewer reassignment finished"
            );
            Ok::<_, DelegationError>(result)
        }
        .instrument(span)
        .await
    }

    /// Hand an unavailable reviewer's assignments to whoever is covering for them
    pub async fn delegate_during_vacation(
        &self,
        primary: &str,
        acting_user: &Actor,
        at: DateTime<Utc>,
        reason: Option<ChangeReason>,
    ) -> Result<VacationDelegation, DelegationError> {
        let availability = self
            .availability
            .effective_availability(primary, at)
            .await?;
        if availability.is_available() {
            return Ok(VacationDelegation::NotNeeded { availability });
        }

        let delegate_id = self.active_delegate(primary, at).await.ok_or_else(|| {
            DelegationError::NoDelegateConfigured {
                primary: primary.to_string(),
            }
        })?;

        let reason = reason.unwrap_or_else(|| {
            ChangeReason::new(
                ChangeReasonKind::VacationDelegation,
                Some(format!("{primary} is {availability:?}")),
            )
        });
        let result = self
            .bulk_reassign(primary, &delegate_id, acting_user, Some(reason))
            .await?;

        Ok(VacationDelegation::Reassigned {
            delegate_id,
            availability,
            result,
        })
    }

    /// Products sitting in review longer than the threshold, oldest first
    pub async fn overdue_reviews(
        &self,
        at: DateTime<Utc>,
    ) -> Result<Vec<OverdueReview>, DelegationError> {
        let products = self.engine.store().load_all().await?;
        let tables = self.tables.read().await;

        let mut overdue: Vec<OverdueReview> = products
            .into_iter()
            .filter(|product| product.current_state == WorkflowState::Review)
            .filter_map(|product| {
                let since = product.last_transition_at()?;
                let waiting = at.signed_duration_since(since);
                if waiting <= self.overdue_threshold {
                    return None;
                }

                let acting_reviewer = product.assigned_reviewer.as_deref().map(|reviewer| {
                    tables
                        .resolve(reviewer, at)
                        .unwrap_or_else(|| reviewer.to_string())
                });

                Some(OverdueReview {
                    product_id: product.id,
                    assigned_reviewer: product.assigned_reviewer,
                    acting_reviewer,
                    in_review_since: since,
                    waiting_hours: waiting.num_hours(),
                })
            })
            .collect();

        overdue.sort_by_key(|review| review.in_review_since);
        Ok(overdue)
    }
}
