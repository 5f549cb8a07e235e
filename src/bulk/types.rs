use serde::{Deserialize, Serialize};
use std::fmt::Display;

use crate::audit::{
    AuditAction, AuditEntryDraft, AuditTrailEntry, ChangeReason, ChangeReasonKind, FieldChange,
};
use crate::workflows::Actor;

const FIELD_REQUESTED: &str = "requested_ids";
const FIELD_SUCCEEDED: &str = "succeeded_ids";
const FIELD_FAILED: &str = "failed_ids";

fn id_list(field: &str, ids: &[String]) -> FieldChange {
    FieldChange::new(field, None, Some(serde_json::Value::from(ids.to_vec()).to_string()))
}

/// Trail key under which a batch's summary entry is written
pub fn bulk_trail_key(batch_id: &str) -> String {
    format!("bulk:{batch_id}")
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedUpdate {
    pub product_id: String,
    pub error: String,
}

/// Outcome of a bulk call. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkOperationResult {
    pub batch_id: String,
    /// True iff no item failed
    pub success: bool,
    pub updated_count: usize,
    pub failed_updates: Vec<FailedUpdate>,
}

impl BulkOperationResult {
    pub fn total(&self) -> usize {
        self.updated_count + self.failed_updates.len()
    }

    pub fn failed_ids(&self) -> Vec<&str> {
        self.failed_updates
            .iter()
            .map(|failure| failure.product_id.as_str())
            .collect()
    }
}

/// Typed view of a `BulkOperation` summary entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkSummary {
    pub operation: String,
    pub target: String,
    pub requested: Vec<String>,
    pub succeeded: Vec<String>,
    pub failed: Vec<String>,
}

impl BulkSummary {
    /// `None` unless the entry is a well-formed bulk summary
    pub fn from_entry(entry: &AuditTrailEntry) -> Option<Self> {
        if entry.action != AuditAction::BulkOperation {
            return None;
        }
        let value = |field: &str| {
            entry
                .change_for(field)
                .and_then(|change| change.new_value.clone())
        };
        let ids = |field: &str| -> Option<Vec<String>> {
            serde_json::from_str(&value(field)?).ok()
        };

        Some(Self {
            operation: value("operation")?,
            target: value("target")?,
            requested: ids(FIELD_REQUESTED)?,
            succeeded: ids(FIELD_SUCCEEDED)?,
            failed: ids(FIELD_FAILED)?,
        })
    }
}

/// Running record of a batch, in input order
#[derive(Debug, Clone)]
pub(crate) struct BulkTally {
    batch_id: String,
    requested: Vec<String>,
    succeeded: Vec<String>,
    failed: Vec<FailedUpdate>,
}

impl BulkTally {
    pub(crate) fn new(batch_id: impl Into<String>) -> Self {
        Self {
            batch_id: batch_id.into(),
            requested: Vec::new(),
            succeeded: Vec::new(),
            failed: Vec::new(),
        }
    }

    pub(crate) fn record_success(&mut self, product_id: &str) {
        self.requested.push(product_id.to_string());
        self.succeeded.push(product_id.to_string());
    }

    pub(crate) fn record_failure(&mut self, product_id: &str, error: impl Display) {
        self.requested.push(product_id.to_string());
        self.failed.push(FailedUpdate {
            product_id: product_id.to_string(),
            error: error.to_string(),
        });
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.requested.is_empty()
    }

    pub(crate) fn batch_id(&self) -> &str {
        &self.batch_id
    }

    /// Summary entry for the batch. Every value is a field change; id lists are JSON arrays.
    pub(crate) fn summary_draft(
        &self,
        operation: &str,
        target: &str,
        actor: &Actor,
        kind: ChangeReasonKind,
        note: Option<&str>,
    ) -> AuditEntryDraft {
        let failed_ids: Vec<String> = self
            .failed
            .iter()
            .map(|failure| failure.product_id.clone())
            .collect();

        AuditEntryDraft::new(AuditAction::BulkOperation, actor.user_id.clone(), actor.role)
            .with_reason(Some(ChangeReason::new(kind, note.map(str::to_string))))
            .with_change(FieldChange::new("operation", None, Some(operation.to_string())))
            .with_change(FieldChange::new("target", None, Some(target.to_string())))
            .with_change(FieldChange::new(
                "updated_count",
                None,
                Some(self.succeeded.len().to_string()),
            ))
            .with_change(FieldChange::new(
                "failed_count",
                None,
                Some(self.failed.len().to_string()),
            ))
            .with_change(id_list(FIELD_REQUESTED, &self.requested))
            .with_change(id_list(FIELD_SUCCEEDED, &self.succeeded))
            .with_change(id_list(FIELD_FAILED, &failed_ids))
    }

    pub(crate) fn finish(self) -> BulkOperationResult {
        BulkOperationResult {
            batch_id: self.batch_id,
            success: self.failed.is_empty(),
            updated_count: self.succeeded.len(),
            failed_updates: self.failed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::UserRole;

    #[test]
    fn tally_counts_add_up() {
        let mut tally = BulkTally::new("b1");
        tally.record_success("p1");
        tally.record_failure("p2", "product p2 not found");
        tally.record_success("p3");

        let result = tally.finish();

        assert!(!result.success);
        assert_eq!(result.updated_count, 2);
        assert_eq!(result.total(), 3);
        assert_eq!(result.failed_ids(), vec!["p2"]);
        assert_eq!(result.failed_updates[0].error, "product p2 not found");
    }

    #[test]
    fn summary_lists_ids_in_input_order() {
        let mut tally = BulkTally::new("b1");
        tally.record_failure("p9", "boom");
        tally.record_success("p1");

        let draft = tally.summary_draft(
            "bulk_transition",
            "approved",
            &Actor::new("lead", UserRole::Admin),
            ChangeReasonKind::BulkTransition,
            Some("quarterly refresh"),
        );

        assert_eq!(draft.action, AuditAction::BulkOperation);
        assert_eq!(
            draft.reason.as_ref().and_then(|reason| reason.note.as_deref()),
            Some("quarterly refresh")
        );
        let field = |name: &str| {
            draft
                .changes
                .iter()
                .find(|change| change.field == name)
                .and_then(|change| change.new_value.clone())
                .unwrap()
        };
        assert_eq!(field("failed_count"), "1");
        assert_eq!(field("requested_ids"), r#"["p9","p1"]"#);
        assert_eq!(field("succeeded_ids"), r#"["p1"]"#);
        assert_eq!(field("failed_ids"), r#"["p9"]"#);
    }

    #[test]
    fn summary_entry_parses_back() {
        let mut tally = BulkTally::new("b1");
        tally.record_success("p1");
        tally.record_failure("p2", "not found");
        let draft = tally.summary_draft(
            "bulk_reassign",
            "r2",
            &Actor::new("lead", UserRole::Admin),
            ChangeReasonKind::AdminOverride,
            None,
        );
        let entry = AuditTrailEntry {
            id: "e1".into(),
            timestamp: chrono::Utc::now(),
            action: draft.action,
            user_id: draft.user_id,
            user_role: draft.user_role,
            product_id: bulk_trail_key("b1"),
            reason: draft.reason,
            changes: draft.changes,
        };

        let summary = BulkSummary::from_entry(&entry).unwrap();

        assert_eq!(summary.operation, "bulk_reassign");
        assert_eq!(summary.target, "r2");
        assert_eq!(summary.requested, vec!["p1", "p2"]);
        assert_eq!(summary.succeeded, vec!["p1"]);
        assert_eq!(summary.failed, vec!["p2"]);

        let mut other = entry.clone();
        other.action = AuditAction::StateChange;
        assert!(BulkSummary::from_entry(&other).is_none());
    }

    #[test]
    fn trail_key_is_namespaced() {
        assert_eq!(bulk_trail_key("abc"), "bulk:abc");
    }
}
