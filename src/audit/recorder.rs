use std::sync::Arc;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use super::types::{AuditAction, AuditEntryDraft, AuditTrailEntry};
use crate::clock::SharedClock;
use crate::store::{AuditStore, StoreError};

#[derive(Debug, Error)]
pub enum AuditError {
    #[error("audit store error: {0}")]
    Store(#[from] StoreError),
}

/// Appends immutable, timestamped entries to per-product trails
pub struct AuditTrailRecorder {
    store: Arc<dyn AuditStore>,
    clock: SharedClock,
}

impl std::fmt::Debug for AuditTrailRecorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditTrailRecorder")
            .field("clock", &self.clock)
            .finish_non_exhaustive()
    }
}

impl AuditTrailRecorder {
    pub fn new(store: Arc<dyn AuditStore>, clock: SharedClock) -> Self {
        Self { store, clock }
    }

    /// Stamp the draft with a fresh id and the current time, then append it
    pub async fn append(
        &self,
        product_id: &str,
        draft: AuditEntryDraft,
    ) -> Result<AuditTrailEntry, AuditError> {
        let entry = AuditTrailEntry {
            id: Uuid::new_v4().to_string(),
            timestamp: self.clock.now(),
            action: draft.action,
            user_id: draft.user_id,
            user_role: draft.user_role,
            product_id: product_id.to_string(),
            reason: draft.reason,
            changes: draft.changes,
        };

        let stored = self.store.append(product_id, entry).await?;

        debug!(
            product_id = %product_id,
            entry_id = %stored.id,
            action = ?stored.action,
            "Audit entry recorded"
        );

        Ok(stored)
    }

    /// Entries in insertion order; an unknown product has an empty trail
    pub async fn get(&self, product_id: &str) -> Result<Vec<AuditTrailEntry>, AuditError> {
        Ok(self.store.get(product_id).await?)
    }

    pub async fn get_by_action(
        &self,
        product_id: &str,
        action: AuditAction,
    ) -> Result<Vec<AuditTrailEntry>, AuditError> {
        Ok(self
            .get(product_id)
            .await?
            .into_iter()
            .filter(|entry| entry.action == action)
            .collect())
    }
}
