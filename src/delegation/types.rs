use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::availability::Availability;
use crate::bulk::BulkOperationResult;
use crate::store::StoreError;

/// Coverage by `delegate_id` over the half-open interval `[start_at, end_at)`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelegationWindow {
    pub delegate_id: String,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub note: Option<String>,
}

impl DelegationWindow {
    pub fn new(
        delegate_id: impl Into<String>,
        start_at: DateTime<Utc>,
        end_at: DateTime<Utc>,
    ) -> Self {
        Self {
            delegate_id: delegate_id.into(),
            start_at,
            end_at,
            note: None,
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start_at <= at && at < self.end_at
    }

    pub fn has_ended(&self, at: DateTime<Utc>) -> bool {
        self.end_at <= at
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum VacationDelegation {
    /// Reviewer is available; nothing was reassigned
    NotNeeded { availability: Availability },
    Reassigned {
        delegate_id: String,
        availability: Availability,
        result: BulkOperationResult,
    },
}

impl VacationDelegation {
    pub fn reassigned_count(&self) -> usize {
        match self {
            VacationDelegation::NotNeeded { .. } => 0,
            VacationDelegation::Reassigned { result, .. } => result.updated_count,
        }
    }
}

/// A product waiting in review longer than the configured threshold
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverdueReview {
    pub product_id: String,
    pub assigned_reviewer: Option<String>,
    /// Delegate covering the assigned reviewer now, or the reviewer themselves
    pub acting_reviewer: Option<String>,
    pub in_review_since: DateTime<Utc>,
    pub waiting_hours: i64,
}

#[derive(Debug, Error)]
pub enum DelegationError {
    #[error("invalid backup reviewer for {primary:?}: {reason}")]
    InvalidBackupReviewer { primary: String, reason: String },

    #[error("invalid delegation window for {primary:?}: {reason}")]
    InvalidDelegationWindow { primary: String, reason: String },

    #[error("no delegate configured for reviewer {primary}")]
    NoDelegateConfigured { primary: String },

    #[error("delegation store error: {0}")]
    Store(#[from] StoreError),
}

impl DelegationError {
    pub fn code(&self) -> &'static str {
        match self {
            DelegationError::InvalidBackupReviewer { .. } => "INVALID_BACKUP_REVIEWER",
            DelegationError::InvalidDelegationWindow { .. } => "INVALID_DELEGATION_WINDOW",
            DelegationError::NoDelegateConfigured { .. } => "NO_DELEGATE_CONFIGURED",
            DelegationError::Store(_) => "STORE_ERROR",
        }
    }
}
