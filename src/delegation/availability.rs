use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;

#[cfg(any(test, feature = "testing"))]
use mockall::automock;

use crate::store::StoreError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Availability {
    #[default]
    Available,
    Unavailable,
    OnVacation,
    OutOfOffice,
}

impl Availability {
    pub fn is_available(&self) -> bool {
        matches!(self, Availability::Available)
    }
}

/// Source of reviewer presence, typically a user-profile service
#[cfg_attr(any(test, feature = "testing"), automock)]
#[async_trait]
pub trait ReviewerAvailability: Send + Sync {
    async fn effective_availability(
        &self,
        reviewer_id: &str,
        at: DateTime<Utc>,
    ) -> Result<Availability, StoreError>;
}

/// Map-backed availability; unknown reviewers are available
#[derive(Debug, Default)]
pub struct StaticAvailability {
    statuses: RwLock<HashMap<String, Availability>>,
}

impl StaticAvailability {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_status(mut self, reviewer_id: impl Into<String>, status: Availability) -> Self {
        self.statuses.get_mut().insert(reviewer_id.into(), status);
        self
    }

    pub async fn set(&self, reviewer_id: impl Into<String>, status: Availability) {
        self.statuses.write().await.insert(reviewer_id.into(), status);
    }
}

#[async_trait]
impl ReviewerAvailability for StaticAvailability {
    async fn effective_availability(
        &self,
        reviewer_id: &str,
        _at: DateTime<Utc>,
    ) -> Result<Availability, StoreError> {
        Ok(self
            .statuses
            .read()
            .await
            .get(reviewer_id)
            .copied()
            .unwrap_or_default())
    }
}
