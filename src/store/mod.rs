// Collaborator interfaces for durable product and audit storage.
// The backing engine is pluggable; the in-memory versions back tests and embedding.

pub mod memory;

use async_trait::async_trait;
use thiserror::Error;

#[cfg(any(test, feature = "testing"))]
use mockall::automock;

use crate::audit::AuditTrailEntry;
use crate::workflows::WorkflowProduct;

pub use memory::{InMemoryAuditStore, InMemoryWorkflowStore};

/// Errors raised by a storage backend itself, as opposed to a rejected write
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Durable access to a product's current state and history
#[cfg_attr(any(test, feature = "testing"), automock)]
#[async_trait]
pub trait WorkflowStore: Send + Sync {
    async fn load(&self, product_id: &str) -> Result<Option<WorkflowProduct>, StoreError>;

    async fn load_all(&self) -> Result<Vec<WorkflowProduct>, StoreError>;

    /// Returns `Ok(false)` when the backend rejected the write
    async fn save(&self, product: &WorkflowProduct) -> Result<bool, StoreError>;
}

/// Append-only audit trail storage, keyed by product id
#[cfg_attr(any(test, feature = "testing"), automock)]
#[async_trait]
pub trait AuditStore: Send + Sync {
    async fn append(
        &self,
        product_id: &str,
        entry: AuditTrailEntry,
    ) -> Result<AuditTrailEntry, StoreError>;

    async fn get(&self, product_id: &str) -> Result<Vec<AuditTrailEntry>, StoreError>;
}
