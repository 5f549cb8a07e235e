use thiserror::Error;

use super::types::WorkflowState;
use crate::audit::AuditError;
use crate::locking::SessionInvalidReason;
use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("product {product_id} not found")]
    NotFound { product_id: String },

    #[error("transition of product {product_id} from {from} to {to} is not allowed")]
    InvalidTransition {
        product_id: String,
        from: WorkflowState,
        to: WorkflowState,
    },

    #[error("failed to save product {product_id}")]
    SaveFailed {
        product_id: String,
        #[source]
        source: Option<StoreError>,
    },

    #[error("editing session rejected: {reason}")]
    SessionInvalid { reason: SessionInvalidReason },

    #[error("workflow store error: {0}")]
    Store(#[from] StoreError),

    #[error(transparent)]
    Audit(#[from] AuditError),
}

impl WorkflowError {
    pub fn code(&self) -> &'static str {
        match self {
            WorkflowError::NotFound { .. } => "NOT_FOUND",
            WorkflowError::InvalidTransition { .. } => "INVALID_TRANSITION",
            WorkflowError::SaveFailed { .. } => "SAVE_FAILED",
            WorkflowError::SessionInvalid { reason } => reason.code(),
            WorkflowError::Store(_) => "STORE_ERROR",
            WorkflowError::Audit(_) => "AUDIT_ERROR",
        }
    }

    pub(crate) fn save_rejected(product_id: &str) -> Self {
        WorkflowError::SaveFailed {
            product_id: product_id.to_string(),
            source: None,
        }
    }
}
