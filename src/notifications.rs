//! Outbound hooks fired after a change has been persisted and audited.
//!
//! Delivery (email, chat, webhooks) lives outside this crate; implementors of
//! [`WorkflowObserver`] receive events and forward them however they like.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

#[cfg(any(test, feature = "testing"))]
use mockall::automock;

use crate::workflows::{Actor, WorkflowState};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionEvent {
    pub product_id: String,
    pub previous_state: WorkflowState,
    pub new_state: WorkflowState,
    pub actor: Actor,
    pub comment: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReassignmentEvent {
    pub product_id: String,
    pub previous_reviewer: Option<String>,
    pub new_reviewer: String,
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

#[cfg_attr(any(test, feature = "testing"), automock)]
#[async_trait]
pub trait WorkflowObserver: Send + Sync {
    async fn on_transition(&self, _event: TransitionEvent) {}

    async fn on_reviewer_assigned(&self, _event: ReassignmentEvent) {}
}

/// Writes every event to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

#[async_trait]
impl WorkflowObserver for TracingObserver {
    async fn on_transition(&self, event: TransitionEvent) {
        info!(
            product_id = %event.product_id,
            from = %event.previous_state,
            to = %event.new_state,
            user_id = %event.actor.user_id,
            role = %event.actor.role,
            "Product transitioned"
        );
    }

    async fn on_reviewer_assigned(&self, event: ReassignmentEvent) {
        info!(
            product_id = %event.product_id,
            previous_reviewer = event.previous_reviewer.as_deref(),
            new_reviewer = %event.new_reviewer,
            user_id = %event.actor.user_id,
            "Reviewer assigned"
        );
    }
}
