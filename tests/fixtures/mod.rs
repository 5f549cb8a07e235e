//! Shared setup for integration tests: a coordinator over in-memory stores
//! with a manually driven clock.
#![allow(dead_code)]

use chrono::Duration;
use product_workflow::{
    Clock, HistoryEntry, InMemoryAuditStore, InMemoryWorkflowStore, ManualClock,
    StaticAvailability, WorkflowConfig, WorkflowCoordinator, WorkflowProduct, WorkflowState,
};
use std::sync::Arc;

pub struct TestWorld {
    pub coordinator: WorkflowCoordinator,
    pub store: Arc<InMemoryWorkflowStore>,
    pub audit_store: Arc<InMemoryAuditStore>,
    pub availability: Arc<StaticAvailability>,
    pub clock: ManualClock,
}

pub fn world() -> TestWorld {
    world_with_config(WorkflowConfig::default())
}

pub fn world_with_config(config: WorkflowConfig) -> TestWorld {
    let store = Arc::new(InMemoryWorkflowStore::new());
    let audit_store = Arc::new(InMemoryAuditStore::new());
    let availability = Arc::new(StaticAvailability::new());
    let clock = ManualClock::default();

    let coordinator = WorkflowCoordinator::builder()
        .config(config)
        .store(store.clone())
        .audit_store(audit_store.clone())
        .availability(availability.clone())
        .clock(Arc::new(clock.clone()))
        .build()
        .expect("test coordinator should build");

    TestWorld {
        coordinator,
        store,
        audit_store,
        availability,
        clock,
    }
}

impl TestWorld {
    /// Seed a product already sitting in `state`, entered one minute after creation
    pub async fn seed(&self, id: &str, state: WorkflowState, reviewer: Option<&str>) -> WorkflowProduct {
        let created_at = self.clock.now() - Duration::minutes(1);
        let mut product = WorkflowProduct::new(id, "submitter", created_at);
        if state != WorkflowState::Draft {
            product.history.push(HistoryEntry {
                state,
                timestamp: self.clock.now(),
                user_id: "submitter".to_string(),
                comment: None,
            });
            product.current_state = state;
        }
        if let Some(reviewer) = reviewer {
            product = product.with_reviewer(reviewer);
        }
        self.store.insert(product.clone()).await;
        product
    }
}
