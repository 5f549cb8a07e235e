use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, HashSet};
use tokio::sync::RwLock;
use tracing::debug;

use super::{AuditStore, StoreError, WorkflowStore};
use crate::audit::AuditTrailEntry;
use crate::workflows::WorkflowProduct;

/// Product store held in process memory.
///
/// `load_all` returns products ordered by id. Saves for ids registered with
/// [`InMemoryWorkflowStore::fail_saves_for`] are rejected with `Ok(false)`.
#[derive(Debug, Default)]
pub struct InMemoryWorkflowStore {
    products: RwLock<BTreeMap<String, WorkflowProduct>>,
    rejected_saves: RwLock<HashSet<String>>,
}

impl InMemoryWorkflowStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a product without going through the transition engine
    pub async fn insert(&self, product: WorkflowProduct) {
        self.products
            .write()
            .await
            .insert(product.id.clone(), product);
    }

    pub async fn fail_saves_for(&self, product_id: impl Into<String>) {
        self.rejected_saves.write().await.insert(product_id.into());
    }

    pub async fn clear_save_failures(&self) {
        self.rejected_saves.write().await.clear();
    }

    pub async fn len(&self) -> usize {
        self.products.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.products.read().await.is_empty()
    }
}

#[async_trait]
impl WorkflowStore for InMemoryWorkflowStore {
    async fn load(&self, product_id: &str) -> Result<Option<WorkflowProduct>, StoreError> {
        Ok(self.products.read().await.get(product_id).cloned())
    }

    async fn load_all(&self) -> Result<Vec<WorkflowProduct>, StoreError> {
        Ok(self.products.read().await.values().cloned().collect())
    }

    async fn save(&self, product: &WorkflowProduct) -> Result<bool, StoreError> {
        if self.rejected_saves.read().await.contains(&product.id) {
            debug!(product_id = %product.id, "In-memory store rejecting save");
            return Ok(false);
        }

        self.products
            .write()
            .await
            .insert(product.id.clone(), product.clone());
        Ok(true)
    }
}

/// Audit trail held in process memory, insertion ordered per product
#[derive(Debug, Default)]
pub struct InMemoryAuditStore {
    trails: RwLock<HashMap<String, Vec<AuditTrailEntry>>>,
}

impl InMemoryAuditStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries across every trail
    pub async fn total_entries(&self) -> usize {
        self.trails.read().await.values().map(Vec::len).sum()
    }

    pub async fn trail_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.trails.read().await.keys().cloned().collect();
        keys.sort();
        keys
    }
}

#[async_trait]
impl AuditStore for InMemoryAuditStore {
    async fn append(
        &self,
        product_id: &str,
        entry: AuditTrailEntry,
    ) -> Result<AuditTrailEntry, StoreError> {
        self.trails
            .write()
            .await
            .entry(product_id.to_string())
            .or_default()
            .push(entry.clone());
        Ok(entry)
    }

    async fn get(&self, product_id: &str) -> Result<Vec<AuditTrailEntry>, StoreError> {
        Ok(self
            .trails
            .read()
            .await
            .get(product_id)
            .cloned()
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[tokio::test]
    async fn rejected_saves_leave_previous_version() {
        let store = InMemoryWorkflowStore::new();
        let product = WorkflowProduct::new("p1", "alice", Utc::now());
        store.insert(product.clone()).await;
        store.fail_saves_for("p1").await;

        let mut changed = product.clone();
        changed.assigned_reviewer = Some("r1".to_string());

        assert!(!store.save(&changed).await.unwrap());
        let loaded = store.load("p1").await.unwrap().unwrap();
        assert_eq!(loaded.assigned_reviewer, None);
    }

    #[tokio::test]
    async fn load_all_is_ordered_by_id() {
        let store = InMemoryWorkflowStore::new();
        for id in ["p3", "p1", "p2"] {
            store.insert(WorkflowProduct::new(id, "alice", Utc::now())).await;
        }

        let ids: Vec<String> = store
            .load_all()
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(ids, vec!["p1", "p2", "p3"]);
    }

    #[tokio::test]
    async fn unknown_trail_is_empty() {
        let store = InMemoryAuditStore::new();
        assert!(store.get("missing").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn save_failures_can_be_cleared() {
        let store = InMemoryWorkflowStore::new();
        assert!(store.is_empty().await);
        let product = WorkflowProduct::new("p1", "alice", Utc::now());
        store.fail_saves_for("p1").await;
        assert!(!store.save(&product).await.unwrap());
        assert!(store.is_empty().await);

        store.clear_save_failures().await;

        assert!(store.save(&product).await.unwrap());
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn trail_keys_are_sorted() {
        let store = InMemoryAuditStore::new();
        assert!(store.trail_keys().await.is_empty());

        for key in ["p2", "bulk:b1", "p1"] {
            let entry = crate::audit::AuditTrailEntry {
                id: format!("e-{key}"),
                timestamp: Utc::now(),
                action: crate::audit::AuditAction::StateChange,
                user_id: "alice".into(),
                user_role: crate::workflows::UserRole::Editor,
                product_id: key.into(),
                reason: None,
                changes: Vec::new(),
            };
            store.append(key, entry).await.unwrap();
        }

        assert_eq!(store.trail_keys().await, vec!["bulk:b1", "p1", "p2"]);
        assert_eq!(store.total_entries().await, 3);
    }
}
