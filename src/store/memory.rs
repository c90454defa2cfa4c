use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use super::{OrderRepository, StoreError};
use crate::domain::order::ServiceOrderAggregate;

/// Process-local repository used by tests and the demo binary.
#[derive(Default)]
pub struct InMemoryOrderRepository {
    orders: RwLock<HashMap<Uuid, ServiceOrderAggregate>>,
    sequences: Mutex<HashMap<String, u64>>,
}

impl InMemoryOrderRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.orders.read().await.len()
    }
}

#[async_trait]
impl OrderRepository for InMemoryOrderRepository {
    async fn load(&self, order_id: Uuid) -> Result<ServiceOrderAggregate, StoreError> {
        self.orders
            .read()
            .await
            .get(&order_id)
            .cloned()
            .ok_or(StoreError::NotFound(order_id))
    }

    async fn save(&self, aggregate: &ServiceOrderAggregate, expected_version: i64) -> Result<i64, StoreError> {
        let mut orders = self.orders.write().await;
        let order_id = aggregate.order.id;

        let actual = orders.get(&order_id).map(|stored| stored.version).unwrap_or(0);
        if actual != expected_version {
            return Err(StoreError::ConcurrencyConflict { expected: expected_version, actual });
        }

        let new_version = expected_version + 1;
        let mut stored = aggregate.clone();
        stored.version = new_version;
        orders.insert(order_id, stored);

        tracing::debug!(order_id = %order_id, new_version, "Saved service order snapshot");
        Ok(new_version)
    }

    async fn next_order_sequence(&self, prefix: &str) -> Result<u64, StoreError> {
        let mut sequences = self.sequences.lock().await;
        let counter = sequences.entry(prefix.to_string()).or_insert(0);
        *counter += 1;
        Ok(*counter)
    }

    async fn delete(&self, order_id: Uuid) -> Result<(), StoreError> {
        self.orders
            .write()
            .await
            .remove(&order_id)
            .map(|_| ())
            .ok_or(StoreError::NotFound(order_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::order::aggregate::fixtures::*;

    #[tokio::test]
    async fn test_save_then_load_bumps_version() {
        let repo = InMemoryOrderRepository::new();
        let aggregate = new_order(&intake());

        let version = repo.save(&aggregate, 0).await.unwrap();
        assert_eq!(version, 1);

        let loaded = repo.load(aggregate.order.id).await.unwrap();
        assert_eq!(loaded.version, 1);
        assert_eq!(loaded.order, aggregate.order);
    }

    #[tokio::test]
    async fn test_stale_version_is_a_conflict() {
        let repo = InMemoryOrderRepository::new();
        let aggregate = new_order(&intake());
        repo.save(&aggregate, 0).await.unwrap();

        let result = repo.save(&aggregate, 0).await;
        assert!(matches!(result, Err(StoreError::ConcurrencyConflict { expected: 0, actual: 1 })));
    }

    #[tokio::test]
    async fn test_sequences_are_per_prefix() {
        let repo = InMemoryOrderRepository::new();
        assert_eq!(repo.next_order_sequence("LAV").await.unwrap(), 1);
        assert_eq!(repo.next_order_sequence("LAV").await.unwrap(), 2);
        assert_eq!(repo.next_order_sequence("REF").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_delete_removes_aggregate() {
        let repo = InMemoryOrderRepository::new();
        let aggregate = new_order(&intake());
        repo.save(&aggregate, 0).await.unwrap();

        repo.delete(aggregate.order.id).await.unwrap();
        assert!(matches!(repo.load(aggregate.order.id).await, Err(StoreError::NotFound(_))));
        assert!(matches!(repo.delete(aggregate.order.id).await, Err(StoreError::NotFound(_))));
        assert_eq!(repo.len().await, 0);
    }
}
