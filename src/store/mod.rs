mod memory;
mod scylla_store;

pub use memory::InMemoryOrderRepository;
pub use scylla_store::ScyllaOrderRepository;

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::order::ServiceOrderAggregate;

// ============================================================================
// Order Repository - persistence seam for the whole aggregate
// ============================================================================
//
// A save writes order, payments, assignments and history together or not at
// all. `expected_version` is the version the caller loaded (0 for a new
// order); a mismatch means another writer got there first.
//
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("service order {0} not found")]
    NotFound(Uuid),

    #[error("concurrency conflict: expected version {expected}, found {actual}")]
    ConcurrencyConflict { expected: i64, actual: i64 },

    #[error("storage backend error: {0}")]
    Backend(String),

    #[error("snapshot serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[async_trait]
pub trait OrderRepository: Send + Sync {
    async fn load(&self, order_id: Uuid) -> Result<ServiceOrderAggregate, StoreError>;

    /// Persist the aggregate atomically and return the new version
    async fn save(&self, aggregate: &ServiceOrderAggregate, expected_version: i64) -> Result<i64, StoreError>;

    /// Next value of the per-prefix order number counter, starting at 1
    async fn next_order_sequence(&self, prefix: &str) -> Result<u64, StoreError>;

    /// Remove the aggregate with everything it owns
    async fn delete(&self, order_id: Uuid) -> Result<(), StoreError>;
}
