use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use scylla::client::session::Session;
use scylla::client::session_builder::SessionBuilder;
use scylla::response::query_result::QueryResult;
use scylla::value::{CqlValue, Row};
use uuid::Uuid;

use super::{OrderRepository, StoreError};
use crate::domain::order::ServiceOrderAggregate;

const MAX_SEQUENCE_ATTEMPTS: u32 = 16;

// ============================================================================
// ScyllaDB Order Repository
// ============================================================================
//
// One row per aggregate holding the JSON snapshot. Writes are lightweight
// transactions:
// - new order:      INSERT ... IF NOT EXISTS
// - existing order: UPDATE ... IF version = <expected>
// Order number counters are compare-and-set on a per-prefix row.
//
// ============================================================================

pub struct ScyllaOrderRepository {
    session: Arc<Session>,
}

impl ScyllaOrderRepository {
    pub fn new(session: Arc<Session>) -> Self {
        Self { session }
    }

    /// Connect, create the keyspace and tables if needed
    pub async fn connect(node: &str, keyspace: &str) -> anyhow::Result<Self> {
        tracing::info!(node, keyspace, "Connecting to ScyllaDB");
        let session: Session = SessionBuilder::new().known_node(node).build().await?;

        session
            .query_unpaged(
                format!(
                    "CREATE KEYSPACE IF NOT EXISTS {} WITH REPLICATION = \
                     {{'class': 'SimpleStrategy', 'replication_factor': 1}}",
                    keyspace
                ),
                &[],
            )
            .await?;
        session.use_keyspace(keyspace, false).await?;

        let repository = Self::new(Arc::new(session));
        repository.ensure_schema().await?;
        Ok(repository)
    }

    pub async fn ensure_schema(&self) -> anyhow::Result<()> {
        self.session
            .query_unpaged(
                "CREATE TABLE IF NOT EXISTS service_orders (
                    id uuid PRIMARY KEY,
                    order_number text,
                    status text,
                    version bigint,
                    aggregate text,
                    updated_at timestamp
                )",
                &[],
            )
            .await?;

        self.session
            .query_unpaged(
                "CREATE TABLE IF NOT EXISTS order_sequences (
                    prefix text PRIMARY KEY,
                    current bigint
                )",
                &[],
            )
            .await?;

        tracing::info!("Service order schema ready");
        Ok(())
    }

    async fn current_version(&self, order_id: Uuid) -> Result<Option<i64>, StoreError> {
        let result = self
            .session
            .query_unpaged("SELECT version FROM service_orders WHERE id = ?", (order_id,))
            .await
            .map_err(backend)?;

        let rows = result.into_rows_result().map_err(backend)?;
        let version = rows.maybe_first_row::<(i64,)>().map_err(backend)?;
        Ok(version.map(|(version,)| version))
    }

    async fn current_sequence(&self, prefix: &str) -> Result<Option<i64>, StoreError> {
        let result = self
            .session
            .query_unpaged("SELECT current FROM order_sequences WHERE prefix = ?", (prefix,))
            .await
            .map_err(backend)?;

        let rows = result.into_rows_result().map_err(backend)?;
        let current = rows.maybe_first_row::<(i64,)>().map_err(backend)?;
        Ok(current.map(|(current,)| current))
    }
}

#[async_trait]
impl OrderRepository for ScyllaOrderRepository {
    async fn load(&self, order_id: Uuid) -> Result<ServiceOrderAggregate, StoreError> {
        let result = self
            .session
            .query_unpaged("SELECT aggregate, version FROM service_orders WHERE id = ?", (order_id,))
            .await
            .map_err(backend)?;

        let rows = result.into_rows_result().map_err(backend)?;
        let (snapshot, version) = rows
            .maybe_first_row::<(String, i64)>()
            .map_err(backend)?
            .ok_or(StoreError::NotFound(order_id))?;

        let mut aggregate: ServiceOrderAggregate = serde_json::from_str(&snapshot)?;
        aggregate.version = version;
        Ok(aggregate)
    }

    async fn save(&self, aggregate: &ServiceOrderAggregate, expected_version: i64) -> Result<i64, StoreError> {
        let order_id = aggregate.order.id;
        let new_version = expected_version + 1;

        let mut snapshot = aggregate.clone();
        snapshot.version = new_version;
        let json = serde_json::to_string(&snapshot)?;

        let result = if expected_version == 0 {
            self.session
                .query_unpaged(
                    "INSERT INTO service_orders (id, order_number, status, version, aggregate, updated_at) \
                     VALUES (?, ?, ?, ?, ?, ?) IF NOT EXISTS",
                    (
                        order_id,
                        aggregate.order.order_number.as_str(),
                        aggregate.order.status.as_str(),
                        new_version,
                        json.as_str(),
                        Utc::now(),
                    ),
                )
                .await
        } else {
            self.session
                .query_unpaged(
                    "UPDATE service_orders SET order_number = ?, status = ?, version = ?, aggregate = ?, updated_at = ? \
                     WHERE id = ? IF version = ?",
                    (
                        aggregate.order.order_number.as_str(),
                        aggregate.order.status.as_str(),
                        new_version,
                        json.as_str(),
                        Utc::now(),
                        order_id,
                        expected_version,
                    ),
                )
                .await
        };
        let result = result.map_err(backend)?;

        if !lwt_applied(result)? {
            let actual = self.current_version(order_id).await?.unwrap_or(0);
            tracing::warn!(order_id = %order_id, expected_version, actual, "Snapshot write rejected");
            return Err(StoreError::ConcurrencyConflict { expected: expected_version, actual });
        }

        tracing::debug!(order_id = %order_id, new_version, "Saved service order snapshot");
        Ok(new_version)
    }

    async fn next_order_sequence(&self, prefix: &str) -> Result<u64, StoreError> {
        for attempt in 1..=MAX_SEQUENCE_ATTEMPTS {
            let result = match self.current_sequence(prefix).await? {
                None => {
                    self.session
                        .query_unpaged(
                            "INSERT INTO order_sequences (prefix, current) VALUES (?, ?) IF NOT EXISTS",
                            (prefix, 1_i64),
                        )
                        .await
                        .map(|result| (result, 1_i64))
                }
                Some(current) => {
                    self.session
                        .query_unpaged(
                            "UPDATE order_sequences SET current = ? WHERE prefix = ? IF current = ?",
                            (current + 1, prefix, current),
                        )
                        .await
                        .map(|result| (result, current + 1))
                }
            };

            let (result, next) = result.map_err(backend)?;
            if lwt_applied(result)? {
                return Ok(next as u64);
            }
            tracing::debug!(prefix, attempt, "Order sequence contended, retrying");
        }

        Err(StoreError::Backend(format!(
            "could not allocate an order number for {} after {} attempts",
            prefix, MAX_SEQUENCE_ATTEMPTS
        )))
    }

    async fn delete(&self, order_id: Uuid) -> Result<(), StoreError> {
        let result = self
            .session
            .query_unpaged("DELETE FROM service_orders WHERE id = ? IF EXISTS", (order_id,))
            .await
            .map_err(backend)?;

        if !lwt_applied(result)? {
            return Err(StoreError::NotFound(order_id));
        }
        tracing::info!(order_id = %order_id, "Deleted service order");
        Ok(())
    }
}

fn backend(err: impl std::fmt::Display) -> StoreError {
    StoreError::Backend(err.to_string())
}

fn lwt_applied(result: QueryResult) -> Result<bool, StoreError> {
    let rows = result.into_rows_result().map_err(backend)?;
    let row = rows.maybe_first_row::<Row>().map_err(backend)?;
    applied_flag(row)
}

/// The first column of a conditional write's result is `[applied]`
fn applied_flag(row: Option<Row>) -> Result<bool, StoreError> {
    match row.and_then(|row| row.columns.into_iter().next().flatten()) {
        Some(CqlValue::Boolean(applied)) => Ok(applied),
        other => Err(StoreError::Backend(format!("unexpected conditional write result: {:?}", other))),
    }
}
