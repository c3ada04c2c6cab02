//! DAO for `KernelMetric` samples (spec.md §3, §4.4 resource accounting).

use crate::models::KernelMetricRow;
use crate::store::StateStore;
use kernel_core::KernelError;

#[derive(Clone)]
pub struct MetricDao {
    store: StateStore,
}

impl MetricDao {
    pub fn new(store: StateStore) -> Self {
        Self { store }
    }

    pub async fn record_metric(&self, row: &KernelMetricRow) -> Result<(), KernelError> {
        let _g = self.store.begin_write();
        sqlx::query(
            "INSERT INTO kernel_metrics (timestamp, process_count, cpu_percent, memory_mb, container_count) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(row.timestamp)
        .bind(row.process_count)
        .bind(row.cpu_percent)
        .bind(row.memory_mb)
        .bind(row.container_count)
        .execute(&self.store.pool)
        .await
        .map_err(|e| KernelError::Internal(e.to_string()))?;
        Ok(())
    }

    pub async fn recent(&self, limit: i64) -> Result<Vec<KernelMetricRow>, KernelError> {
        sqlx::query_as::<_, KernelMetricRow>(
            "SELECT * FROM kernel_metrics ORDER BY id DESC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.store.pool)
        .await
        .map_err(|e| KernelError::Internal(e.to_string()))
    }
}
