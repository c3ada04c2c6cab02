//! DAO for external integrations (spec.md §4.10, e.g. S3).

use crate::models::{IntegrationLogRow, IntegrationRow};
use crate::store::StateStore;
use kernel_core::KernelError;

#[derive(Clone)]
pub struct IntegrationDao {
    store: StateStore,
}

impl IntegrationDao {
    pub fn new(store: StateStore) -> Self {
        Self { store }
    }

    pub async fn register(&self, row: &IntegrationRow) -> Result<(), KernelError> {
        let _g = self.store.begin_write();
        sqlx::query(
            "INSERT INTO integrations (id, integration_type, name, encrypted_credentials, status, available_actions) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&row.id)
        .bind(&row.integration_type)
        .bind(&row.name)
        .bind(&row.encrypted_credentials)
        .bind(&row.status)
        .bind(&row.available_actions)
        .execute(&self.store.pool)
        .await
        .map_err(|e| KernelError::Internal(e.to_string()))?;
        Ok(())
    }

    pub async fn get(&self, id: &str) -> Result<Option<IntegrationRow>, KernelError> {
        sqlx::query_as::<_, IntegrationRow>("SELECT * FROM integrations WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.store.pool)
            .await
            .map_err(|e| KernelError::Internal(e.to_string()))
    }

    pub async fn set_status(&self, id: &str, status: &str) -> Result<(), KernelError> {
        let _g = self.store.begin_write();
        sqlx::query("UPDATE integrations SET status = ? WHERE id = ?")
            .bind(status)
            .bind(id)
            .execute(&self.store.pool)
            .await
            .map_err(|e| KernelError::Internal(e.to_string()))?;
        Ok(())
    }

    pub async fn append_log(&self, row: &IntegrationLogRow) -> Result<(), KernelError> {
        let _g = self.store.begin_write();
        sqlx::query(
            "INSERT INTO integration_logs (integration_id, action, status, message, timestamp) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&row.integration_id)
        .bind(&row.action)
        .bind(&row.status)
        .bind(&row.message)
        .bind(row.timestamp)
        .execute(&self.store.pool)
        .await
        .map_err(|e| KernelError::Internal(e.to_string()))?;
        Ok(())
    }

    pub async fn get_logs(&self, id: &str) -> Result<Vec<IntegrationLogRow>, KernelError> {
        sqlx::query_as::<_, IntegrationLogRow>(
            "SELECT * FROM integration_logs WHERE integration_id = ? ORDER BY id",
        )
        .bind(id)
        .fetch_all(&self.store.pool)
        .await
        .map_err(|e| KernelError::Internal(e.to_string()))
    }
}
