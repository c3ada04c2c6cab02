//! DAO for `MemoryRecord` — episodic/semantic/procedural agent memories.

use crate::models::MemoryRecordRow;
use crate::store::StateStore;
use kernel_core::KernelError;

#[derive(Clone)]
pub struct MemoryDao {
    store: StateStore,
}

impl MemoryDao {
    pub fn new(store: StateStore) -> Self {
        Self { store }
    }

    pub async fn insert(&self, row: &MemoryRecordRow) -> Result<(), KernelError> {
        let _g = self.store.begin_write();
        sqlx::query(
            "INSERT INTO memory_records (id, agent_uid, layer, content, tags, importance, source_pid, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&row.id)
        .bind(&row.agent_uid)
        .bind(&row.layer)
        .bind(&row.content)
        .bind(&row.tags)
        .bind(row.importance)
        .bind(row.source_pid)
        .bind(row.created_at)
        .execute(&self.store.pool)
        .await
        .map_err(|e| KernelError::Internal(e.to_string()))?;
        Ok(())
    }

    pub async fn recall(&self, agent_uid: &str, layer: Option<&str>, limit: i64) -> Result<Vec<MemoryRecordRow>, KernelError> {
        let rows = match layer {
            Some(layer) => {
                sqlx::query_as::<_, MemoryRecordRow>(
                    "SELECT * FROM memory_records WHERE agent_uid = ? AND layer = ? \
                     ORDER BY importance DESC, created_at DESC LIMIT ?",
                )
                .bind(agent_uid)
                .bind(layer)
                .bind(limit)
                .fetch_all(&self.store.pool)
                .await
            }
            None => {
                sqlx::query_as::<_, MemoryRecordRow>(
                    "SELECT * FROM memory_records WHERE agent_uid = ? \
                     ORDER BY importance DESC, created_at DESC LIMIT ?",
                )
                .bind(agent_uid)
                .bind(limit)
                .fetch_all(&self.store.pool)
                .await
            }
        };
        rows.map_err(|e| KernelError::Internal(e.to_string()))
    }
}
