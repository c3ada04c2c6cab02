//! DAO for IPC mailbox messages (spec.md §3 `IPCMessage`).
//!
//! The live mailbox is in-memory inside `kernel-process`; this table is a
//! durable audit trail, written alongside each send so a restart can at
//! least show what was in flight.

use crate::models::IpcMessageRow;
use crate::store::StateStore;
use kernel_core::KernelError;

#[derive(Clone)]
pub struct IpcDao {
    store: StateStore,
}

impl IpcDao {
    pub fn new(store: StateStore) -> Self {
        Self { store }
    }

    pub async fn record(&self, row: &IpcMessageRow) -> Result<i64, KernelError> {
        let _g = self.store.begin_write();
        let result = sqlx::query(
            "INSERT INTO ipc_messages (from_pid, to_pid, channel, payload, timestamp, delivered) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(row.from_pid)
        .bind(row.to_pid)
        .bind(&row.channel)
        .bind(&row.payload)
        .bind(row.timestamp)
        .bind(row.delivered)
        .execute(&self.store.pool)
        .await
        .map_err(|e| KernelError::Internal(e.to_string()))?;
        Ok(result.last_insert_rowid())
    }

    pub async fn mark_delivered(&self, id: i64) -> Result<(), KernelError> {
        let _g = self.store.begin_write();
        sqlx::query("UPDATE ipc_messages SET delivered = 1 WHERE id = ?")
            .bind(id)
            .execute(&self.store.pool)
            .await
            .map_err(|e| KernelError::Internal(e.to_string()))?;
        Ok(())
    }

    pub async fn undelivered_for(&self, to_pid: i64) -> Result<Vec<IpcMessageRow>, KernelError> {
        sqlx::query_as::<_, IpcMessageRow>(
            "SELECT * FROM ipc_messages WHERE to_pid = ? AND delivered = 0 ORDER BY id",
        )
        .bind(to_pid)
        .fetch_all(&self.store.pool)
        .await
        .map_err(|e| KernelError::Internal(e.to_string()))
    }
}
