//! DAOs for process records and agent logs.

use crate::models::{AgentLogRow, ProcessRow};
use crate::store::StateStore;
use kernel_core::KernelError;

#[derive(Clone)]
pub struct ProcessDao {
    store: StateStore,
}

impl ProcessDao {
    pub fn new(store: StateStore) -> Self {
        Self { store }
    }

    pub async fn insert_process(&self, row: &ProcessRow) -> Result<(), KernelError> {
        let _g = self.store.begin_write();
        sqlx::query(
            "INSERT INTO processes (pid, ppid, uid, owner_uid, name, role, goal, state, \
             agent_phase, cwd, env, exit_code, created_at, exited_at, tty_id, sandbox_config) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(row.pid)
        .bind(row.ppid)
        .bind(&row.uid)
        .bind(&row.owner_uid)
        .bind(&row.name)
        .bind(&row.role)
        .bind(&row.goal)
        .bind(&row.state)
        .bind(&row.agent_phase)
        .bind(&row.cwd)
        .bind(&row.env)
        .bind(row.exit_code)
        .bind(row.created_at)
        .bind(row.exited_at)
        .bind(&row.tty_id)
        .bind(&row.sandbox_config)
        .execute(&self.store.pool)
        .await
        .map_err(|e| KernelError::Internal(e.to_string()))?;
        Ok(())
    }

    pub async fn set_tty(&self, pid: i64, tty_id: &str) -> Result<(), KernelError> {
        let _g = self.store.begin_write();
        sqlx::query("UPDATE processes SET tty_id = ? WHERE pid = ?")
            .bind(tty_id)
            .bind(pid)
            .execute(&self.store.pool)
            .await
            .map_err(|e| KernelError::Internal(e.to_string()))?;
        Ok(())
    }

    pub async fn update_state(&self, pid: i64, state: &str, agent_phase: &str) -> Result<(), KernelError> {
        let _g = self.store.begin_write();
        sqlx::query("UPDATE processes SET state = ?, agent_phase = ? WHERE pid = ?")
            .bind(state)
            .bind(agent_phase)
            .bind(pid)
            .execute(&self.store.pool)
            .await
            .map_err(|e| KernelError::Internal(e.to_string()))?;
        Ok(())
    }

    pub async fn mark_exited(&self, pid: i64, exit_code: i32, exited_at: chrono::DateTime<chrono::Utc>) -> Result<(), KernelError> {
        let _g = self.store.begin_write();
        sqlx::query(
            "UPDATE processes SET state = 'zombie', exit_code = ?, exited_at = ? WHERE pid = ?",
        )
        .bind(exit_code as i64)
        .bind(exited_at)
        .bind(pid)
        .execute(&self.store.pool)
        .await
        .map_err(|e| KernelError::Internal(e.to_string()))?;
        Ok(())
    }

    pub async fn mark_reaped(&self, pid: i64) -> Result<(), KernelError> {
        let _g = self.store.begin_write();
        sqlx::query("UPDATE processes SET state = 'dead' WHERE pid = ?")
            .bind(pid)
            .execute(&self.store.pool)
            .await
            .map_err(|e| KernelError::Internal(e.to_string()))?;
        Ok(())
    }

    pub async fn get_process(&self, pid: i64) -> Result<Option<ProcessRow>, KernelError> {
        sqlx::query_as::<_, ProcessRow>("SELECT * FROM processes WHERE pid = ?")
            .bind(pid)
            .fetch_optional(&self.store.pool)
            .await
            .map_err(|e| KernelError::Internal(e.to_string()))
    }

    pub async fn get_all_processes(&self) -> Result<Vec<ProcessRow>, KernelError> {
        sqlx::query_as::<_, ProcessRow>("SELECT * FROM processes ORDER BY pid")
            .fetch_all(&self.store.pool)
            .await
            .map_err(|e| KernelError::Internal(e.to_string()))
    }

    pub async fn max_pid(&self) -> Result<Option<i64>, KernelError> {
        let (max,): (Option<i64>,) = sqlx::query_as("SELECT max(pid) FROM processes")
            .fetch_one(&self.store.pool)
            .await
            .map_err(|e| KernelError::Internal(e.to_string()))?;
        Ok(max)
    }

    pub async fn append_log(&self, row: &AgentLogRow) -> Result<(), KernelError> {
        let _g = self.store.begin_write();
        sqlx::query(
            "INSERT INTO agent_logs (pid, step, phase, tool, content, timestamp) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(row.pid)
        .bind(row.step)
        .bind(&row.phase)
        .bind(&row.tool)
        .bind(&row.content)
        .bind(row.timestamp)
        .execute(&self.store.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                KernelError::conflict(format!("duplicate step {} for pid {}", row.step, row.pid))
            }
            other => KernelError::Internal(other.to_string()),
        })?;
        Ok(())
    }

    pub async fn get_agent_logs(&self, pid: i64) -> Result<Vec<AgentLogRow>, KernelError> {
        sqlx::query_as::<_, AgentLogRow>(
            "SELECT * FROM agent_logs WHERE pid = ? ORDER BY step",
        )
        .bind(pid)
        .fetch_all(&self.store.pool)
        .await
        .map_err(|e| KernelError::Internal(e.to_string()))
    }

    pub async fn max_step(&self, pid: i64) -> Result<i64, KernelError> {
        let (max,): (Option<i64>,) = sqlx::query_as("SELECT max(step) FROM agent_logs WHERE pid = ?")
            .bind(pid)
            .fetch_one(&self.store.pool)
            .await
            .map_err(|e| KernelError::Internal(e.to_string()))?;
        Ok(max.unwrap_or(0))
    }
}
