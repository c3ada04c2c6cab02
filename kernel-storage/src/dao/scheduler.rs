//! DAOs for cron jobs and event triggers (spec.md §4.9).

use crate::models::{CronJobRow, EventTriggerRow};
use crate::store::StateStore;
use chrono::{DateTime, Utc};
use kernel_core::KernelError;

#[derive(Clone)]
pub struct SchedulerDao {
    store: StateStore,
}

impl SchedulerDao {
    pub fn new(store: StateStore) -> Self {
        Self { store }
    }

    pub async fn insert_cron(&self, row: &CronJobRow) -> Result<(), KernelError> {
        let _g = self.store.begin_write();
        sqlx::query(
            "INSERT INTO cron_jobs (id, name, cron_expression, agent_config, enabled, owner_uid, last_run, next_run) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&row.id)
        .bind(&row.name)
        .bind(&row.cron_expression)
        .bind(&row.agent_config)
        .bind(row.enabled)
        .bind(&row.owner_uid)
        .bind(row.last_run)
        .bind(row.next_run)
        .execute(&self.store.pool)
        .await
        .map_err(|e| KernelError::Internal(e.to_string()))?;
        Ok(())
    }

    pub async fn delete_cron(&self, id: &str) -> Result<(), KernelError> {
        let _g = self.store.begin_write();
        sqlx::query("DELETE FROM cron_jobs WHERE id = ?")
            .bind(id)
            .execute(&self.store.pool)
            .await
            .map_err(|e| KernelError::Internal(e.to_string()))?;
        Ok(())
    }

    pub async fn set_cron_enabled(&self, id: &str, enabled: bool) -> Result<(), KernelError> {
        let _g = self.store.begin_write();
        sqlx::query("UPDATE cron_jobs SET enabled = ? WHERE id = ?")
            .bind(enabled)
            .bind(id)
            .execute(&self.store.pool)
            .await
            .map_err(|e| KernelError::Internal(e.to_string()))?;
        Ok(())
    }

    pub async fn record_cron_run(&self, id: &str, last_run: DateTime<Utc>, next_run: Option<DateTime<Utc>>) -> Result<(), KernelError> {
        let _g = self.store.begin_write();
        sqlx::query("UPDATE cron_jobs SET last_run = ?, next_run = ? WHERE id = ?")
            .bind(last_run)
            .bind(next_run)
            .bind(id)
            .execute(&self.store.pool)
            .await
            .map_err(|e| KernelError::Internal(e.to_string()))?;
        Ok(())
    }

    pub async fn list_cron(&self) -> Result<Vec<CronJobRow>, KernelError> {
        sqlx::query_as::<_, CronJobRow>("SELECT * FROM cron_jobs")
            .fetch_all(&self.store.pool)
            .await
            .map_err(|e| KernelError::Internal(e.to_string()))
    }

    pub async fn insert_trigger(&self, row: &EventTriggerRow) -> Result<(), KernelError> {
        let _g = self.store.begin_write();
        sqlx::query(
            "INSERT INTO event_triggers (id, name, event_type, event_filter, cooldown_ms, last_fired_at, agent_config, owner_uid) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&row.id)
        .bind(&row.name)
        .bind(&row.event_type)
        .bind(&row.event_filter)
        .bind(row.cooldown_ms)
        .bind(row.last_fired_at)
        .bind(&row.agent_config)
        .bind(&row.owner_uid)
        .execute(&self.store.pool)
        .await
        .map_err(|e| KernelError::Internal(e.to_string()))?;
        Ok(())
    }

    pub async fn delete_trigger(&self, id: &str) -> Result<(), KernelError> {
        let _g = self.store.begin_write();
        sqlx::query("DELETE FROM event_triggers WHERE id = ?")
            .bind(id)
            .execute(&self.store.pool)
            .await
            .map_err(|e| KernelError::Internal(e.to_string()))?;
        Ok(())
    }

    pub async fn record_trigger_fire(&self, id: &str, fired_at: DateTime<Utc>) -> Result<(), KernelError> {
        let _g = self.store.begin_write();
        sqlx::query("UPDATE event_triggers SET last_fired_at = ? WHERE id = ?")
            .bind(fired_at)
            .bind(id)
            .execute(&self.store.pool)
            .await
            .map_err(|e| KernelError::Internal(e.to_string()))?;
        Ok(())
    }

    pub async fn list_triggers(&self) -> Result<Vec<EventTriggerRow>, KernelError> {
        sqlx::query_as::<_, EventTriggerRow>("SELECT * FROM event_triggers")
            .fetch_all(&self.store.pool)
            .await
            .map_err(|e| KernelError::Internal(e.to_string()))
    }
}
