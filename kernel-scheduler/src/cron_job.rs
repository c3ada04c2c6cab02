//! `CronJob` scheduling: a single monotonic ticker drives every job's
//! due-check (spec.md §4.9's "single monotonic ticker (1s) advances all
//! jobs").

use chrono::{DateTime, Utc};
use cron::Schedule;
use dashmap::DashMap;
use kernel_core::domain::ProcessState;
use kernel_core::{KernelError, Pid, Result};
use kernel_process::{ProcessConfig, ProcessManager};
use kernel_storage::{CronJobRow, SchedulerDao};
use serde::Deserialize;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Deserialize)]
pub struct CronJobSpec {
    pub name: String,
    pub cron_expression: String,
    pub agent_config: serde_json::Value,
    pub owner_uid: String,
}

/// Parses a standard 5-field cron expression (`min hour dom month dow`) by
/// prepending a `0` seconds field, since the `cron` crate's own syntax
/// includes seconds.
fn parse_schedule(expr: &str) -> Result<Schedule> {
    let six_field = format!("0 {expr}");
    Schedule::from_str(&six_field).map_err(|e| KernelError::invalid_argument(format!("invalid cron expression '{expr}': {e}")))
}

fn next_run_after(expr: &str, after: DateTime<Utc>) -> Result<Option<DateTime<Utc>>> {
    Ok(parse_schedule(expr)?.after(&after).next())
}

pub struct CronScheduler {
    dao: SchedulerDao,
    process_manager: Arc<ProcessManager>,
    /// Job id -> pid of its still-outstanding run, if any (spec.md §4.9:
    /// "one outstanding run per job; if the previous run is still live,
    /// the fire is skipped and logged").
    running: DashMap<String, Pid>,
}

impl CronScheduler {
    pub fn new(dao: SchedulerDao, process_manager: Arc<ProcessManager>) -> Self {
        Self { dao, process_manager, running: DashMap::new() }
    }

    pub async fn create(&self, spec: CronJobSpec) -> Result<CronJobRow> {
        let next_run = next_run_after(&spec.cron_expression, Utc::now())?;
        let row = CronJobRow {
            id: Uuid::new_v4().to_string(),
            name: spec.name,
            cron_expression: spec.cron_expression,
            agent_config: serde_json::to_string(&spec.agent_config).map_err(|e| KernelError::Internal(e.to_string()))?,
            enabled: true,
            owner_uid: spec.owner_uid,
            last_run: None,
            next_run,
        };
        self.dao.insert_cron(&row).await?;
        Ok(row)
    }

    pub async fn delete(&self, id: &str) -> Result<()> {
        self.running.remove(id);
        self.dao.delete_cron(id).await
    }

    pub async fn set_enabled(&self, id: &str, enabled: bool) -> Result<()> {
        self.dao.set_cron_enabled(id, enabled).await?;
        if enabled {
            if let Some(row) = self.dao.list_cron().await?.into_iter().find(|r| r.id == id) {
                let next_run = next_run_after(&row.cron_expression, Utc::now())?;
                self.dao.record_cron_run(id, row.last_run.unwrap_or_else(Utc::now), next_run).await?;
            }
        }
        Ok(())
    }

    pub async fn list(&self) -> Result<Vec<CronJobRow>> {
        self.dao.list_cron().await
    }

    /// Runs the 1s ticker forever. Intended to be spawned once at boot.
    pub async fn run(self: Arc<Self>) {
        let mut ticker = tokio::time::interval(Duration::from_secs(1));
        loop {
            ticker.tick().await;
            if let Err(e) = self.tick_once().await {
                warn!(error = %e, "cron tick failed");
            }
        }
    }

    async fn tick_once(&self) -> Result<()> {
        let now = Utc::now();
        for row in self.dao.list_cron().await? {
            if !row.enabled {
                continue;
            }
            let Some(next_run) = row.next_run else { continue };
            if next_run > now {
                continue;
            }
            self.fire(row, now).await?;
        }
        Ok(())
    }

    async fn fire(&self, row: CronJobRow, now: DateTime<Utc>) -> Result<()> {
        if let Some(entry) = self.running.get(&row.id) {
            let pid = *entry.value();
            drop(entry);
            if self.still_running(pid) {
                info!(job = %row.name, pid = %pid, "cron fire skipped: previous run still live");
                let next_run = next_run_after(&row.cron_expression, now)?;
                self.dao.record_cron_run(&row.id, row.last_run.unwrap_or(now), next_run).await?;
                return Ok(());
            }
            self.running.remove(&row.id);
        }

        let config: ProcessConfig = serde_json::from_str(&row.agent_config)
            .map_err(|e| KernelError::invalid_argument(format!("cron job '{}' has invalid agent_config: {e}", row.name)))?;
        let pid = self.process_manager.spawn(config, None, &row.owner_uid, &row.owner_uid).await?;
        self.running.insert(row.id.clone(), pid);

        let next_run = next_run_after(&row.cron_expression, now)?;
        self.dao.record_cron_run(&row.id, now, next_run).await?;
        info!(job = %row.name, pid = %pid, "cron job fired");
        Ok(())
    }

    fn still_running(&self, pid: Pid) -> bool {
        matches!(
            self.process_manager.state_of(pid),
            Ok(ProcessState::Running | ProcessState::Sleeping | ProcessState::Waiting | ProcessState::Stopped)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use kernel_core::EventBus;
    use kernel_process::{HistoryEntry, LanguageModel, ModelAction, ToolDescriptor};
    use kernel_sandbox::backend::{LocalPtyBackend, NullContainerBackend};
    use kernel_sandbox::PtyManager;
    use kernel_storage::Store;
    use kernel_tools::ToolRegistry;
    use tempfile::TempDir;

    /// Completes on its very first step, so fired jobs never stay "running".
    struct ImmediateModel;

    #[async_trait]
    impl LanguageModel for ImmediateModel {
        async fn next_action(&self, _goal: &str, _history: &[HistoryEntry], _tools: &[ToolDescriptor]) -> kernel_core::Result<ModelAction> {
            Ok(ModelAction::Complete { summary: "done".into() })
        }
    }

    async fn scheduler() -> (Arc<CronScheduler>, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = Store::open(&dir.path().join("test.db")).await.unwrap();
        let bus = EventBus::new();
        let pty = Arc::new(PtyManager::new(
            Arc::new(LocalPtyBackend::new("/bin/sh")),
            Arc::new(NullContainerBackend),
            bus.clone(),
        ));
        let tools = Arc::new(ToolRegistry::new());
        let model: Arc<dyn LanguageModel> = Arc::new(ImmediateModel);
        let process_manager = Arc::new(ProcessManager::new(store.process, store.ipc, store.metrics, bus, pty, tools, model));
        (Arc::new(CronScheduler::new(store.scheduler, process_manager)), dir)
    }

    fn basic_config() -> serde_json::Value {
        serde_json::json!({
            "name": "worker", "role": "assistant", "goal": "say hi", "cwd": "/", "env": {}, "sandbox": null, "agent": null
        })
    }

    #[tokio::test]
    async fn create_computes_next_run() {
        let (sched, _dir) = scheduler().await;
        let job = sched
            .create(CronJobSpec { name: "daily".into(), cron_expression: "0 0 * * *".into(), agent_config: basic_config(), owner_uid: "u1".into() })
            .await
            .unwrap();
        assert!(job.next_run.is_some());
    }

    #[tokio::test]
    async fn invalid_cron_expression_is_rejected() {
        let (sched, _dir) = scheduler().await;
        let err = sched
            .create(CronJobSpec { name: "bad".into(), cron_expression: "not a cron".into(), agent_config: basic_config(), owner_uid: "u1".into() })
            .await
            .unwrap_err();
        assert_eq!(err.wire_code(), "invalid_argument");
    }

    #[tokio::test]
    async fn due_job_fires_and_advances_next_run() {
        let (sched, _dir) = scheduler().await;
        let job = sched
            .create(CronJobSpec { name: "every-minute".into(), cron_expression: "* * * * *".into(), agent_config: basic_config(), owner_uid: "u1".into() })
            .await
            .unwrap();
        // Force it due immediately.
        sched.dao.record_cron_run(&job.id, Utc::now() - chrono::Duration::hours(1), Some(Utc::now() - chrono::Duration::seconds(1))).await.unwrap();

        sched.tick_once().await.unwrap();
        let rows = sched.list().await.unwrap();
        let updated = rows.into_iter().find(|r| r.id == job.id).unwrap();
        assert!(updated.last_run.is_some());
        assert!(updated.next_run.unwrap() > Utc::now());
    }
}
