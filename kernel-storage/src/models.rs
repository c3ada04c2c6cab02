//! Row types returned by the DAOs. These are the durable shapes of the
//! entities in spec.md §3; wire/runtime types in other crates convert to and
//! from these at their boundary rather than deriving `sqlx::FromRow`
//! themselves, keeping `sqlx` out of every crate but this one.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct UserRow {
    pub id: String,
    pub username: String,
    pub password_hash: String,
    pub display_name: String,
    pub role: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct TokenRow {
    pub token: String,
    pub user_id: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct OrgRow {
    pub id: String,
    pub name: String,
    pub display_name: String,
    pub owner_uid: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct OrgMemberRow {
    pub org_id: String,
    pub user_id: String,
    pub role: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct TeamRow {
    pub id: String,
    pub org_id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ProcessRow {
    pub pid: i64,
    pub ppid: Option<i64>,
    pub uid: String,
    pub owner_uid: String,
    pub name: String,
    pub role: String,
    pub goal: String,
    pub state: String,
    pub agent_phase: String,
    pub cwd: String,
    pub env: String,
    pub exit_code: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub exited_at: Option<DateTime<Utc>>,
    pub tty_id: Option<String>,
    pub sandbox_config: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct AgentLogRow {
    pub id: i64,
    pub pid: i64,
    pub step: i64,
    pub phase: String,
    pub tool: Option<String>,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct FileMetaRow {
    pub path: String,
    pub owner_uid: String,
    pub file_type: String,
    pub size: i64,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
    pub hidden: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct KernelMetricRow {
    pub id: i64,
    pub timestamp: DateTime<Utc>,
    pub process_count: i64,
    pub cpu_percent: f64,
    pub memory_mb: f64,
    pub container_count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct PluginRow {
    pub id: String,
    pub owner_uid: String,
    pub manifest: String,
    pub install_source: String,
    pub installed_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct McpServerRow {
    pub id: String,
    pub name: String,
    pub transport: String,
    pub connection_spec: String,
    pub auto_connect: bool,
    pub enabled: bool,
    pub cached_tools: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct OpenClawImportRow {
    pub skill_id: String,
    pub serialized_skill: String,
    pub dependencies_met: bool,
    pub source_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct IntegrationRow {
    pub id: String,
    pub integration_type: String,
    pub name: String,
    pub encrypted_credentials: String,
    pub status: String,
    pub available_actions: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct IntegrationLogRow {
    pub id: i64,
    pub integration_id: String,
    pub action: String,
    pub status: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct CronJobRow {
    pub id: String,
    pub name: String,
    pub cron_expression: String,
    pub agent_config: String,
    pub enabled: bool,
    pub owner_uid: String,
    pub last_run: Option<DateTime<Utc>>,
    pub next_run: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct EventTriggerRow {
    pub id: String,
    pub name: String,
    pub event_type: String,
    pub event_filter: String,
    pub cooldown_ms: i64,
    pub last_fired_at: Option<DateTime<Utc>>,
    pub agent_config: String,
    pub owner_uid: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct IpcMessageRow {
    pub id: i64,
    pub from_pid: i64,
    pub to_pid: i64,
    pub channel: String,
    pub payload: String,
    pub timestamp: DateTime<Utc>,
    pub delivered: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct MemoryRecordRow {
    pub id: String,
    pub agent_uid: String,
    pub layer: String,
    pub content: String,
    pub tags: String,
    pub importance: f64,
    pub source_pid: Option<i64>,
    pub created_at: DateTime<Utc>,
}
