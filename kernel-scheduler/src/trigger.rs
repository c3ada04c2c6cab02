//! `EventTrigger`: bus-subscribed agent spawning on a shallow filter match
//! plus a cooldown (spec.md §4.9).

use chrono::Utc;
use kernel_core::{EventBus, EventEnvelope, KernelError, Result};
use kernel_process::{ProcessConfig, ProcessManager};
use kernel_storage::{EventTriggerRow, SchedulerDao};
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, serde::Deserialize)]
pub struct EventTriggerSpec {
    pub name: String,
    pub event_type: String,
    #[serde(default = "default_filter")]
    pub event_filter: Value,
    pub cooldown_ms: i64,
    pub agent_config: Value,
    pub owner_uid: String,
}

fn default_filter() -> Value {
    Value::Object(Default::default())
}

/// `filter`'s keys must all be present in `data` with equal values
/// (spec.md's "shallow key/value subset match" — nested objects compare
/// by equality, not recursively).
fn matches_filter(filter: &Value, data: &Value) -> bool {
    let Some(filter_obj) = filter.as_object() else { return true };
    let Some(data_obj) = data.as_object() else { return filter_obj.is_empty() };
    filter_obj.iter().all(|(k, v)| data_obj.get(k) == Some(v))
}

pub struct TriggerEngine {
    dao: SchedulerDao,
    process_manager: Arc<ProcessManager>,
    bus: Arc<EventBus>,
}

impl TriggerEngine {
    pub fn new(dao: SchedulerDao, process_manager: Arc<ProcessManager>, bus: Arc<EventBus>) -> Arc<Self> {
        Arc::new(Self { dao, process_manager, bus })
    }

    pub async fn create(&self, spec: EventTriggerSpec) -> Result<EventTriggerRow> {
        let row = EventTriggerRow {
            id: Uuid::new_v4().to_string(),
            name: spec.name,
            event_type: spec.event_type,
            event_filter: serde_json::to_string(&spec.event_filter).map_err(|e| KernelError::Internal(e.to_string()))?,
            cooldown_ms: spec.cooldown_ms,
            last_fired_at: None,
            agent_config: serde_json::to_string(&spec.agent_config).map_err(|e| KernelError::Internal(e.to_string()))?,
            owner_uid: spec.owner_uid,
        };
        self.dao.insert_trigger(&row).await?;
        Ok(row)
    }

    pub async fn delete(&self, id: &str) -> Result<()> {
        self.dao.delete_trigger(id).await
    }

    pub async fn list(&self) -> Result<Vec<EventTriggerRow>> {
        self.dao.list_triggers().await
    }

    /// Subscribes to every bus event; per-trigger `event_type` filtering
    /// happens inside the handler. Returns the subscription handle so the
    /// caller can unsubscribe at shutdown.
    pub fn start(self: &Arc<Self>) -> kernel_core::Unsubscribe {
        let this = self.clone();
        self.bus.on(move |envelope| {
            let this = this.clone();
            let envelope = envelope.clone();
            // Handlers must stay synchronous (EventBus contract); hand off
            // to a task rather than await inline.
            tokio::spawn(async move {
                if let Err(e) = this.handle_event(envelope).await {
                    warn!(error = %e, "event trigger handling failed");
                }
            });
        })
    }

    async fn handle_event(&self, envelope: EventEnvelope) -> Result<()> {
        let event_type = envelope.event.wire_name();
        let serialized = serde_json::to_value(&envelope.event).map_err(|e| KernelError::Internal(e.to_string()))?;
        let data = serialized.get("data").cloned().unwrap_or(Value::Null);
        let now = Utc::now();

        for row in self.dao.list_triggers().await? {
            if row.event_type != event_type {
                continue;
            }
            let filter: Value = serde_json::from_str(&row.event_filter).unwrap_or(Value::Null);
            if !matches_filter(&filter, &data) {
                continue;
            }
            if let Some(last_fired) = row.last_fired_at {
                let elapsed = (now - last_fired).num_milliseconds();
                if elapsed < row.cooldown_ms {
                    continue;
                }
            }

            let config: ProcessConfig = match serde_json::from_str(&row.agent_config) {
                Ok(c) => c,
                Err(e) => {
                    warn!(trigger = %row.name, error = %e, "trigger has invalid agent_config, skipping");
                    continue;
                }
            };
            let pid = self.process_manager.spawn(config, None, &row.owner_uid, &row.owner_uid).await?;
            self.dao.record_trigger_fire(&row.id, now).await?;
            info!(trigger = %row.name, pid = %pid, "event trigger fired");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_filter_matches_anything() {
        assert!(matches_filter(&serde_json::json!({}), &serde_json::json!({"pid": 1})));
    }

    #[test]
    fn subset_match_ignores_extra_fields() {
        let filter = serde_json::json!({"owner_uid": "u1"});
        let data = serde_json::json!({"owner_uid": "u1", "name": "worker"});
        assert!(matches_filter(&filter, &data));
    }

    #[test]
    fn mismatched_value_does_not_match() {
        let filter = serde_json::json!({"owner_uid": "u1"});
        let data = serde_json::json!({"owner_uid": "u2"});
        assert!(!matches_filter(&filter, &data));
    }

    #[test]
    fn missing_key_does_not_match() {
        let filter = serde_json::json!({"owner_uid": "u1"});
        let data = serde_json::json!({"name": "worker"});
        assert!(!matches_filter(&filter, &data));
    }
}
