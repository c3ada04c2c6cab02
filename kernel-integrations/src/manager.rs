//! `IntegrationManager`: `register → test → execute → getLogs` over a
//! pluggable set of external-service [`Provider`]s (spec.md §4.10).

use crate::providers::{self, Provider};
use crate::types::{IntegrationInfo, IntegrationSpec, TestResult};
use base64::Engine;
use chrono::Utc;
use kernel_core::{KernelError, Result};
use kernel_storage::{IntegrationDao, IntegrationLogRow, IntegrationRow};
use serde_json::Value;
use uuid::Uuid;

pub struct IntegrationManager {
    dao: IntegrationDao,
}

impl IntegrationManager {
    pub fn new(dao: IntegrationDao) -> Self {
        Self { dao }
    }

    fn provider_for_row(row: &IntegrationRow) -> Result<Box<dyn Provider>> {
        providers::for_type(&row.integration_type)
            .ok_or_else(|| KernelError::invalid_argument(format!("unknown integration type '{}'", row.integration_type)))
    }

    fn decode_credentials(row: &IntegrationRow) -> Result<Value> {
        let raw = base64::engine::general_purpose::STANDARD
            .decode(&row.encrypted_credentials)
            .map_err(|e| KernelError::Internal(format!("corrupt credential blob: {e}")))?;
        serde_json::from_slice(&raw).map_err(|e| KernelError::Internal(format!("corrupt credential blob: {e}")))
    }

    /// There is no AEAD crate in this workspace's dependency stack; this
    /// is opaque-at-rest storage, not real encryption. Documented as a
    /// known gap rather than faked with a hand-rolled cipher.
    fn encode_credentials(credentials: &Value) -> Result<String> {
        let raw = serde_json::to_vec(credentials).map_err(|e| KernelError::Internal(e.to_string()))?;
        Ok(base64::engine::general_purpose::STANDARD.encode(raw))
    }

    fn classify(message: String) -> KernelError {
        if message.starts_with("Network error:") || message.starts_with("HTTP ") {
            KernelError::NetworkError(message)
        } else {
            KernelError::InvalidArgument(message)
        }
    }

    pub async fn register(&self, spec: IntegrationSpec) -> Result<IntegrationInfo> {
        let provider = providers::for_type(&spec.integration_type)
            .ok_or_else(|| KernelError::invalid_argument(format!("unknown integration type '{}'", spec.integration_type)))?;
        let actions: Vec<String> = provider.actions().iter().map(|a| a.to_string()).collect();
        let id = Uuid::new_v4().to_string();

        let row = IntegrationRow {
            id: id.clone(),
            integration_type: spec.integration_type.clone(),
            name: spec.name.clone(),
            encrypted_credentials: Self::encode_credentials(&spec.credentials)?,
            status: "registered".to_string(),
            available_actions: serde_json::to_string(&actions).map_err(|e| KernelError::Internal(e.to_string()))?,
        };
        self.dao.register(&row).await?;

        Ok(IntegrationInfo { id, integration_type: spec.integration_type, name: spec.name, status: row.status, available_actions: actions })
    }

    pub async fn test(&self, id: &str) -> Result<TestResult> {
        let row = self.dao.get(id).await?.ok_or_else(|| KernelError::not_found(format!("integration {id}")))?;
        let provider = Self::provider_for_row(&row)?;
        let credentials = Self::decode_credentials(&row)?;

        let result = match provider.test(&credentials).await {
            Ok(message) => {
                self.dao.set_status(id, "ok").await?;
                self.append_log(id, "test", "ok", &message).await?;
                TestResult { success: true, message }
            }
            Err(message) => {
                self.dao.set_status(id, "error").await?;
                self.append_log(id, "test", "error", &message).await?;
                TestResult { success: false, message }
            }
        };
        Ok(result)
    }

    pub async fn execute(&self, id: &str, action: &str, params: Value) -> Result<Value> {
        let row = self.dao.get(id).await?.ok_or_else(|| KernelError::not_found(format!("integration {id}")))?;
        let provider = Self::provider_for_row(&row)?;
        let credentials = Self::decode_credentials(&row)?;

        match provider.execute(action, params, &credentials).await {
            Ok(outcome) => {
                self.append_log(id, action, "ok", "success").await?;
                Ok(outcome.data)
            }
            Err(message) => {
                self.append_log(id, action, "error", &message).await?;
                Err(Self::classify(message))
            }
        }
    }

    pub async fn get_logs(&self, id: &str) -> Result<Vec<IntegrationLogRow>> {
        self.dao.get_logs(id).await
    }

    async fn append_log(&self, id: &str, action: &str, status: &str, message: &str) -> Result<()> {
        self.dao
            .append_log(&IntegrationLogRow {
                id: 0,
                integration_id: id.to_string(),
                action: action.to_string(),
                status: status.to_string(),
                message: message.to_string(),
                timestamp: Utc::now(),
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kernel_storage::Store;
    use serde_json::json;
    use tempfile::TempDir;

    async fn manager() -> (IntegrationManager, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = Store::open(&dir.path().join("test.db")).await.unwrap();
        (IntegrationManager::new(store.integrations), dir)
    }

    #[tokio::test]
    async fn register_unknown_type_is_invalid_argument() {
        let (manager, _dir) = manager().await;
        let spec = IntegrationSpec { integration_type: "made-up".into(), name: "x".into(), credentials: json!({}) };
        let err = manager.register(spec).await.unwrap_err();
        assert_eq!(err.wire_code(), "invalid_argument");
    }

    #[tokio::test]
    async fn register_s3_persists_actions_and_redacts_credentials() {
        let (manager, _dir) = manager().await;
        let spec = IntegrationSpec {
            integration_type: "s3".into(),
            name: "backups".into(),
            credentials: json!({"access_key":"a","secret_key":"b","region":"us-east-1","bucket":"my-bucket"}),
        };
        let info = manager.register(spec).await.unwrap();
        assert_eq!(info.status, "registered");
        assert!(info.available_actions.contains(&"list_objects".to_string()));
    }

    #[tokio::test]
    async fn execute_against_unreachable_host_is_network_error() {
        let (manager, _dir) = manager().await;
        let spec = IntegrationSpec {
            integration_type: "s3".into(),
            name: "backups".into(),
            credentials: json!({
                "access_key":"a","secret_key":"b","region":"us-east-1","bucket":"my-bucket",
                "endpoint":"http://127.0.0.1:1"
            }),
        };
        let info = manager.register(spec).await.unwrap();
        let err = manager.execute(&info.id, "list_objects", json!({})).await.unwrap_err();
        assert_eq!(err.wire_code(), "network_error");

        let logs = manager.get_logs(&info.id).await.unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].status, "error");
    }

    #[tokio::test]
    async fn test_unknown_integration_is_not_found() {
        let (manager, _dir) = manager().await;
        let err = manager.test("nope").await.unwrap_err();
        assert_eq!(err.wire_code(), "not_found");
    }
}
