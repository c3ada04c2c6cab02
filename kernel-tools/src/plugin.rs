//! `PluginManager`: per-user plugin bundles loaded from
//! `<home>/<uid>/.config/plugins/<pluginName>/` at agent spawn (spec.md
//! §4.8). Manifest validation and the handler path-escape rejection are
//! the two hard invariants named there.

use crate::registry::ToolRegistry;
use crate::tool::{Tool, ToolContext, ToolResult};
use async_trait::async_trait;
use chrono::Utc;
use kernel_core::{EventBus, KernelError, KernelEvent, Result};
use kernel_storage::{PluginDao, PluginRow};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Namespaces a plugin's tool names so one uninstall's `remove_prefixed`
/// call can never touch another plugin's tools, even for the same owner.
fn tool_prefix(owner_uid: &str, plugin_name: &str) -> String {
    format!("plugin__{owner_uid}__{plugin_name}__")
}

/// Wraps one `PluginToolSpec` as a callable `Tool`, executing its handler
/// as a subprocess (REDESIGN: sandboxed evaluation via subprocess rather
/// than a dynamic `require`/import of plugin code).
struct PluginProxyTool {
    full_name: String,
    description: String,
    input_schema: serde_json::Value,
    handler_path: PathBuf,
}

#[async_trait]
impl Tool for PluginProxyTool {
    fn name(&self) -> &str {
        &self.full_name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn input_schema(&self) -> &serde_json::Value {
        &self.input_schema
    }

    async fn execute(&self, args: serde_json::Value, _ctx: &ToolContext) -> Result<ToolResult> {
        let args_json = serde_json::to_string(&args).map_err(|e| KernelError::Internal(e.to_string()))?;
        let output = tokio::process::Command::new(&self.handler_path)
            .arg(args_json)
            .output()
            .await
            .map_err(|e| KernelError::Internal(format!("running plugin handler failed: {e}")))?;
        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        if output.status.success() {
            Ok(ToolResult::ok(stdout))
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
            Ok(ToolResult::error(if stderr.is_empty() { stdout } else { stderr }))
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginManifest {
    pub name: String,
    pub version: String,
    pub description: String,
    pub tools: Vec<PluginToolSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginToolSpec {
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub input_schema: serde_json::Value,
    pub handler: String,
}

pub struct PluginManager {
    home: PathBuf,
    dao: PluginDao,
    bus: Arc<EventBus>,
    registry: Arc<ToolRegistry>,
}

impl PluginManager {
    pub fn new(home: PathBuf, dao: PluginDao, bus: Arc<EventBus>, registry: Arc<ToolRegistry>) -> Self {
        Self { home, dao, bus, registry }
    }

    fn plugin_dir(&self, uid: &str, plugin_name: &str) -> PathBuf {
        self.home.join(uid).join(".config/plugins").join(plugin_name)
    }

    /// Registers every tool a manifest declares into the shared
    /// `ToolRegistry`, under `plugin__{uid}__{pluginName}__{toolName}`.
    fn register_manifest_tools(&self, uid: &str, manifest: &PluginManifest) {
        let dir = self.plugin_dir(uid, &manifest.name);
        let prefix = tool_prefix(uid, &manifest.name);
        for tool in &manifest.tools {
            let proxy = PluginProxyTool {
                full_name: format!("{prefix}{}", tool.name),
                description: tool.description.clone(),
                input_schema: tool.input_schema.clone(),
                handler_path: dir.join(&tool.handler),
            };
            self.registry.register(Arc::new(proxy));
        }
    }

    /// Validates a manifest against spec.md §4.8's required-field and
    /// path-escape rules. Does not touch disk.
    pub fn validate_manifest(manifest: &PluginManifest, plugin_dir: &Path) -> Result<()> {
        if manifest.name.is_empty() {
            return Err(KernelError::invalid_argument("manifest missing name"));
        }
        if manifest.version.is_empty() {
            return Err(KernelError::invalid_argument("manifest missing version"));
        }
        if manifest.description.is_empty() {
            return Err(KernelError::invalid_argument("manifest missing description"));
        }
        if manifest.tools.is_empty() {
            return Err(KernelError::invalid_argument("manifest declares no tools"));
        }
        for tool in &manifest.tools {
            if tool.handler.is_empty() {
                return Err(KernelError::invalid_argument(format!(
                    "tool '{}' missing handler path",
                    tool.name
                )));
            }
            Self::assert_handler_within(plugin_dir, &tool.handler)?;
        }
        Ok(())
    }

    fn assert_handler_within(plugin_dir: &Path, handler: &str) -> Result<()> {
        let candidate = plugin_dir.join(handler);
        let normalized = normalize(&candidate);
        let normalized_root = normalize(plugin_dir);
        if !normalized.starts_with(&normalized_root) {
            return Err(KernelError::invalid_argument(format!(
                "handler path '{handler}' escapes the plugin directory"
            )));
        }
        Ok(())
    }

    /// Installs a plugin bundle. Rejects names containing `..` or a path
    /// separator before anything touches disk.
    pub async fn install_plugin(
        &self,
        uid: &str,
        manifest: PluginManifest,
        handlers: HashMap<String, String>,
    ) -> Result<PathBuf> {
        if manifest.name.contains("..") || manifest.name.contains('/') || manifest.name.contains('\\') {
            return Err(KernelError::invalid_argument("plugin name must not contain '..' or a path separator"));
        }
        let dir = self.plugin_dir(uid, &manifest.name);
        Self::validate_manifest(&manifest, &dir)?;

        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| KernelError::Internal(format!("creating plugin dir failed: {e}")))?;

        let manifest_json = serde_json::to_string_pretty(&manifest)
            .map_err(|e| KernelError::Internal(e.to_string()))?;
        tokio::fs::write(dir.join("manifest.json"), &manifest_json)
            .await
            .map_err(|e| KernelError::Internal(e.to_string()))?;

        for (name, source) in &handlers {
            Self::assert_handler_within(&dir, name)?;
            let path = dir.join(name);
            if let Some(parent) = path.parent() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| KernelError::Internal(e.to_string()))?;
            }
            tokio::fs::write(&path, source)
                .await
                .map_err(|e| KernelError::Internal(e.to_string()))?;
        }

        let row = PluginRow {
            id: uuid::Uuid::new_v4().to_string(),
            owner_uid: uid.to_string(),
            manifest: manifest_json,
            install_source: "local".to_string(),
            installed_at: Utc::now(),
            updated_at: Utc::now(),
            enabled: true,
        };
        self.dao.install(&row).await?;
        self.register_manifest_tools(uid, &manifest);
        self.bus.emit(KernelEvent::PluginLoaded { plugin_id: row.id, name: manifest.name });
        Ok(dir)
    }

    /// Loads every enabled plugin manifest for `uid`, skipping and logging
    /// any bundle that fails validation rather than aborting the scan.
    pub async fn load_for_user(&self, uid: &str) -> Vec<PluginManifest> {
        let rows = match self.dao.list_for_owner(uid).await {
            Ok(rows) => rows,
            Err(e) => {
                self.bus.emit(KernelEvent::PluginError { message: e.to_string() });
                return Vec::new();
            }
        };
        let mut manifests = Vec::new();
        for row in rows.into_iter().filter(|r| r.enabled) {
            match serde_json::from_str::<PluginManifest>(&row.manifest) {
                Ok(manifest) => {
                    let dir = self.plugin_dir(uid, &manifest.name);
                    if Self::validate_manifest(&manifest, &dir).is_ok() {
                        manifests.push(manifest);
                    } else {
                        self.bus.emit(KernelEvent::PluginError {
                            message: format!("plugin '{}' failed validation on load", manifest.name),
                        });
                    }
                }
                Err(e) => {
                    self.bus.emit(KernelEvent::PluginError { message: format!("corrupt manifest: {e}") });
                }
            }
        }
        manifests
    }

    /// Every installed plugin record, enabled or not (`plugin.registry.list`).
    pub async fn list_all(&self) -> Result<Vec<PluginRow>> {
        self.dao.list_all().await
    }

    /// Re-registers every enabled plugin's tools into the `ToolRegistry`.
    /// Called once at boot, since the registry is in-memory and does not
    /// survive a restart on its own.
    pub async fn restore_all(&self) {
        let rows = match self.dao.list_all().await {
            Ok(rows) => rows,
            Err(e) => {
                tracing::warn!(error = %e, "failed to restore plugin registry");
                return;
            }
        };
        for row in rows.into_iter().filter(|r| r.enabled) {
            match serde_json::from_str::<PluginManifest>(&row.manifest) {
                Ok(manifest) => self.register_manifest_tools(&row.owner_uid, &manifest),
                Err(e) => tracing::warn!(plugin_id = %row.id, error = %e, "skipping corrupt plugin manifest on restore"),
            }
        }
    }

    pub async fn uninstall(&self, id: &str) -> Result<()> {
        if let Some(row) = self.dao.get(id).await? {
            if let Ok(manifest) = serde_json::from_str::<PluginManifest>(&row.manifest) {
                self.registry.remove_prefixed(&tool_prefix(&row.owner_uid, &manifest.name));
            }
        }
        self.dao.uninstall(id).await
    }

    pub async fn set_enabled(&self, id: &str, enabled: bool) -> Result<()> {
        if let Some(row) = self.dao.get(id).await? {
            if let Ok(manifest) = serde_json::from_str::<PluginManifest>(&row.manifest) {
                if enabled {
                    self.register_manifest_tools(&row.owner_uid, &manifest);
                } else {
                    self.registry.remove_prefixed(&tool_prefix(&row.owner_uid, &manifest.name));
                }
            }
        }
        self.dao.set_enabled(id, enabled).await
    }
}

fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            std::path::Component::ParentDir => {
                out.pop();
            }
            std::path::Component::CurDir => {}
            other => out.push(other.as_os_str()),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use kernel_storage::StateStore;
    use tempfile::tempdir;

    fn sample_manifest() -> PluginManifest {
        PluginManifest {
            name: "greeter".to_string(),
            version: "1.0.0".to_string(),
            description: "says hi".to_string(),
            tools: vec![PluginToolSpec {
                name: "greet".to_string(),
                description: "says hi".to_string(),
                input_schema: serde_json::json!({}),
                handler: "handler.js".to_string(),
            }],
        }
    }

    async fn manager() -> (PluginManager, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let store = StateStore::open_in_memory().await.unwrap();
        let dao = PluginDao::new(store);
        let bus = EventBus::new();
        let registry = Arc::new(ToolRegistry::new());
        (PluginManager::new(dir.path().to_path_buf(), dao, bus, registry), dir)
    }

    #[tokio::test]
    async fn install_and_reload() {
        let (mgr, _dir) = manager().await;
        let mut handlers = HashMap::new();
        handlers.insert("handler.js".to_string(), "console.log('hi')".to_string());
        mgr.install_plugin("u1", sample_manifest(), handlers).await.unwrap();
        let loaded = mgr.load_for_user("u1").await;
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].name, "greeter");
        assert!(mgr.registry.get("plugin__u1__greeter__greet").is_some());
    }

    #[tokio::test]
    async fn uninstall_deregisters_the_plugins_tools() {
        let (mgr, _dir) = manager().await;
        let mut handlers = HashMap::new();
        handlers.insert("handler.js".to_string(), "console.log('hi')".to_string());
        mgr.install_plugin("u1", sample_manifest(), handlers).await.unwrap();
        let row = mgr.list_all().await.unwrap().into_iter().next().unwrap();
        mgr.uninstall(&row.id).await.unwrap();
        assert!(mgr.registry.get("plugin__u1__greeter__greet").is_none());
    }

    #[tokio::test]
    async fn rejects_plugin_name_with_path_separator() {
        let (mgr, _dir) = manager().await;
        let mut manifest = sample_manifest();
        manifest.name = "../evil".to_string();
        let err = mgr.install_plugin("u1", manifest, HashMap::new()).await.unwrap_err();
        assert_eq!(err.wire_code(), "invalid_argument");
    }

    #[tokio::test]
    async fn rejects_handler_path_escape() {
        let (mgr, _dir) = manager().await;
        let mut manifest = sample_manifest();
        manifest.tools[0].handler = "../../etc/passwd".to_string();
        let err = mgr.install_plugin("u1", manifest, HashMap::new()).await.unwrap_err();
        assert_eq!(err.wire_code(), "invalid_argument");
    }

    #[tokio::test]
    async fn rejects_manifest_missing_tools() {
        let dir = tempdir().unwrap();
        let mut manifest = sample_manifest();
        manifest.tools.clear();
        let err = PluginManager::validate_manifest(&manifest, dir.path()).unwrap_err();
        assert_eq!(err.wire_code(), "invalid_argument");
    }
}
