//! `OpenClawAdapter`: imports SKILL.md files into the plugin surface
//! (spec.md §4.8). Frontmatter extraction reuses the
//! regex-plus-`serde_yaml` technique of
//! `cortex_ingestion::processors::markdown::MarkdownProcessor`, which this
//! repo has no use for the rest of (section/code-block parsing), so only
//! the frontmatter half is carried forward.

use crate::registry::ToolRegistry;
use crate::tool::{Tool, ToolContext, ToolResult};
use async_trait::async_trait;
use kernel_core::{EventBus, KernelError, KernelEvent, Result};
use kernel_storage::{OpenClawDao, OpenClawImportRow, PluginDao, PluginRow};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug, Clone, Default, Deserialize)]
struct SkillFrontmatter {
    name: Option<String>,
    description: Option<String>,
    #[serde(default)]
    commands: Vec<String>,
    #[serde(default)]
    dependencies: SkillDependencies,
    #[serde(flatten)]
    keywords: HashMap<String, serde_yaml::Value>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SkillDependencies {
    #[serde(default)]
    pub bins: Vec<String>,
    #[serde(default)]
    pub env: Vec<String>,
    #[serde(default)]
    pub os: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkillManifest {
    pub skill_id: String,
    pub name: String,
    pub description: String,
    /// One tool per declared command for command-dispatch skills; a
    /// single tool named after the skill itself otherwise.
    pub tools: Vec<String>,
    pub dependencies: SkillDependencies,
    pub warnings: Vec<String>,
    pub dependencies_met: bool,
    pub keywords: HashMap<String, serde_json::Value>,
    /// The SKILL.md body below the frontmatter — the instructions an
    /// invocation of this skill's tool(s) hands back to the agent.
    pub instructions: String,
}

#[derive(Debug, Default, Serialize)]
pub struct BatchImportReport {
    pub imported: Vec<String>,
    pub failed: Vec<FailedImport>,
    pub total_scanned: usize,
}

#[derive(Debug, Serialize)]
pub struct FailedImport {
    pub path: String,
    pub error: String,
}

/// Returns a skill's own stored instructions text on invocation — an
/// OpenClaw skill is natural-language guidance, not executable code, so
/// "running" one honestly means handing the agent back what it says to do.
struct OpenClawSkillTool {
    full_name: String,
    description: String,
    instructions: String,
    schema: serde_json::Value,
}

#[async_trait]
impl Tool for OpenClawSkillTool {
    fn name(&self) -> &str {
        &self.full_name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn input_schema(&self) -> &serde_json::Value {
        &self.schema
    }

    async fn execute(&self, _args: serde_json::Value, _ctx: &ToolContext) -> Result<ToolResult> {
        Ok(ToolResult::ok(self.instructions.clone()))
    }
}

const OPENCLAW_INSTALL_SOURCE: &str = "local";
const OPENCLAW_IMPORTER: &str = "openclaw-importer";

pub struct OpenClawAdapter {
    dao: OpenClawDao,
    bus: Arc<EventBus>,
    plugin_dao: PluginDao,
    registry: Arc<ToolRegistry>,
}

impl OpenClawAdapter {
    pub fn new(dao: OpenClawDao, bus: Arc<EventBus>, plugin_dao: PluginDao, registry: Arc<ToolRegistry>) -> Self {
        Self { dao, bus, plugin_dao, registry }
    }

    fn tool_prefix(skill_id: &str) -> String {
        format!("openclaw__{skill_id}__")
    }

    /// Registers each of a manifest's tools into the shared `ToolRegistry`
    /// and records the import as a `PluginRegistry` entry, keyed by the
    /// skill's own `skill_id` so re-importing updates rather than
    /// duplicates the row (spec.md: re-import "leaves registry size
    /// unchanged").
    async fn register_manifest(&self, manifest: &SkillManifest) -> Result<()> {
        let prefix = Self::tool_prefix(&manifest.skill_id);
        for tool_name in &manifest.tools {
            let proxy = OpenClawSkillTool {
                full_name: format!("{prefix}{tool_name}"),
                description: manifest.description.clone(),
                instructions: manifest.instructions.clone(),
                schema: serde_json::json!({ "type": "object", "properties": {} }),
            };
            self.registry.register(Arc::new(proxy));
        }

        let manifest_json = serde_json::to_string(manifest).map_err(|e| KernelError::Internal(e.to_string()))?;
        let now = chrono::Utc::now();
        self.plugin_dao
            .upsert(&PluginRow {
                id: manifest.skill_id.clone(),
                owner_uid: OPENCLAW_IMPORTER.to_string(),
                manifest: manifest_json,
                install_source: OPENCLAW_INSTALL_SOURCE.to_string(),
                installed_at: now,
                updated_at: now,
                enabled: true,
            })
            .await
    }

    fn frontmatter_regex() -> Regex {
        Regex::new(r"(?s)^---\s*\n(.*?)\n---\s*\n(.*)$").expect("static frontmatter regex is valid")
    }

    /// Parses one SKILL.md file's content into a manifest. `available_bins`
    /// and `set_env_vars` let callers (and tests) control dependency-check
    /// outcomes without touching the real host environment.
    pub fn parse_skill(
        content: &str,
        available_bins: &[&str],
        set_env_vars: &[&str],
        host_os: &str,
    ) -> Result<SkillManifest> {
        let captures = Self::frontmatter_regex()
            .captures(content)
            .ok_or_else(|| KernelError::invalid_argument("SKILL.md has no YAML frontmatter"))?;
        let yaml_str = captures.get(1).map(|m| m.as_str()).unwrap_or_default();
        let body = captures.get(2).map(|m| m.as_str()).unwrap_or_default();

        let frontmatter: SkillFrontmatter = serde_yaml::from_str(yaml_str)
            .map_err(|e| KernelError::invalid_argument(format!("invalid frontmatter YAML: {e}")))?;

        let name = frontmatter
            .name
            .clone()
            .ok_or_else(|| KernelError::invalid_argument("SKILL.md frontmatter missing required 'name' field"))?;

        let description = frontmatter
            .description
            .clone()
            .unwrap_or_else(|| body.trim().lines().next().unwrap_or_default().to_string());

        let tools = if frontmatter.commands.is_empty() {
            vec![name.clone()]
        } else {
            frontmatter.commands.clone()
        };

        let mut warnings = Vec::new();
        let mut dependencies_met = true;

        for bin in &frontmatter.dependencies.bins {
            if !available_bins.contains(&bin.as_str()) {
                warnings.push(format!("required binary '{bin}' not found on this host"));
                dependencies_met = false;
            }
        }
        for var in &frontmatter.dependencies.env {
            if !set_env_vars.contains(&var.as_str()) {
                warnings.push(format!("required environment variable '{var}' is not set"));
                dependencies_met = false;
            }
        }
        if !frontmatter.dependencies.os.is_empty() && !frontmatter.dependencies.os.iter().any(|os| os == host_os) {
            warnings.push(format!(
                "skill declares os {:?} but host is '{host_os}'",
                frontmatter.dependencies.os
            ));
        }

        let keywords = frontmatter
            .keywords
            .into_iter()
            .filter_map(|(k, v)| serde_json::to_value(v).ok().map(|v| (k, v)))
            .collect();

        Ok(SkillManifest {
            skill_id: name.clone(),
            name,
            description,
            tools,
            dependencies: frontmatter.dependencies,
            warnings,
            dependencies_met,
            keywords,
            instructions: body.trim().to_string(),
        })
    }

    /// Imports a single SKILL.md file and persists the import record.
    pub async fn import_file(&self, path: &Path) -> Result<SkillManifest> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| KernelError::invalid_argument(format!("reading {}: {e}", path.display())))?;
        let manifest = Self::parse_skill(&content, &host_available_bins(), &host_env_vars(), std::env::consts::OS)?;

        let serialized = serde_json::to_string(&manifest).map_err(|e| KernelError::Internal(e.to_string()))?;
        self.dao
            .upsert(&OpenClawImportRow {
                skill_id: manifest.skill_id.clone(),
                serialized_skill: serialized,
                dependencies_met: manifest.dependencies_met,
                source_path: path.to_string_lossy().into_owned(),
            })
            .await?;

        self.register_manifest(&manifest).await?;

        self.bus.emit(KernelEvent::OpenclawSkillImported {
            skill_id: manifest.skill_id.clone(),
            dependencies_met: manifest.dependencies_met,
        });
        Ok(manifest)
    }

    /// Walks `root` for `SKILL.md` files one directory deep, importing
    /// each and aggregating a report. A single bad file never aborts the
    /// scan.
    pub async fn import_batch(&self, root: &Path) -> Result<BatchImportReport> {
        let mut report = BatchImportReport::default();
        let mut entries = match tokio::fs::read_dir(root).await {
            Ok(entries) => entries,
            Err(e) => {
                return Err(KernelError::invalid_argument(format!("cannot scan {}: {e}", root.display())));
            }
        };

        let mut candidates: Vec<PathBuf> = Vec::new();
        while let Ok(Some(entry)) = entries.next_entry().await {
            let path = entry.path();
            if path.is_dir() {
                let skill_md = path.join("SKILL.md");
                if skill_md.exists() {
                    candidates.push(skill_md);
                }
            } else if path.file_name().map(|n| n == "SKILL.md").unwrap_or(false) {
                candidates.push(path);
            }
        }

        report.total_scanned = candidates.len();
        for path in candidates {
            match self.import_file(&path).await {
                Ok(manifest) => report.imported.push(manifest.skill_id),
                Err(e) => report.failed.push(FailedImport {
                    path: path.to_string_lossy().into_owned(),
                    error: e.message(),
                }),
            }
        }

        self.bus.emit(KernelEvent::OpenclawBatchImported {
            imported: report.imported.len(),
            failed: report.failed.len(),
            total_scanned: report.total_scanned,
        });
        Ok(report)
    }

    /// Restores previously imported skills from storage on init, silently
    /// skipping rows whose serialized payload is corrupt (spec.md §4.2),
    /// and re-registers each one's tools into the `ToolRegistry` since the
    /// registry itself is in-memory and does not survive a restart.
    pub async fn restore(&self) -> Vec<SkillManifest> {
        let rows = self.dao.list_all().await.unwrap_or_default();
        let mut manifests = Vec::new();
        for row in rows {
            match serde_json::from_str::<SkillManifest>(&row.serialized_skill) {
                Ok(manifest) => {
                    if let Err(e) = self.register_manifest(&manifest).await {
                        tracing::warn!(skill_id = %manifest.skill_id, error = %e, "failed to restore openclaw skill's tools");
                    }
                    manifests.push(manifest);
                }
                Err(e) => {
                    tracing::warn!(skill_id = %row.skill_id, error = %e, "skipping corrupt openclaw import row");
                }
            }
        }
        manifests
    }
}

fn host_available_bins() -> Vec<&'static str> {
    Vec::new()
}

fn host_env_vars() -> Vec<&'static str> {
    Vec::new()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"---
name: deploy-helper
description: Deploys the current project
commands:
  - deploy
  - rollback
dependencies:
  bins:
    - git
  env:
    - DEPLOY_TOKEN
  os:
    - linux
---

Full skill instructions go here.
"#;

    #[test]
    fn parses_full_frontmatter() {
        let manifest = OpenClawAdapter::parse_skill(SAMPLE, &["git"], &["DEPLOY_TOKEN"], "linux").unwrap();
        assert_eq!(manifest.name, "deploy-helper");
        assert_eq!(manifest.tools, vec!["deploy", "rollback"]);
        assert!(manifest.dependencies_met);
        assert!(manifest.warnings.is_empty());
    }

    #[test]
    fn missing_bin_sets_dependencies_unmet() {
        let manifest = OpenClawAdapter::parse_skill(SAMPLE, &[], &["DEPLOY_TOKEN"], "linux").unwrap();
        assert!(!manifest.dependencies_met);
        assert_eq!(manifest.warnings.len(), 1);
    }

    #[test]
    fn os_mismatch_warns_but_stays_importable() {
        let manifest = OpenClawAdapter::parse_skill(SAMPLE, &["git"], &["DEPLOY_TOKEN"], "windows").unwrap();
        assert!(manifest.dependencies_met);
        assert_eq!(manifest.warnings.len(), 1);
    }

    #[test]
    fn missing_name_is_rejected() {
        let bad = "---\ndescription: no name here\n---\nbody";
        let err = OpenClawAdapter::parse_skill(bad, &[], &[], "linux").unwrap_err();
        assert_eq!(err.wire_code(), "invalid_argument");
    }

    #[test]
    fn instruction_skill_without_commands_exposes_one_tool() {
        let content = "---\nname: summarizer\n---\nSummarize the input.";
        let manifest = OpenClawAdapter::parse_skill(content, &[], &[], "linux").unwrap();
        assert_eq!(manifest.tools, vec!["summarizer"]);
    }

    #[tokio::test]
    async fn importing_a_skill_registers_its_tool_and_returns_its_instructions() {
        let store = kernel_storage::StateStore::open_in_memory().await.unwrap();
        let dao = OpenClawDao::new(store.clone());
        let plugin_dao = PluginDao::new(store);
        let bus = EventBus::new();
        let registry = Arc::new(ToolRegistry::new());
        let adapter = OpenClawAdapter::new(dao, bus, plugin_dao.clone(), registry.clone());

        let dir = tempfile::tempdir().unwrap();
        let skill_path = dir.path().join("SKILL.md");
        tokio::fs::write(&skill_path, SAMPLE).await.unwrap();

        let manifest = adapter.import_file(&skill_path).await.unwrap();
        let tool = registry.get(&format!("openclaw__{}__deploy", manifest.skill_id)).unwrap();
        let ctx = ToolContext { pid: kernel_core::Pid(1), owner_uid: "u1".to_string() };
        let result = tool.execute(serde_json::json!({}), &ctx).await.unwrap();
        assert!(result.text.contains("Full skill instructions go here."));

        assert_eq!(plugin_dao.list_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn reimporting_the_same_skill_leaves_the_registry_size_unchanged() {
        let store = kernel_storage::StateStore::open_in_memory().await.unwrap();
        let dao = OpenClawDao::new(store.clone());
        let plugin_dao = PluginDao::new(store);
        let bus = EventBus::new();
        let registry = Arc::new(ToolRegistry::new());
        let adapter = OpenClawAdapter::new(dao, bus, plugin_dao.clone(), registry);

        let dir = tempfile::tempdir().unwrap();
        let skill_path = dir.path().join("SKILL.md");
        tokio::fs::write(&skill_path, SAMPLE).await.unwrap();

        adapter.import_file(&skill_path).await.unwrap();
        adapter.import_file(&skill_path).await.unwrap();
        assert_eq!(plugin_dao.list_all().await.unwrap().len(), 1);
    }
}
