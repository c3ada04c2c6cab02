//! DAOs for plugins, MCP server records, and OpenClaw imports — the durable
//! half of the dynamic tool surface (spec.md §4.8).

use crate::models::{McpServerRow, OpenClawImportRow, PluginRow};
use crate::store::StateStore;
use kernel_core::KernelError;

#[derive(Clone)]
pub struct PluginDao {
    store: StateStore,
}

impl PluginDao {
    pub fn new(store: StateStore) -> Self {
        Self { store }
    }

    pub async fn install(&self, row: &PluginRow) -> Result<(), KernelError> {
        let _g = self.store.begin_write();
        sqlx::query(
            "INSERT INTO plugins (id, owner_uid, manifest, install_source, installed_at, updated_at, enabled) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&row.id)
        .bind(&row.owner_uid)
        .bind(&row.manifest)
        .bind(&row.install_source)
        .bind(row.installed_at)
        .bind(row.updated_at)
        .bind(row.enabled)
        .execute(&self.store.pool)
        .await
        .map_err(|e| KernelError::Internal(e.to_string()))?;
        Ok(())
    }

    /// Installs or overwrites a plugin record keyed by `id`. Used for
    /// OpenClaw-sourced registrations, which must keep a deterministic id
    /// (the skill_id) stable across re-imports so the registry doesn't
    /// grow a duplicate row each time the same skill is imported.
    pub async fn upsert(&self, row: &PluginRow) -> Result<(), KernelError> {
        let _g = self.store.begin_write();
        sqlx::query(
            "INSERT INTO plugins (id, owner_uid, manifest, install_source, installed_at, updated_at, enabled) \
             VALUES (?, ?, ?, ?, ?, ?, ?) \
             ON CONFLICT (id) DO UPDATE SET \
               owner_uid = excluded.owner_uid, manifest = excluded.manifest, \
               install_source = excluded.install_source, updated_at = excluded.updated_at, \
               enabled = excluded.enabled",
        )
        .bind(&row.id)
        .bind(&row.owner_uid)
        .bind(&row.manifest)
        .bind(&row.install_source)
        .bind(row.installed_at)
        .bind(row.updated_at)
        .bind(row.enabled)
        .execute(&self.store.pool)
        .await
        .map_err(|e| KernelError::Internal(e.to_string()))?;
        Ok(())
    }

    pub async fn uninstall(&self, id: &str) -> Result<(), KernelError> {
        let _g = self.store.begin_write();
        sqlx::query("DELETE FROM plugins WHERE id = ?")
            .bind(id)
            .execute(&self.store.pool)
            .await
            .map_err(|e| KernelError::Internal(e.to_string()))?;
        Ok(())
    }

    pub async fn set_enabled(&self, id: &str, enabled: bool) -> Result<(), KernelError> {
        let _g = self.store.begin_write();
        sqlx::query("UPDATE plugins SET enabled = ?, updated_at = ? WHERE id = ?")
            .bind(enabled)
            .bind(chrono::Utc::now())
            .bind(id)
            .execute(&self.store.pool)
            .await
            .map_err(|e| KernelError::Internal(e.to_string()))?;
        Ok(())
    }

    pub async fn get(&self, id: &str) -> Result<Option<PluginRow>, KernelError> {
        sqlx::query_as::<_, PluginRow>("SELECT * FROM plugins WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.store.pool)
            .await
            .map_err(|e| KernelError::Internal(e.to_string()))
    }

    pub async fn list_for_owner(&self, owner_uid: &str) -> Result<Vec<PluginRow>, KernelError> {
        sqlx::query_as::<_, PluginRow>("SELECT * FROM plugins WHERE owner_uid = ?")
            .bind(owner_uid)
            .fetch_all(&self.store.pool)
            .await
            .map_err(|e| KernelError::Internal(e.to_string()))
    }

    pub async fn list_all(&self) -> Result<Vec<PluginRow>, KernelError> {
        sqlx::query_as::<_, PluginRow>("SELECT * FROM plugins")
            .fetch_all(&self.store.pool)
            .await
            .map_err(|e| KernelError::Internal(e.to_string()))
    }
}

#[derive(Clone)]
pub struct McpDao {
    store: StateStore,
}

impl McpDao {
    pub fn new(store: StateStore) -> Self {
        Self { store }
    }

    pub async fn upsert(&self, row: &McpServerRow) -> Result<(), KernelError> {
        let _g = self.store.begin_write();
        sqlx::query(
            "INSERT INTO mcp_servers (id, name, transport, connection_spec, auto_connect, enabled, cached_tools) \
             VALUES (?, ?, ?, ?, ?, ?, ?) \
             ON CONFLICT (id) DO UPDATE SET \
               name = excluded.name, transport = excluded.transport, \
               connection_spec = excluded.connection_spec, auto_connect = excluded.auto_connect, \
               enabled = excluded.enabled, cached_tools = excluded.cached_tools",
        )
        .bind(&row.id)
        .bind(&row.name)
        .bind(&row.transport)
        .bind(&row.connection_spec)
        .bind(row.auto_connect)
        .bind(row.enabled)
        .bind(&row.cached_tools)
        .execute(&self.store.pool)
        .await
        .map_err(|e| KernelError::Internal(e.to_string()))?;
        Ok(())
    }

    pub async fn delete(&self, id: &str) -> Result<(), KernelError> {
        let _g = self.store.begin_write();
        sqlx::query("DELETE FROM mcp_servers WHERE id = ?")
            .bind(id)
            .execute(&self.store.pool)
            .await
            .map_err(|e| KernelError::Internal(e.to_string()))?;
        Ok(())
    }

    pub async fn list(&self) -> Result<Vec<McpServerRow>, KernelError> {
        sqlx::query_as::<_, McpServerRow>("SELECT * FROM mcp_servers")
            .fetch_all(&self.store.pool)
            .await
            .map_err(|e| KernelError::Internal(e.to_string()))
    }

    pub async fn get(&self, id: &str) -> Result<Option<McpServerRow>, KernelError> {
        sqlx::query_as::<_, McpServerRow>("SELECT * FROM mcp_servers WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.store.pool)
            .await
            .map_err(|e| KernelError::Internal(e.to_string()))
    }
}

#[derive(Clone)]
pub struct OpenClawDao {
    store: StateStore,
}

impl OpenClawDao {
    pub fn new(store: StateStore) -> Self {
        Self { store }
    }

    pub async fn upsert(&self, row: &OpenClawImportRow) -> Result<(), KernelError> {
        let _g = self.store.begin_write();
        sqlx::query(
            "INSERT INTO openclaw_imports (skill_id, serialized_skill, dependencies_met, source_path) \
             VALUES (?, ?, ?, ?) \
             ON CONFLICT (skill_id) DO UPDATE SET \
               serialized_skill = excluded.serialized_skill, \
               dependencies_met = excluded.dependencies_met, \
               source_path = excluded.source_path",
        )
        .bind(&row.skill_id)
        .bind(&row.serialized_skill)
        .bind(row.dependencies_met)
        .bind(&row.source_path)
        .execute(&self.store.pool)
        .await
        .map_err(|e| KernelError::Internal(e.to_string()))?;
        Ok(())
    }

    pub async fn get(&self, skill_id: &str) -> Result<Option<OpenClawImportRow>, KernelError> {
        sqlx::query_as::<_, OpenClawImportRow>("SELECT * FROM openclaw_imports WHERE skill_id = ?")
            .bind(skill_id)
            .fetch_optional(&self.store.pool)
            .await
            .map_err(|e| KernelError::Internal(e.to_string()))
    }

    pub async fn list_all(&self) -> Result<Vec<OpenClawImportRow>, KernelError> {
        sqlx::query_as::<_, OpenClawImportRow>("SELECT * FROM openclaw_imports")
            .fetch_all(&self.store.pool)
            .await
            .map_err(|e| KernelError::Internal(e.to_string()))
    }
}
