//! Per-user virtual filesystem rooted at a host subtree (spec.md §4.7).
//! Grounded on `cortex_vfs::Vfs` (physical-path resolution under a
//! `base_path`, `tokio::fs` operations) with the root-escape check that
//! crate's narrower single-tenant use case omitted.

use crate::ListEntry;
use chrono::Utc;
use kernel_core::{EventBus, KernelError, KernelEvent, Result};
use kernel_storage::{FileDao, FileMetaRow};
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub struct FileSystem {
    root: PathBuf,
    dao: FileDao,
    bus: Arc<EventBus>,
}

impl FileSystem {
    /// `root` is this user's private subtree, e.g. `<data_dir>/<uid>`.
    pub fn new(root: PathBuf, dao: FileDao, bus: Arc<EventBus>) -> Self {
        Self { root, dao, bus }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolves `path` (a virtual path relative to the user's root) to an
    /// absolute host path, rejecting anything that escapes the root.
    /// Never trusts the client-supplied string: a symlink or `..` segment
    /// that would land outside `root` is an `invalid_argument`, not a
    /// silent clamp.
    fn resolve(&self, path: &str) -> Result<PathBuf> {
        let relative = path.trim_start_matches('/');
        let candidate = self.root.join(relative);

        let probe = candidate
            .parent()
            .filter(|p| p.exists())
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| self.root.clone());
        let canonical_probe = probe
            .canonicalize()
            .map_err(|e| KernelError::invalid_argument(format!("path resolution failed: {e}")))?;
        let canonical_root = self
            .root
            .canonicalize()
            .map_err(|e| KernelError::invalid_argument(format!("root resolution failed: {e}")))?;
        if !canonical_probe.starts_with(&canonical_root) {
            return Err(KernelError::invalid_argument(format!(
                "path '{path}' escapes the user root"
            )));
        }
        Ok(candidate)
    }

    fn virtual_path(&self, absolute: &Path) -> String {
        absolute
            .strip_prefix(&self.root)
            .unwrap_or(absolute)
            .to_string_lossy()
            .replace('\\', "/")
    }

    pub async fn read(&self, path: &str) -> Result<Vec<u8>> {
        let physical = self.resolve(path)?;
        tokio::fs::read(&physical)
            .await
            .map_err(|e| KernelError::not_found(format!("{path}: {e}")))
    }

    pub async fn write(&self, path: &str, content: &[u8], owner_uid: &str) -> Result<()> {
        let physical = self.resolve(path)?;
        if let Some(parent) = physical.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| KernelError::Internal(format!("mkdir parent failed: {e}")))?;
        }
        tokio::fs::write(&physical, content)
            .await
            .map_err(|e| KernelError::Internal(format!("write failed: {e}")))?;
        self.record_mutation(&physical, owner_uid).await?;
        Ok(())
    }

    pub async fn ls(&self, path: &str) -> Result<Vec<ListEntry>> {
        let physical = self.resolve(path)?;
        let mut read_dir = tokio::fs::read_dir(&physical)
            .await
            .map_err(|e| KernelError::not_found(format!("{path}: {e}")))?;
        let mut out = Vec::new();
        while let Some(entry) = read_dir
            .next_entry()
            .await
            .map_err(|e| KernelError::Internal(e.to_string()))?
        {
            let meta = entry
                .metadata()
                .await
                .map_err(|e| KernelError::Internal(e.to_string()))?;
            out.push(ListEntry {
                name: entry.file_name().to_string_lossy().into_owned(),
                is_dir: meta.is_dir(),
                size: meta.len(),
            });
        }
        out.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(out)
    }

    pub async fn stat(&self, path: &str) -> Result<FileMetaRow> {
        if let Some(row) = self.dao.get(&self.virtual_path(&self.resolve(path)?)).await? {
            return Ok(row);
        }
        // Fall back to a live host-FS stat for files never yet mutated
        // through this API (e.g. pre-seeded content).
        let physical = self.resolve(path)?;
        let meta = tokio::fs::metadata(&physical)
            .await
            .map_err(|e| KernelError::not_found(format!("{path}: {e}")))?;
        Ok(FileMetaRow {
            path: self.virtual_path(&physical),
            owner_uid: String::new(),
            file_type: if meta.is_dir() { "dir".to_string() } else { "file".to_string() },
            size: meta.len() as i64,
            created_at: Utc::now(),
            modified_at: Utc::now(),
            hidden: false,
        })
    }

    pub async fn mkdir(&self, path: &str, owner_uid: &str) -> Result<()> {
        let physical = self.resolve(path)?;
        tokio::fs::create_dir_all(&physical)
            .await
            .map_err(|e| KernelError::Internal(format!("mkdir failed: {e}")))?;
        self.record_mutation(&physical, owner_uid).await?;
        Ok(())
    }

    pub async fn rm(&self, path: &str, recursive: bool) -> Result<()> {
        let physical = self.resolve(path)?;
        let meta = tokio::fs::metadata(&physical)
            .await
            .map_err(|e| KernelError::not_found(format!("{path}: {e}")))?;
        if meta.is_dir() {
            if recursive {
                tokio::fs::remove_dir_all(&physical)
                    .await
                    .map_err(|e| KernelError::Internal(e.to_string()))?;
            } else {
                tokio::fs::remove_dir(&physical)
                    .await
                    .map_err(|e| KernelError::invalid_argument(format!("directory not empty: {e}")))?;
            }
        } else {
            tokio::fs::remove_file(&physical)
                .await
                .map_err(|e| KernelError::Internal(e.to_string()))?;
        }
        self.dao.remove(&self.virtual_path(&physical)).await?;
        self.bus.emit(KernelEvent::FsChanged {
            path: self.virtual_path(&physical),
            owner_uid: String::new(),
        });
        Ok(())
    }

    pub async fn upload(&self, content: &[u8], dest_path: &str, owner_uid: &str) -> Result<()> {
        self.write(dest_path, content, owner_uid).await
    }

    async fn record_mutation(&self, physical: &Path, owner_uid: &str) -> Result<()> {
        let meta = tokio::fs::metadata(physical)
            .await
            .map_err(|e| KernelError::Internal(e.to_string()))?;
        let path = self.virtual_path(physical);
        let now = Utc::now();
        self.dao
            .upsert(&FileMetaRow {
                path: path.clone(),
                owner_uid: owner_uid.to_string(),
                file_type: if meta.is_dir() { "dir".to_string() } else { "file".to_string() },
                size: meta.len() as i64,
                created_at: now,
                modified_at: now,
                hidden: path.rsplit('/').next().is_some_and(|name| name.starts_with('.')),
            })
            .await?;
        self.bus.emit(KernelEvent::FsChanged {
            path,
            owner_uid: owner_uid.to_string(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kernel_storage::StateStore;
    use tempfile::tempdir;

    async fn fs_fixture() -> (FileSystem, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let store = StateStore::open_in_memory().await.unwrap();
        let dao = FileDao::new(store);
        let bus = EventBus::new();
        (FileSystem::new(dir.path().to_path_buf(), dao, bus), dir)
    }

    #[tokio::test]
    async fn write_read_roundtrip() {
        let (fs, _dir) = fs_fixture().await;
        fs.write("hello.txt", b"hi", "u1").await.unwrap();
        assert_eq!(fs.read("hello.txt").await.unwrap(), b"hi");
        let meta = fs.stat("hello.txt").await.unwrap();
        assert_eq!(meta.owner_uid, "u1");
    }

    #[tokio::test]
    async fn path_escape_is_rejected() {
        let (fs, _dir) = fs_fixture().await;
        let err = fs.read("../../etc/passwd").await.unwrap_err();
        assert_eq!(err.wire_code(), "invalid_argument");
    }

    #[tokio::test]
    async fn mkdir_and_ls() {
        let (fs, _dir) = fs_fixture().await;
        fs.mkdir("sub", "u1").await.unwrap();
        fs.write("sub/a.txt", b"a", "u1").await.unwrap();
        let entries = fs.ls("sub").await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "a.txt");
    }

    #[tokio::test]
    async fn rm_removes_file_and_meta() {
        let (fs, _dir) = fs_fixture().await;
        fs.write("gone.txt", b"x", "u1").await.unwrap();
        fs.rm("gone.txt", false).await.unwrap();
        assert!(fs.read("gone.txt").await.is_err());
        assert!(fs.dao.get("gone.txt").await.unwrap().is_none());
    }
}
