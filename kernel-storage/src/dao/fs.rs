//! File metadata index DAO — mirrors what is visible on disk (spec.md §3).

use crate::models::FileMetaRow;
use crate::store::StateStore;
use kernel_core::KernelError;

#[derive(Clone)]
pub struct FileDao {
    store: StateStore,
}

impl FileDao {
    pub fn new(store: StateStore) -> Self {
        Self { store }
    }

    pub async fn upsert(&self, row: &FileMetaRow) -> Result<(), KernelError> {
        let _g = self.store.begin_write();
        sqlx::query(
            "INSERT INTO file_meta (path, owner_uid, file_type, size, created_at, modified_at, hidden) \
             VALUES (?, ?, ?, ?, ?, ?, ?) \
             ON CONFLICT (path) DO UPDATE SET \
               size = excluded.size, modified_at = excluded.modified_at, hidden = excluded.hidden",
        )
        .bind(&row.path)
        .bind(&row.owner_uid)
        .bind(&row.file_type)
        .bind(row.size)
        .bind(row.created_at)
        .bind(row.modified_at)
        .bind(row.hidden)
        .execute(&self.store.pool)
        .await
        .map_err(|e| KernelError::Internal(e.to_string()))?;
        Ok(())
    }

    pub async fn remove(&self, path: &str) -> Result<(), KernelError> {
        let _g = self.store.begin_write();
        sqlx::query("DELETE FROM file_meta WHERE path = ? OR path LIKE ? || '/%'")
            .bind(path)
            .bind(path)
            .execute(&self.store.pool)
            .await
            .map_err(|e| KernelError::Internal(e.to_string()))?;
        Ok(())
    }

    pub async fn get(&self, path: &str) -> Result<Option<FileMetaRow>, KernelError> {
        sqlx::query_as::<_, FileMetaRow>("SELECT * FROM file_meta WHERE path = ?")
            .bind(path)
            .fetch_optional(&self.store.pool)
            .await
            .map_err(|e| KernelError::Internal(e.to_string()))
    }

    pub async fn get_files_by_owner(&self, owner_uid: &str) -> Result<Vec<FileMetaRow>, KernelError> {
        sqlx::query_as::<_, FileMetaRow>("SELECT * FROM file_meta WHERE owner_uid = ? ORDER BY path")
            .bind(owner_uid)
            .fetch_all(&self.store.pool)
            .await
            .map_err(|e| KernelError::Internal(e.to_string()))
    }
}
