//! Per-user virtual filesystem and shared-directory watcher (spec.md
//! §4.7), grounded on `cortex_vfs::Vfs`.

pub mod vfs;
pub mod watcher;

pub use vfs::FileSystem;
pub use watcher::watch_shared;

/// One directory listing entry (spec.md §4.7's `ls`).
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ListEntry {
    pub name: String,
    pub is_dir: bool,
    pub size: u64,
}
