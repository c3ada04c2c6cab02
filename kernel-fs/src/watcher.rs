//! Debounced watcher over a shared-dir prefix (spec.md §4.7): changes
//! under `/shared` emit `fs.changed` so multiple connected UIs can refresh
//! without polling. Built on `notify`, already a teacher workspace
//! dependency used elsewhere for config hot-reload.

use kernel_core::{EventBus, KernelEvent};
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

const DEBOUNCE: Duration = Duration::from_millis(250);

/// Starts watching `shared_root` and forwards debounced changes onto
/// `bus`. Returns the live `RecommendedWatcher`; drop it to stop watching.
pub fn watch_shared(shared_root: PathBuf, bus: Arc<EventBus>) -> notify::Result<RecommendedWatcher> {
    let (tx, mut rx) = mpsc::unbounded_channel();

    let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
        if let Ok(event) = res {
            for path in event.paths {
                let _ = tx.send(path);
            }
        }
    })?;
    watcher.watch(&shared_root, RecursiveMode::Recursive)?;

    let root_for_task = shared_root.clone();
    tokio::spawn(async move {
        let mut pending: Option<PathBuf> = None;
        loop {
            tokio::select! {
                path = rx.recv() => {
                    match path {
                        Some(path) => pending = Some(path),
                        None => break,
                    }
                }
                _ = tokio::time::sleep(DEBOUNCE), if pending.is_some() => {
                    if let Some(path) = pending.take() {
                        let display = relative_to(&root_for_task, &path);
                        bus.emit(KernelEvent::FsChanged { path: display, owner_uid: "shared".to_string() });
                    }
                }
            }
        }
    });

    Ok(watcher)
}

fn relative_to(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}
