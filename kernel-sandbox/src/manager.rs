//! `PtyManager`: maps TTY ids to either a local PTY session or a
//! containerized one, fanning output onto the [`EventBus`] (spec.md §4.6).
//! Grounded on the teacher's `cc::process` registry shape — one handle
//! struct, one `DashMap` keyed by id, synchronous lookups, async lifecycle
//! operations.

use crate::backend::{ContainerBackend, PtyBackend};
use dashmap::DashMap;
use kernel_core::{EventBus, KernelError, KernelEvent, Pid, Result};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::Child;
use tokio::sync::Mutex as AsyncMutex;
use uuid::Uuid;

/// A single open TTY. Exactly one of the session ever owns the child
/// process it was opened with (spec.md §4.6 invariant); `containerized`
/// records which backend produced it.
pub struct TtySession {
    pub id: Uuid,
    pub pid: Pid,
    pub containerized: bool,
    child: AsyncMutex<Child>,
    stdin: AsyncMutex<Box<dyn tokio::io::AsyncWrite + Send + Unpin>>,
}

pub struct PtyManager {
    sessions: DashMap<Uuid, Arc<TtySession>>,
    pty_backend: Arc<dyn PtyBackend>,
    container_backend: Arc<dyn ContainerBackend>,
    bus: Arc<EventBus>,
}

impl PtyManager {
    pub fn new(
        pty_backend: Arc<dyn PtyBackend>,
        container_backend: Arc<dyn ContainerBackend>,
        bus: Arc<EventBus>,
    ) -> Self {
        Self {
            sessions: DashMap::new(),
            pty_backend,
            container_backend,
            bus,
        }
    }

    /// Opens a TTY for `pid`: tries the container backend first, falling
    /// back to the local PTY backend when it declines (returns `None`).
    pub async fn open(&self, pid: Pid) -> Result<Uuid> {
        let tty_id = Uuid::new_v4();

        let (child, stdin, stdout, containerized) = match self.container_backend.spawn_shell(pid).await? {
            Some(shell) => (shell.child, shell.stdin, shell.stdout, true),
            None => {
                let shell = self.pty_backend.spawn(pid).await?;
                (shell.child, shell.stdin, shell.stdout, false)
            }
        };

        let session = Arc::new(TtySession {
            id: tty_id,
            pid,
            containerized,
            child: AsyncMutex::new(child),
            stdin: AsyncMutex::new(stdin),
        });
        self.sessions.insert(tty_id, session);

        self.spawn_output_pump(tty_id, stdout);

        self.bus.emit(KernelEvent::TtyOpened { tty_id, pid, containerized });
        Ok(tty_id)
    }

    fn spawn_output_pump(&self, tty_id: Uuid, mut stdout: Box<dyn tokio::io::AsyncRead + Send + Unpin>) {
        let bus = self.bus.clone();
        tokio::spawn(async move {
            let mut buf = [0u8; 4096];
            loop {
                match stdout.read(&mut buf).await {
                    Ok(0) => break,
                    Ok(n) => {
                        bus.emit(KernelEvent::TtyOutput { tty_id, data: buf[..n].to_vec() });
                    }
                    Err(_) => break,
                }
            }
        });
    }

    /// Writes to `tty_id`'s stdin. `false` for an unknown id.
    pub async fn write(&self, tty_id: Uuid, data: &[u8]) -> bool {
        let Some(session) = self.sessions.get(&tty_id).map(|s| Arc::clone(&s)) else {
            return false;
        };
        let mut stdin = session.stdin.lock().await;
        stdin.write_all(data).await.is_ok()
    }

    /// Best-effort resize; `false` for an unknown id.
    pub async fn resize(&self, tty_id: Uuid, cols: u16, rows: u16) -> bool {
        let Some(session) = self.sessions.get(&tty_id).map(|s| Arc::clone(&s)) else {
            return false;
        };
        if session.containerized {
            // Container sessions may silently succeed (spec.md §4.6).
            return true;
        }
        let mut child = session.child.lock().await;
        self.pty_backend.resize(&mut child, cols, rows).await.is_ok()
    }

    pub async fn close(&self, tty_id: Uuid) -> Result<()> {
        let Some((_, session)) = self.sessions.remove(&tty_id) else {
            return Err(KernelError::not_found(format!("tty {tty_id}")));
        };
        let mut child = session.child.lock().await;
        let _ = child.start_kill();
        self.bus.emit(KernelEvent::TtyClosed { tty_id });
        Ok(())
    }

    /// Total open sessions, used for best-effort `container_count` sampling.
    pub fn session_count(&self) -> usize {
        self.sessions.iter().filter(|e| e.value().containerized).count()
    }

    pub fn get_by_pid(&self, pid: Pid) -> Vec<Uuid> {
        self.sessions
            .iter()
            .filter(|entry| entry.value().pid == pid)
            .map(|entry| *entry.key())
            .collect()
    }

    pub async fn shutdown(&self) {
        let ids: Vec<Uuid> = self.sessions.iter().map(|e| *e.key()).collect();
        for id in ids {
            let _ = self.close(id).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{LocalPtyBackend, NullContainerBackend};

    fn manager() -> PtyManager {
        PtyManager::new(
            Arc::new(LocalPtyBackend::new("/bin/sh")),
            Arc::new(NullContainerBackend),
            EventBus::new(),
        )
    }

    #[tokio::test]
    async fn open_write_close_roundtrip() {
        let mgr = manager();
        let tty_id = mgr.open(Pid(1)).await.unwrap();
        assert!(mgr.write(tty_id, b"echo hi\n").await);
        assert_eq!(mgr.get_by_pid(Pid(1)), vec![tty_id]);
        mgr.close(tty_id).await.unwrap();
        assert!(mgr.get_by_pid(Pid(1)).is_empty());
    }

    #[tokio::test]
    async fn write_to_unknown_tty_is_false() {
        let mgr = manager();
        assert!(!mgr.write(Uuid::new_v4(), b"x").await);
    }

    #[tokio::test]
    async fn close_unknown_tty_is_not_found() {
        let mgr = manager();
        let err = mgr.close(Uuid::new_v4()).await.unwrap_err();
        assert_eq!(err.wire_code(), "not_found");
    }

    #[tokio::test]
    async fn shutdown_closes_all_sessions() {
        let mgr = manager();
        let a = mgr.open(Pid(1)).await.unwrap();
        let b = mgr.open(Pid(2)).await.unwrap();
        mgr.shutdown().await;
        assert!(mgr.get_by_pid(Pid(1)).is_empty());
        assert!(mgr.get_by_pid(Pid(2)).is_empty());
        let _ = (a, b);
    }
}
