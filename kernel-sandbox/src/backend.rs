//! `PTYBackend` and `ContainerBackend` traits (spec.md §4.6). A pure-Rust
//! backend built over `std::process::Command` + pipes stands in for a real
//! ioctl-level PTY allocation; the hard requirement is the interface
//! contract, not a specific terminfo binding (spec.md §1's Non-goal).

use async_trait::async_trait;
use kernel_core::{KernelError, Pid, Result};
use std::process::Stdio;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::process::{Child, Command};

/// One end of a spawned shell: readable stdout/stderr, writable stdin, and
/// the child handle used for resize/kill.
pub struct SpawnedShell {
    pub child: Child,
    pub stdin: Box<dyn AsyncWrite + Send + Unpin>,
    pub stdout: Box<dyn AsyncRead + Send + Unpin>,
}

#[async_trait]
pub trait PtyBackend: Send + Sync {
    /// Spawns a local shell for `pid`. Always succeeds unless the host is
    /// out of process slots.
    async fn spawn(&self, pid: Pid) -> Result<SpawnedShell>;

    /// Best-effort terminal resize; local backends may ignore cols/rows if
    /// they have no real ioctl behind them.
    async fn resize(&self, child: &mut Child, cols: u16, rows: u16) -> Result<()>;
}

/// The default pure-Rust local backend: a login-ish shell over plain pipes.
pub struct LocalPtyBackend {
    shell: String,
}

impl LocalPtyBackend {
    pub fn new(shell: impl Into<String>) -> Self {
        Self { shell: shell.into() }
    }
}

impl Default for LocalPtyBackend {
    fn default() -> Self {
        Self::new(std::env::var("SHELL").unwrap_or_else(|_| "/bin/sh".to_string()))
    }
}

#[async_trait]
impl PtyBackend for LocalPtyBackend {
    async fn spawn(&self, pid: Pid) -> Result<SpawnedShell> {
        let mut child = Command::new(&self.shell)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| KernelError::SandboxUnavailable(format!("pid {pid}: spawn shell failed: {e}")))?;
        let stdin = child.stdin.take().ok_or_else(|| {
            KernelError::SandboxUnavailable(format!("pid {pid}: no stdin handle"))
        })?;
        let stdout = child.stdout.take().ok_or_else(|| {
            KernelError::SandboxUnavailable(format!("pid {pid}: no stdout handle"))
        })?;
        Ok(SpawnedShell {
            child,
            stdin: Box::new(stdin),
            stdout: Box::new(stdout),
        })
    }

    async fn resize(&self, _child: &mut Child, _cols: u16, _rows: u16) -> Result<()> {
        // No real ioctl behind this backend; resize is a silent no-op,
        // matching spec.md §4.6's "container sessions may silently
        // succeed" allowance extended here to the plain-pipe case too.
        Ok(())
    }
}

/// A running sandboxed process handed back by a [`ContainerBackend`].
pub struct ContainerShell {
    pub child: Child,
    pub stdin: Box<dyn AsyncWrite + Send + Unpin>,
    pub stdout: Box<dyn AsyncRead + Send + Unpin>,
}

#[async_trait]
pub trait ContainerBackend: Send + Sync {
    /// Attempts to start a containerized shell for `pid`. `None` means "no
    /// container attached" — the caller falls back to [`PtyBackend`].
    async fn spawn_shell(&self, pid: Pid) -> Result<Option<ContainerShell>>;
}

/// Default backend: never offers a container (spec.md §1 excludes Docker's
/// own internals from the hard core).
#[derive(Default)]
pub struct NullContainerBackend;

#[async_trait]
impl ContainerBackend for NullContainerBackend {
    async fn spawn_shell(&self, _pid: Pid) -> Result<Option<ContainerShell>> {
        Ok(None)
    }
}

/// Shells out to the `docker` CLI. Best-effort: any failure to launch
/// Docker itself degrades to `Ok(None)` rather than hard-failing the spawn,
/// since the caller always has the local PTY backend to fall back to.
pub struct DockerContainerBackend {
    image: String,
}

impl DockerContainerBackend {
    pub fn new(image: impl Into<String>) -> Self {
        Self { image: image.into() }
    }
}

#[async_trait]
impl ContainerBackend for DockerContainerBackend {
    async fn spawn_shell(&self, pid: Pid) -> Result<Option<ContainerShell>> {
        let mut child = match Command::new("docker")
            .args([
                "run",
                "--rm",
                "-i",
                "--name",
                &format!("aether-{pid}"),
                &self.image,
                "/bin/sh",
            ])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
        {
            Ok(child) => child,
            Err(e) => {
                tracing::warn!(pid = pid.0, error = %e, "docker unavailable, falling back to local pty");
                return Ok(None);
            }
        };
        let stdin = child.stdin.take();
        let stdout = child.stdout.take();
        match (stdin, stdout) {
            (Some(stdin), Some(stdout)) => Ok(Some(ContainerShell {
                child,
                stdin: Box::new(stdin),
                stdout: Box::new(stdout),
            })),
            _ => Ok(None),
        }
    }
}
