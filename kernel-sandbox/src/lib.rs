//! Local pseudoterminal and container primitives (spec.md §4.6): the
//! `PtyBackend`/`ContainerBackend` trait pair and the `PtyManager` that
//! maps TTY ids onto whichever backend produced them.

pub mod backend;
pub mod manager;

pub use backend::{
    ContainerBackend, ContainerShell, DockerContainerBackend, LocalPtyBackend,
    NullContainerBackend, PtyBackend, SpawnedShell,
};
pub use manager::{PtyManager, TtySession};
