//! Shared foundation crate for the Aether agent kernel: error taxonomy,
//! identifiers, the event bus, domain enums, configuration, and logging
//! bootstrap. Every other `kernel-*` crate depends on this one and nothing
//! here depends on them — it is the leaf of the dependency graph.

pub mod config;
pub mod domain;
pub mod error;
pub mod event;
pub mod ids;
pub mod logging;

pub use config::KernelConfig;
pub use domain::{AgentPhase, OrgRole, Permission, ProcessState, Signal, SystemRole};
pub use error::{KernelError, Result, WireError};
pub use event::{EventBus, EventEnvelope, KernelEvent, Unsubscribe};
pub use ids::{OrgId, Pid, PidAllocator, TeamId, TtyId, UserId};
