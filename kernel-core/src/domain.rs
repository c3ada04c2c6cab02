//! Shared domain enums referenced by more than one subsystem crate, kept
//! here to avoid circular dependencies between `kernel-process`,
//! `kernel-auth`, and `kernel-server`.

use serde::{Deserialize, Serialize};

/// Process lifecycle state — the DAG of spec.md §4.4:
/// `created -> running <-> sleeping`, `running -> waiting -> running`,
/// `{running,sleeping,waiting} -> stopped -> running`, any -> `zombie -> dead`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessState {
    Created,
    Running,
    Sleeping,
    Waiting,
    Stopped,
    Zombie,
    Dead,
}

impl ProcessState {
    /// Validates a transition against the DAG in spec.md §4.4. `Created`
    /// is reachable only as an initial state, never as a target.
    pub fn can_transition_to(self, to: ProcessState) -> bool {
        use ProcessState::*;
        if to == Created {
            return false;
        }
        match (self, to) {
            (Created, Running) => true,
            (Running, Sleeping) | (Sleeping, Running) => true,
            (Running, Waiting) | (Waiting, Running) => true,
            (Running, Stopped) | (Sleeping, Stopped) | (Waiting, Stopped) => true,
            (Stopped, Running) => true,
            (_, Zombie) => self != Dead && self != Zombie,
            (Zombie, Dead) => true,
            // A direct terminal transition is allowed for processes that
            // never reach zombie (e.g. spawn failure -> dead immediately).
            (_, Dead) => self != Dead,
            _ => false,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, ProcessState::Dead)
    }
}

/// Finer-grained phase within a `Running` agent process (spec.md Glossary).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentPhase {
    Booting,
    Thinking,
    Executing,
    Waiting,
    Observing,
    Idle,
    Completed,
    Failed,
}

/// Unix-style signals accepted by `ProcessManager::signal` (spec.md §4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Signal {
    Sigterm,
    Sigkill,
    Sigstop,
    Sigcont,
    Sigint,
    Sigusr1,
    Sigusr2,
}

/// A system-level user role, distinct from an org-scoped [`OrgRole`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SystemRole {
    Admin,
    User,
}

/// A role scoped to membership in one [`crate::ids::OrgId`] (spec.md §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrgRole {
    Owner,
    Admin,
    Manager,
    Member,
    Viewer,
}

/// The curated permission list (spec.md §4.3's matrix columns). Curated and
/// closed — see SPEC_FULL.md's Open Question resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    OrgView,
    OrgManage,
    OrgDelete,
    MembersView,
    MembersInvite,
    MembersRemove,
    TeamsCreate,
    TeamsManage,
    AgentsView,
    AgentsSpawn,
    FsRead,
    FsWrite,
    PluginsManage,
}

impl OrgRole {
    /// The role -> permission matrix of spec.md §4.3, read literally off the
    /// table (✓ = allowed).
    pub fn allows(self, permission: Permission) -> bool {
        use OrgRole::*;
        use Permission::*;
        match self {
            Owner => true,
            Admin => !matches!(permission, OrgDelete),
            Manager => matches!(
                permission,
                OrgView | MembersView | MembersInvite | TeamsCreate | TeamsManage
                    | AgentsView | AgentsSpawn | FsRead | FsWrite
            ),
            Member => matches!(
                permission,
                OrgView | MembersView | AgentsView | AgentsSpawn | FsRead | FsWrite
            ),
            Viewer => matches!(permission, OrgView | MembersView | AgentsView | FsRead),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn process_state_never_returns_to_created() {
        assert!(!ProcessState::Running.can_transition_to(ProcessState::Created));
        assert!(!ProcessState::Dead.can_transition_to(ProcessState::Created));
    }

    #[test]
    fn zombie_must_precede_dead() {
        assert!(ProcessState::Zombie.can_transition_to(ProcessState::Dead));
    }

    #[test]
    fn owner_has_every_permission() {
        for p in [
            Permission::OrgView,
            Permission::OrgManage,
            Permission::OrgDelete,
            Permission::MembersView,
            Permission::MembersInvite,
            Permission::MembersRemove,
            Permission::TeamsCreate,
            Permission::TeamsManage,
            Permission::AgentsView,
            Permission::AgentsSpawn,
            Permission::FsRead,
            Permission::FsWrite,
            Permission::PluginsManage,
        ] {
            assert!(OrgRole::Owner.allows(p));
        }
    }

    #[test]
    fn viewer_cannot_write_fs() {
        assert!(!OrgRole::Viewer.allows(Permission::FsWrite));
        assert!(OrgRole::Viewer.allows(Permission::OrgView));
    }

    #[test]
    fn admin_cannot_delete_org() {
        assert!(!OrgRole::Admin.allows(Permission::OrgDelete));
        assert!(OrgRole::Admin.allows(Permission::OrgManage));
    }

    #[test]
    fn manager_cannot_manage_plugins_but_can_manage_teams() {
        assert!(!OrgRole::Manager.allows(Permission::PluginsManage));
        assert!(OrgRole::Manager.allows(Permission::TeamsManage));
        assert!(!OrgRole::Manager.allows(Permission::MembersRemove));
    }
}
