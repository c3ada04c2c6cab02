//! Identity, credential, and permission layer for the Aether kernel:
//! users, opaque bearer tokens, orgs/teams, and role-to-permission
//! resolution (spec.md §4.3). Grounded in structure on the teacher's
//! `cc::permissions` module, re-expressed over durable storage instead of
//! an in-memory tool-permission policy.

pub mod manager;
pub mod password;
pub mod token;

pub use manager::{AuthManager, User};
