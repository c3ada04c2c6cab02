//! External service connectors behind one uniform shape (spec.md §4.10):
//! `register → test → execute → getLogs`, plus a hand-rolled AWS
//! Signature V4 signer for the S3 provider.

pub mod manager;
pub mod providers;
pub mod sigv4;
pub mod types;

pub use manager::IntegrationManager;
pub use providers::Provider;
pub use types::{IntegrationInfo, IntegrationSpec, TestResult};
