//! Wire-level shapes for `IntegrationManager` (spec.md §4.10).

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Input to `register`. `credentials` is provider-specific (for `s3`:
/// `access_key`, `secret_key`, `region`, `bucket`, `endpoint?`).
#[derive(Debug, Clone, Deserialize)]
pub struct IntegrationSpec {
    pub integration_type: String,
    pub name: String,
    pub credentials: Value,
}

/// The persisted record, credentials redacted.
#[derive(Debug, Clone, Serialize)]
pub struct IntegrationInfo {
    pub id: String,
    pub integration_type: String,
    pub name: String,
    pub status: String,
    pub available_actions: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TestResult {
    pub success: bool,
    pub message: String,
}
