//! Provider trait plus the concrete connectors (spec.md §4.10: "each
//! provider declares an action list and a signer").

pub mod s3;

use async_trait::async_trait;
use serde_json::Value;

/// One executed call's outcome, logged verbatim by the manager.
pub struct ProviderResult {
    pub data: Value,
}

#[async_trait]
pub trait Provider: Send + Sync {
    fn actions(&self) -> &'static [&'static str];

    /// A cheap connectivity probe (spec.md's `test(id)`).
    async fn test(&self, credentials: &Value) -> Result<String, String>;

    async fn execute(&self, action: &str, params: Value, credentials: &Value) -> Result<ProviderResult, String>;
}

/// Builds the provider for a known `integration_type`, or `None`.
pub fn for_type(integration_type: &str) -> Option<Box<dyn Provider>> {
    match integration_type {
        "s3" => Some(Box::new(s3::S3Provider::new())),
        _ => None,
    }
}
