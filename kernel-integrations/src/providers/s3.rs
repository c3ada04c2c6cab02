//! S3 connector: the provider named directly in spec.md §4.10 ("S3
//! provider implements AWS Signature V4 exactly").

use super::{Provider, ProviderResult};
use crate::sigv4;
use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;

#[derive(Debug, Deserialize)]
struct S3Credentials {
    access_key: String,
    secret_key: String,
    region: String,
    bucket: String,
    #[serde(default)]
    endpoint: Option<String>,
}

impl S3Credentials {
    fn from_value(credentials: &Value) -> Result<Self, String> {
        serde_json::from_value(credentials.clone()).map_err(|e| format!("invalid s3 credentials: {e}"))
    }

    /// `https://{bucket}.s3.{region}.amazonaws.com`, or the configured
    /// S3-compatible endpoint verbatim.
    fn base_url(&self) -> String {
        self.endpoint
            .clone()
            .unwrap_or_else(|| format!("https://{}.s3.{}.amazonaws.com", self.bucket, self.region))
    }

    fn host(&self) -> String {
        let base = self.base_url();
        base.trim_start_matches("https://").trim_start_matches("http://").to_string()
    }
}

pub struct S3Provider {
    client: reqwest::Client,
}

impl S3Provider {
    pub fn new() -> Self {
        Self { client: reqwest::Client::new() }
    }
}

impl Default for S3Provider {
    fn default() -> Self {
        Self::new()
    }
}

impl S3Provider {
    async fn send(
        &self,
        method: reqwest::Method,
        creds: &S3Credentials,
        key: &str,
        query: &str,
        body: Vec<u8>,
    ) -> Result<reqwest::Response, String> {
        let uri = if key.is_empty() { "/".to_string() } else { format!("/{key}") };
        let url = format!("{}{uri}{}", creds.base_url(), if query.is_empty() { String::new() } else { format!("?{query}") });

        let mut headers = BTreeMap::new();
        headers.insert("host".to_string(), creds.host());

        let signed = sigv4::sign(
            method.as_str(),
            &uri,
            query,
            &headers,
            &body,
            &creds.region,
            "s3",
            &creds.access_key,
            &creds.secret_key,
            Utc::now(),
        );

        self.client
            .request(method, &url)
            .header("host", creds.host())
            .header("x-amz-date", signed.x_amz_date)
            .header("x-amz-content-sha256", signed.x_amz_content_sha256)
            .header("Authorization", signed.authorization)
            .body(body)
            .send()
            .await
            .map_err(|e| format!("Network error: {e}"))
    }
}

#[async_trait]
impl Provider for S3Provider {
    fn actions(&self) -> &'static [&'static str] {
        &["list_objects", "get_object", "put_object", "delete_object"]
    }

    async fn test(&self, credentials: &Value) -> Result<String, String> {
        let creds = S3Credentials::from_value(credentials)?;
        let resp = self.send(reqwest::Method::GET, &creds, "", "list-type=2&max-keys=1", Vec::new()).await?;
        if resp.status().is_success() {
            Ok(format!("connected to bucket '{}'", creds.bucket))
        } else {
            Err(format!("HTTP {}", resp.status().as_u16()))
        }
    }

    async fn execute(&self, action: &str, params: Value, credentials: &Value) -> Result<ProviderResult, String> {
        let creds = S3Credentials::from_value(credentials)?;
        match action {
            "list_objects" => {
                let prefix = params.get("prefix").and_then(Value::as_str).unwrap_or("");
                let query = if prefix.is_empty() { "list-type=2".to_string() } else { format!("list-type=2&prefix={prefix}") };
                let resp = self.send(reqwest::Method::GET, &creds, "", &query, Vec::new()).await?;
                let status = resp.status();
                let body = resp.text().await.map_err(|e| format!("Network error: {e}"))?;
                if !status.is_success() {
                    return Err(format!("HTTP {}", status.as_u16()));
                }
                Ok(ProviderResult { data: json!({ "xml": body }) })
            }
            "get_object" => {
                let key = params.get("key").and_then(Value::as_str).ok_or("missing 'key' param")?;
                let resp = self.send(reqwest::Method::GET, &creds, key, "", Vec::new()).await?;
                let status = resp.status();
                let bytes = resp.bytes().await.map_err(|e| format!("Network error: {e}"))?;
                if !status.is_success() {
                    return Err(format!("HTTP {}", status.as_u16()));
                }
                Ok(ProviderResult { data: json!({ "base64": base64::Engine::encode(&base64::engine::general_purpose::STANDARD, bytes) }) })
            }
            "put_object" => {
                let key = params.get("key").and_then(Value::as_str).ok_or("missing 'key' param")?;
                let body_b64 = params.get("body").and_then(Value::as_str).unwrap_or("");
                let body = base64::Engine::decode(&base64::engine::general_purpose::STANDARD, body_b64)
                    .map_err(|e| format!("invalid base64 body: {e}"))?;
                let resp = self.send(reqwest::Method::PUT, &creds, key, "", body).await?;
                let status = resp.status();
                if !status.is_success() {
                    return Err(format!("HTTP {}", status.as_u16()));
                }
                Ok(ProviderResult { data: json!({ "key": key }) })
            }
            "delete_object" => {
                let key = params.get("key").and_then(Value::as_str).ok_or("missing 'key' param")?;
                let resp = self.send(reqwest::Method::DELETE, &creds, key, "", Vec::new()).await?;
                let status = resp.status();
                if !status.is_success() && status.as_u16() != 204 {
                    return Err(format!("HTTP {}", status.as_u16()));
                }
                Ok(ProviderResult { data: json!({ "key": key }) })
            }
            other => Err(format!("unknown action '{other}'")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_defaults_to_virtual_hosted_style() {
        let creds = S3Credentials {
            access_key: "a".into(),
            secret_key: "b".into(),
            region: "us-east-1".into(),
            bucket: "my-bucket".into(),
            endpoint: None,
        };
        assert_eq!(creds.base_url(), "https://my-bucket.s3.us-east-1.amazonaws.com");
    }

    #[test]
    fn custom_endpoint_is_used_verbatim() {
        let creds = S3Credentials {
            access_key: "a".into(),
            secret_key: "b".into(),
            region: "us-east-1".into(),
            bucket: "my-bucket".into(),
            endpoint: Some("http://localhost:9000".into()),
        };
        assert_eq!(creds.base_url(), "http://localhost:9000");
    }
}
