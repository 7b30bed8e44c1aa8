use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::{Map, Value};

use crate::registry::ResourceSpec;
use crate::upstream::UpstreamConfig;

/// Trait for per-entity record lookups against the system of record.
///
/// Both operations are best-effort from the pipeline's point of view: a
/// `None` means the record does not exist, an `Err` means the lookup itself
/// failed. Either way the caller degrades to an unenriched subject or
/// resource, it never fails the request.
#[async_trait]
pub trait RecordFetcher: Send + Sync {
    /// Fetches the full subject record by its raw identifier.
    async fn fetch_subject(&self, id: &str) -> Result<Option<Map<String, Value>>>;

    /// Fetches one resource instance by its opaque key.
    async fn fetch_instance(
        &self,
        spec: &ResourceSpec,
        key: &str,
    ) -> Result<Option<Map<String, Value>>>;
}

/// Record fetcher backed by the upstream content API itself.
pub struct UpstreamFetcher {
    base: String,
    users_path: String,
    token: Option<String>,
    client: reqwest::Client,
}

impl UpstreamFetcher {
    pub fn new(cfg: &UpstreamConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()
            .context("build record fetcher client")?;

        Ok(Self {
            base: cfg.url.trim_end_matches('/').to_string(),
            users_path: cfg.users_path.clone(),
            token: cfg.token.clone(),
            client,
        })
    }

    async fn fetch(&self, url: String) -> Result<Option<Map<String, Value>>> {
        let mut req = self.client.get(&url);
        if let Some(ref token) = self.token {
            req = req.bearer_auth(token);
        }

        let resp = req.send().await.context("request upstream record")?;

        let status = resp.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            bail!("upstream returned {status} for {url}");
        }

        let value: Value = resp.json().await.context("parse upstream record")?;
        Ok(flatten_record(value))
    }
}

#[async_trait]
impl RecordFetcher for UpstreamFetcher {
    async fn fetch_subject(&self, id: &str) -> Result<Option<Map<String, Value>>> {
        let url = format!("{}{}/{}", self.base, self.users_path, id);
        self.fetch(url).await
    }

    async fn fetch_instance(
        &self,
        spec: &ResourceSpec,
        key: &str,
    ) -> Result<Option<Map<String, Value>>> {
        let url = format!("{}/api/{}/{}", self.base, spec.plural, key);
        self.fetch(url).await
    }
}

/// Unwraps the content API's response envelope down to a flat field map.
///
/// Accepts three shapes: a plain object, `{"data": <record>}`, and
/// `{"data": {"id": .., "attributes": {..}}}`. In the last case the id is
/// folded into the attribute map so mapped fields and the id are addressed
/// uniformly.
pub fn flatten_record(value: Value) -> Option<Map<String, Value>> {
    let map = match value {
        Value::Object(map) => map,
        _ => return None,
    };

    if let Some(data) = map.get("data") {
        if !data.is_null() {
            return flatten_record(data.clone());
        }
        return None;
    }

    if let Some(Value::Object(attrs)) = map.get("attributes") {
        let mut merged = attrs.clone();
        if let Some(id) = map.get("id") {
            merged.insert("id".to_string(), id.clone());
        }
        return Some(merged);
    }

    Some(map)
}
