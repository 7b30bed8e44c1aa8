use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::Method;
use serde::{Deserialize, Serialize};

use crate::paths::{CommonConfig, PathSet};

/// The protected content API behind the gateway.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct UpstreamConfig {
    /// Base URL of the upstream content API.
    #[serde(default)]
    pub url: String,

    /// Optional service token for record lookups the gateway makes on its
    /// own behalf (subject and instance enrichment).
    pub token: Option<String>,

    /// Path under which subject records live, joined with the raw id.
    #[serde(default = "UpstreamConfig::default_users_path")]
    pub users_path: String,

    #[serde(default = "UpstreamConfig::default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        UpstreamConfig {
            url: String::new(),
            token: None,
            users_path: Self::default_users_path(),
            timeout_secs: Self::default_timeout_secs(),
        }
    }
}

impl CommonConfig for UpstreamConfig {
    fn complete(&mut self, _ps: &PathSet) -> Result<()> {
        if self.url.is_empty() {
            bail!("upstream url is required");
        }
        if !self.url.starts_with("http://") && !self.url.starts_with("https://") {
            bail!("upstream url must be http or https");
        }
        if self.users_path.is_empty() || !self.users_path.starts_with('/') {
            bail!("users_path must start with '/'");
        }
        if self.timeout_secs == 0 {
            bail!("timeout_secs must be greater than 0");
        }
        self.url = self.url.trim_end_matches('/').to_string();
        Ok(())
    }
}

impl UpstreamConfig {
    fn default_users_path() -> String {
        String::from("/api/users")
    }

    fn default_timeout_secs() -> u64 {
        30
    }
}

/// A request the gateway forwards after the policy check passes.
#[derive(Debug, Clone)]
pub struct ProxyRequest {
    pub method: String,
    pub path: String,
    pub query: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Vec<u8>>,
}

/// What came back from the upstream, replayed to the caller.
#[derive(Debug, Clone)]
pub struct ProxyResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

/// Trait for forwarding requests to the protected content API.
#[async_trait]
pub trait Upstream: Send + Sync {
    async fn forward(&self, req: ProxyRequest) -> Result<ProxyResponse>;
}

pub struct HttpUpstream {
    base: String,
    client: reqwest::Client,
}

impl HttpUpstream {
    pub fn new(cfg: &UpstreamConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()
            .context("build upstream client")?;
        Ok(Self {
            base: cfg.url.trim_end_matches('/').to_string(),
            client,
        })
    }
}

#[async_trait]
impl Upstream for HttpUpstream {
    async fn forward(&self, req: ProxyRequest) -> Result<ProxyResponse> {
        let method = Method::from_bytes(req.method.as_bytes())
            .with_context(|| format!("invalid method '{}'", req.method))?;

        let url = if req.query.is_empty() {
            format!("{}{}", self.base, req.path)
        } else {
            format!("{}{}?{}", self.base, req.path, req.query)
        };

        let mut outbound = self.client.request(method, &url);
        for (key, value) in req.headers {
            outbound = outbound.header(key, value);
        }
        if let Some(body) = req.body {
            outbound = outbound.body(body);
        }

        let resp = outbound.send().await.context("forward request upstream")?;

        let status = resp.status().as_u16();
        let content_type = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(String::from);
        let body = resp.bytes().await.context("read upstream response")?;

        Ok(ProxyResponse {
            status,
            content_type,
            body: body.to_vec(),
        })
    }
}
