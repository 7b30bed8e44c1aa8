use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use log::debug;
use reqwest::{StatusCode, Url};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::check::{ActionVerb, ResourceDescriptor, Subject};

use super::DecisionClient;

#[derive(Debug, Serialize)]
struct CheckRequest<'a> {
    user: &'a Subject,
    action: &'a str,
    resource: &'a ResourceDescriptor,
    context: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct CheckResponse {
    allow: bool,
}

/// HTTP client for a hosted policy decision point.
///
/// The decision endpoint is `POST <url>/allowed` with a bearer token; the
/// answer is `{"allow": <bool>}`. All calls are bounded by the configured
/// timeout.
pub struct HttpDecisionClient {
    url: String,
    token: String,
    client: reqwest::Client,
}

pub struct HttpDecisionClientBuilder {
    url: String,
    token: String,
    timeout_secs: u64,
}

impl HttpDecisionClient {
    const ALLOWED_PATH: &str = "/allowed";
    const HEALTHY_PATH: &str = "/healthy";

    /// Probes the decision point's health endpoint. Used when an
    /// administrator submits connection settings, before they are saved.
    pub async fn check_health(&self) -> Result<()> {
        let url = format!("{}{}", self.url, Self::HEALTHY_PATH);
        let resp = self
            .client
            .get(&url)
            .bearer_auth(&self.token)
            .send()
            .await
            .context("request decision service health")?;

        match resp.status() {
            StatusCode::OK => Ok(()),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                bail!("decision service rejected the API token")
            }
            status => bail!("decision service health returned {status}"),
        }
    }
}

#[async_trait]
impl DecisionClient for HttpDecisionClient {
    async fn check(
        &self,
        subject: &Subject,
        action: ActionVerb,
        resource: &ResourceDescriptor,
    ) -> Result<bool> {
        let url = format!("{}{}", self.url, Self::ALLOWED_PATH);
        let body = CheckRequest {
            user: subject,
            action: action.as_str(),
            resource,
            context: Map::new(),
        };

        debug!(
            "Decision check: subject={}, action={}, resource={}",
            subject.key(),
            action.as_str(),
            resource.type_name()
        );

        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await
            .context("request decision service")?;

        let status = resp.status();
        if !status.is_success() {
            bail!("decision service returned {status}");
        }

        let decision: CheckResponse = resp
            .json()
            .await
            .context("parse decision service response")?;
        Ok(decision.allow)
    }
}

impl HttpDecisionClientBuilder {
    pub fn new(url: &str, token: &str, timeout_secs: u64) -> Self {
        Self {
            url: url.trim_end_matches('/').to_string(),
            token: token.to_string(),
            timeout_secs,
        }
    }

    /// Builds the client without contacting the decision point. Used at boot
    /// when the stored connection was already validated once.
    pub fn build(self) -> Result<HttpDecisionClient> {
        let parsed = match Url::parse(&self.url) {
            Ok(url) => url,
            Err(_) => bail!("invalid decision service url '{}'", self.url),
        };

        match parsed.scheme() {
            "http" | "https" => {}
            _ => bail!(
                "invalid url scheme, expect 'http' or 'https', not '{}'",
                parsed.scheme()
            ),
        }

        if self.token.is_empty() {
            bail!("decision service token is required");
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(self.timeout_secs))
            .build()
            .context("build decision service client")?;

        Ok(HttpDecisionClient {
            url: self.url,
            token: self.token,
            client,
        })
    }

    /// Builds the client and validates the connection with a health probe.
    pub async fn connect(self) -> Result<HttpDecisionClient> {
        let client = self.build()?;
        client
            .check_health()
            .await
            .context("check decision service health")?;
        Ok(client)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_validation() {
        // Valid urls build, trailing slash is trimmed
        let client = HttpDecisionClientBuilder::new("http://localhost:7766/", "key", 5)
            .build()
            .unwrap();
        assert_eq!(client.url, "http://localhost:7766");

        // Bad scheme
        assert!(
            HttpDecisionClientBuilder::new("ftp://localhost:7766", "key", 5)
                .build()
                .is_err()
        );

        // Not a url at all
        assert!(HttpDecisionClientBuilder::new("localhost", "key", 5)
            .build()
            .is_err());

        // Missing token
        assert!(
            HttpDecisionClientBuilder::new("http://localhost:7766", "", 5)
                .build()
                .is_err()
        );
    }
}
