mod http;

pub mod config;

pub use http::{HttpDecisionClient, HttpDecisionClientBuilder};

use std::sync::{Arc, RwLock};

use anyhow::Result;
use async_trait::async_trait;

use crate::check::{ActionVerb, ResourceDescriptor, Subject};

/// Trait for policy decision clients.
///
/// Implementors answer whether a subject may perform an action on a
/// resource. Any error from `check` is treated by the caller as "decision
/// unavailable" and handled fail-open; implementations should not try to
/// mask their own failures.
#[async_trait]
pub trait DecisionClient: Send + Sync {
    /// Asks the decision service whether the request is allowed.
    async fn check(
        &self,
        subject: &Subject,
        action: ActionVerb,
        resource: &ResourceDescriptor,
    ) -> Result<bool>;
}

/// Holder for the currently configured decision client.
///
/// The client is constructed explicitly from persisted connection settings:
/// installed when an administrator saves a connection (and at boot when one
/// is already stored), torn down when the connection is deleted. "Not yet
/// configured" is an explicit `None`, observed by the pipeline as a
/// fail-open condition.
pub struct DecisionHandle {
    client: RwLock<Option<Arc<dyn DecisionClient>>>,
}

impl DecisionHandle {
    pub fn new() -> Self {
        Self {
            client: RwLock::new(None),
        }
    }

    pub fn with_client(client: Arc<dyn DecisionClient>) -> Self {
        Self {
            client: RwLock::new(Some(client)),
        }
    }

    pub fn install(&self, client: Arc<dyn DecisionClient>) {
        let mut slot = self.client.write().unwrap();
        *slot = Some(client);
    }

    pub fn teardown(&self) {
        let mut slot = self.client.write().unwrap();
        *slot = None;
    }

    pub fn current(&self) -> Option<Arc<dyn DecisionClient>> {
        self.client.read().unwrap().clone()
    }

    pub fn is_configured(&self) -> bool {
        self.client.read().unwrap().is_some()
    }
}

impl Default for DecisionHandle {
    fn default() -> Self {
        Self::new()
    }
}
