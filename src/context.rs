use std::sync::Arc;

use crate::check::Gate;
use crate::config::GatewayConfig;
use crate::pdp::DecisionHandle;
use crate::registry::ResourceRegistry;
use crate::store::Settings;
use crate::upstream::Upstream;

/// Shared state handed to every request handler.
pub struct ServerContext {
    pub cfg: GatewayConfig,

    pub gate: Gate,

    pub registry: Arc<ResourceRegistry>,

    pub settings: Arc<Settings>,

    pub decision: Arc<DecisionHandle>,

    pub upstream: Arc<dyn Upstream>,
}
