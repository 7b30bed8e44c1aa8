use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use log::{info, warn};
use openssl::ssl::{SslAcceptor, SslAcceptorBuilder, SslMethod};
use serde::{Deserialize, Serialize};

use crate::authn::config::IdentityConfig;
use crate::authn::jwt::JwtTokenVerifier;
use crate::check::Gate;
use crate::context::ServerContext;
use crate::fetch::UpstreamFetcher;
use crate::logs::LogsConfig;
use crate::paths::{CommonConfig, PathSet};
use crate::pdp::config::PdpConfig;
use crate::pdp::{DecisionHandle, HttpDecisionClientBuilder};
use crate::registry::{ResourceRegistry, ResourceSpec};
use crate::restful::RestfulServer;
use crate::store::config::StoreConfig;
use crate::store::{Settings, SettingsDb};
use crate::upstream::{HttpUpstream, UpstreamConfig};

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct GatewayConfig {
    #[serde(default = "GatewayConfig::default_bind")]
    pub bind: String,

    #[serde(default)]
    pub ssl: bool,

    /// Static bearer token protecting the /config admin surface.
    #[serde(default)]
    pub admin_token: String,

    pub keep_alive_secs: Option<u64>,

    pub workers: Option<u64>,

    #[serde(default = "GatewayConfig::default_payload_limit_mib")]
    pub payload_limit_mib: usize,

    /// Resource types the gateway enforces policy for. Requests to segments
    /// not listed here pass through unchecked.
    #[serde(default)]
    pub resources: Vec<ResourceSpec>,

    #[serde(default)]
    pub identity: IdentityConfig,

    #[serde(default)]
    pub upstream: UpstreamConfig,

    #[serde(default)]
    pub pdp: PdpConfig,

    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub logs: LogsConfig,

    #[serde(skip)]
    pki_dir: PathBuf,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        GatewayConfig {
            bind: Self::default_bind(),
            ssl: false,
            admin_token: String::new(),
            keep_alive_secs: None,
            workers: None,
            payload_limit_mib: Self::default_payload_limit_mib(),
            resources: Vec::new(),
            identity: IdentityConfig::default(),
            upstream: UpstreamConfig::default(),
            pdp: PdpConfig::default(),
            store: StoreConfig::default(),
            logs: LogsConfig::default(),
            pki_dir: PathBuf::new(),
        }
    }
}

impl CommonConfig for GatewayConfig {
    fn complete(&mut self, ps: &PathSet) -> Result<()> {
        if self.bind.is_empty() {
            bail!("bind is required");
        }

        if self.admin_token.is_empty() {
            bail!("admin_token is required");
        }

        if let Some(keep_alive_secs) = self.keep_alive_secs {
            if keep_alive_secs == 0 {
                bail!("keep_alive_secs must be greater than 0");
            }
        }

        if let Some(workers) = self.workers {
            if workers == 0 {
                bail!("workers must be greater than 0");
            }
        }

        if self.payload_limit_mib == 0 {
            bail!("payload_limit_mib must be greater than 0");
        }

        if self.resources.is_empty() {
            warn!("No resources configured, all requests will pass through unchecked");
        }

        self.identity.complete(ps).context("identity")?;
        self.upstream.complete(ps).context("upstream")?;
        self.pdp.complete(ps).context("pdp")?;
        self.store.complete(ps).context("store")?;
        self.logs.complete(ps).context("logs")?;

        self.pki_dir = ps.pki_path.clone();

        Ok(())
    }
}

impl GatewayConfig {
    pub fn build_ctx(&self) -> Result<Arc<ServerContext>> {
        let registry = Arc::new(
            ResourceRegistry::new(self.resources.clone()).context("init resource registry")?,
        );

        let db = SettingsDb::open(&self.store.path).context("init settings store")?;
        let settings = Arc::new(Settings::new(db));

        let verifier = Arc::new(
            JwtTokenVerifier::new(&self.identity.secret, self.identity.subject_prefix.clone())
                .context("init token verifier")?,
        );

        let fetcher = Arc::new(UpstreamFetcher::new(&self.upstream).context("init fetcher")?);
        let upstream = Arc::new(HttpUpstream::new(&self.upstream).context("init upstream")?);

        let decision = Arc::new(DecisionHandle::new());
        self.init_decision_client(&settings, &decision)?;

        let gate = Gate::new(
            registry.clone(),
            settings.clone(),
            verifier,
            decision.clone(),
            fetcher,
        );

        let ctx = ServerContext {
            cfg: self.clone(),
            gate,
            registry,
            settings,
            decision,
            upstream,
        };
        Ok(Arc::new(ctx))
    }

    /// Installs the decision client from stored connection settings, when
    /// present. The stored settings were health-probed when they were saved,
    /// so boot does not probe again; an unreachable decision point must not
    /// keep the gateway down. A client that cannot even be built leaves
    /// enforcement fail-open.
    fn init_decision_client(
        &self,
        settings: &Arc<Settings>,
        decision: &Arc<DecisionHandle>,
    ) -> Result<()> {
        let snapshot = settings.snapshot().context("load settings")?;
        let connection = match snapshot.connection {
            Some(ref connection) => connection,
            None => {
                warn!("No decision service configured, enforcement is fail-open");
                return Ok(());
            }
        };

        let builder = HttpDecisionClientBuilder::new(
            &connection.url,
            &connection.token,
            self.pdp.timeout_secs,
        );
        match builder.build() {
            Ok(client) => {
                info!("Decision service client ready for {}", connection.url);
                decision.install(Arc::new(client));
            }
            Err(e) => {
                warn!("Stored connection settings are unusable, enforcement is fail-open: {e:#}");
            }
        }
        Ok(())
    }

    pub fn build_restful_server(&self, ctx: Arc<ServerContext>) -> Result<RestfulServer> {
        let mut srv = RestfulServer::new(self.bind.clone(), ctx, self.payload_limit_mib);
        if self.ssl {
            let ssl = self.build_ssl()?;
            srv.set_ssl(ssl);
        }

        if let Some(keep_alive_secs) = self.keep_alive_secs {
            srv.set_keep_alive_secs(keep_alive_secs);
        }

        if let Some(workers) = self.workers {
            srv.set_workers(workers);
        }

        Ok(srv)
    }

    fn build_ssl(&self) -> Result<SslAcceptorBuilder> {
        let key_path = self.pki_dir.join("key.pem");
        if !key_path.exists() {
            bail!("ssl key file not exists: {:?}", key_path);
        }

        let cert_path = self.pki_dir.join("cert.pem");
        if !cert_path.exists() {
            bail!("ssl cert file not exists: {:?}", cert_path);
        }

        let mut builder =
            SslAcceptor::mozilla_intermediate(SslMethod::tls()).context("init ssl acceptor")?;

        builder
            .set_private_key_file(&key_path, openssl::ssl::SslFiletype::PEM)
            .context("load ssl key file")?;
        builder
            .set_certificate_chain_file(&cert_path)
            .context("load ssl cert file")?;

        Ok(builder)
    }

    fn default_bind() -> String {
        String::from("127.0.0.1:8787")
    }

    fn default_payload_limit_mib() -> usize {
        16
    }
}
