use std::sync::Arc;
use std::time::Duration;

use actix_web::http::StatusCode;
use actix_web::web::{self, Bytes, Data, PayloadConfig};
use actix_web::{App, HttpRequest, HttpResponse, HttpResponseBuilder, HttpServer};
use anyhow::{Context, Result};
use log::{error, info, warn};
use openssl::ssl::SslAcceptorBuilder;
use sd_notify::NotifyState;

use crate::api::{CommonResponse, HEADER_AUTHORIZATION, HEADER_CONTENT_TYPE};
use crate::context::ServerContext;
use crate::handlers::{self, bearer_token};
use crate::response::Response;
use crate::upstream::ProxyRequest;

pub struct RestfulServer {
    ssl: Option<SslAcceptorBuilder>,
    ctx: Arc<ServerContext>,

    keep_alive_secs: Option<u64>,
    workers: Option<u64>,

    bind: String,

    payload_limit_mib: usize,
}

impl RestfulServer {
    const API_PATH: &str = "/api";
    const CONFIG_PATH: &str = "/config";
    const HEALTHZ_PATH: &str = "/healthz";

    pub fn new(bind: String, ctx: Arc<ServerContext>, payload_limit_mib: usize) -> Self {
        Self {
            ssl: None,
            ctx,
            keep_alive_secs: None,
            workers: None,
            bind,
            payload_limit_mib,
        }
    }

    pub fn set_ssl(&mut self, ssl: SslAcceptorBuilder) {
        self.ssl = Some(ssl);
    }

    pub fn set_keep_alive_secs(&mut self, keep_alive_secs: u64) {
        self.keep_alive_secs = Some(keep_alive_secs);
    }

    pub fn set_workers(&mut self, workers: u64) {
        self.workers = Some(workers);
    }

    /// Route table for the gateway, shared between `run` and the tests.
    ///
    /// The whole `/api` scope funnels into `handle_api` regardless of method
    /// or depth; the pipeline decides what is enforced. Methods it cannot
    /// classify still have to reach the upstream (CORS preflight, HEAD).
    pub fn configure_routes(cfg: &mut web::ServiceConfig) {
        cfg.service(web::scope(Self::API_PATH).default_service(web::route().to(handle_api)))
            .service(
                web::scope(Self::CONFIG_PATH)
                    .route(
                        "/connection",
                        web::get().to(handlers::connection::get_connection),
                    )
                    .route(
                        "/connection",
                        web::put().to(handlers::connection::put_connection),
                    )
                    .route(
                        "/connection",
                        web::delete().to(handlers::connection::delete_connection),
                    )
                    .route("/mappings", web::get().to(handlers::mappings::get_mappings))
                    .route("/mappings", web::put().to(handlers::mappings::put_mappings))
                    .route(
                        "/exclusions",
                        web::get().to(handlers::exclusions::get_exclusions),
                    )
                    .route(
                        "/exclusions",
                        web::put().to(handlers::exclusions::put_exclusions),
                    ),
            )
            .service(
                web::resource(Self::HEALTHZ_PATH)
                    .route(web::get().to(handlers::healthz::get_healthz)),
            )
            .default_service(web::route().to(default_handler));
    }

    pub async fn run(mut self) -> Result<()> {
        let ctx = self.ctx.clone();
        let payload_limit = self.payload_limit_mib * 1024 * 1024;
        let mut srv = HttpServer::new(move || {
            App::new()
                .app_data(Data::new(ctx.clone()))
                .app_data(PayloadConfig::new(payload_limit))
                .configure(Self::configure_routes)
        });

        if let Some(ssl) = self.ssl.take() {
            info!("Binding to https://{}", self.bind);
            srv = srv.bind_openssl(&self.bind, ssl).context("bind with ssl")?
        } else {
            warn!("Using HTTP (without SSL). THIS IS DANGEROUS, DO NOT USE IN PRODUCTION");
            info!("Binding to http://{}", self.bind);
            srv = srv.bind(&self.bind).context("bind without ssl")?
        };

        if let Some(keep_alive) = self.keep_alive_secs {
            srv = srv.keep_alive(Duration::from_secs(keep_alive));
        }
        if let Some(workers) = self.workers {
            srv = srv.workers(workers as usize);
        }

        sd_notify::notify(true, &[NotifyState::Ready]).context("notify systemd")?;
        info!("Starting restful server");
        srv.run().await.context("run server")?;

        info!("Server stopped by user");
        Ok(())
    }
}

/// The enforcement path: evaluate the policy pipeline, then either reject
/// with the fixed forbidden body or forward the request untouched to the
/// upstream content API.
pub async fn handle_api(
    req: HttpRequest,
    body: Option<Bytes>,
    ctx: Data<Arc<ServerContext>>,
) -> HttpResponse {
    let method = req.method().as_str().to_string();
    let path = req.uri().path().to_string();
    let bearer = bearer_token(&req);

    let verdict = ctx.gate.evaluate(&method, &path, bearer.as_deref()).await;
    if !verdict.proceeds() {
        return Response::forbidden("You are not authorized to perform this action").into();
    }

    let mut headers = Vec::new();
    for name in [HEADER_AUTHORIZATION, HEADER_CONTENT_TYPE] {
        if let Some(value) = req.headers().get(name).and_then(|v| v.to_str().ok()) {
            headers.push((name.to_string(), value.to_string()));
        }
    }

    let proxy_req = ProxyRequest {
        method,
        path,
        query: req.query_string().to_string(),
        headers,
        body: body.map(|b| b.to_vec()),
    };

    match ctx.upstream.forward(proxy_req).await {
        Ok(resp) => {
            let status =
                StatusCode::from_u16(resp.status).unwrap_or(StatusCode::BAD_GATEWAY);
            let mut builder = HttpResponseBuilder::new(status);
            if let Some(content_type) = resp.content_type {
                builder.content_type(content_type);
            }
            builder.body(resp.body)
        }
        Err(e) => {
            error!("Failed to forward request upstream: {e:#}");
            Response::bad_gateway(format!("{e:#}")).into()
        }
    }
}

async fn default_handler(req: HttpRequest) -> HttpResponse {
    let path = req.uri().path().to_string();
    let method = req.method().as_str().to_string();
    let message = format!("No route to {method} {path}");
    let ret = CommonResponse {
        code: StatusCode::NOT_FOUND.into(),
        message: Some(message),
    };
    HttpResponse::NotFound().json(ret)
}
