use std::sync::Arc;

use actix_web::web::{Bytes, Data};
use actix_web::{HttpRequest, HttpResponse};
use log::{error, info};

use crate::api::{ConnectionPayload, ConnectionStatus};
use crate::context::ServerContext;
use crate::pdp::HttpDecisionClientBuilder;
use crate::response::Response;

use super::{parse_json, require_admin};

pub async fn get_connection(
    req: HttpRequest,
    ctx: Data<Arc<ServerContext>>,
) -> HttpResponse {
    if let Some(resp) = require_admin(&ctx, &req) {
        return resp.into();
    }

    let snapshot = match ctx.settings.snapshot() {
        Ok(snapshot) => snapshot,
        Err(e) => {
            error!("Failed to read connection settings: {e:#}");
            return Response::error("failed to read settings").into();
        }
    };

    let status = snapshot.connection.as_ref().map(|c| ConnectionStatus {
        url: c.url.clone(),
        has_token: !c.token.is_empty(),
    });
    Response::json(status).into()
}

/// Saves new decision service connection settings. The decision point is
/// probed first; settings that fail the probe are rejected and nothing
/// changes. On success the new client replaces the current one immediately.
pub async fn put_connection(
    req: HttpRequest,
    body: Bytes,
    ctx: Data<Arc<ServerContext>>,
) -> HttpResponse {
    if let Some(resp) = require_admin(&ctx, &req) {
        return resp.into();
    }

    let payload: ConnectionPayload = match parse_json(&body) {
        Ok(payload) => payload,
        Err(e) => return Response::bad_request(format!("{e:#}")).into(),
    };
    if payload.url.is_empty() {
        return Response::bad_request("url is required").into();
    }
    if payload.token.is_empty() {
        return Response::bad_request("token is required").into();
    }

    let builder =
        HttpDecisionClientBuilder::new(&payload.url, &payload.token, ctx.cfg.pdp.timeout_secs);
    let client = match builder.connect().await {
        Ok(client) => client,
        Err(e) => {
            info!("Rejecting connection settings for {}: {:#}", payload.url, e);
            return Response::bad_request(format!("{e:#}")).into();
        }
    };

    if let Err(e) = ctx.settings.save_connection(&payload) {
        error!("Failed to save connection settings: {e:#}");
        return Response::error("failed to save settings").into();
    }
    ctx.decision.install(Arc::new(client));

    info!("Decision service connection updated to {}", payload.url);
    Response::ok().into()
}

pub async fn delete_connection(
    req: HttpRequest,
    ctx: Data<Arc<ServerContext>>,
) -> HttpResponse {
    if let Some(resp) = require_admin(&ctx, &req) {
        return resp.into();
    }

    if let Err(e) = ctx.settings.clear_connection() {
        error!("Failed to clear connection settings: {e:#}");
        return Response::error("failed to save settings").into();
    }
    ctx.decision.teardown();

    info!("Decision service connection removed, enforcement is now fail-open");
    Response::ok().into()
}
