pub mod connection;
pub mod exclusions;
pub mod healthz;
pub mod mappings;

use actix_web::web::Bytes;
use actix_web::HttpRequest;
use anyhow::{Context, Result};
use serde::de::DeserializeOwned;

use crate::api::HEADER_AUTHORIZATION;
use crate::context::ServerContext;
use crate::response::Response;

/// Extracts the bearer token from the Authorization header, if any.
pub fn bearer_token(req: &HttpRequest) -> Option<String> {
    let value = req.headers().get(HEADER_AUTHORIZATION)?;
    let value = value.to_str().ok()?;
    let token = value.strip_prefix("Bearer ")?;
    if token.is_empty() {
        return None;
    }
    Some(String::from(token))
}

/// Checks the static admin token on a configuration request. Returns the
/// rejection to send when the caller is not an administrator.
pub fn require_admin(ctx: &ServerContext, req: &HttpRequest) -> Option<Response> {
    let token = match bearer_token(req) {
        Some(token) => token,
        None => return Some(Response::unauthenticated("Admin token is required")),
    };
    if token != ctx.cfg.admin_token {
        return Some(Response::unauthenticated("Invalid admin token"));
    }
    None
}

pub fn parse_json<T: DeserializeOwned>(body: &Bytes) -> Result<T> {
    serde_json::from_slice(body).context("parse request body")
}
