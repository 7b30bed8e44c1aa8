use std::sync::Arc;

use actix_web::web::{Bytes, Data};
use actix_web::{HttpRequest, HttpResponse};
use log::{error, info};

use crate::api::MappingsPayload;
use crate::context::ServerContext;
use crate::response::Response;

use super::{parse_json, require_admin};

pub async fn get_mappings(req: HttpRequest, ctx: Data<Arc<ServerContext>>) -> HttpResponse {
    if let Some(resp) = require_admin(&ctx, &req) {
        return resp.into();
    }

    match ctx.settings.mappings() {
        Ok(mappings) => Response::json(mappings).into(),
        Err(e) => {
            error!("Failed to read mappings: {e:#}");
            Response::error("failed to read settings").into()
        }
    }
}

pub async fn put_mappings(
    req: HttpRequest,
    body: Bytes,
    ctx: Data<Arc<ServerContext>>,
) -> HttpResponse {
    if let Some(resp) = require_admin(&ctx, &req) {
        return resp.into();
    }

    let payload: MappingsPayload = match parse_json(&body) {
        Ok(payload) => payload,
        Err(e) => return Response::bad_request(format!("{e:#}")).into(),
    };

    // Mappings for types the gateway does not protect would never be read
    for type_name in payload.resource_fields.keys() {
        if !ctx.registry.contains(type_name) {
            return Response::bad_request(format!("unknown resource type '{type_name}'"))
                .into();
        }
    }

    if let Err(e) = ctx.settings.save_mappings(&payload) {
        error!("Failed to save mappings: {e:#}");
        return Response::error("failed to save settings").into();
    }

    info!(
        "Attribute mappings updated: {} subject fields, {} resource types",
        payload.subject_fields.len(),
        payload.resource_fields.len()
    );
    Response::ok().into()
}
