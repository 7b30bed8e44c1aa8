use std::sync::Arc;

use actix_web::web::{Bytes, Data};
use actix_web::{HttpRequest, HttpResponse};
use log::{error, info};

use crate::api::ExclusionsPayload;
use crate::context::ServerContext;
use crate::response::Response;

use super::{parse_json, require_admin};

pub async fn get_exclusions(req: HttpRequest, ctx: Data<Arc<ServerContext>>) -> HttpResponse {
    if let Some(resp) = require_admin(&ctx, &req) {
        return resp.into();
    }

    match ctx.settings.exclusions() {
        Ok(exclusions) => Response::json(exclusions).into(),
        Err(e) => {
            error!("Failed to read exclusions: {e:#}");
            Response::error("failed to read settings").into()
        }
    }
}

pub async fn put_exclusions(
    req: HttpRequest,
    body: Bytes,
    ctx: Data<Arc<ServerContext>>,
) -> HttpResponse {
    if let Some(resp) = require_admin(&ctx, &req) {
        return resp.into();
    }

    let payload: ExclusionsPayload = match parse_json(&body) {
        Ok(payload) => payload,
        Err(e) => return Response::bad_request(format!("{e:#}")).into(),
    };

    for type_name in payload.types.iter() {
        if !ctx.registry.contains(type_name) {
            return Response::bad_request(format!("unknown resource type '{type_name}'"))
                .into();
        }
    }

    if let Err(e) = ctx.settings.save_exclusions(&payload) {
        error!("Failed to save exclusions: {e:#}");
        return Response::error("failed to save settings").into();
    }

    info!("Exclusions updated: {} types exempted", payload.types.len());
    Response::ok().into()
}
