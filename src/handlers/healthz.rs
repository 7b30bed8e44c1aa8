use actix_web::HttpResponse;
use chrono::Utc;

use crate::api::HealthResponse;
use crate::response::Response;

pub async fn get_healthz() -> HttpResponse {
    let now = Utc::now().timestamp() as u64;
    Response::json(HealthResponse {
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: now,
    })
    .into()
}
