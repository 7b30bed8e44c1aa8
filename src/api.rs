use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const HEADER_AUTHORIZATION: &str = "Authorization";
pub const HEADER_CONTENT_TYPE: &str = "Content-Type";
pub const MIME_JSON: &str = "application/json";

pub const STATUS_OK: u16 = 200;
pub const STATUS_BAD_REQUEST: u16 = 400;
pub const STATUS_UNAUTHORIZED: u16 = 401;
pub const STATUS_NOT_FOUND: u16 = 404;
pub const STATUS_INTERNAL_SERVER_ERROR: u16 = 500;

/// Envelope for admin API responses.
#[derive(Debug, Serialize, Deserialize)]
pub struct CommonResponse {
    pub code: u16,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Envelope for admin API responses that carry data.
#[derive(Debug, Serialize, Deserialize)]
pub struct DataResponse<T> {
    pub code: u16,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

/// The rejection body returned to callers on an explicit policy deny.
/// The shape is fixed, downstream clients match on it.
#[derive(Debug, Serialize, Deserialize)]
pub struct ForbiddenResponse {
    pub data: Value,
    pub error: ForbiddenError,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ForbiddenError {
    pub status: u16,
    pub name: String,
    pub message: String,
    pub details: Map<String, Value>,
}

impl ForbiddenResponse {
    pub fn new(message: impl ToString) -> Self {
        Self {
            data: Value::Null,
            error: ForbiddenError {
                status: 403,
                name: String::from("ForbiddenError"),
                message: message.to_string(),
                details: Map::new(),
            },
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub version: String,
    pub timestamp: u64,
}

/// Decision service connection settings, as submitted by an administrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionPayload {
    pub url: String,
    pub token: String,
}

/// Sanitized view of the stored connection, the token itself is never echoed.
#[derive(Debug, Serialize, Deserialize)]
pub struct ConnectionStatus {
    pub url: String,
    pub has_token: bool,
}

/// Attribute mapping configuration: which subject fields and which resource
/// fields (per resource type) are forwarded to the decision service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MappingsPayload {
    #[serde(default)]
    pub subject_fields: Vec<String>,

    #[serde(default)]
    pub resource_fields: HashMap<String, Vec<String>>,
}

/// Resource types exempted from policy checks.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExclusionsPayload {
    #[serde(default)]
    pub types: Vec<String>,
}
