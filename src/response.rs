use actix_web::http::StatusCode;
use actix_web::{HttpResponse, HttpResponseBuilder};
use serde::Serialize;

use crate::api::{CommonResponse, DataResponse, ForbiddenResponse};

/// A wrapper struct for HTTP responses that provides convenient methods
/// for creating the response types the gateway produces.
pub struct Response {
    http_response: HttpResponse,
}

impl Response {
    pub fn ok() -> Self {
        let resp = CommonResponse {
            code: StatusCode::OK.into(),
            message: None,
        };
        Self {
            http_response: HttpResponse::Ok().json(resp),
        }
    }

    pub fn json<T: Serialize>(data: T) -> Self {
        let resp = DataResponse {
            code: StatusCode::OK.into(),
            message: None,
            data: Some(data),
        };
        Self {
            http_response: HttpResponse::Ok().json(resp),
        }
    }

    pub fn not_found() -> Self {
        Self::err_response(StatusCode::NOT_FOUND, "Resource not found".to_string())
    }

    pub fn bad_request(message: impl AsRef<str>) -> Self {
        let message = format!("Bad request: {}", message.as_ref());
        Self::err_response(StatusCode::BAD_REQUEST, message)
    }

    pub fn unauthenticated(message: impl AsRef<str>) -> Self {
        let message = format!("Unauthenticated: {}", message.as_ref());
        Self::err_response(StatusCode::UNAUTHORIZED, message)
    }

    /// The explicit policy deny. Unlike the other error responses this one
    /// uses the fixed `{data, error}` body shape the protected API's clients
    /// already understand.
    pub fn forbidden(message: impl ToString) -> Self {
        let resp = ForbiddenResponse::new(message);
        Self {
            http_response: HttpResponse::Forbidden().json(resp),
        }
    }

    pub fn bad_gateway(message: impl AsRef<str>) -> Self {
        let message = format!("Upstream error: {}", message.as_ref());
        Self::err_response(StatusCode::BAD_GATEWAY, message)
    }

    pub fn error(message: &str) -> Self {
        let message = format!("Server error: {message}");
        Self::err_response(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    fn err_response(status: StatusCode, message: String) -> Self {
        let resp = CommonResponse {
            code: status.into(),
            message: Some(message),
        };
        Self {
            http_response: HttpResponseBuilder::new(status).json(resp),
        }
    }
}

impl From<Response> for HttpResponse {
    fn from(val: Response) -> Self {
        val.http_response
    }
}
