//! Response Envelope
//!
//! Every response is `{success, message, data}` or, on failure,
//! `{success: false, message, error: {code, kind, message, request_id}, request_id}`.

use axum::{
    extract::Request,
    http::{HeaderName, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Request correlation header, set or generated by the request-id layer.
pub const REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

/// Success envelope.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    #[serde(skip)]
    status: StatusCode,
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    /// 200 with data.
    pub fn ok(message: impl Into<String>, data: T) -> Self {
        Self::with_status(StatusCode::OK, message, Some(data))
    }

    /// 201 with data.
    pub fn created(message: impl Into<String>, data: T) -> Self {
        Self::with_status(StatusCode::CREATED, message, Some(data))
    }

    fn with_status(status: StatusCode, message: impl Into<String>, data: Option<T>) -> Self {
        Self {
            status,
            success: true,
            message: message.into(),
            data,
        }
    }
}

impl ApiResponse<()> {
    /// 200 without data.
    pub fn message(message: impl Into<String>) -> Self {
        Self::with_status(StatusCode::OK, message, None)
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        (self.status, Json(self)).into_response()
    }
}

/// Error details carried on an error response.
///
/// Also stored as a response extension so [`stamp_request_id`] can re-render
/// the envelope once the request id is known.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    /// HTTP status code.
    pub code: u16,
    /// Machine-readable error kind, e.g. `INVALID_TOKEN`.
    pub kind: &'static str,
    /// Client-safe message.
    pub message: String,
}

#[derive(Serialize)]
struct ErrorEnvelope<'a> {
    success: bool,
    message: &'a str,
    error: ErrorDetail<'a>,
    #[serde(skip_serializing_if = "Option::is_none")]
    request_id: Option<&'a str>,
}

#[derive(Serialize)]
struct ErrorDetail<'a> {
    code: u16,
    kind: &'a str,
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    request_id: Option<&'a str>,
}

fn render_error(status: StatusCode, body: &ErrorBody, request_id: Option<&str>) -> Response {
    let envelope = ErrorEnvelope {
        success: false,
        message: &body.message,
        error: ErrorDetail {
            code: body.code,
            kind: body.kind,
            message: &body.message,
            request_id,
        },
        request_id,
    };

    let mut response = (status, Json(envelope)).into_response();
    response.extensions_mut().insert(body.clone());
    response
}

/// Build an error envelope response without a request id.
pub fn error_response(status: StatusCode, body: ErrorBody) -> Response {
    render_error(status, &body, None)
}

/// Middleware that writes the request id into error envelopes.
///
/// Must run inside the layer that sets `x-request-id`.
pub async fn stamp_request_id(request: Request, next: Next) -> Response {
    let request_id = request
        .headers()
        .get(&REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);

    let response = next.run(request).await;

    let body = response.extensions().get::<ErrorBody>().cloned();
    match (request_id, body) {
        (Some(request_id), Some(body)) => render_error(response.status(), &body, Some(&request_id)),
        _ => response,
    }
}
