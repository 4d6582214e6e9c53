//! Errors raised while serving a proxied request.
//!
//! None of these abort a listener: each one becomes a JSON error response
//! tagged with `x-cassette-error`.

use super::headers::{CassetteHeadersExt, X_CASSETTE_ERROR};
use super::response_ext::{full_body, ProxyBody};
use crate::store::StoreError;
use hyper::{Response, StatusCode};
use thiserror::Error;

/// Failures talking to the origin or the upstream proxy.
#[derive(Debug, Error)]
pub enum ForwardError {
    #[error("invalid upstream proxy address: {0}")]
    InvalidUpstream(String),

    #[error("upstream unreachable: {0}")]
    Connect(String),

    #[error("upstream did not respond within {0}s")]
    Timeout(u64),

    #[error("upstream request failed: {0}")]
    Request(String),
}

impl ForwardError {
    pub fn status(&self) -> StatusCode {
        match self {
            ForwardError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            _ => StatusCode::BAD_GATEWAY,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ForwardError::InvalidUpstream(_) => "invalid-upstream",
            ForwardError::Connect(_) => "upstream-unreachable",
            ForwardError::Timeout(_) => "upstream-timeout",
            ForwardError::Request(_) => "upstream-error",
        }
    }
}

#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("cannot determine target, no Host header")]
    MissingHost,

    #[error("invalid request target: {0}")]
    InvalidTarget(String),

    #[error("failed to read request body: {0}")]
    RequestBody(String),

    #[error(transparent)]
    Forward(#[from] ForwardError),

    #[error("failed to read upstream response body: {0}")]
    ResponseBody(String),

    #[error("mapping '{id}' has invalid status code {status}")]
    InvalidMapping { id: String, status: u16 },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ProxyError {
    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::MissingHost | ProxyError::InvalidTarget(_) | ProxyError::RequestBody(_) => {
                StatusCode::BAD_REQUEST
            }
            ProxyError::Forward(e) => e.status(),
            ProxyError::ResponseBody(_) => StatusCode::BAD_GATEWAY,
            ProxyError::InvalidMapping { .. } | ProxyError::Store(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ProxyError::MissingHost => "missing-host",
            ProxyError::InvalidTarget(_) => "invalid-target",
            ProxyError::RequestBody(_) => "request-body",
            ProxyError::Forward(e) => e.kind(),
            ProxyError::ResponseBody(_) => "upstream-body",
            ProxyError::InvalidMapping { .. } => "invalid-mapping",
            ProxyError::Store(_) => "store",
        }
    }

    pub fn into_response(self) -> Response<ProxyBody> {
        let mut response = error_response(self.status(), &self.to_string());
        response.set_header_value(&X_CASSETTE_ERROR, self.kind());
        response
    }
}

/// JSON `{"error": message}` response.
pub fn error_response(status: StatusCode, message: &str) -> Response<ProxyBody> {
    let body = serde_json::json!({ "error": message }).to_string();
    let mut response = Response::new(full_body(body));
    *response.status_mut() = status;
    response.headers_mut().insert(
        hyper::header::CONTENT_TYPE,
        hyper::header::HeaderValue::from_static("application/json"),
    );
    response
}
