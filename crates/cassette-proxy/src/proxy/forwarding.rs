//! Request forwarding to the origin or through the upstream proxy.

use super::client::{create_http_client, Route};
use super::error::ForwardError;
use super::headers::strip_hop_by_hop;
use super::response_ext::{BoxError, ProxyBody};
use crate::config::{Config, UpstreamConfig};
use async_trait::async_trait;
use futures::TryStreamExt;
use http_body_util::{BodyExt, StreamBody};
use hyper::body::{Bytes, Frame};
use hyper::header::HOST;
use hyper::{HeaderMap, Method, Request, Response};
use std::time::Duration;
use tracing::{debug, warn};

/// Executes a live request. Implemented by [`HttpForwarder`]; tests swap in
/// fakes to observe whether the origin was contacted.
#[async_trait]
pub trait Forward: Send + Sync {
    async fn forward(&self, req: &Request<Bytes>) -> Result<Response<ProxyBody>, ForwardError>;
}

pub struct HttpForwarder {
    client: reqwest::Client,
    timeout_secs: u64,
    retries: u32,
    retry_non_idempotent: bool,
}

impl HttpForwarder {
    /// Forwarder that contacts origins directly.
    pub fn direct(config: &Config) -> Result<Self, ForwardError> {
        Self::new(config, &Route::Direct)
    }

    /// Forwarder that sends everything through `upstream`.
    pub fn via_upstream(config: &Config, upstream: &UpstreamConfig) -> Result<Self, ForwardError> {
        let url = upstream.proxy_url().map_err(ForwardError::InvalidUpstream)?;
        Self::new(config, &Route::Upstream(url))
    }

    fn new(config: &Config, route: &Route) -> Result<Self, ForwardError> {
        Ok(Self {
            client: create_http_client(route, &config.connection_pool)?,
            timeout_secs: config.forward.timeout_secs,
            retries: config.forward.retries,
            retry_non_idempotent: config.forward.retry_non_idempotent,
        })
    }

    fn attempts_for(&self, method: &Method) -> u32 {
        if method.is_idempotent() || self.retry_non_idempotent {
            self.retries + 1
        } else {
            1
        }
    }

    async fn send_once(&self, req: &Request<Bytes>) -> Result<reqwest::Response, reqwest::Error> {
        self.client
            .request(req.method().clone(), req.uri().to_string())
            .headers(forwardable_headers(req.headers()))
            .body(req.body().clone())
            .timeout(Duration::from_secs(self.timeout_secs))
            .send()
            .await
    }

    fn classify(&self, err: reqwest::Error) -> ForwardError {
        if err.is_timeout() {
            ForwardError::Timeout(self.timeout_secs)
        } else if err.is_connect() {
            ForwardError::Connect(error_chain(&err))
        } else {
            ForwardError::Request(error_chain(&err))
        }
    }
}

#[async_trait]
impl Forward for HttpForwarder {
    async fn forward(&self, req: &Request<Bytes>) -> Result<Response<ProxyBody>, ForwardError> {
        let attempts = self.attempts_for(req.method());
        let mut attempt = 1;
        let upstream = loop {
            match self.send_once(req).await {
                Ok(response) => break response,
                Err(e) if e.is_connect() && attempt < attempts => {
                    warn!(
                        "Connect to {} failed (attempt {}/{}): {}",
                        req.uri(),
                        attempt,
                        attempts,
                        e
                    );
                    attempt += 1;
                }
                Err(e) => return Err(self.classify(e)),
            }
        };

        debug!("Upstream responded {} for {}", upstream.status(), req.uri());
        Ok(into_proxy_response(upstream, self.timeout_secs))
    }
}

/// Stand-in used when the upstream proxy address cannot be turned into a
/// client. Every request fails with the original reason.
pub struct UnavailableForwarder {
    reason: String,
}

impl UnavailableForwarder {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl Forward for UnavailableForwarder {
    async fn forward(&self, _req: &Request<Bytes>) -> Result<Response<ProxyBody>, ForwardError> {
        Err(ForwardError::InvalidUpstream(self.reason.clone()))
    }
}

fn forwardable_headers(headers: &HeaderMap) -> HeaderMap {
    let mut out = headers.clone();
    strip_hop_by_hop(&mut out);
    out.remove(HOST);
    out
}

/// The per-request timeout also bounds the body read; a stalled body
/// surfaces as [`ForwardError::Timeout`] so it is reported like a slow origin.
fn into_proxy_response(upstream: reqwest::Response, timeout_secs: u64) -> Response<ProxyBody> {
    let status = upstream.status();
    let headers = upstream.headers().clone();
    let stream = upstream
        .bytes_stream()
        .map_ok(Frame::data)
        .map_err(move |e| -> BoxError {
            if e.is_timeout() {
                Box::new(ForwardError::Timeout(timeout_secs))
            } else {
                Box::new(e)
            }
        });

    let mut response = Response::new(StreamBody::new(stream).boxed_unsync());
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    response
}

// reqwest hides the interesting part (e.g. "connection refused") in the source chain
fn error_chain(err: &dyn std::error::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
