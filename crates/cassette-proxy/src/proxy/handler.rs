//! The interception pipeline.
//!
//! normalize -> match -> (stub | forward -> capture) -> client response.
//! Every failure is turned into a gateway-style JSON response here.

use super::capture::capture_response;
use super::error::ProxyError;
use super::forwarding::Forward;
use super::matcher::{find_mapping, stub_response};
use super::normalize::normalize;
use super::response_ext::{BoxError, ProxyBody};
use crate::metrics;
use crate::store::Stores;
use hyper::body::Body;
use hyper::http::uri::Scheme;
use hyper::{Request, Response};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

/// State shared by every connection of one listener.
#[derive(Clone)]
pub struct Pipeline {
    label: &'static str,
    stores: Arc<Stores>,
    forwarder: Arc<dyn Forward>,
    annotate: bool,
}

enum Outcome {
    Stub,
    Forwarded,
}

impl Outcome {
    fn as_str(&self) -> &'static str {
        match self {
            Outcome::Stub => "stub",
            Outcome::Forwarded => "forwarded",
        }
    }
}

impl Pipeline {
    pub fn new(
        label: &'static str,
        stores: Arc<Stores>,
        forwarder: Arc<dyn Forward>,
        annotate: bool,
    ) -> Self {
        Self {
            label,
            stores,
            forwarder,
            annotate,
        }
    }

    /// Listener name used in logs and metrics.
    pub fn label(&self) -> &'static str {
        self.label
    }

    /// Serve one request. Never fails: errors become responses.
    pub async fn handle<B>(
        &self,
        req: Request<B>,
        scheme: Scheme,
        default_authority: Option<&str>,
    ) -> Response<ProxyBody>
    where
        B: Body,
        B::Error: Into<BoxError>,
    {
        let method = req.method().clone();
        let uri = req.uri().clone();
        match self.try_handle(req, &scheme, default_authority).await {
            Ok((response, outcome)) => {
                metrics::record_request(self.label, outcome.as_str());
                response
            }
            Err(e) => {
                warn!(
                    listener = self.label,
                    kind = e.kind(),
                    "{} {} failed: {}",
                    method,
                    uri,
                    e
                );
                metrics::record_request(self.label, "error");
                e.into_response()
            }
        }
    }

    async fn try_handle<B>(
        &self,
        req: Request<B>,
        scheme: &Scheme,
        default_authority: Option<&str>,
    ) -> Result<(Response<ProxyBody>, Outcome), ProxyError>
    where
        B: Body,
        B::Error: Into<BoxError>,
    {
        let normalized = normalize(req, scheme, default_authority).await?;

        if let Some(mapping) = find_mapping(&self.stores.mappings, &normalized.record) {
            debug!(
                listener = self.label,
                mapping_id = %mapping.id,
                "Serving {} {} from mapping",
                normalized.record.method,
                normalized.record.url
            );
            return Ok((stub_response(&mapping, self.annotate)?, Outcome::Stub));
        }

        let start = Instant::now();
        let response = self.forwarder.forward(&normalized.forward).await?;
        metrics::record_forward_duration(
            self.label,
            response.status().as_u16(),
            start.elapsed().as_secs_f64() * 1000.0,
        );

        let captured = capture_response(
            &self.stores.calls,
            normalized.record,
            response,
            self.annotate,
        )
        .await?;
        metrics::record_capture(self.label);
        debug!(
            listener = self.label,
            call_id = %captured.call_id,
            "Forwarded {} {}",
            normalized.forward.method(),
            normalized.forward.uri()
        );

        Ok((captured.response, Outcome::Forwarded))
    }
}
