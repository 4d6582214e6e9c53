//! System handlers: link index, health, metrics, CA certificate.

use crate::admin_api::types::*;
use crate::admin_api::AdminState;
use crate::metrics::{collect_metrics, set_store_entries};
use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};

/// GET / - Root endpoint
pub fn handle_root(base_url: &str) -> Response<Full<Bytes>> {
    let body = serde_json::json!({
        "_links": {
            "requests": {"href": format!("{}/requests", base_url)},
            "mappings": {"href": format!("{}/mappings", base_url)},
            "ca": {"href": format!("{}/ca.crt", base_url)},
            "health": {"href": format!("{}/health", base_url)},
            "metrics": {"href": format!("{}/metrics", base_url)}
        }
    });
    json_response(StatusCode::OK, &body)
}

/// GET /health - Health check
pub fn handle_health() -> Response<Full<Bytes>> {
    ok_response()
}

/// GET /metrics - Prometheus metrics
pub fn handle_metrics(state: &AdminState) -> Response<Full<Bytes>> {
    set_store_entries("calls", state.stores.calls.len());
    set_store_entries("mappings", state.stores.mappings.len());

    build_response_with_headers(
        StatusCode::OK,
        [("Content-Type", "text/plain; version=0.0.4")],
        collect_metrics(),
    )
}

/// GET /ca.crt - PEM of the CA that signs intercepted TLS sessions
pub fn handle_ca_cert(state: &AdminState) -> Response<Full<Bytes>> {
    build_response_with_headers(
        StatusCode::OK,
        [("Content-Type", "application/x-pem-file")],
        state.ca_cert_pem.clone(),
    )
}
