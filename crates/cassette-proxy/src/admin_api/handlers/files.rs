//! Raw access to the replayed body of a mapping.

use crate::admin_api::types::{
    build_response_with_headers, collect_body, error_response, not_found, ok_response,
};
use crate::admin_api::AdminState;
use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::{Request, Response, StatusCode};
use tracing::info;

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// GET /files/:id - The decoded body, typed with the mapping's Content-Type
pub fn handle_get(id: &str, state: &AdminState) -> Response<Full<Bytes>> {
    let Some(mapping) = state.stores.mappings.get(id) else {
        return not_found();
    };
    let content_type = mapping
        .response
        .header
        .first("Content-Type")
        .unwrap_or(DEFAULT_CONTENT_TYPE)
        .to_string();

    build_response_with_headers(
        StatusCode::OK,
        [("Content-Type", content_type)],
        mapping.response.decoded_body().clone(),
    )
}

/// PUT /files/:id - Replace the decoded body with the request body as-is
pub async fn handle_put(
    id: &str,
    req: Request<Incoming>,
    state: &AdminState,
) -> Response<Full<Bytes>> {
    let body = match collect_body(req).await {
        Ok(b) => b,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, &e),
    };
    let len = body.len();

    match state.stores.mappings.set_body(id, body) {
        Ok(()) => {
            info!(mapping_id = %id, bytes = len, "Replaced mapping body");
            ok_response()
        }
        Err(e) => error_response(StatusCode::NOT_FOUND, &e.to_string()),
    }
}
