//! Mapping management handlers.

use crate::admin_api::types::{
    collect_body, error_response, json_response, ok_response, DataResponse, ListResponse,
};
use crate::admin_api::AdminState;
use crate::record::Mapping;
use crate::store::StoreError;
use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::{Request, Response, StatusCode};
use tracing::{info, warn};

/// GET /mappings - List mappings
pub fn handle_list(state: &AdminState) -> Response<Full<Bytes>> {
    json_response(
        StatusCode::OK,
        &ListResponse::new(state.stores.mappings.list()),
    )
}

/// GET /mappings/:id
pub fn handle_get(id: &str, state: &AdminState) -> Response<Full<Bytes>> {
    match state.stores.mappings.get(id) {
        Some(mapping) => json_response(StatusCode::OK, &DataResponse { data: mapping }),
        None => error_response(StatusCode::NOT_FOUND, &format!("mapping '{id}' not found")),
    }
}

/// PUT /mappings/:id - Create or replace a mapping
pub async fn handle_put(
    id: &str,
    req: Request<Incoming>,
    state: &AdminState,
) -> Response<Full<Bytes>> {
    let body = match collect_body(req).await {
        Ok(b) => b,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, &e),
    };

    let mapping: Mapping = match serde_json::from_slice(&body) {
        Ok(m) => m,
        Err(e) => {
            return error_response(
                StatusCode::BAD_REQUEST,
                &format!("Invalid mapping JSON: {e}"),
            )
        }
    };

    if StatusCode::from_u16(mapping.response.status_code).is_err() {
        return error_response(
            StatusCode::BAD_REQUEST,
            &format!("Invalid status code {}", mapping.response.status_code),
        );
    }

    match state.stores.mappings.put(id, mapping.clone()) {
        Ok(replaced) => {
            info!(mapping_id = %id, replaced, "Stored mapping");
            json_response(StatusCode::OK, &DataResponse { data: mapping })
        }
        Err(e @ StoreError::IdMismatch { .. }) => {
            warn!(mapping_id = %id, "Rejected mapping: {}", e);
            error_response(StatusCode::BAD_REQUEST, &e.to_string())
        }
        Err(e @ StoreError::Conflict(_)) => error_response(StatusCode::CONFLICT, &e.to_string()),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()),
    }
}

/// DELETE /mappings/:id
pub fn handle_delete(id: &str, state: &AdminState) -> Response<Full<Bytes>> {
    match state.stores.mappings.delete(id) {
        Ok(_) => {
            info!(mapping_id = %id, "Deleted mapping");
            ok_response()
        }
        Err(e) => error_response(StatusCode::NOT_FOUND, &e.to_string()),
    }
}
