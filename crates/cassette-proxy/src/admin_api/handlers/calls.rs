//! Call history handlers.

use crate::admin_api::types::{
    collect_body, error_response, json_response, ok_response, DataResponse, ListResponse,
};
use crate::admin_api::AdminState;
use crate::record::Call;
use crate::store::StoreError;
use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::{Request, Response, StatusCode};
use tracing::info;

/// GET /requests - List captured calls
pub fn handle_list(state: &AdminState) -> Response<Full<Bytes>> {
    json_response(StatusCode::OK, &ListResponse::new(state.stores.calls.list()))
}

/// GET /requests/:id
pub fn handle_get(id: &str, state: &AdminState) -> Response<Full<Bytes>> {
    match state.stores.calls.get(id) {
        Some(call) => json_response(StatusCode::OK, &DataResponse { data: call }),
        None => error_response(StatusCode::NOT_FOUND, &format!("call '{id}' not found")),
    }
}

/// DELETE /requests - Drop the whole call history
pub fn handle_clear(state: &AdminState) -> Response<Full<Bytes>> {
    let dropped = state.stores.calls.len();
    state.stores.calls.clear();
    info!(dropped, "Cleared call store");
    ok_response()
}

/// POST /requests - Import a call, e.g. one captured by another instance
pub async fn handle_import(req: Request<Incoming>, state: &AdminState) -> Response<Full<Bytes>> {
    let body = match collect_body(req).await {
        Ok(b) => b,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, &e),
    };

    let mut call: Call = match serde_json::from_slice(&body) {
        Ok(c) => c,
        Err(e) => {
            return error_response(StatusCode::BAD_REQUEST, &format!("Invalid call JSON: {e}"))
        }
    };
    if call.id.is_empty() {
        call.id = uuid::Uuid::new_v4().to_string();
    }

    match state.stores.calls.insert(call.clone()) {
        Ok(()) => {
            info!(call_id = %call.id, "Imported call");
            json_response(StatusCode::OK, &DataResponse { data: call })
        }
        Err(e @ StoreError::Duplicate(_)) => error_response(StatusCode::CONFLICT, &e.to_string()),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()),
    }
}
