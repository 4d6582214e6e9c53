//! Promotion of captured calls into mappings.

use crate::admin_api::types::{error_response, json_response, DataResponse};
use crate::admin_api::AdminState;
use crate::metrics::record_promotion;
use crate::record::PromoteError;
use crate::store::StoreError;
use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};
use tracing::warn;

/// POST /recordings/:id - Promote call `id` to a mapping with the same id
pub fn handle_promote(id: &str, state: &AdminState) -> Response<Full<Bytes>> {
    match state.stores.promote(id) {
        Ok(call) => {
            record_promotion("ok");
            json_response(StatusCode::OK, &DataResponse { data: call })
        }
        Err(e @ PromoteError::NotFound(_)) => {
            record_promotion("not_found");
            error_response(StatusCode::NOT_FOUND, &e.to_string())
        }
        Err(e @ PromoteError::Decode { .. }) => {
            record_promotion("decode_error");
            warn!(call_id = %id, "Promotion failed: {}", e);
            error_response(StatusCode::BAD_GATEWAY, &e.to_string())
        }
        Err(PromoteError::Store(e @ StoreError::Conflict(_))) => {
            record_promotion("conflict");
            error_response(StatusCode::CONFLICT, &e.to_string())
        }
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()),
    }
}
