//! Response capture.
//!
//! Drains a live response, stores it as a [`Call`] and hands the client an
//! equivalent buffered response.

use super::error::{ForwardError, ProxyError};
use super::headers::{strip_hop_by_hop, CassetteHeadersExt, X_CASSETTE_CALL_ID};
use super::response_ext::{full_body, ProxyBody};
use crate::record::{self, Call, HeaderMultiMap};
use crate::store::CallStore;
use http_body_util::BodyExt;
use hyper::header::CONTENT_LENGTH;
use hyper::Response;
use tracing::debug;
use uuid::Uuid;

pub struct Captured {
    pub call_id: String,
    pub response: Response<ProxyBody>,
}

/// Capture `response`, returned for `request`, into `calls`.
pub async fn capture_response(
    calls: &CallStore,
    request: record::Request,
    response: Response<ProxyBody>,
    annotate: bool,
) -> Result<Captured, ProxyError> {
    let (mut parts, body) = response.into_parts();
    let body = body
        .collect()
        .await
        .map_err(|e| match e.downcast::<ForwardError>() {
            Ok(forward) => ProxyError::Forward(*forward),
            Err(e) => ProxyError::ResponseBody(e.to_string()),
        })?
        .to_bytes();

    strip_hop_by_hop(&mut parts.headers);
    parts.headers.remove(CONTENT_LENGTH);

    let recorded = record::Response::captured(
        parts.status.as_u16(),
        HeaderMultiMap::from_header_map(&parts.headers),
        body.clone(),
    );
    let call_id = Uuid::new_v4().to_string();
    calls.insert(Call::new(call_id.clone(), request, recorded))?;
    debug!(call_id = %call_id, status = parts.status.as_u16(), bytes = body.len(), "Captured call");

    let mut response = Response::from_parts(parts, full_body(body));
    if annotate {
        response.set_header_value(&X_CASSETTE_CALL_ID, &call_id);
    }
    Ok(Captured { call_id, response })
}
