//! Stub matching and replay.

use super::error::ProxyError;
use super::headers::{strip_hop_by_hop, CassetteHeadersExt, X_CASSETTE_MAPPING_ID};
use super::response_ext::{full_body, ProxyBody};
use crate::record::{Mapping, Request};
use crate::store::MappingStore;
use hyper::header::CONTENT_LENGTH;
use hyper::{Response, StatusCode};

/// Mapping to serve for `request`, if any. Matching is exact on method and
/// URL; among several candidates the most recently written wins.
pub fn find_mapping(mappings: &MappingStore, request: &Request) -> Option<Mapping> {
    mappings.find(request)
}

/// Build the client response for a matched mapping. The decoded body is
/// served; `Content-Length` is recomputed from it.
pub fn stub_response(mapping: &Mapping, annotate: bool) -> Result<Response<ProxyBody>, ProxyError> {
    let status = StatusCode::from_u16(mapping.response.status_code).map_err(|_| {
        ProxyError::InvalidMapping {
            id: mapping.id.clone(),
            status: mapping.response.status_code,
        }
    })?;

    let mut headers = mapping.response.header.to_header_map();
    strip_hop_by_hop(&mut headers);
    headers.remove(CONTENT_LENGTH);

    let mut response = Response::new(full_body(mapping.response.decoded_body().clone()));
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    if annotate {
        response.set_header_value(&X_CASSETTE_MAPPING_ID, &mapping.id);
    }
    Ok(response)
}
