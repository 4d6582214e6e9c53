//! Turning a captured call into a replayable mapping.

use super::types::{Call, Mapping};
use crate::store::StoreError;
use bytes::Bytes;
use flate2::read::MultiGzDecoder;
use std::io::Read;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PromoteError {
    #[error("call '{0}' not found")]
    NotFound(String),

    #[error("failed to decode body of call '{id}': {source}")]
    Decode {
        id: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Build the mapping for `call`.
///
/// A gzip-encoded body is decompressed and `Content-Encoding` dropped so the
/// stub replays plain bytes. The wire copies of the body are cleared either
/// way; the decoded body is what gets served.
pub fn to_mapping(call: &Call) -> Result<Mapping, PromoteError> {
    let mut mapping = call.clone();
    let response = &mut mapping.response;

    if response.header.first("Content-Encoding") == Some("gzip") {
        let decoded = gunzip(response.raw_body()).map_err(|source| PromoteError::Decode {
            id: call.id.clone(),
            source,
        })?;
        response.set_decoded_body(decoded);
        response.header.remove("Content-Encoding");
    }

    response.clear_wire_body();
    Ok(mapping)
}

fn gunzip(data: &[u8]) -> std::io::Result<Bytes> {
    let mut decoder = MultiGzDecoder::new(data);
    let mut out = Vec::new();
    decoder.read_to_end(&mut out)?;
    Ok(Bytes::from(out))
}
