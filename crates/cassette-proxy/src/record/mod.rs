//! Canonical record model.
//!
//! Every intercepted exchange is reduced to a [`Call`]: a normalized
//! [`Request`] plus the [`Response`] that was returned for it. A [`Mapping`]
//! has the same shape and is what the proxy replays instead of contacting
//! the origin.

mod form;
mod headers;
mod promote;
mod types;

pub use form::{parse_forms, parse_urlencoded, FormValues, ParsedForms};
pub use headers::{canonical_name, HeaderMultiMap};
pub use promote::{to_mapping, PromoteError};
pub use types::{Call, Mapping, Request, Response};
