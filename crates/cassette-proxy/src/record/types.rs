//! Captured call types shared by the proxy pipeline, the stores and the admin API.

use super::form::FormValues;
use super::headers::HeaderMultiMap;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// A normalized intercepted request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Request {
    /// Absolute URL, e.g. `http://example.com/path?q=1`.
    pub url: String,
    pub method: String,
    /// Request headers, `Host` excluded.
    pub header: HeaderMultiMap,
    pub form: FormValues,
    pub post_form: FormValues,
}

impl Request {
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: method.into(),
            ..Default::default()
        }
    }

    /// Method and URL equality, the only criteria used for stub matching.
    pub fn matches(&self, method: &str, url: &str) -> bool {
        self.method == method && self.url == url
    }
}

/// A captured or stubbed response.
///
/// The body is held in four views. `body_base64` and `body` are the wire
/// copies exposed over the admin API; `raw` is exactly what the origin sent;
/// `decoded` is what gets replayed. All four agree at capture time and only
/// diverge once a promotion strips the content encoding or the admin API
/// replaces the body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "ResponseRepr")]
pub struct Response {
    pub status_code: u16,
    pub header: HeaderMultiMap,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub body_base64: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub body: String,
    #[serde(skip)]
    raw: Bytes,
    #[serde(skip)]
    decoded: Bytes,
}

#[derive(Deserialize)]
#[serde(default)]
struct ResponseRepr {
    status_code: u16,
    header: HeaderMultiMap,
    body_base64: String,
    body: String,
}

impl Default for ResponseRepr {
    fn default() -> Self {
        Self {
            status_code: 200,
            header: HeaderMultiMap::default(),
            body_base64: String::new(),
            body: String::new(),
        }
    }
}

impl From<ResponseRepr> for Response {
    fn from(repr: ResponseRepr) -> Self {
        let raw = match BASE64.decode(repr.body_base64.as_bytes()) {
            Ok(bytes) if !repr.body_base64.is_empty() => Bytes::from(bytes),
            _ => Bytes::from(repr.body.clone().into_bytes()),
        };
        Self {
            status_code: repr.status_code,
            header: repr.header,
            body_base64: repr.body_base64,
            body: repr.body,
            decoded: raw.clone(),
            raw,
        }
    }
}

impl Default for Response {
    fn default() -> Self {
        ResponseRepr::default().into()
    }
}

impl Response {
    /// Build a response as captured from the origin: every body view is
    /// derived from `raw`.
    pub fn captured(status_code: u16, header: HeaderMultiMap, raw: Bytes) -> Self {
        Self {
            status_code,
            header,
            body_base64: BASE64.encode(&raw),
            body: String::from_utf8_lossy(&raw).into_owned(),
            decoded: raw.clone(),
            raw,
        }
    }

    /// Body exactly as received.
    pub fn raw_body(&self) -> &Bytes {
        &self.raw
    }

    /// Body used for replay.
    pub fn decoded_body(&self) -> &Bytes {
        &self.decoded
    }

    pub fn set_decoded_body(&mut self, body: Bytes) {
        self.decoded = body;
    }

    /// Drop the wire copies of the body, leaving `decoded` authoritative.
    pub fn clear_wire_body(&mut self) {
        self.body.clear();
        self.body_base64.clear();
    }
}

/// One intercepted exchange.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Call {
    pub id: String,
    pub request: Request,
    pub response: Response,
}

/// A promoted call served as a stub. Same shape as [`Call`].
pub type Mapping = Call;

impl Call {
    pub fn new(id: impl Into<String>, request: Request, response: Response) -> Self {
        Self {
            id: id.into(),
            request,
            response,
        }
    }
}
