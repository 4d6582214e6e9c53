//! Multi-valued header mapping used by captured requests and responses.
//!
//! Keys are stored in canonical form (`content-type` becomes `Content-Type`),
//! so lookups are case-insensitive and the JSON form reads the same way no
//! matter how the peer spelled the header.

use hyper::header::{HeaderMap, HeaderName, HeaderValue};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

/// Header name -> all values, in arrival order per name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct HeaderMultiMap(BTreeMap<String, Vec<String>>);

/// Canonicalize a header name: first letter and every letter following a
/// hyphen upper-cased, everything else lower-cased.
pub fn canonical_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut upper = true;
    for c in name.chars() {
        if upper {
            out.push(c.to_ascii_uppercase());
        } else {
            out.push(c.to_ascii_lowercase());
        }
        upper = c == '-';
    }
    out
}

impl HeaderMultiMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy every header whose value is valid UTF-8 (lossy otherwise).
    pub fn from_header_map(headers: &HeaderMap) -> Self {
        let mut map = Self::new();
        for (name, value) in headers.iter() {
            let value = match value.to_str() {
                Ok(v) => v.to_string(),
                Err(_) => String::from_utf8_lossy(value.as_bytes()).into_owned(),
            };
            map.append(name.as_str(), value);
        }
        map
    }

    /// Append a value under `name`.
    pub fn append(&mut self, name: &str, value: impl Into<String>) {
        self.0
            .entry(canonical_name(name))
            .or_default()
            .push(value.into());
    }

    pub fn get(&self, name: &str) -> Option<&[String]> {
        self.0.get(&canonical_name(name)).map(Vec::as_slice)
    }

    /// First value for `name`, if any.
    pub fn first(&self, name: &str) -> Option<&str> {
        self.get(name)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(&canonical_name(name))
    }

    /// Remove every value for `name`, returning them.
    pub fn remove(&mut self, name: &str) -> Option<Vec<String>> {
        self.0.remove(&canonical_name(name))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Convert back into a transport header map. Names or values that are not
    /// valid on the wire are skipped.
    pub fn to_header_map(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        for (name, values) in &self.0 {
            let Ok(name) = HeaderName::from_bytes(name.as_bytes()) else {
                continue;
            };
            for value in values {
                if let Ok(value) = HeaderValue::from_str(value) {
                    headers.append(name.clone(), value);
                }
            }
        }
        headers
    }
}

impl FromIterator<(String, Vec<String>)> for HeaderMultiMap {
    fn from_iter<I: IntoIterator<Item = (String, Vec<String>)>>(iter: I) -> Self {
        let mut map = Self::new();
        for (name, values) in iter {
            map.0.entry(canonical_name(&name)).or_default().extend(values);
        }
        map
    }
}

impl<'de> Deserialize<'de> for HeaderMultiMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = BTreeMap::<String, Vec<String>>::deserialize(deserializer)?;
        Ok(raw.into_iter().collect())
    }
}
