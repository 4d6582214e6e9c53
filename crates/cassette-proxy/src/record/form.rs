//! URL-encoded form parsing for captured requests.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Form key -> all values, in order of appearance.
pub type FormValues = BTreeMap<String, Vec<String>>;

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Parse `a=1&b=2&a=3` style input. Malformed percent-escapes fall back to the
/// raw text rather than dropping the pair.
pub fn parse_urlencoded(input: &str) -> FormValues {
    let mut values = FormValues::new();
    for pair in input.split(['&', ';']) {
        if pair.is_empty() {
            continue;
        }
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        values
            .entry(decode_component(key))
            .or_default()
            .push(decode_component(value));
    }
    values
}

fn decode_component(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    match urlencoding::decode(&spaced) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => spaced,
    }
}

/// Both views of a request's form data.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedForms {
    /// Body values followed by query values.
    pub form: FormValues,
    /// Body values only.
    pub post_form: FormValues,
}

/// Parse the query string and, for POST/PUT/PATCH with a URL-encoded
/// content type, the body.
pub fn parse_forms(
    method: &str,
    content_type: Option<&str>,
    query: Option<&str>,
    body: &[u8],
) -> ParsedForms {
    let mut post_form = FormValues::new();
    let takes_body = matches!(method, "POST" | "PUT" | "PATCH");
    if takes_body && content_type.is_some_and(is_urlencoded) {
        post_form = parse_urlencoded(&String::from_utf8_lossy(body));
    }

    let mut form = post_form.clone();
    if let Some(query) = query {
        for (key, values) in parse_urlencoded(query) {
            form.entry(key).or_default().extend(values);
        }
    }

    ParsedForms { form, post_form }
}

fn is_urlencoded(content_type: &str) -> bool {
    content_type
        .split(';')
        .next()
        .map(|media| media.trim().eq_ignore_ascii_case(FORM_CONTENT_TYPE))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_urlencoded_multi_values() {
        let values = parse_urlencoded("a=1&b=hello+world&a=%2F");
        assert_eq!(values["a"], vec!["1", "/"]);
        assert_eq!(values["b"], vec!["hello world"]);
    }

    #[test]
    fn test_parse_urlencoded_key_without_value() {
        let values = parse_urlencoded("flag&x=");
        assert_eq!(values["flag"], vec![""]);
        assert_eq!(values["x"], vec![""]);
    }

    #[test]
    fn test_parse_urlencoded_bad_escape_kept() {
        let values = parse_urlencoded("k=%zz");
        assert_eq!(values["k"], vec!["%zz"]);
    }

    #[test]
    fn test_post_form_body_before_query() {
        let forms = parse_forms(
            "POST",
            Some("application/x-www-form-urlencoded; charset=utf-8"),
            Some("a=q"),
            b"a=b&c=d",
        );
        assert_eq!(forms.post_form["a"], vec!["b"]);
        assert!(!forms.post_form.contains_key("q"));
        assert_eq!(forms.form["a"], vec!["b", "q"]);
        assert_eq!(forms.form["c"], vec!["d"]);
    }

    #[test]
    fn test_get_body_ignored() {
        let forms = parse_forms(
            "GET",
            Some("application/x-www-form-urlencoded"),
            Some("x=1"),
            b"a=b",
        );
        assert!(forms.post_form.is_empty());
        assert_eq!(forms.form.len(), 1);
        assert_eq!(forms.form["x"], vec!["1"]);
    }

    #[test]
    fn test_json_body_not_parsed() {
        let forms = parse_forms("POST", Some("application/json"), None, b"a=b");
        assert!(forms.post_form.is_empty());
        assert!(forms.form.is_empty());
    }
}
