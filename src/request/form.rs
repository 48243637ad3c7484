//! Form-encoded POST request builder.

use std::collections::HashMap;

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde_json::Value;
use url::Url;

use crate::method::HttpMethod;
use crate::request::Request;

/// Encode set for form body keys and values.
///
/// RFC 3986 query encoding, except that `:#[]@!$&'()*+,;=` are not treated
/// as safe and are escaped even though they are otherwise allowed in query
/// components. Leaves the unreserved characters plus `/` and `?` intact.
const FORM_BODY_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~')
    .remove(b'/')
    .remove(b'?');

/// A POST request whose body is a URL-query-style `key=value&key2=value2`
/// encoding of a string map.
///
/// Fields are emitted in lexicographic key order so the body is
/// deterministic.
#[derive(Debug, Clone)]
pub struct FormPostRequest {
    url: Url,
    headers: Option<HashMap<String, String>>,
    form_body: HashMap<String, String>,
    user_info: Option<HashMap<String, Value>>,
}

impl FormPostRequest {
    /// Creates a form POST request for the given fields.
    pub fn new(url: Url, form_body: HashMap<String, String>) -> Self {
        FormPostRequest {
            url,
            headers: None,
            form_body,
            user_info: None,
        }
    }

    /// Sets the request headers.
    pub fn with_headers(mut self, headers: HashMap<String, String>) -> Self {
        self.headers = Some(headers);
        self
    }

    /// Attaches an opaque user-context map to the request.
    pub fn with_user_info(mut self, user_info: HashMap<String, Value>) -> Self {
        self.user_info = Some(user_info);
        self
    }
}

impl Request for FormPostRequest {
    fn url(&self) -> Url {
        self.url.clone()
    }

    fn method(&self) -> HttpMethod {
        HttpMethod::Post
    }

    fn headers(&self) -> Option<HashMap<String, String>> {
        self.headers.clone()
    }

    fn body(&self) -> Option<Vec<u8>> {
        Some(encode_form_body(&self.form_body).into_bytes())
    }

    fn user_info(&self) -> Option<HashMap<String, Value>> {
        self.user_info.clone()
    }
}

fn encode_form_body(fields: &HashMap<String, String>) -> String {
    let mut pairs: Vec<_> = fields.iter().collect();
    pairs.sort_by(|a, b| a.0.cmp(b.0));
    pairs
        .iter()
        .map(|(key, value)| {
            format!(
                "{}={}",
                utf8_percent_encode(key, FORM_BODY_ENCODE_SET),
                utf8_percent_encode(value, FORM_BODY_ENCODE_SET)
            )
        })
        .collect::<Vec<_>>()
        .join("&")
}
