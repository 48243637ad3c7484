//! Request contract and request builders.
//!
//! A [`Request`] fully describes one outbound call without performing it.
//! The submodules provide builders that derive a body and headers for common
//! encodings (JSON, form-encoded, multipart); they are alternate constructors,
//! not separate state.

pub mod form;
pub mod json;
pub mod multipart;

use std::collections::HashMap;

use serde_json::Value;
use url::Url;

use crate::method::HttpMethod;

/// An immutable description of an outbound HTTP call.
///
/// No validation is applied to headers; malformed input is passed through to
/// the transport, which fails at dispatch time.
pub trait Request {
    /// The URL to fetch.
    fn url(&self) -> Url;

    /// The HTTP method to use.
    fn method(&self) -> HttpMethod;

    /// The headers for the request, copied to the wire request verbatim.
    fn headers(&self) -> Option<HashMap<String, String>> {
        None
    }

    /// The body of the request, set on the wire request verbatim.
    fn body(&self) -> Option<Vec<u8>> {
        None
    }

    /// Opaque caller context, carried through unchanged to the
    /// [`Response`](crate::Response) this request produces.
    fn user_info(&self) -> Option<HashMap<String, Value>> {
        None
    }
}

/// Simple [`Request`] implementation for scenarios where you just need to
/// perform a request with a URL rather than creating specific domain
/// request types.
#[derive(Debug, Clone)]
pub struct BasicRequest {
    url: Url,
    method: HttpMethod,
    headers: Option<HashMap<String, String>>,
    body: Option<Vec<u8>>,
    user_info: Option<HashMap<String, Value>>,
}

impl BasicRequest {
    /// Creates a request with the given URL and method and no headers, body,
    /// or user context.
    pub fn new(url: Url, method: HttpMethod) -> Self {
        BasicRequest {
            url,
            method,
            headers: None,
            body: None,
            user_info: None,
        }
    }

    /// Creates a GET request for the given URL.
    pub fn get(url: Url) -> Self {
        Self::new(url, HttpMethod::Get)
    }

    /// Sets the request headers.
    pub fn with_headers(mut self, headers: HashMap<String, String>) -> Self {
        self.headers = Some(headers);
        self
    }

    /// Sets the request body.
    pub fn with_body(mut self, body: Vec<u8>) -> Self {
        self.body = Some(body);
        self
    }

    /// Attaches an opaque user-context map to the request.
    pub fn with_user_info(mut self, user_info: HashMap<String, Value>) -> Self {
        self.user_info = Some(user_info);
        self
    }
}

impl Request for BasicRequest {
    fn url(&self) -> Url {
        self.url.clone()
    }

    fn method(&self) -> HttpMethod {
        self.method
    }

    fn headers(&self) -> Option<HashMap<String, String>> {
        self.headers.clone()
    }

    fn body(&self) -> Option<Vec<u8>> {
        self.body.clone()
    }

    fn user_info(&self) -> Option<HashMap<String, Value>> {
        self.user_info.clone()
    }
}

/// Returns a copy of `url` with the given query items appended.
pub fn append_query_items(url: &Url, items: &[(&str, &str)]) -> Url {
    let mut url = url.clone();
    {
        let mut pairs = url.query_pairs_mut();
        pairs.extend_pairs(items.iter().copied());
    }
    url
}
