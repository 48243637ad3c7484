//! JSON-encoded request builder.

use std::collections::HashMap;

use serde::Serialize;
use serde_json::Value;
use url::Url;

use crate::method::HttpMethod;
use crate::request::Request;

/// A request whose body is the JSON encoding of a serializable value.
///
/// Adds a `Content-Type: application/json` header; any headers supplied by
/// the caller are merged in and win on conflict.
#[derive(Debug, Clone)]
pub struct JsonRequest<B: Serialize> {
    url: Url,
    method: HttpMethod,
    headers: Option<HashMap<String, String>>,
    json_body: B,
    user_info: Option<HashMap<String, Value>>,
}

impl<B: Serialize> JsonRequest<B> {
    /// Creates a request that serializes `json_body` as its payload.
    pub fn new(url: Url, method: HttpMethod, json_body: B) -> Self {
        JsonRequest {
            url,
            method,
            headers: None,
            json_body,
            user_info: None,
        }
    }

    /// Sets additional request headers.
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

impl<B: Serialize> Request for JsonRequest<B> {
    fn url(&self) -> Url {
        self.url.clone()
    }

    fn method(&self) -> HttpMethod {
        self.method
    }

    fn headers(&self) -> Option<HashMap<String, String>> {
        let mut headers = HashMap::from([(
            "Content-Type".to_string(),
            "application/json".to_string(),
        )]);
        if let Some(extra) = &self.headers {
            for (name, value) in extra {
                headers.insert(name.clone(), value.clone());
            }
        }
        Some(headers)
    }

    fn body(&self) -> Option<Vec<u8>> {
        serde_json::to_vec(&self.json_body).ok()
    }

    fn user_info(&self) -> Option<HashMap<String, Value>> {
        self.user_info.clone()
    }
}
