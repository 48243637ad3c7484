//! Received response value object.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::request::Request;

/// The raw outcome of a completed network call, handed to a
/// [`Parsable`](crate::Parsable) implementation.
///
/// Created exactly once per completed call and immutable thereafter.
pub struct Response {
    data: Option<Vec<u8>>,
    status: u16,
    headers: Option<HashMap<String, String>>,
    user_info: Option<HashMap<String, Value>>,
    original_request: Arc<dyn Request + Send + Sync>,
}

impl Response {
    /// Bundles the received data with the request that produced it.
    pub fn new(
        data: Option<Vec<u8>>,
        status: u16,
        headers: Option<HashMap<String, String>>,
        user_info: Option<HashMap<String, Value>>,
        original_request: Arc<dyn Request + Send + Sync>,
    ) -> Self {
        Response {
            data,
            status,
            headers,
            user_info,
            original_request,
        }
    }

    /// The body bytes, absent on an empty body.
    pub fn data(&self) -> Option<&[u8]> {
        self.data.as_deref()
    }

    /// The HTTP status code received.
    pub fn status(&self) -> u16 {
        self.status
    }

    /// The response headers received.
    pub fn headers(&self) -> Option<&HashMap<String, String>> {
        self.headers.as_ref()
    }

    /// The user-context map carried through from the originating request.
    pub fn user_info(&self) -> Option<&HashMap<String, Value>> {
        self.user_info.as_ref()
    }

    /// The request this response was created from.
    pub fn original_request(&self) -> &(dyn Request + Send + Sync) {
        self.original_request.as_ref()
    }

    /// Best-effort text rendering of the body, for error diagnostics.
    pub fn body_text(&self) -> Option<String> {
        self.data
            .as_deref()
            .map(|data| String::from_utf8_lossy(data).into_owned())
    }
}

impl fmt::Debug for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Response")
            .field("status", &self.status)
            .field("data_len", &self.data.as_ref().map(Vec::len))
            .field("headers", &self.headers)
            .field("url", &self.original_request.url().as_str())
            .finish()
    }
}
