//! Error types for the fetch pipeline.
//!
//! Every failure a request can produce is represented by [`FetchError`].
//! Errors are terminal for the request that produced them: nothing in this
//! crate retries, and each `perform` call delivers exactly one result.

use std::string::FromUtf8Error;

use thiserror::Error;
use url::Url;

/// The failures that can occur when performing and parsing a request.
#[derive(Error, Debug)]
pub enum FetchError {
    /// The network call itself failed (DNS, TLS, connection reset, timeout).
    /// The parser is never invoked for these.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The task was cancelled client-side before the transport completed.
    /// Reported through the normal completion path, not as a separate
    /// terminal state.
    #[error("request cancelled")]
    Cancelled,

    /// HTTP status outside the success range recognised by the parser, with
    /// the request URL and a best-effort text rendering of the body.
    #[error("HTTP error code: {code}. URL: {url}")]
    HttpError {
        /// The status code received.
        code: u16,
        /// The URL of the originating request.
        url: Url,
        /// The response body decoded as UTF-8, if any body was received.
        body_text: Option<String>,
    },

    /// HTTP status outside the success range, status code only.
    #[error("status code error: {0}")]
    StatusCode(u16),

    /// Success-range status but the response carried no body when the parser
    /// required one.
    #[error("no data received")]
    NoData,

    /// The body was present but could not be decoded into the target type.
    #[error("parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// The body was present but is not valid UTF-8.
    #[error("response body is not valid UTF-8: {0}")]
    Utf8(#[from] FromUtf8Error),

    /// A domain-specific error produced by an
    /// [`ErrorParsing`](crate::ErrorParsing) implementation.
    #[error(transparent)]
    Api(Box<dyn std::error::Error + Send + Sync>),
}

impl FetchError {
    /// Wraps a domain error produced by an error parser.
    pub fn api<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        FetchError::Api(Box::new(error))
    }

    /// Returns the domain error wrapped by [`FetchError::Api`], downcast to
    /// the requested type, if this is such an error.
    pub fn downcast_api<E>(&self) -> Option<&E>
    where
        E: std::error::Error + 'static,
    {
        match self {
            FetchError::Api(inner) => inner.downcast_ref::<E>(),
            _ => None,
        }
    }
}
