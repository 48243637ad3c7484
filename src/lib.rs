//! typed_fetch: a typed HTTP request/response layer over `reqwest`.
//!
//! This library decouples "how to interpret a response" from "how to make the
//! call": a [`Request`] describes an outbound call, a [`Session`] performs it,
//! and a [`Parsable`] implementation turns the received bytes, status, and
//! headers into a typed value or a classified [`FetchError`]. Sessions track
//! in-flight tasks for cancellation and report activity edges to a shared
//! [`SessionActivityMonitor`].
//!
//! # Example
//!
//! ```no_run
//! use serde::Deserialize;
//! use typed_fetch::{BasicRequest, FetchResult, Json, RequestPerforming, Session};
//! use url::Url;
//!
//! #[derive(Deserialize)]
//! struct Widget {
//!     name: String,
//! }
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let session = Session::new();
//! let request = BasicRequest::get(Url::parse("https://api.example.com/widget")?);
//!
//! // Callback delivery:
//! session.perform_simple(request.clone(), |result: FetchResult<Json<Widget>>| {
//!     if let Ok(widget) = result {
//!         println!("fetched {}", widget.0.name);
//!     }
//! });
//!
//! // Or await the same pipeline directly:
//! let widget: Json<Widget> = session.fetch(request, None).await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Requirements
//!
//! Sessions must be created and used within a tokio runtime; the transport
//! (`reqwest`) owns all connection handling, TLS, and timeouts. This crate
//! adds no retries, caching, or queuing on top of it.

#![warn(missing_docs)]

mod error;
mod method;
mod monitor;
mod parse;
mod request;
mod response;
mod result;
mod session;

pub use error::FetchError;
pub use method::HttpMethod;
pub use monitor::SessionActivityMonitor;
pub use parse::{ErrorParsing, Json, NoDataResponse, Parsable, Text};
pub use request::form::FormPostRequest;
pub use request::json::JsonRequest;
pub use request::multipart::{MultipartFormRequest, MultipartSection, BOUNDARY_TOKEN};
pub use request::{append_query_items, BasicRequest, Request};
pub use response::Response;
pub use result::{FetchResult, FetchResultExt};
pub use session::{Cancellable, RequestHandle, RequestPerforming, Session};
