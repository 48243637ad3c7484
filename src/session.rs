//! Request dispatch, in-flight task tracking, and cancellation.
//!
//! A [`Session`] performs one [`Request`] over the transport and delivers
//! exactly one [`FetchResult`] per call, either through a completion callback
//! ([`RequestPerforming::perform`]) or as a lazy single-item stream
//! ([`Session::response_stream`]). Both delivery modes share the same
//! response-processing pipeline.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use futures::Stream;
use log::debug;
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::FetchError;
use crate::monitor::SessionActivityMonitor;
use crate::parse::{ErrorParsing, Parsable};
use crate::request::Request;
use crate::response::Response;
use crate::result::FetchResult;

/// An operation that can be cancelled.
pub trait Cancellable {
    /// Requests transport-level abort of the operation. The completion
    /// callback still fires, with [`FetchError::Cancelled`].
    fn cancel(&self);
}

/// Handle to an in-flight request returned by
/// [`RequestPerforming::perform`].
#[derive(Debug, Clone)]
pub struct RequestHandle {
    token: CancellationToken,
}

impl Cancellable for RequestHandle {
    fn cancel(&self) {
        self.token.cancel();
    }
}

/// An object that can make requests.
///
/// The seam consumers should depend on; substitute a test double here to
/// keep application code off the network.
pub trait RequestPerforming {
    /// Makes an HTTP request for the resource described by `request`.
    ///
    /// The parsed result is delivered to `completion` on the session's
    /// response runtime. Returns a cancellable handle to the operation,
    /// registered before this method returns so immediate cancellation is
    /// possible.
    fn perform<T, R, F>(
        &self,
        request: R,
        error_parser: Option<Arc<dyn ErrorParsing + Send + Sync>>,
        completion: F,
    ) -> RequestHandle
    where
        T: Parsable + Send + 'static,
        R: Request + Send + Sync + 'static,
        F: FnOnce(FetchResult<T>) + Send + 'static;

    /// [`perform`](RequestPerforming::perform) without custom error parsing.
    fn perform_simple<T, R, F>(&self, request: R, completion: F) -> RequestHandle
    where
        T: Parsable + Send + 'static,
        R: Request + Send + Sync + 'static,
        F: FnOnce(FetchResult<T>) + Send + 'static,
    {
        self.perform(request, None, completion)
    }

    /// Cancels all outstanding tasks started through this performer.
    fn cancel_all_tasks(&self);
}

/// Session for making requests using a shared `reqwest::Client`.
///
/// Owns the registry of in-flight tasks and reports activity to a
/// [`SessionActivityMonitor`] (the process-wide shared instance by default).
/// Must be created within a tokio runtime; transport work is spawned on the
/// runtime captured at construction and results are delivered on the
/// configurable response runtime, which defaults to the same one.
///
/// Cloning a session shares its client, registry, and monitor.
#[derive(Clone)]
pub struct Session {
    client: reqwest::Client,
    runtime: Handle,
    response_runtime: Handle,
    tasks: Arc<Mutex<HashMap<Uuid, CancellationToken>>>,
    monitor: Arc<SessionActivityMonitor>,
}

impl Session {
    /// Creates a session with a default client.
    pub fn new() -> Self {
        Self::with_client(reqwest::Client::new())
    }

    /// Creates a session using the supplied client, for callers that need
    /// transport-level configuration (timeouts, proxies, TLS).
    pub fn with_client(client: reqwest::Client) -> Self {
        let runtime = Handle::current();
        Session {
            client,
            response_runtime: runtime.clone(),
            runtime,
            tasks: Arc::new(Mutex::new(HashMap::new())),
            monitor: SessionActivityMonitor::shared(),
        }
    }

    /// Substitutes a scoped activity monitor, e.g. for test isolation.
    pub fn with_monitor(mut self, monitor: Arc<SessionActivityMonitor>) -> Self {
        self.monitor = monitor;
        self
    }

    /// Delivers completion callbacks on the given runtime instead of the one
    /// the session was created on.
    pub fn with_response_runtime(mut self, handle: Handle) -> Self {
        self.response_runtime = handle;
        self
    }

    /// Number of requests currently registered as in flight.
    pub fn outstanding_tasks(&self) -> usize {
        self.tasks.lock().expect("task registry lock poisoned").len()
    }

    /// Performs `request` and resolves to the parsed result.
    ///
    /// The stream-style counterpart to [`RequestPerforming::perform`]: lazy
    /// until awaited, increments the activity monitor when polled, and
    /// decrements exactly once whether it resolves, fails before a response
    /// exists, or is dropped mid-flight. Dropping the future aborts the
    /// transport call.
    pub async fn fetch<T, R>(
        &self,
        request: R,
        error_parser: Option<Arc<dyn ErrorParsing + Send + Sync>>,
    ) -> FetchResult<T>
    where
        T: Parsable,
        R: Request + Send + Sync + 'static,
    {
        run_fetch(
            self.client.clone(),
            Arc::clone(&self.monitor),
            Arc::new(request),
            error_parser,
        )
        .await
    }

    /// Exposes [`fetch`](Session::fetch) as a lazy stream that yields the
    /// single result and then completes. Dropping the stream cancels the
    /// underlying task.
    pub fn response_stream<T, R>(
        &self,
        request: R,
        error_parser: Option<Arc<dyn ErrorParsing + Send + Sync>>,
    ) -> impl Stream<Item = FetchResult<T>> + Send + 'static
    where
        T: Parsable + Send + 'static,
        R: Request + Send + Sync + 'static,
    {
        let client = self.client.clone();
        let monitor = Arc::clone(&self.monitor);
        futures::stream::once(run_fetch(client, monitor, Arc::new(request), error_parser))
    }
}

impl RequestPerforming for Session {
    fn perform<T, R, F>(
        &self,
        request: R,
        error_parser: Option<Arc<dyn ErrorParsing + Send + Sync>>,
        completion: F,
    ) -> RequestHandle
    where
        T: Parsable + Send + 'static,
        R: Request + Send + Sync + 'static,
        F: FnOnce(FetchResult<T>) + Send + 'static,
    {
        let request: Arc<dyn Request + Send + Sync> = Arc::new(request);
        let task_id = Uuid::new_v4();
        let token = CancellationToken::new();

        self.monitor.increment_count();
        {
            let mut tasks = self.tasks.lock().expect("task registry lock poisoned");
            tasks.insert(task_id, token.clone());
        }
        debug!(
            "dispatching {} {} as task {task_id}",
            request.method().as_str(),
            request.url()
        );

        let client = self.client.clone();
        let tasks = Arc::clone(&self.tasks);
        let monitor = Arc::clone(&self.monitor);
        let response_runtime = self.response_runtime.clone();
        let worker_token = token.clone();
        self.runtime.spawn(async move {
            let raw = tokio::select! {
                _ = worker_token.cancelled() => {
                    debug!("task {task_id} cancelled");
                    Err(FetchError::Cancelled)
                }
                raw = execute(&client, &*request) => raw,
            };
            // Drop the registry entry before the monitor decrement and the
            // delivery, so a concurrent cancel_all_tasks never observes a
            // stale handle for a completed task.
            {
                let mut tasks = tasks.lock().expect("task registry lock poisoned");
                tasks.remove(&task_id);
            }
            let parser: Option<&dyn ErrorParsing> =
                error_parser.as_deref().map(|p| p as &dyn ErrorParsing);
            let result = process_response::<T>(raw, request, parser);
            monitor.decrement_count();
            response_runtime.spawn(async move { completion(result) });
        });

        RequestHandle { token }
    }

    fn cancel_all_tasks(&self) {
        let mut tasks = self.tasks.lock().expect("task registry lock poisoned");
        debug!("cancelling {} outstanding task(s)", tasks.len());
        for token in tasks.values() {
            token.cancel();
        }
        tasks.clear();
    }
}

/// Raw transport outcome before parsing.
struct RawResponse {
    status: u16,
    headers: HashMap<String, String>,
    data: Option<Vec<u8>>,
}

/// Builds the wire request from `request` verbatim and performs it.
///
/// Header names and values are not validated here; illegal ones surface as a
/// transport builder error at dispatch time.
async fn execute(
    client: &reqwest::Client,
    request: &(dyn Request + Send + Sync),
) -> Result<RawResponse, FetchError> {
    let mut builder = client.request(request.method().into(), request.url());
    if let Some(headers) = request.headers() {
        for (name, value) in &headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
    }
    if let Some(body) = request.body() {
        builder = builder.body(body);
    }
    let response = builder.send().await?;
    let status = response.status().as_u16();
    let headers = collect_headers(response.headers());
    let bytes = response.bytes().await?;
    let data = if bytes.is_empty() {
        None
    } else {
        Some(bytes.to_vec())
    };
    Ok(RawResponse {
        status,
        headers,
        data,
    })
}

/// Renders received headers as strings. Header values are not guaranteed to
/// be UTF-8 on the wire; opaque bytes are rendered lossily rather than
/// dropped or blanked, so a garbled value stays distinguishable from an
/// empty one.
fn collect_headers(headers: &reqwest::header::HeaderMap) -> HashMap<String, String> {
    headers
        .iter()
        .map(|(name, value)| {
            (
                name.as_str().to_string(),
                String::from_utf8_lossy(value.as_bytes()).into_owned(),
            )
        })
        .collect()
}

/// Turns a transport outcome into the typed result. Transport errors bypass
/// the parser; anything else is wrapped in a [`Response`] with the request's
/// user context carried over, and handed to `T::parse`.
fn process_response<T: Parsable>(
    raw: Result<RawResponse, FetchError>,
    request: Arc<dyn Request + Send + Sync>,
    error_parser: Option<&dyn ErrorParsing>,
) -> FetchResult<T> {
    match raw {
        Err(error) => Err(error),
        Ok(raw) => {
            let user_info = request.user_info();
            let response = Response::new(raw.data, raw.status, Some(raw.headers), user_info, request);
            T::parse(&response, error_parser)
        }
    }
}

/// Shared body of [`Session::fetch`] and [`Session::response_stream`].
async fn run_fetch<T: Parsable>(
    client: reqwest::Client,
    monitor: Arc<SessionActivityMonitor>,
    request: Arc<dyn Request + Send + Sync>,
    error_parser: Option<Arc<dyn ErrorParsing + Send + Sync>>,
) -> FetchResult<T> {
    let guard = ActivityGuard::new(monitor);
    let raw = execute(&client, &*request).await;
    let parser: Option<&dyn ErrorParsing> =
        error_parser.as_deref().map(|p| p as &dyn ErrorParsing);
    let result = process_response::<T>(raw, request, parser);
    guard.finish();
    result
}

/// Keeps the activity count balanced on every exit path of the stream mode,
/// including cancellation by drop.
struct ActivityGuard {
    monitor: Arc<SessionActivityMonitor>,
    armed: bool,
}

impl ActivityGuard {
    fn new(monitor: Arc<SessionActivityMonitor>) -> Self {
        monitor.increment_count();
        ActivityGuard {
            monitor,
            armed: true,
        }
    }

    /// Decrements once, before the result is handed to the caller.
    fn finish(mut self) {
        self.armed = false;
        self.monitor.decrement_count();
    }
}

impl Drop for ActivityGuard {
    fn drop(&mut self) {
        if self.armed {
            self.monitor.decrement_count();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use reqwest::header::{HeaderMap, HeaderValue};

    #[test]
    fn test_collect_headers_renders_non_utf8_values_lossily() {
        let mut headers = HeaderMap::new();
        headers.insert("x-plain", HeaderValue::from_static("plain value"));
        headers.insert(
            "x-opaque",
            HeaderValue::from_bytes(&[b'a', 0xE9, b'b']).unwrap(),
        );
        let collected = collect_headers(&headers);
        assert_eq!(collected.get("x-plain"), Some(&"plain value".to_string()));
        assert_eq!(collected.get("x-opaque"), Some(&"a\u{fffd}b".to_string()));
    }

    #[tokio::test]
    async fn test_new_session_has_no_outstanding_tasks() {
        let session = Session::new();
        assert_eq!(session.outstanding_tasks(), 0);
    }

    #[tokio::test]
    async fn test_cancel_all_on_empty_registry_is_a_noop() {
        let session = Session::new();
        session.cancel_all_tasks();
        assert_eq!(session.outstanding_tasks(), 0);
    }

    #[tokio::test]
    async fn test_cloned_sessions_share_the_registry() {
        let session = Session::new();
        let clone = session.clone();
        session
            .tasks
            .lock()
            .unwrap()
            .insert(Uuid::new_v4(), CancellationToken::new());
        assert_eq!(clone.outstanding_tasks(), 1);
        clone.cancel_all_tasks();
        assert_eq!(session.outstanding_tasks(), 0);
    }
}
