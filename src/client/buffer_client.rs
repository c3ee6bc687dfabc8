//! The long-polling page buffer client
//!
//! One client owns one remote buffer endpoint. It repeatedly GETs the next
//! token window, hands every page to the owner's callback, and acknowledges
//! a drained buffer with a DELETE. Failures feed an exponential backoff; a
//! transient failure streak that outlives `min_error_duration` is promoted
//! to a fatal error and surfaced through `client_failed`.

use super::backoff::Backoff;
use super::callback::ClientCallback;
use super::status::PageBufferClientStatus;
use crate::error::{Error, Result};
use crate::protocol::{
    decode_pages_response, FramedPageCodec, PageDeserializer, PagesResponse, PRESTO_MAX_SIZE,
};
use chrono::{DateTime, Utc};
use reqwest::Client;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, error};
use url::Url;

const DEFAULT_MAX_RESPONSE_SIZE: usize = 16 * 1024 * 1024;
const DEFAULT_MIN_ERROR_DURATION: Duration = Duration::from_secs(60);

// ============================================================================
// Configuration
// ============================================================================

/// Builder for a [`PageBufferClient`]
pub struct PageBufferClientBuilder {
    endpoint: Url,
    max_response_size: usize,
    min_error_duration: Duration,
    http: Option<Client>,
    executor: Option<Handle>,
    deserializer: Option<Arc<dyn PageDeserializer>>,
}

impl PageBufferClientBuilder {
    fn new(endpoint: Url) -> Self {
        Self {
            endpoint,
            max_response_size: DEFAULT_MAX_RESPONSE_SIZE,
            min_error_duration: DEFAULT_MIN_ERROR_DURATION,
            http: None,
            executor: None,
            deserializer: None,
        }
    }

    /// Cap the size of one response body, advertised to the server through
    /// the `X-Presto-Max-Size` request header and enforced while reading.
    #[must_use]
    pub fn max_response_size(mut self, bytes: usize) -> Self {
        self.max_response_size = bytes;
        self
    }

    /// Error-streak duration above which a transient failure is promoted to
    /// a fatal one.
    #[must_use]
    pub fn min_error_duration(mut self, duration: Duration) -> Self {
        self.min_error_duration = duration;
        self
    }

    /// Use a shared HTTP client instead of a fresh one.
    #[must_use]
    pub fn http_client(mut self, http: Client) -> Self {
        self.http = Some(http);
        self
    }

    /// Submit delayed tasks and continuations to this runtime handle instead
    /// of the ambient one.
    #[must_use]
    pub fn executor(mut self, executor: Handle) -> Self {
        self.executor = Some(executor);
        self
    }

    /// Decode page bodies with this deserializer instead of the default
    /// [`FramedPageCodec`].
    #[must_use]
    pub fn page_deserializer(mut self, deserializer: Arc<dyn PageDeserializer>) -> Self {
        self.deserializer = Some(deserializer);
        self
    }

    /// Build the client, wiring callbacks to `callback`.
    pub fn build(self, callback: Arc<dyn ClientCallback>) -> Result<PageBufferClient> {
        if self.endpoint.cannot_be_a_base() {
            return Err(Error::config(format!(
                "endpoint {} cannot carry a token path segment",
                self.endpoint
            )));
        }
        let executor = match self.executor {
            Some(executor) => executor,
            None => Handle::try_current().map_err(|_| {
                Error::config("no tokio runtime available; set an executor handle")
            })?,
        };
        Ok(PageBufferClient {
            inner: Arc::new(ClientInner {
                http: self.http.unwrap_or_default(),
                endpoint: self.endpoint,
                max_response_size: self.max_response_size,
                min_error_duration: self.min_error_duration,
                callback,
                deserializer: self
                    .deserializer
                    .unwrap_or_else(|| Arc::new(FramedPageCodec)),
                executor,
                state: StateLock::new(ClientState {
                    closed: false,
                    scheduled: false,
                    completed: false,
                    token: 0,
                    in_flight: None,
                    backoff: Backoff::new(),
                    last_update: Utc::now(),
                }),
                pages_received: AtomicU64::new(0),
                requests_scheduled: AtomicU64::new(0),
                requests_completed: AtomicU64::new(0),
                requests_failed: AtomicU64::new(0),
            }),
        })
    }
}

// ============================================================================
// State
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RequestKind {
    Get,
    Delete,
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestKind::Get => write!(f, "GET"),
            RequestKind::Delete => write!(f, "DELETE"),
        }
    }
}

struct InFlightRequest {
    kind: RequestKind,
    task: JoinHandle<()>,
}

struct ClientState {
    closed: bool,
    scheduled: bool,
    completed: bool,
    token: u64,
    in_flight: Option<InFlightRequest>,
    backoff: Backoff,
    last_update: DateTime<Utc>,
}

/// Mutex over the client state that remembers which thread holds it, so the
/// callback-outside-the-lock rule can be asserted at runtime.
struct StateLock {
    inner: Mutex<ClientState>,
    holder: AtomicU64,
}

fn thread_token() -> u64 {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    std::thread::current().id().hash(&mut hasher);
    // 0 is the sentinel for "unheld"
    hasher.finish() | 1
}

impl StateLock {
    fn new(state: ClientState) -> Self {
        Self {
            inner: Mutex::new(state),
            holder: AtomicU64::new(0),
        }
    }

    fn lock(&self) -> StateGuard<'_> {
        let guard = self.inner.lock().expect("client state lock poisoned");
        self.holder.store(thread_token(), Ordering::Release);
        StateGuard {
            guard,
            holder: &self.holder,
        }
    }

    fn held_by_current_thread(&self) -> bool {
        self.holder.load(Ordering::Acquire) == thread_token()
    }
}

struct StateGuard<'a> {
    guard: MutexGuard<'a, ClientState>,
    holder: &'a AtomicU64,
}

impl Drop for StateGuard<'_> {
    fn drop(&mut self) {
        self.holder.store(0, Ordering::Release);
    }
}

impl Deref for StateGuard<'_> {
    type Target = ClientState;

    fn deref(&self) -> &ClientState {
        &self.guard
    }
}

impl DerefMut for StateGuard<'_> {
    fn deref_mut(&mut self) -> &mut ClientState {
        &mut self.guard
    }
}

// ============================================================================
// Client
// ============================================================================

struct ClientInner {
    http: Client,
    endpoint: Url,
    max_response_size: usize,
    min_error_duration: Duration,
    callback: Arc<dyn ClientCallback>,
    deserializer: Arc<dyn PageDeserializer>,
    executor: Handle,
    state: StateLock,
    pages_received: AtomicU64,
    requests_scheduled: AtomicU64,
    requests_completed: AtomicU64,
    requests_failed: AtomicU64,
}

/// Long-polling client for one remote page buffer.
///
/// Cheap to clone; clones share the same state. All public operations are
/// thread-safe and none of them blocks on I/O. At most one HTTP request is
/// in flight per client at any time.
///
/// Two clients are equal iff their endpoints are equal, so a set keyed by
/// clients is keyed by endpoint alone.
#[derive(Clone)]
pub struct PageBufferClient {
    inner: Arc<ClientInner>,
}

impl PageBufferClient {
    /// Start building a client for `endpoint`.
    pub fn builder(endpoint: Url) -> PageBufferClientBuilder {
        PageBufferClientBuilder::new(endpoint)
    }

    /// The endpoint this client polls.
    pub fn endpoint(&self) -> &Url {
        &self.inner.endpoint
    }

    /// Whether an HTTP request is currently in flight.
    pub fn is_running(&self) -> bool {
        self.inner.state.lock().in_flight.is_some()
    }

    /// Arm the client: submit a delayed task that issues the next request.
    ///
    /// Idempotent. A client that is closed, already armed, or has a request
    /// in flight returns silently. The current backoff delay is applied
    /// before the request fires and counts against the error budget.
    pub fn schedule_request(&self) {
        {
            let mut state = self.inner.state.lock();
            if state.closed || state.in_flight.is_some() || state.scheduled {
                return;
            }
            state.scheduled = true;

            // start before scheduling so the delay counts against the error budget
            state.backoff.start();
            let delay = state.backoff.delay();

            let client = self.clone();
            self.inner.executor.spawn(async move {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                client.initiate_request();
            });

            state.last_update = Utc::now();
        }
        self.inner.requests_scheduled.fetch_add(1, Ordering::Relaxed);
    }

    /// Close the client.
    ///
    /// Idempotent. Cancels the in-flight request, if any, and fires one
    /// best-effort DELETE against the endpoint whose response is ignored.
    /// Never blocks the caller.
    pub fn close(&self) {
        let (should_send_delete, in_flight) = {
            let mut state = self.inner.state.lock();
            let should_send_delete = !state.closed;
            state.closed = true;
            let in_flight = state.in_flight.take();
            state.last_update = Utc::now();
            (should_send_delete, in_flight)
        };

        if let Some(request) = in_flight {
            request.task.abort();
        }

        // abort the buffer on the remote node; the response is ignored
        if should_send_delete {
            let http = self.inner.http.clone();
            let endpoint = self.inner.endpoint.clone();
            self.inner.executor.spawn(async move {
                let _ = http.delete(endpoint).send().await;
            });
        }
    }

    /// Point-in-time snapshot for observability.
    pub fn status(&self) -> PageBufferClientStatus {
        let state = self.inner.state.lock();
        let label = if state.closed {
            "closed"
        } else if state.in_flight.is_some() {
            "running"
        } else if state.scheduled {
            "scheduled"
        } else if state.completed {
            "completed"
        } else {
            "queued"
        };
        let http_request_state = state.in_flight.as_ref().map_or_else(
            || "not scheduled".to_string(),
            |request| format!("processing {}", request.kind),
        );
        PageBufferClientStatus {
            uri: self.inner.endpoint.to_string(),
            state: label.to_string(),
            last_update: state.last_update,
            pages_received: self.inner.pages_received.load(Ordering::Relaxed),
            requests_scheduled: self.inner.requests_scheduled.load(Ordering::Relaxed),
            requests_completed: self.inner.requests_completed.load(Ordering::Relaxed),
            requests_failed: self.inner.requests_failed.load(Ordering::Relaxed),
            http_request_state,
        }
    }

    // ========================================================================
    // Internal task
    // ========================================================================

    fn initiate_request(&self) {
        let mut state = self.inner.state.lock();
        state.scheduled = false;
        if state.closed || state.in_flight.is_some() {
            return;
        }

        if state.completed {
            self.send_delete(&mut state);
        } else {
            self.send_get_results(&mut state);
        }

        state.last_update = Utc::now();
    }

    fn send_get_results(&self, state: &mut StateGuard<'_>) {
        let uri = page_uri(&self.inner.endpoint, state.token);
        let client = self.clone();
        let task = self.inner.executor.spawn(async move {
            match client.fetch_pages(uri.clone()).await {
                Ok(response) => client.on_get_success(response),
                Err(err) => client.on_get_failure(&uri, err),
            }
        });
        state.in_flight = Some(InFlightRequest {
            kind: RequestKind::Get,
            task,
        });
    }

    async fn fetch_pages(&self, uri: Url) -> Result<PagesResponse> {
        let response = self
            .inner
            .http
            .get(uri)
            .header(PRESTO_MAX_SIZE, self.inner.max_response_size.to_string())
            .send()
            .await?;
        decode_pages_response(
            response,
            self.inner.deserializer.as_ref(),
            self.inner.max_response_size,
        )
        .await
    }

    fn on_get_success(&self, response: PagesResponse) {
        self.check_not_holding_lock("request continuation");

        let response_token = response.token();
        let next_token = response.next_token();
        let client_complete = response.client_complete();

        let pages = {
            let mut state = self.inner.state.lock();
            state.backoff.reset();
            if response_token == state.token {
                state.token = next_token;
                response.into_pages()
            } else {
                // replay of an already acknowledged window
                Vec::new()
            }
        };

        for page in pages {
            self.inner.pages_received.fetch_add(1, Ordering::Relaxed);
            self.inner.callback.add_page(self, page);
        }

        {
            let mut state = self.inner.state.lock();
            // the buffer is drained; acknowledge with a DELETE on the next turn
            if client_complete {
                state.completed = true;
            }
            state.in_flight = None;
            state.last_update = Utc::now();
        }
        self.inner.requests_completed.fetch_add(1, Ordering::Relaxed);
        self.inner.callback.request_complete(self);
    }

    fn on_get_failure(&self, uri: &Url, err: Error) {
        self.check_not_holding_lock("request continuation");
        debug!(uri = %uri, error = %err, "page request failed");

        let elapsed = self.inner.state.lock().backoff.elapsed();
        let err = if err.is_retryable() && elapsed > self.inner.min_error_duration {
            Error::transport_timeout(uri.as_str(), elapsed, err)
        } else {
            err
        };
        self.handle_failure(err);
    }

    fn send_delete(&self, state: &mut StateGuard<'_>) {
        let client = self.clone();
        let endpoint = self.inner.endpoint.clone();
        let task = self.inner.executor.spawn(async move {
            let result = async {
                let response = client.inner.http.delete(endpoint.clone()).send().await?;
                let status = response.status();
                if !status.is_success() {
                    return Err(Error::http_status(
                        status.as_u16(),
                        format!(
                            "unexpected response to DELETE {endpoint}: {}",
                            status.canonical_reason().unwrap_or("unknown"),
                        ),
                    ));
                }
                Ok(())
            }
            .await;
            match result {
                Ok(()) => client.on_delete_success(),
                Err(err) => client.on_delete_failure(err),
            }
        });
        state.in_flight = Some(InFlightRequest {
            kind: RequestKind::Delete,
            task,
        });
    }

    fn on_delete_success(&self) {
        self.check_not_holding_lock("request continuation");
        {
            let mut state = self.inner.state.lock();
            state.closed = true;
            state.in_flight = None;
            state.last_update = Utc::now();
        }
        self.inner.requests_completed.fetch_add(1, Ordering::Relaxed);
        self.inner.callback.client_finished(self);
    }

    fn on_delete_failure(&self, err: Error) {
        self.check_not_holding_lock("request continuation");
        error!(endpoint = %self.inner.endpoint, error = %err, "request to delete buffer failed");

        let elapsed = self.inner.state.lock().backoff.elapsed();
        let err = if err.is_retryable() && elapsed > self.inner.min_error_duration {
            Error::too_many_requests_failed(self.inner.endpoint.as_str(), elapsed, err)
        } else {
            err
        };
        self.handle_failure(err);
    }

    fn handle_failure(&self, err: Error) {
        self.inner.requests_failed.fetch_add(1, Ordering::Relaxed);
        self.inner.requests_completed.fetch_add(1, Ordering::Relaxed);

        if !err.is_retryable() {
            self.check_not_holding_lock("client_failed");
            self.inner.callback.client_failed(self, err);
        }

        {
            let mut state = self.inner.state.lock();
            state.backoff.note_error();
            state.in_flight = None;
            state.last_update = Utc::now();
        }
        self.inner.callback.request_complete(self);
    }

    /// Callbacks must never run under the state lock.
    fn check_not_holding_lock(&self, context: &str) {
        if self.inner.state.held_by_current_thread() {
            error!(context, "cannot run callbacks while holding the client state lock");
            debug_assert!(
                false,
                "cannot run callbacks while holding the client state lock: {context}"
            );
        }
    }
}

/// Append the token as a path segment to the endpoint.
fn page_uri(endpoint: &Url, token: u64) -> Url {
    let mut uri = endpoint.clone();
    uri.path_segments_mut()
        .expect("endpoint validated at build time")
        .pop_if_empty()
        .push(&token.to_string());
    uri
}

impl PartialEq for PageBufferClient {
    fn eq(&self, other: &Self) -> bool {
        self.inner.endpoint == other.inner.endpoint
    }
}

impl Eq for PageBufferClient {}

impl Hash for PageBufferClient {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.inner.endpoint.as_str().hash(state);
    }
}

impl fmt::Display for PageBufferClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = {
            let state = self.inner.state.lock();
            if state.closed {
                "CLOSED"
            } else if state.in_flight.is_some() {
                "RUNNING"
            } else {
                "QUEUED"
            }
        };
        write!(
            f,
            "PageBufferClient {{ {}, {} }}",
            self.inner.endpoint, state
        )
    }
}

impl fmt::Debug for PageBufferClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PageBufferClient")
            .field("endpoint", &self.inner.endpoint.as_str())
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}
