//! Read-only status snapshot for observability

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

/// Point-in-time view of one client, as returned by
/// [`PageBufferClient::status`](super::PageBufferClient::status).
///
/// `state` is one of `closed`, `running`, `scheduled`, `completed` or
/// `queued`, first matching flag wins in that order. The counters are
/// monotonic over the client's lifetime.
#[derive(Debug, Clone, Serialize)]
pub struct PageBufferClientStatus {
    /// Endpoint the client polls
    pub uri: String,
    /// Observable state label
    pub state: String,
    /// Timestamp of the last state transition, diagnostics only
    pub last_update: DateTime<Utc>,
    /// Pages delivered to the owner
    pub pages_received: u64,
    /// Requests handed to the executor
    pub requests_scheduled: u64,
    /// Request attempts that ran to completion, successfully or not
    pub requests_completed: u64,
    /// Request attempts that failed
    pub requests_failed: u64,
    /// Label of the in-flight request, or `not scheduled`
    pub http_request_state: String,
}

impl fmt::Display for PageBufferClientStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}] pages={} scheduled={} completed={} failed={} ({})",
            self.uri,
            self.state,
            self.pages_received,
            self.requests_scheduled,
            self.requests_completed,
            self.requests_failed,
            self.http_request_state,
        )
    }
}
