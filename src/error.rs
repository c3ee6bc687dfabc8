//! Error types for the page buffer client
//!
//! Failures are partitioned into structural errors that terminate a client
//! and transient errors that drive another retry. All public APIs return
//! `Result<T, Error>` where Error is defined here.

use std::time::Duration;
use thiserror::Error;

/// Advisory text attached to errors promoted after a persistent error streak.
const WORKER_NODE_ERROR: &str = "Encountered too many errors talking to a worker node. \
     The node may have crashed or be under too much load";

/// The main error type for the page buffer client
#[derive(Error, Debug)]
pub enum Error {
    // ============================================================================
    // Configuration Errors
    // ============================================================================
    #[error("configuration error: {message}")]
    Config { message: String },

    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    // ============================================================================
    // Structural Errors (terminate the client)
    // ============================================================================
    #[error("response exceeded the maximum size of {limit} bytes")]
    PageTooLarge { limit: usize },

    #[error("page transport error: {message}")]
    PageTransport { message: String },

    #[error("{} ({uri} - requests failed for {elapsed:?})", WORKER_NODE_ERROR)]
    PageTransportTimeout {
        uri: String,
        elapsed: Duration,
        #[source]
        source: Box<Error>,
    },

    #[error("too many requests to delete {uri} failed over {elapsed:?}")]
    TooManyRequestsFailed {
        uri: String,
        elapsed: Duration,
        #[source]
        source: Box<Error>,
    },

    // ============================================================================
    // Transient Errors (drive another retry)
    // ============================================================================
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {status}: {message}")]
    HttpStatus { status: u16, message: String },
}

impl Error {
    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a page transport error
    pub fn transport(message: impl Into<String>) -> Self {
        Self::PageTransport {
            message: message.into(),
        }
    }

    /// Create an HTTP status error
    pub fn http_status(status: u16, message: impl Into<String>) -> Self {
        Self::HttpStatus {
            status,
            message: message.into(),
        }
    }

    /// Promote a persistent transient failure on the GET path
    pub fn transport_timeout(uri: impl Into<String>, elapsed: Duration, source: Error) -> Self {
        Self::PageTransportTimeout {
            uri: uri.into(),
            elapsed,
            source: Box::new(source),
        }
    }

    /// Promote a persistent transient failure on the DELETE path
    pub fn too_many_requests_failed(
        uri: impl Into<String>,
        elapsed: Duration,
        source: Error,
    ) -> Self {
        Self::TooManyRequestsFailed {
            uri: uri.into(),
            elapsed,
            source: Box::new(source),
        }
    }

    /// Check if this error is retryable
    ///
    /// Retryable errors feed the backoff loop; everything else is surfaced
    /// to the owner through `client_failed` and halts the client.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Http(_) | Error::HttpStatus { .. })
    }
}

/// Result type alias for the page buffer client
pub type Result<T> = std::result::Result<T, Error>;
