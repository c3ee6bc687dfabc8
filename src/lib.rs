//! # Page Buffer Client
//!
//! A long-polling client for remote page buffers: the per-peer building
//! block of a distributed exchange layer. A consumer task fans one client
//! out per upstream producer endpoint; each client pulls an ordered,
//! monotonically-tokened stream of opaque binary pages over HTTP, surfaces
//! every page to its owner through callbacks, and tears the remote buffer
//! down with a DELETE once it is drained.
//!
//! ## Features
//!
//! - **Idempotent polling**: a token pair per response makes replayed
//!   windows safe to discard
//! - **Failure tolerance**: exponential backoff (1..100 ms) with an error
//!   budget that promotes persistent transient failures to fatal ones
//! - **Non-blocking shutdown**: `close()` cancels in-flight work and fires a
//!   best-effort server-side cleanup without blocking the caller
//! - **Strict concurrency discipline**: at most one in-flight request per
//!   client; callbacks always run outside the client's lock
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use pagebuffer_client::{ClientCallback, PageBufferClient};
//! use std::sync::Arc;
//!
//! let client = PageBufferClient::builder("http://worker-7:8080/v1/task/3/results/0".parse()?)
//!     .max_response_size(16 * 1024 * 1024)
//!     .min_error_duration(std::time::Duration::from_secs(60))
//!     .build(Arc::new(MyCallback))?;
//!
//! // arm the first poll; re-arm from `request_complete` until
//! // `client_finished` or `client_failed` fires
//! client.schedule_request();
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │                      PageBufferClient                      │
//! │  schedule_request()   close()   status()   is_running()    │
//! └───────────────┬────────────────────────────┬───────────────┘
//!                 │ GET <endpoint>/<token>     │ DELETE <endpoint>
//! ┌───────────────┴──────────────┐  ┌──────────┴───────────────┐
//! │       protocol decoder       │  │     ClientCallback       │
//! │  headers · tokens · pages    │  │  add_page                │
//! │  size cap · media type       │  │  request_complete        │
//! └──────────────────────────────┘  │  client_finished         │
//!                                   │  client_failed           │
//!                                   └──────────────────────────┘
//! ```

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::cast_possible_truncation)]

/// Error types for the client
pub mod error;

/// Wire protocol: values, headers, response decoding
pub mod protocol;

/// The client state machine, callbacks, and status view
pub mod client;

pub use client::{ClientCallback, PageBufferClient, PageBufferClientBuilder, PageBufferClientStatus};
pub use error::{Error, Result};
pub use protocol::{FramedPageCodec, Page, PageDeserializer, PagesResponse};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");
