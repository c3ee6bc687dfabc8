//! Protocol value types
//!
//! Defines the opaque page value, the immutable carrier for one fetch, and
//! the deserializer seam through which page bodies are decoded.

use crate::error::{Error, Result};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::fmt;

// ============================================================================
// Page
// ============================================================================

/// An opaque binary record produced by the upstream server.
///
/// The client never inspects the payload; it only tracks the number of
/// logical rows the blob encodes and its size in bytes.
#[derive(Clone, PartialEq, Eq)]
pub struct Page {
    data: Bytes,
    row_count: u32,
}

impl Page {
    /// Create a new page from a payload and its row count
    pub fn new(data: impl Into<Bytes>, row_count: u32) -> Self {
        Self {
            data: data.into(),
            row_count,
        }
    }

    /// The raw payload
    pub fn data(&self) -> &Bytes {
        &self.data
    }

    /// Number of logical rows encoded in the payload
    pub fn row_count(&self) -> u32 {
        self.row_count
    }

    /// Payload size in bytes
    pub fn size_bytes(&self) -> usize {
        self.data.len()
    }
}

impl fmt::Debug for Page {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Page")
            .field("rows", &self.row_count)
            .field("bytes", &self.data.len())
            .finish()
    }
}

// ============================================================================
// PagesResponse
// ============================================================================

/// Immutable carrier for the result of one GET against the buffer endpoint.
///
/// `token` is the window the body fulfills; `next_token` is the cursor to
/// request next. When `token` does not match the client's current cursor the
/// pages must be discarded (the server replayed an already acknowledged
/// window). `client_complete` is sticky on the server side.
#[derive(Clone)]
pub struct PagesResponse {
    token: u64,
    next_token: u64,
    pages: Vec<Page>,
    client_complete: bool,
}

impl PagesResponse {
    /// Create a response carrying pages
    pub fn of(token: u64, next_token: u64, pages: Vec<Page>, client_complete: bool) -> Self {
        Self {
            token,
            next_token,
            pages,
            client_complete,
        }
    }

    /// Create a response without pages, as produced by a `204 No Content`
    pub fn empty(token: u64, next_token: u64, client_complete: bool) -> Self {
        Self::of(token, next_token, Vec::new(), client_complete)
    }

    /// The token window the body fulfills
    pub fn token(&self) -> u64 {
        self.token
    }

    /// The cursor to request next
    pub fn next_token(&self) -> u64 {
        self.next_token
    }

    /// The pages carried by this response, in server order
    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    /// Consume the response, taking ownership of its pages
    pub fn into_pages(self) -> Vec<Page> {
        self.pages
    }

    /// Whether the server-side buffer has been fully drained
    pub fn client_complete(&self) -> bool {
        self.client_complete
    }
}

impl fmt::Debug for PagesResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PagesResponse")
            .field("token", &self.token)
            .field("next_token", &self.next_token)
            .field("pages", &self.pages.len())
            .field("client_complete", &self.client_complete)
            .finish()
    }
}

// ============================================================================
// Page deserialization
// ============================================================================

/// Deserializer for a page-stream response body.
///
/// Implementations must be pure: same bytes in, same pages out, in server
/// order. The decoder hands over the fully read body, so implementations
/// never touch the network.
pub trait PageDeserializer: Send + Sync {
    /// Decode an entire response body into its pages
    fn read_pages(&self, body: Bytes) -> Result<Vec<Page>>;
}

/// Default page codec: repeated `[row_count: u32][data_len: u32][data]`
/// frames, integers big-endian.
#[derive(Debug, Clone, Copy, Default)]
pub struct FramedPageCodec;

impl FramedPageCodec {
    /// Frame header size: row count plus data length
    const HEADER_BYTES: usize = 8;

    /// Append one page to an output buffer in the framed encoding
    pub fn write_page(dst: &mut BytesMut, page: &Page) {
        dst.put_u32(page.row_count());
        dst.put_u32(page.size_bytes() as u32);
        dst.put_slice(page.data());
    }
}

impl PageDeserializer for FramedPageCodec {
    fn read_pages(&self, body: Bytes) -> Result<Vec<Page>> {
        let mut buf = body;
        let mut pages = Vec::new();
        while buf.has_remaining() {
            if buf.remaining() < Self::HEADER_BYTES {
                return Err(Error::transport(format!(
                    "truncated page frame header: {} bytes remaining",
                    buf.remaining()
                )));
            }
            let row_count = buf.get_u32();
            let data_len = buf.get_u32() as usize;
            if buf.remaining() < data_len {
                return Err(Error::transport(format!(
                    "truncated page frame: expected {data_len} bytes, got {}",
                    buf.remaining()
                )));
            }
            let data = buf.copy_to_bytes(data_len);
            pages.push(Page::new(data, row_count));
        }
        Ok(pages)
    }
}
