//! Page buffer wire protocol
//!
//! The buffer endpoint speaks plain HTTP: `GET <endpoint>/<token>` returns
//! one window of opaque pages together with a token pair in the response
//! headers, and `DELETE <endpoint>` tears the buffer down. This module
//! defines the value types, the header constants, and the response decoder.

mod decode;
mod headers;
mod types;

pub use decode::decode_pages_response;
pub use headers::{
    PRESTO_BUFFER_COMPLETE, PRESTO_MAX_SIZE, PRESTO_PAGES_CONTENT_TYPE, PRESTO_PAGE_NEXT_TOKEN,
    PRESTO_PAGE_TOKEN,
};
pub use types::{FramedPageCodec, Page, PageDeserializer, PagesResponse};
