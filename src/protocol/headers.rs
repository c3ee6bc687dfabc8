//! Wire-level constants for the page buffer protocol.

/// Token window fulfilled by the response body.
pub const PRESTO_PAGE_TOKEN: &str = "X-Presto-Page-Token";

/// Cursor the client must request next.
pub const PRESTO_PAGE_NEXT_TOKEN: &str = "X-Presto-Page-Next-Token";

/// Whether the server-side buffer has been fully drained.
pub const PRESTO_BUFFER_COMPLETE: &str = "X-Presto-Buffer-Complete";

/// Request header capping the size of one response body, in bytes.
pub const PRESTO_MAX_SIZE: &str = "X-Presto-Max-Size";

/// Media type of a page-stream response body.
pub const PRESTO_PAGES_CONTENT_TYPE: &str = "application/x-presto-pages";

/// Compare the type/subtype essence of a media type, ignoring parameters
/// and ASCII case. Error pages served with a 200 carry a different essence.
pub(crate) fn media_type_matches(value: &str, expected: &str) -> bool {
    let essence = value.split(';').next().unwrap_or("").trim();
    essence.eq_ignore_ascii_case(expected)
}
