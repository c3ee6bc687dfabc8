//! Response decoder
//!
//! Parses one HTTP response from the buffer endpoint into a [`PagesResponse`],
//! enforcing status, content type, the three mandatory response headers, and
//! the per-request size cap.

use super::headers::{
    media_type_matches, PRESTO_BUFFER_COMPLETE, PRESTO_PAGES_CONTENT_TYPE, PRESTO_PAGE_NEXT_TOKEN,
    PRESTO_PAGE_TOKEN,
};
use super::types::{PageDeserializer, PagesResponse};
use crate::error::{Error, Result};
use bytes::{Bytes, BytesMut};
use reqwest::header::{HeaderMap, CONTENT_TYPE};
use reqwest::{Response, StatusCode};
use url::Url;

/// Decode one response from the buffer endpoint.
///
/// A `204 No Content` means no pages were produced within the server-side
/// wait window; the header-derived tokens and complete flag still apply.
/// Everything other than a `200 OK` with the page-stream media type and all
/// three mandatory headers is a [`Error::PageTransport`]. A body larger than
/// `max_size` is [`Error::PageTooLarge`].
pub async fn decode_pages_response(
    response: Response,
    deserializer: &dyn PageDeserializer,
    max_size: usize,
) -> Result<PagesResponse> {
    let uri = response.url().clone();
    let status = response.status();

    if status == StatusCode::NO_CONTENT {
        let headers = response.headers();
        return Ok(PagesResponse::empty(
            token_header(headers, PRESTO_PAGE_TOKEN, &uri)?,
            token_header(headers, PRESTO_PAGE_NEXT_TOKEN, &uri)?,
            complete_header(headers, &uri)?,
        ));
    }

    // anything other than OK is fatal
    if status != StatusCode::OK {
        return Err(Error::transport(format!(
            "expected response code to be 200, but was {} {}: {uri}",
            status.as_u16(),
            status.canonical_reason().unwrap_or("unknown"),
        )));
    }

    // a mismatched content type under a 200 is usually an error page
    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok());
    match content_type {
        Some(value) if media_type_matches(value, PRESTO_PAGES_CONTENT_TYPE) => {}
        other => {
            return Err(Error::transport(format!(
                "expected {PRESTO_PAGES_CONTENT_TYPE} response from server but got {}: {uri}",
                other.unwrap_or("no content type"),
            )))
        }
    }

    let token = token_header(response.headers(), PRESTO_PAGE_TOKEN, &uri)?;
    let next_token = token_header(response.headers(), PRESTO_PAGE_NEXT_TOKEN, &uri)?;
    let complete = complete_header(response.headers(), &uri)?;

    let body = read_body(response, max_size).await?;
    let pages = deserializer.read_pages(body)?;
    Ok(PagesResponse::of(token, next_token, pages, complete))
}

/// Stream the body into one buffer, enforcing the size cap as chunks arrive.
async fn read_body(mut response: Response, max_size: usize) -> Result<Bytes> {
    let hint = response
        .content_length()
        .map_or(1024, |length| length.min(max_size as u64) as usize);
    let mut body = BytesMut::with_capacity(hint);
    loop {
        let chunk = response
            .chunk()
            .await
            .map_err(|err| Error::transport(format!("failed reading response body: {err}")))?;
        let Some(chunk) = chunk else {
            return Ok(body.freeze());
        };
        if body.len() + chunk.len() > max_size {
            return Err(Error::PageTooLarge { limit: max_size });
        }
        body.extend_from_slice(&chunk);
    }
}

fn token_header(headers: &HeaderMap, name: &str, uri: &Url) -> Result<u64> {
    let value = headers
        .get(name)
        .ok_or_else(|| Error::transport(format!("expected {name} header: {uri}")))?;
    value
        .to_str()
        .ok()
        .and_then(|text| text.parse().ok())
        .ok_or_else(|| Error::transport(format!("invalid {name} header: {uri}")))
}

fn complete_header(headers: &HeaderMap, uri: &Url) -> Result<bool> {
    let value = headers
        .get(PRESTO_BUFFER_COMPLETE)
        .ok_or_else(|| Error::transport(format!("expected {PRESTO_BUFFER_COMPLETE} header: {uri}")))?;
    match value.to_str().ok() {
        Some("true") => Ok(true),
        Some("false") => Ok(false),
        _ => Err(Error::transport(format!(
            "invalid {PRESTO_BUFFER_COMPLETE} header: {uri}"
        ))),
    }
}
