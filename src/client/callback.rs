//! Callback contract between a client and its owner

use super::buffer_client::PageBufferClient;
use crate::error::Error;
use crate::protocol::Page;

/// The narrow interface through which a [`PageBufferClient`] reports to the
/// owner that created it.
///
/// For each request, `add_page` is called zero or more times, followed by
/// either `request_complete` or `client_finished` (once the buffer is
/// complete and the DELETE succeeded). If the client is closed while a
/// response is in flight, `request_complete`, `client_finished` and
/// `client_failed` may never be called.
///
/// All notifications are delivered from the executor and never while the
/// client's internal lock is held. Implementations must not perform blocking
/// operations; hand work off if they must. Implementations that retain the
/// client should hold it weakly (`Arc::downgrade`) so the callback sink and
/// the client do not form an ownership cycle.
pub trait ClientCallback: Send + Sync {
    /// One page became available, in server order.
    fn add_page(&self, client: &PageBufferClient, page: Page);

    /// One request attempt finished, successfully or with a non-fatal
    /// failure. The owner is expected to re-arm the client with
    /// [`PageBufferClient::schedule_request`] unless `client_failed` was
    /// signaled.
    fn request_complete(&self, client: &PageBufferClient);

    /// The remote buffer acknowledged the DELETE; the client is done.
    /// Mutually exclusive with `client_failed` for a single lifetime.
    fn client_finished(&self, client: &PageBufferClient);

    /// A fatal failure surfaced; the owner should close the client.
    /// Fires at most once per lifetime.
    fn client_failed(&self, client: &PageBufferClient, cause: Error);
}
