//! Cursor-driven paged search (RFC 2696 simple paged results).
//!
//! A [`PagingCursor`] threads the server's cookie from one page to the
//! next. [`page`] runs one round trip over a checked-out session and
//! updates the cursor in place.

use tracing::{debug, instrument, warn};

use crate::error::{ConnectorError, ConnectorResult};
use crate::operation::{DirectoryEntry, Query};
use crate::protocol::{PagingControl, ResultCode, SearchRequest};
use crate::traits::SearchTransport;

/// Page size used when a cursor is created with a size of zero.
pub const DEFAULT_PAGE_SIZE: u32 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CursorState {
    Fresh,
    Continuing,
    Exhausted,
}

/// Per-query paging state: the server cookie and the page size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PagingCursor {
    page_size: u32,
    cookie: Vec<u8>,
    state: CursorState,
    pages_fetched: u32,
}

impl PagingCursor {
    /// Start a new paged search sequence.
    pub fn new(page_size: u32) -> Self {
        Self {
            page_size: if page_size == 0 {
                DEFAULT_PAGE_SIZE
            } else {
                page_size
            },
            cookie: Vec::new(),
            state: CursorState::Fresh,
            pages_fetched: 0,
        }
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Cookie to send with the next request. Empty before the first page.
    pub fn cookie(&self) -> &[u8] {
        &self.cookie
    }

    /// True once the server has returned an empty cookie.
    pub fn is_exhausted(&self) -> bool {
        self.state == CursorState::Exhausted
    }

    /// True if no page has been fetched yet.
    pub fn is_fresh(&self) -> bool {
        self.state == CursorState::Fresh
    }

    /// Number of pages fetched so far.
    pub fn pages_fetched(&self) -> u32 {
        self.pages_fetched
    }

    /// Forget the cookie so the next page starts the search over.
    pub fn reset(&mut self) {
        self.cookie.clear();
        self.state = CursorState::Fresh;
        self.pages_fetched = 0;
    }

    fn control(&self) -> PagingControl {
        PagingControl {
            size: self.page_size,
            cookie: self.cookie.clone(),
        }
    }

    fn advance(&mut self, cookie: Vec<u8>) {
        self.pages_fetched += 1;
        if cookie.is_empty() {
            self.cookie.clear();
            self.state = CursorState::Exhausted;
        } else {
            self.cookie = cookie;
            self.state = CursorState::Continuing;
        }
    }
}

impl Default for PagingCursor {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SIZE)
    }
}

/// One page of search results.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SearchPage {
    /// Entries in server order.
    pub entries: Vec<DirectoryEntry>,
    /// The server hit its size limit and returned only part of the page.
    pub truncated: bool,
    /// Another page is available through the updated cursor.
    pub has_more: bool,
}

impl SearchPage {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_last(&self) -> bool {
        !self.has_more
    }
}

/// Fetch the next page of `query` over `session`.
///
/// Sends a subtree search carrying the cursor's cookie and page size, then
/// stores the cookie from the response's paged results control in `cursor`.
/// An empty or missing cookie exhausts the cursor; an exhausted cursor
/// yields an empty final page without contacting the server.
///
/// `sizeLimitExceeded` is not an error: the entries already returned are
/// handed back with [`SearchPage::truncated`] set and the cursor is
/// exhausted. Any other failure leaves
/// the cursor untouched and is reported as `SearchFailed`.
#[instrument(
    skip(session, query, cursor),
    fields(base_dn = %query.base_dn(), filter = %query.filter(), page = cursor.pages_fetched() + 1)
)]
pub async fn page<T>(
    session: &mut T,
    query: &Query,
    cursor: &mut PagingCursor,
) -> ConnectorResult<SearchPage>
where
    T: SearchTransport + ?Sized,
{
    if cursor.is_exhausted() {
        debug!("Cursor exhausted; no request sent");
        return Ok(SearchPage::default());
    }

    let request = SearchRequest::paged(query, cursor.control());
    debug!(
        page_size = cursor.page_size(),
        cookie_len = cursor.cookie().len(),
        "Requesting page"
    );

    let response = session.search(&request).await.map_err(|e| {
        ConnectorError::search_failed_with_source(
            format!("search under '{}' failed", query.base_dn()),
            e,
        )
    })?;

    let truncated = match response.result_code {
        ResultCode::SUCCESS => false,
        ResultCode::SIZE_LIMIT_EXCEEDED => {
            warn!(
                returned = response.entries.len(),
                "Server size limit exceeded; returning partial page"
            );
            true
        }
        code => {
            return Err(ConnectorError::search_failed(
                format!(
                    "search under '{}' with filter {} returned {}: {}",
                    query.base_dn(),
                    query.filter(),
                    code,
                    response.message
                ),
                Some(code.0),
            ));
        }
    };

    // A size-limited result ends the sequence even if a cookie came with it.
    let cookie = if truncated {
        Vec::new()
    } else {
        response
            .paging_cookie()
            .map(<[u8]>::to_vec)
            .unwrap_or_default()
    };
    cursor.advance(cookie);

    debug!(
        returned = response.entries.len(),
        has_more = !cursor.is_exhausted(),
        "Page received"
    );

    Ok(SearchPage {
        entries: response.entries,
        truncated,
        has_more: !cursor.is_exhausted(),
    })
}
