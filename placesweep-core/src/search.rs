//! Nearby place search.
//!
//! The [`PlaceSearch`] trait abstracts a single request to a place-search
//! provider. Walking continuation tokens, waiting between pages and deciding
//! what a failure means for a sample point are the caller's business; an
//! implementation only turns one [`PageRequest`] into one [`SearchPage`].

use async_trait::async_trait;
use thiserror::Error;

use crate::{RawPlace, SamplePoint};

/// Parameters of a nearby search around one sample point.
#[derive(Debug, Clone, PartialEq)]
pub struct NearbyQuery {
    /// Centre of the search.
    pub location: SamplePoint,
    /// Search radius in metres.
    pub radius_m: u32,
    /// Optional provider category filter, e.g. `"restaurant"`.
    pub category: Option<String>,
}

/// One request in a paginated search.
#[derive(Debug, Clone, PartialEq)]
pub enum PageRequest {
    /// The first page for a query.
    Initial(NearbyQuery),
    /// A follow-up page identified by an opaque provider token.
    Continuation {
        /// Token returned with the previous page.
        token: String,
    },
}

/// One page of search results.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchPage {
    /// Result records in provider order.
    pub results: Vec<RawPlace>,
    /// Token for the next page, when the provider has more.
    pub next_page_token: Option<String>,
}

/// Errors from [`PlaceSearch::fetch_page`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SearchError {
    /// The request did not complete within the configured timeout.
    #[error("request to {url} timed out after {timeout_secs}s")]
    Timeout {
        /// Request URL with credentials redacted.
        url: String,
        /// Configured timeout.
        timeout_secs: u64,
    },
    /// The provider answered with a non-success HTTP status.
    #[error("request to {url} failed with status {status}: {message}")]
    Http {
        /// Request URL with credentials redacted.
        url: String,
        /// HTTP status code.
        status: u16,
        /// Error description.
        message: String,
    },
    /// The request failed before a response arrived.
    #[error("network error contacting {url}: {message}")]
    Network {
        /// Request URL with credentials redacted.
        url: String,
        /// Error description.
        message: String,
    },
    /// The response body could not be decoded.
    #[error("failed to decode search response: {message}")]
    Parse {
        /// Decoder error description.
        message: String,
    },
    /// The provider reported a failure status in an otherwise valid body.
    #[error("search provider returned {status}: {message}")]
    Service {
        /// Provider status, e.g. `OVER_QUERY_LIMIT`.
        status: String,
        /// Provider error message, possibly empty.
        message: String,
    },
}

/// Issue single page requests against a place-search provider.
///
/// Implementations must be shareable across the harvester's concurrent
/// workers.
///
/// # Examples
///
/// ```
/// use async_trait::async_trait;
/// use placesweep_core::{PageRequest, PlaceSearch, SearchError, SearchPage};
///
/// struct NothingNearby;
///
/// #[async_trait]
/// impl PlaceSearch for NothingNearby {
///     async fn fetch_page(&self, _request: &PageRequest) -> Result<SearchPage, SearchError> {
///         Ok(SearchPage::default())
///     }
/// }
/// ```
#[async_trait]
pub trait PlaceSearch: Send + Sync {
    /// Issue exactly one request and return the decoded page.
    async fn fetch_page(&self, request: &PageRequest) -> Result<SearchPage, SearchError>;
}
