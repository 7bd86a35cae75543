//! Nearby-search response body.
//!
//! See: <https://developers.google.com/maps/documentation/places/web-service/search-nearby>

use placesweep_core::{RawPlace, SearchError, SearchPage};
use serde::Deserialize;

/// Decoded nearby-search response.
#[derive(Debug, Default, Deserialize)]
pub struct NearbyResponse {
    /// Result records; absent in some error responses.
    #[serde(default)]
    pub results: Vec<RawPlace>,

    /// Opaque token for the next page.
    pub next_page_token: Option<String>,

    /// Provider status.
    ///
    /// Common values:
    /// - `"OK"` - results returned
    /// - `"ZERO_RESULTS"` - valid request with nothing nearby
    /// - `"OVER_QUERY_LIMIT"`, `"REQUEST_DENIED"`, `"INVALID_REQUEST"` - failures
    pub status: Option<String>,

    /// Human readable detail accompanying a failure status.
    pub error_message: Option<String>,
}

impl NearbyResponse {
    /// Whether the status describes a successful search.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        matches!(self.status.as_deref(), None | Some("OK" | "ZERO_RESULTS"))
    }

    /// Convert into a [`SearchPage`], surfacing failure statuses.
    pub fn into_page(self) -> Result<SearchPage, SearchError> {
        if !self.is_ok() {
            return Err(SearchError::Service {
                status: self.status.unwrap_or_default(),
                message: self.error_message.unwrap_or_default(),
            });
        }
        Ok(SearchPage {
            results: self.results,
            next_page_token: self.next_page_token.filter(|token| !token.is_empty()),
        })
    }
}
