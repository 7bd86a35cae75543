//! Test utilities for place search.
//!
//! [`StubPlaceSearch`] answers from a script keyed by sample point and by
//! continuation token, without making HTTP requests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use placesweep_core::{
    PageRequest, PlaceSearch, RawGeometry, RawLocation, RawPlace, SamplePoint, SearchError,
    SearchPage,
};

type Scripted = Result<SearchPage, SearchError>;

/// Stub `PlaceSearch` for testing.
///
/// Initial requests are matched on the `lat,lon` rendering of the query
/// location; unmatched points receive an empty page. Continuations are
/// matched on the token; an unknown token is a service error, mirroring an
/// expired token.
///
/// # Example
///
/// ```
/// use placesweep_core::{NearbyQuery, PageRequest, PlaceSearch, SamplePoint};
/// use placesweep_data::search::test_support::{StubPlaceSearch, page, place};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let search = StubPlaceSearch::new()
///     .with_page_at(0.5, 0.5, page(vec![place("a", 0.5, 0.5)], None));
///
/// let request = PageRequest::Initial(NearbyQuery {
///     location: SamplePoint::unchecked(0.5, 0.5),
///     radius_m: 300,
///     category: None,
/// });
/// let found = search.fetch_page(&request).await.expect("scripted page");
/// assert_eq!(found.results.len(), 1);
/// assert_eq!(search.call_count(), 1);
/// # }
/// ```
#[derive(Debug, Default)]
pub struct StubPlaceSearch {
    initial: HashMap<String, Scripted>,
    continuations: HashMap<String, Scripted>,
    calls: AtomicU64,
    requests: Mutex<Vec<PageRequest>>,
}

impl StubPlaceSearch {
    /// Create a stub that finds nothing anywhere.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer the first request at `(lat, lon)` with `page`.
    #[must_use]
    pub fn with_page_at(mut self, lat: f64, lon: f64, page: SearchPage) -> Self {
        self.initial.insert(point_key(lat, lon), Ok(page));
        self
    }

    /// Fail the first request at `(lat, lon)` with `error`.
    #[must_use]
    pub fn with_error_at(mut self, lat: f64, lon: f64, error: SearchError) -> Self {
        self.initial.insert(point_key(lat, lon), Err(error));
        self
    }

    /// Answer the continuation for `token` with `page`.
    #[must_use]
    pub fn with_continuation(mut self, token: &str, page: SearchPage) -> Self {
        self.continuations.insert(token.to_owned(), Ok(page));
        self
    }

    /// Fail the continuation for `token` with `error`.
    #[must_use]
    pub fn with_continuation_error(mut self, token: &str, error: SearchError) -> Self {
        self.continuations.insert(token.to_owned(), Err(error));
        self
    }

    /// Number of requests received so far.
    #[must_use]
    pub fn call_count(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Every request received so far, in arrival order.
    #[must_use]
    pub fn requests(&self) -> Vec<PageRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

fn point_key(lat: f64, lon: f64) -> String {
    SamplePoint::unchecked(lat, lon).to_string()
}

#[async_trait]
impl PlaceSearch for StubPlaceSearch {
    async fn fetch_page(&self, request: &PageRequest) -> Result<SearchPage, SearchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request.clone());
        match request {
            PageRequest::Initial(query) => self
                .initial
                .get(&query.location.to_string())
                .cloned()
                .unwrap_or_else(|| Ok(SearchPage::default())),
            PageRequest::Continuation { token } => {
                self.continuations.get(token).cloned().unwrap_or_else(|| {
                    Err(SearchError::Service {
                        status: "INVALID_REQUEST".to_string(),
                        message: format!("unknown page token {token}"),
                    })
                })
            }
        }
    }
}

/// Build a page from `results` and an optional continuation token.
#[must_use]
pub fn page(results: Vec<RawPlace>, next_page_token: Option<&str>) -> SearchPage {
    SearchPage {
        results,
        next_page_token: next_page_token.map(str::to_owned),
    }
}

/// Build a minimal located record.
#[must_use]
pub fn place(place_id: &str, lat: f64, lng: f64) -> RawPlace {
    RawPlace {
        place_id: Some(place_id.to_owned()),
        name: Some(format!("Place {place_id}")),
        geometry: Some(RawGeometry {
            location: Some(RawLocation {
                lat: Some(lat),
                lng: Some(lng),
            }),
        }),
        ..RawPlace::default()
    }
}
