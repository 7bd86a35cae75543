//! Continuation-token pagination for one sample point.
//!
//! The provider hands out a continuation token with each page that has a
//! successor. Tokens only become valid after a short delay, so every
//! continuation request waits [`PaginationPolicy::page_delay`] first. The walk
//! stops when no token comes back, after
//! [`PaginationPolicy::max_continuations`] follow-up pages, or on the first
//! failure.

use std::time::Duration;

use futures_util::{Stream, StreamExt, stream};
use log::{debug, warn};
use placesweep_core::{NearbyQuery, PageRequest, PlaceSearch, RawPlace, SearchError, SearchPage};

/// Default wait before each continuation request.
pub const DEFAULT_PAGE_DELAY: Duration = Duration::from_secs(2);

/// Default bound on continuation requests per point.
pub const DEFAULT_MAX_CONTINUATIONS: u32 = 5;

/// Pacing and bounds for continuation requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaginationPolicy {
    /// Wait before each continuation request.
    pub page_delay: Duration,
    /// Maximum continuation requests per point; zero fetches only the first
    /// page.
    pub max_continuations: u32,
}

impl Default for PaginationPolicy {
    fn default() -> Self {
        Self {
            page_delay: DEFAULT_PAGE_DELAY,
            max_continuations: DEFAULT_MAX_CONTINUATIONS,
        }
    }
}

enum Cursor {
    First(NearbyQuery),
    Continue { token: String, issued: u32 },
    Finished,
}

fn advance(page: &Result<SearchPage, SearchError>, issued: u32, policy: PaginationPolicy) -> Cursor {
    match page {
        Ok(SearchPage {
            next_page_token: Some(token),
            ..
        }) if issued < policy.max_continuations => Cursor::Continue {
            token: token.clone(),
            issued: issued + 1,
        },
        _ => Cursor::Finished,
    }
}

/// Lazily fetch the pages for one query.
///
/// Each item is the outcome of exactly one request. The stream ends after the
/// first error.
pub fn pages<'a>(
    search: &'a dyn PlaceSearch,
    query: NearbyQuery,
    policy: PaginationPolicy,
) -> impl Stream<Item = Result<SearchPage, SearchError>> + Send + 'a {
    stream::unfold(Cursor::First(query), move |cursor| async move {
        let (request, issued) = match cursor {
            Cursor::Finished => return None,
            Cursor::First(query) => (PageRequest::Initial(query), 0),
            Cursor::Continue { token, issued } => {
                tokio::time::sleep(policy.page_delay).await;
                (PageRequest::Continuation { token }, issued)
            }
        };
        let page = search.fetch_page(&request).await;
        let next = advance(&page, issued, policy);
        Some((page, next))
    })
}

/// How the search for one point ended.
#[derive(Debug, Clone, PartialEq)]
pub enum PointStatus {
    /// Every page was fetched.
    Complete,
    /// Pagination stopped early; the results gathered so far are kept.
    Truncated,
    /// The first page failed; the point contributes nothing.
    Failed(SearchError),
}

/// Results gathered for one sample point.
#[derive(Debug, Clone, PartialEq)]
pub struct PointOutcome {
    /// Records from every fetched page, in page order.
    pub results: Vec<RawPlace>,
    /// Requests issued, failed ones included.
    pub api_calls: u64,
    /// How the walk ended.
    pub status: PointStatus,
}

/// Fetch every page for `query` and classify the outcome.
///
/// A failure on the first page fails the point. A failure on a continuation,
/// or a token left over once the continuation bound is reached, truncates it.
pub async fn collect_point(
    search: &dyn PlaceSearch,
    query: NearbyQuery,
    policy: PaginationPolicy,
) -> PointOutcome {
    let location = query.location;
    let mut outcome = PointOutcome {
        results: Vec::new(),
        api_calls: 0,
        status: PointStatus::Complete,
    };
    let mut leftover_token = false;
    let mut stream = Box::pin(pages(search, query, policy));
    while let Some(page) = stream.next().await {
        outcome.api_calls += 1;
        match page {
            Ok(page) => {
                debug!(
                    "point {location}: page {} returned {} results",
                    outcome.api_calls,
                    page.results.len()
                );
                leftover_token = page.next_page_token.is_some();
                outcome.results.extend(page.results);
            }
            Err(err) if outcome.api_calls == 1 => {
                outcome.status = PointStatus::Failed(err);
                return outcome;
            }
            Err(err) => {
                warn!(
                    "point {location}: pagination stopped after {} pages: {err}",
                    outcome.api_calls - 1
                );
                outcome.status = PointStatus::Truncated;
                return outcome;
            }
        }
    }
    if leftover_token {
        warn!(
            "point {location}: continuation limit of {} reached, remaining pages skipped",
            policy.max_continuations
        );
        outcome.status = PointStatus::Truncated;
    }
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::test_support::{StubPlaceSearch, page, place};
    use placesweep_core::SamplePoint;
    use rstest::{fixture, rstest};

    #[fixture]
    fn query() -> NearbyQuery {
        NearbyQuery {
            location: SamplePoint::unchecked(1.0, 2.0),
            radius_m: 300,
            category: None,
        }
    }

    fn ids(outcome: &PointOutcome) -> Vec<String> {
        outcome
            .results
            .iter()
            .filter_map(|raw| raw.place_id.clone())
            .collect()
    }

    #[rstest]
    #[tokio::test(start_paused = true)]
    async fn follows_tokens_until_exhausted(query: NearbyQuery) {
        let search = StubPlaceSearch::new()
            .with_page_at(1.0, 2.0, page(vec![place("a", 1.0, 2.0)], Some("t1")))
            .with_continuation("t1", page(vec![place("b", 1.0, 2.0)], Some("t2")))
            .with_continuation("t2", page(vec![place("c", 1.0, 2.0)], None));

        let started = tokio::time::Instant::now();
        let outcome = collect_point(&search, query, PaginationPolicy::default()).await;

        assert_eq!(outcome.status, PointStatus::Complete);
        assert_eq!(outcome.api_calls, 3);
        assert_eq!(ids(&outcome), vec!["a", "b", "c"]);
        assert!(started.elapsed() >= DEFAULT_PAGE_DELAY * 2);
    }

    #[rstest]
    #[tokio::test(start_paused = true)]
    async fn first_page_failure_fails_the_point(query: NearbyQuery) {
        let search = StubPlaceSearch::new().with_error_at(
            1.0,
            2.0,
            SearchError::Timeout {
                url: "http://example.com".to_string(),
                timeout_secs: 25,
            },
        );

        let outcome = collect_point(&search, query, PaginationPolicy::default()).await;

        assert!(matches!(outcome.status, PointStatus::Failed(SearchError::Timeout { .. })));
        assert_eq!(outcome.api_calls, 1);
        assert!(outcome.results.is_empty());
    }

    #[rstest]
    #[tokio::test(start_paused = true)]
    async fn continuation_failure_keeps_gathered_results(query: NearbyQuery) {
        let search = StubPlaceSearch::new()
            .with_page_at(1.0, 2.0, page(vec![place("a", 1.0, 2.0)], Some("t1")))
            .with_continuation_error(
                "t1",
                SearchError::Service {
                    status: "INVALID_REQUEST".to_string(),
                    message: String::new(),
                },
            );

        let outcome = collect_point(&search, query, PaginationPolicy::default()).await;

        assert_eq!(outcome.status, PointStatus::Truncated);
        assert_eq!(outcome.api_calls, 2);
        assert_eq!(ids(&outcome), vec!["a"]);
    }

    #[rstest]
    #[tokio::test(start_paused = true)]
    async fn continuation_bound_truncates(query: NearbyQuery) {
        let search = StubPlaceSearch::new()
            .with_page_at(1.0, 2.0, page(vec![place("a", 1.0, 2.0)], Some("t1")))
            .with_continuation("t1", page(vec![place("b", 1.0, 2.0)], Some("t2")));
        let policy = PaginationPolicy {
            max_continuations: 1,
            ..PaginationPolicy::default()
        };

        let outcome = collect_point(&search, query, policy).await;

        assert_eq!(outcome.status, PointStatus::Truncated);
        assert_eq!(outcome.api_calls, 2);
        assert_eq!(search.call_count(), 2);
    }

    #[rstest]
    #[tokio::test(start_paused = true)]
    async fn pages_stream_is_lazy(query: NearbyQuery) {
        let search = StubPlaceSearch::new()
            .with_page_at(1.0, 2.0, page(vec![place("a", 1.0, 2.0)], Some("t1")));

        let mut stream = Box::pin(pages(&search, query, PaginationPolicy::default()));
        assert_eq!(search.call_count(), 0);
        let first = stream.next().await.expect("one page").expect("page succeeds");

        assert_eq!(first.next_page_token.as_deref(), Some("t1"));
        assert_eq!(search.call_count(), 1);
    }
}
