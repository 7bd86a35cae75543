//! Place search over HTTP and the pagination protocol.
//!
//! [`HttpPlaceSearch`] implements [`placesweep_core::PlaceSearch`] against the
//! Google Places nearby-search endpoint. [`pagination`] walks continuation
//! tokens for one sample point on top of any `PlaceSearch`.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use placesweep_core::{NearbyQuery, PageRequest, PlaceSearch, SamplePoint};
//! use placesweep_data::search::{HttpPlaceSearch, HttpPlaceSearchConfig};
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let config = HttpPlaceSearchConfig::new("my-api-key")
//!     .with_timeout(Duration::from_secs(10))
//!     .with_user_agent("my-app/1.0");
//! let search = HttpPlaceSearch::with_config(config)?;
//!
//! let page = search
//!     .fetch_page(&PageRequest::Initial(NearbyQuery {
//!         location: SamplePoint::unchecked(18.52, 73.85),
//!         radius_m: 300,
//!         category: None,
//!     }))
//!     .await?;
//! println!("{} results", page.results.len());
//! # Ok(())
//! # }
//! ```

mod nearby;
pub mod pagination;
mod provider;

#[doc(hidden)]
pub mod test_support;

pub use pagination::{PaginationPolicy, PointOutcome, PointStatus, collect_point, pages};
pub use provider::{
    DEFAULT_ENDPOINT, DEFAULT_USER_AGENT, HttpPlaceSearch, HttpPlaceSearchConfig,
    ProviderBuildError,
};
