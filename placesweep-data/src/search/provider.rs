//! HTTP-based `PlaceSearch` using the Places nearby-search API.
//!
//! Each call to [`PlaceSearch::fetch_page`] issues exactly one `GET` request.
//! The API key travels as a query parameter, so every URL that ends up in an
//! error or a log line is redacted first.

use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use placesweep_core::{PageRequest, PlaceSearch, SearchError, SearchPage};
use reqwest::Client;
use url::Url;

use super::nearby::NearbyResponse;

/// Error type for [`HttpPlaceSearch`] construction failures.
#[derive(Debug)]
pub enum ProviderBuildError {
    /// Failed to build the HTTP client.
    HttpClient(reqwest::Error),
    /// The configured endpoint is not a valid absolute URL.
    InvalidEndpoint(url::ParseError),
}

impl std::fmt::Display for ProviderBuildError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::HttpClient(err) => write!(f, "failed to build HTTP client: {err}"),
            Self::InvalidEndpoint(err) => write!(f, "invalid search endpoint: {err}"),
        }
    }
}

impl std::error::Error for ProviderBuildError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::HttpClient(err) => Some(err),
            Self::InvalidEndpoint(err) => Some(err),
        }
    }
}

/// Default nearby-search endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://maps.googleapis.com/maps/api/place/nearbysearch/json";

/// Default user agent for search requests.
pub const DEFAULT_USER_AGENT: &str = "placesweep/0.1";

/// Default request timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 25;

const REDACTED: &str = "REDACTED";

/// Configuration for [`HttpPlaceSearch`].
#[derive(Clone)]
pub struct HttpPlaceSearchConfig {
    /// Nearby-search endpoint URL.
    pub endpoint: String,
    /// API key sent with every request.
    pub api_key: String,
    /// Per-request timeout.
    pub timeout: Duration,
    /// User agent string for requests.
    pub user_agent: String,
}

impl std::fmt::Debug for HttpPlaceSearchConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpPlaceSearchConfig")
            .field("endpoint", &self.endpoint)
            .field("api_key", &REDACTED)
            .field("timeout", &self.timeout)
            .field("user_agent", &self.user_agent)
            .finish()
    }
}

impl HttpPlaceSearchConfig {
    /// Create a configuration for the default endpoint.
    #[must_use]
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            api_key: api_key.into(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }

    /// Point the client at a different endpoint, e.g. a local mock.
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Set the request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the user agent string.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }
}

/// Nearby search over HTTP.
#[derive(Debug)]
pub struct HttpPlaceSearch {
    client: Client,
    endpoint: Url,
    config: HttpPlaceSearchConfig,
}

impl HttpPlaceSearch {
    /// Create a client for the default endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client fails to build.
    pub fn new(api_key: impl Into<String>) -> Result<Self, ProviderBuildError> {
        Self::with_config(HttpPlaceSearchConfig::new(api_key))
    }

    /// Create a client with explicit configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the endpoint does not parse or the HTTP client
    /// fails to build.
    pub fn with_config(config: HttpPlaceSearchConfig) -> Result<Self, ProviderBuildError> {
        let endpoint = Url::parse(&config.endpoint).map_err(ProviderBuildError::InvalidEndpoint)?;
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .connect_timeout(config.timeout)
            .timeout(config.timeout)
            .build()
            .map_err(ProviderBuildError::HttpClient)?;
        Ok(Self {
            client,
            endpoint,
            config,
        })
    }

    /// Build the request URL for one page.
    ///
    /// Initial requests carry `location=lat,lng`, `radius` and an optional
    /// `type`; continuations carry only `pagetoken`.
    fn build_url(&self, request: &PageRequest) -> Url {
        let mut url = self.endpoint.clone();
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("key", &self.config.api_key);
            match request {
                PageRequest::Initial(nearby) => {
                    query.append_pair("location", &nearby.location.to_string());
                    query.append_pair("radius", &nearby.radius_m.to_string());
                    if let Some(category) = &nearby.category {
                        query.append_pair("type", category);
                    }
                }
                PageRequest::Continuation { token } => {
                    query.append_pair("pagetoken", token);
                }
            }
        }
        url
    }

    /// Render `url` with the API key masked.
    fn redact(url: &Url) -> String {
        let mut masked = url.clone();
        let pairs: Vec<(String, String)> = url
            .query_pairs()
            .map(|(name, value)| {
                let value = if name == "key" {
                    REDACTED.to_string()
                } else {
                    value.into_owned()
                };
                (name.into_owned(), value)
            })
            .collect();
        masked.query_pairs_mut().clear().extend_pairs(pairs);
        masked.to_string()
    }

    /// Convert a reqwest error to a `SearchError`.
    fn convert_reqwest_error(&self, error: reqwest::Error, url: &str) -> SearchError {
        // reqwest embeds the full URL, key included, in its messages.
        let error = error.without_url();
        let message = error.to_string();

        if error.is_timeout() {
            return SearchError::Timeout {
                url: url.to_owned(),
                timeout_secs: self.config.timeout.as_secs(),
            };
        }

        if let Some(status) = error.status() {
            return SearchError::Http {
                url: url.to_owned(),
                status: status.as_u16(),
                message,
            };
        }

        SearchError::Network {
            url: url.to_owned(),
            message,
        }
    }
}

impl HttpPlaceSearch {
    /// Convert a failure while reading the response body. A stalled body is a
    /// timeout like a stalled response; anything else is undecodable.
    fn convert_body_error(&self, error: reqwest::Error, url: &str) -> SearchError {
        if error.is_timeout() {
            return self.convert_reqwest_error(error, url);
        }
        SearchError::Parse {
            message: error.without_url().to_string(),
        }
    }
}

#[async_trait]
impl PlaceSearch for HttpPlaceSearch {
    async fn fetch_page(&self, request: &PageRequest) -> Result<SearchPage, SearchError> {
        let url = self.build_url(request);
        let redacted = Self::redact(&url);
        debug!("requesting {redacted}");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|err| self.convert_reqwest_error(err, &redacted))?
            .error_for_status()
            .map_err(|err| self.convert_reqwest_error(err, &redacted))?;

        let body: NearbyResponse = response
            .json()
            .await
            .map_err(|err| self.convert_body_error(err, &redacted))?;

        body.into_page()
    }
}
