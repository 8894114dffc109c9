//! Web search client used by the research stage.
//!
//! [`GoogleSearch`] calls the Custom Search JSON API with a key, an engine
//! id and the query string.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{check_http_response, ProviderError};

/// Default Custom Search endpoint.
pub const GOOGLE_SEARCH_ENDPOINT: &str = "https://www.googleapis.com/customsearch/v1";

/// Number of results requested per query.
const RESULTS_PER_QUERY: u8 = 5;

/// One search hit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchItem {
    /// Result title.
    pub title: String,
    /// Result URL.
    pub link: String,
    /// Short excerpt, when the engine returns one.
    #[serde(default)]
    pub snippet: Option<String>,
}

/// Parsed search response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResults {
    /// Result items in engine order.
    pub items: Vec<SearchItem>,
    /// Engine-reported total, as the string the API returns.
    pub total_results: Option<String>,
}

/// Errors from the search client.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    /// Transport or status failure.
    #[error("search request failed: {0}")]
    Provider(#[from] ProviderError),
    /// Body did not match the expected schema.
    #[error("search response parse error: {0}")]
    Parse(String),
}

/// Web search interface.
#[async_trait]
pub trait WebSearch: Send + Sync {
    /// Run a query and return the parsed results.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError`] on transport, status, or parse failure.
    async fn search(&self, query: &str) -> Result<SearchResults, SearchError>;
}

/// Custom Search JSON API client.
pub struct GoogleSearch {
    api_key: String,
    engine_id: String,
    endpoint: String,
    client: reqwest::Client,
}

impl std::fmt::Debug for GoogleSearch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GoogleSearch")
            .field("engine_id", &self.engine_id)
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

impl GoogleSearch {
    /// Create a client for the default endpoint.
    pub fn new(api_key: String, engine_id: String) -> Self {
        Self::with_endpoint(api_key, engine_id, GOOGLE_SEARCH_ENDPOINT.to_owned())
    }

    /// Create a client for a custom endpoint.
    pub fn with_endpoint(api_key: String, engine_id: String, endpoint: String) -> Self {
        Self {
            api_key,
            engine_id,
            endpoint,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl WebSearch for GoogleSearch {
    async fn search(&self, query: &str) -> Result<SearchResults, SearchError> {
        debug!(query, "running web search");
        let num = RESULTS_PER_QUERY.to_string();
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("key", self.api_key.as_str()),
                ("cx", self.engine_id.as_str()),
                ("q", query),
                ("num", num.as_str()),
            ])
            .send()
            .await
            .map_err(ProviderError::from)?;

        let body = check_http_response(response).await?;
        parse_search_response(&body)
    }
}

/// Parse a Custom Search response body.
///
/// # Errors
///
/// Returns [`SearchError::Parse`] when the body is not valid JSON of the
/// expected shape. A body without `items` yields an empty result list.
pub fn parse_search_response(body: &str) -> Result<SearchResults, SearchError> {
    let raw: RawSearchResponse =
        serde_json::from_str(body).map_err(|e| SearchError::Parse(e.to_string()))?;
    Ok(SearchResults {
        items: raw.items.unwrap_or_default(),
        total_results: raw.search_information.and_then(|info| info.total_results),
    })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSearchResponse {
    items: Option<Vec<SearchItem>>,
    search_information: Option<RawSearchInformation>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSearchInformation {
    total_results: Option<String>,
}
