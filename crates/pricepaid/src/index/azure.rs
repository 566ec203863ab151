//! HTTP client for a managed cognitive-search index.
//!
//! Queries are posted to `{endpoint}/indexes/{index}/docs/search`. Matching
//! documents come back under `value` and facet buckets under `@search.facets`.

use std::fmt;

use ahash::AHashMap as HashMap;
use async_trait::async_trait;
use reqwest::{Client, Request, StatusCode, Url};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{instrument, trace, warn};

use super::{
    FacetCounts, FacetValue, IndexError, RawPropertyRecord, SearchIndex, SearchPage,
    SearchRequest, error::Result,
};

pub const DEFAULT_API_VERSION: &str = "2020-06-30";

#[derive(Debug, Serialize)]
struct SearchBody<'a> {
    search: &'static str,
    filter: &'a str,
    skip: u64,
    top: usize,
    facets: &'a [&'static str],
}

impl<'a> From<&'a SearchRequest> for SearchBody<'a> {
    fn from(request: &'a SearchRequest) -> Self {
        Self {
            search: "*",
            filter: request.filter.as_str(),
            skip: request.skip,
            top: request.top,
            facets: &request.facets,
        }
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponseBody {
    #[serde(default)]
    value: Vec<RawPropertyRecord>,
    #[serde(rename = "@search.facets", default)]
    facets: HashMap<String, Vec<FacetBucket>>,
}

/// A facet bucket on the wire: either a plain value or a numeric range.
#[derive(Debug, Deserialize)]
struct FacetBucket {
    count: u64,
    #[serde(default)]
    value: Option<Value>,
    #[serde(default)]
    from: Option<Value>,
    #[serde(default)]
    to: Option<Value>,
}

impl FacetBucket {
    fn label(&self) -> String {
        match (&self.value, &self.from, &self.to) {
            (Some(value), _, _) if !value.is_null() => scalar_label(value),
            (_, from, to) if from.is_some() || to.is_some() => format!(
                "{}-{}",
                from.as_ref().map(scalar_label).unwrap_or_default(),
                to.as_ref().map(scalar_label).unwrap_or_default()
            ),
            _ => String::new(),
        }
    }
}

fn scalar_label(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Decode a search response body into records and facet counts.
pub fn decode_search_page(body: &str) -> Result<SearchPage> {
    let response: SearchResponseBody = serde_json::from_str(body)?;
    let facets = response
        .facets
        .into_iter()
        .map(|(field, buckets)| {
            let values = buckets
                .iter()
                .map(|bucket| FacetValue::new(bucket.label(), bucket.count))
                .collect::<Vec<_>>();
            (field, values)
        })
        .collect::<FacetCounts>();
    Ok(SearchPage {
        records: response.value,
        facets,
    })
}

/// [`SearchIndex`] backed by a managed search service over HTTP.
#[derive(Clone)]
pub struct AzureSearchIndex {
    client: Client,
    endpoint: Url,
    index: String,
    api_version: String,
    api_key: Option<String>,
}

impl fmt::Debug for AzureSearchIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AzureSearchIndex")
            .field("endpoint", &self.endpoint.as_str())
            .field("index", &self.index)
            .field("api_version", &self.api_version)
            .field("has_api_key", &self.api_key.is_some())
            .finish_non_exhaustive()
    }
}

impl AzureSearchIndex {
    pub fn with_client(client: Client, endpoint: &str, index: impl Into<String>) -> Result<Self> {
        let endpoint = Url::parse(endpoint)
            .map_err(|e| IndexError::InvalidEndpoint(format!("{endpoint}: {e}")))?;
        if endpoint.cannot_be_a_base() {
            return Err(IndexError::InvalidEndpoint(endpoint.to_string()));
        }
        Ok(Self {
            client,
            endpoint,
            index: index.into(),
            api_version: DEFAULT_API_VERSION.to_string(),
            api_key: None,
        })
    }

    pub fn new(endpoint: &str, index: impl Into<String>) -> Result<Self> {
        Self::with_client(Client::new(), endpoint, index)
    }

    pub fn with_api_version(mut self, api_version: impl Into<String>) -> Self {
        self.api_version = api_version.into();
        self
    }

    /// Send `key` in the `api-key` header of every request.
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        let key = key.into();
        self.api_key = (!key.is_empty()).then_some(key);
        self
    }

    pub fn index(&self) -> &str {
        &self.index
    }

    pub fn search_url(&self) -> Result<Url> {
        let mut url = self.endpoint.clone();
        url.path_segments_mut()
            .map_err(|()| IndexError::InvalidEndpoint(self.endpoint.to_string()))?
            .pop_if_empty()
            .extend(["indexes", self.index.as_str(), "docs", "search"]);
        url.query_pairs_mut()
            .clear()
            .append_pair("api-version", &self.api_version);
        Ok(url)
    }

    pub fn build_request(&self, request: &SearchRequest) -> Result<Request> {
        let mut builder = self
            .client
            .post(self.search_url()?)
            .json(&SearchBody::from(request));
        if let Some(key) = &self.api_key {
            builder = builder.header("api-key", key);
        }
        Ok(builder.build()?)
    }
}

#[async_trait]
impl SearchIndex for AzureSearchIndex {
    #[instrument(name = "Search Service Query", skip_all, fields(index = %self.index, skip = request.skip), level = "debug")]
    async fn query(&self, request: &SearchRequest) -> Result<SearchPage> {
        let http_request = self.build_request(request)?;
        let response = self.client.execute(http_request).await?;
        let status = response.status();
        let body = if status.is_success() {
            response.text().await?
        } else {
            response.text().await.unwrap_or_default()
        };
        trace!(bytes = body.len(), "Search response received");
        decode_search_response(status, &body)
    }
}

/// Interpret a search response: any non-success status is a failure carrying
/// the response body, otherwise the body is decoded as a page.
pub fn decode_search_response(status: StatusCode, body: &str) -> Result<SearchPage> {
    if !status.is_success() {
        warn!(status = status.as_u16(), "Search service request failed");
        return Err(IndexError::Status {
            status: status.as_u16(),
            body: body.to_string(),
        });
    }
    decode_search_page(body)
}
