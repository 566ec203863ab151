//! Property search for the pricepaid library.
//!
//! [`PropertySearcher`] turns a postcode, a radius and a page number into a
//! display-ready page of nearby transactions with facet counts:
//!
//! 1. split the postcode into its outward and inward codes
//! 2. look up the coordinate for that key
//! 3. build a radius filter around the coordinate
//! 4. run a faceted, paginated search
//! 5. decode each record and group the facet buckets
//!
//! A postcode that cannot be split and a postcode with no stored coordinate
//! both produce an empty response, not an error. Backend failures abort the
//! whole request.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use pricepaid::{PropertySearchRequest, PropertySearcher, ServiceConfig};
//!
//! # async fn run() -> pricepaid::error::Result<()> {
//! let config = ServiceConfig::from_env()?;
//! let searcher = PropertySearcher::from_config(&config)?;
//!
//! let response = searcher
//!     .find_properties(&PropertySearchRequest::new("SW1A 1AA", 1, 0))
//!     .await?;
//! println!("{} transactions nearby", response.results.len());
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use futures::{StreamExt, TryStreamExt};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::{
    config::ServiceConfig,
    error::PricePaidError,
    geocode::{GeocodeLookup, GeocodeStore, TableGeocodeStore},
    index::{AzureSearchIndex, FacetCounts, FacetField, FacetValue, SearchExecutor, SearchIndex},
    mapping::{PropertySearchResult, to_display_result},
    postcode::validate_postcode,
    query::SearchFilter,
};

const DEFAULT_BULK_CONCURRENCY: usize = 8;

/// A "transactions near this postcode" query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertySearchRequest {
    pub postcode: String,
    /// Search radius in kilometres, inclusive
    pub distance_km: u32,
    /// Zero-based page number
    #[serde(default)]
    pub page: u32,
}

impl PropertySearchRequest {
    pub fn new(postcode: impl Into<String>, distance_km: u32, page: u32) -> Self {
        Self {
            postcode: postcode.into(),
            distance_km,
            page,
        }
    }
}

/// Facet buckets for the five tracked fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PropertyFacets {
    pub towns: Vec<FacetValue>,
    pub localities: Vec<FacetValue>,
    pub districts: Vec<FacetValue>,
    pub counties: Vec<FacetValue>,
    pub prices: Vec<FacetValue>,
}

impl PropertyFacets {
    pub fn from_counts(counts: &FacetCounts) -> Self {
        Self {
            towns: counts.field(FacetField::TownCity).to_vec(),
            localities: counts.field(FacetField::Locality).to_vec(),
            districts: counts.field(FacetField::District).to_vec(),
            counties: counts.field(FacetField::County).to_vec(),
            prices: counts.field(FacetField::Price).to_vec(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.towns.is_empty()
            && self.localities.is_empty()
            && self.districts.is_empty()
            && self.counties.is_empty()
            && self.prices.is_empty()
    }
}

/// One page of display results plus facet counts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PropertySearchResponse {
    pub results: Vec<PropertySearchResult>,
    pub facets: PropertyFacets,
}

impl PropertySearchResponse {
    /// The "no match" response: no results and no facet buckets.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty() && self.facets.is_empty()
    }
}

/// Searches property transactions near a postcode.
///
/// Holds shared handles to the geocoding store and the search index. Build it
/// once at startup and clone it freely; clones share the same backends.
///
/// # Examples
///
/// ```rust,no_run
/// use pricepaid::{PropertySearcher, ServiceConfig};
///
/// let config = ServiceConfig::builder()
///     .geocode_endpoint("https://account.table.core.windows.net")
///     .geocode_table("postcodes")
///     .search_endpoint("https://service.search.windows.net")
///     .search_index("pricepaid")
///     .build()?;
/// let searcher = PropertySearcher::from_config(&config)?;
/// # Ok::<(), pricepaid::error::PricePaidError>(())
/// ```
#[derive(Debug, Clone)]
pub struct PropertySearcher {
    geocode: GeocodeLookup,
    executor: SearchExecutor,
    bulk_concurrency: usize,
}

impl PropertySearcher {
    /// Create a searcher from explicit backend handles.
    pub fn new(geocode_store: Arc<dyn GeocodeStore>, search_index: Arc<dyn SearchIndex>) -> Self {
        Self {
            geocode: GeocodeLookup::new(geocode_store),
            executor: SearchExecutor::new(search_index),
            bulk_concurrency: DEFAULT_BULK_CONCURRENCY,
        }
    }

    /// Create a searcher talking to the HTTP backends described by `config`.
    ///
    /// A single HTTP client, with the configured timeout, is shared by both
    /// backends.
    #[instrument(name = "Create PropertySearcher", skip_all, level = "info")]
    pub fn from_config(config: &ServiceConfig) -> Result<Self, PricePaidError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;

        let mut table = TableGeocodeStore::with_client(
            client.clone(),
            &config.geocode_endpoint,
            config.geocode_table.as_str(),
        )?;
        if let Some(credentials) = &config.geocode_credentials {
            table = table.with_credentials(credentials.as_str());
        }

        let mut index =
            AzureSearchIndex::with_client(client, &config.search_endpoint, config.search_index.as_str())?
                .with_api_version(config.search_api_version.as_str());
        if let Some(key) = &config.search_api_key {
            index = index.with_api_key(key.as_str());
        }

        info!(
            geocode_table = %config.geocode_table,
            search_index = %config.search_index,
            timeout_seconds = config.request_timeout.as_secs_f32(),
            "PropertySearcher created"
        );
        Ok(Self::new(Arc::new(table), Arc::new(index))
            .with_bulk_concurrency(config.bulk_concurrency))
    }

    /// Limit how many requests [`find_properties_bulk`](Self::find_properties_bulk) runs at once.
    pub fn with_bulk_concurrency(mut self, n: usize) -> Self {
        self.bulk_concurrency = n.max(1);
        self
    }

    /// Find transactions within `request.distance_km` of `request.postcode`.
    ///
    /// Geocoding finishes before the search starts. Dropping the returned
    /// future cancels whichever backend call is in flight.
    #[instrument(
        name = "Find Properties",
        skip_all,
        fields(
            postcode = %request.postcode,
            distance_km = request.distance_km,
            page = request.page
        ),
        level = "info"
    )]
    pub async fn find_properties(
        &self,
        request: &PropertySearchRequest,
    ) -> Result<PropertySearchResponse, PricePaidError> {
        let t_find = std::time::Instant::now();

        let Some(key) = validate_postcode(&request.postcode) else {
            debug!("Postcode is not a two-part key, skipping geocoding");
            return Ok(PropertySearchResponse::empty());
        };

        let Some(center) = self.geocode.try_get_geo(&key.outward, &key.inward).await? else {
            debug!(postcode = %key, "No coordinate for postcode");
            return Ok(PropertySearchResponse::empty());
        };

        let filter = SearchFilter::by_distance(center, request.distance_km);
        let response = self.search_and_assemble(filter, request.page).await?;

        info!(
            %center,
            num_results = response.results.len(),
            elapsed_seconds = ?t_find.elapsed(),
            "Property search complete"
        );
        Ok(response)
    }

    /// Find transactions whose town/city is exactly `town`.
    #[instrument(name = "Find Properties In Town", skip(self), level = "info")]
    pub async fn find_properties_in_town(
        &self,
        town: &str,
        page: u32,
    ) -> Result<PropertySearchResponse, PricePaidError> {
        let response = self
            .search_and_assemble(SearchFilter::by_town(town), page)
            .await?;
        info!(
            num_results = response.results.len(),
            "Town search complete"
        );
        Ok(response)
    }

    /// Run several postcode searches, returning responses in input order.
    ///
    /// At most `bulk_concurrency` requests are in flight at once. The first
    /// failure fails the whole batch.
    #[instrument(name = "Find Properties Bulk", skip_all, fields(num_requests = requests.len()), level = "info")]
    pub async fn find_properties_bulk(
        &self,
        requests: &[PropertySearchRequest],
    ) -> Result<Vec<PropertySearchResponse>, PricePaidError> {
        futures::stream::iter(requests.iter().map(|request| self.find_properties(request)))
            .buffered(self.bulk_concurrency)
            .try_collect()
            .await
    }

    async fn search_and_assemble(
        &self,
        filter: SearchFilter,
        page: u32,
    ) -> Result<PropertySearchResponse, PricePaidError> {
        let (facets, records) = self.executor.search(filter, page).await?;
        Ok(PropertySearchResponse {
            results: records.into_iter().map(to_display_result).collect(),
            facets: PropertyFacets::from_counts(&facets),
        })
    }
}
