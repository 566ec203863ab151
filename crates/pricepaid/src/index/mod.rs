//! Faceted, paginated search over the property-transaction index.
//!
//! The index itself is an external managed service reached through the
//! [`SearchIndex`] trait. [`SearchExecutor`] fixes the query shape every caller
//! gets: fifty records per page and the same five facets.

use std::{fmt, sync::Arc};

use ahash::AHashMap as HashMap;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
pub use error::IndexError;
use error::Result;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::{geocode::GeoCoordinate, query::SearchFilter};

pub mod azure;

pub use azure::AzureSearchIndex;

/// Number of records per page.
pub const PAGE_SIZE: usize = 50;

/// The fields facet counts are requested for on every query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FacetField {
    TownCity,
    Locality,
    District,
    County,
    Price,
}

impl FacetField {
    pub const ALL: [Self; 5] = [
        Self::TownCity,
        Self::Locality,
        Self::District,
        Self::County,
        Self::Price,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::TownCity => "TownCity",
            Self::Locality => "Locality",
            Self::District => "District",
            Self::County => "County",
            Self::Price => "Price",
        }
    }
}

impl fmt::Display for FacetField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single facet bucket: the bucket label and how many matches fall in it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FacetValue {
    pub label: String,
    pub count: u64,
}

impl FacetValue {
    pub fn new(label: impl Into<String>, count: u64) -> Self {
        Self {
            label: label.into(),
            count,
        }
    }
}

/// Facet buckets for one response, keyed by field name.
///
/// Lookups are by exact field name. A field that was not requested, or that
/// the backend returned nothing for, yields an empty slice.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FacetCounts {
    buckets: HashMap<String, Vec<FacetValue>>,
}

impl FacetCounts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, field: impl Into<String>, values: Vec<FacetValue>) {
        self.buckets.insert(field.into(), values);
    }

    pub fn get(&self, field: &str) -> &[FacetValue] {
        self.buckets.get(field).map_or(&[], Vec::as_slice)
    }

    pub fn field(&self, field: FacetField) -> &[FacetValue] {
        self.get(field.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.values().all(Vec::is_empty)
    }
}

impl<K: Into<String>> FromIterator<(K, Vec<FacetValue>)> for FacetCounts {
    fn from_iter<I: IntoIterator<Item = (K, Vec<FacetValue>)>>(iter: I) -> Self {
        Self {
            buckets: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

/// GeoJSON point as stored in the index, `[longitude, latitude]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    #[serde(rename = "type")]
    pub kind: String,
    pub coordinates: [f64; 2],
}

impl GeoPoint {
    pub fn coordinate(&self) -> GeoCoordinate {
        let [longitude, latitude] = self.coordinates;
        GeoCoordinate::new(latitude, longitude)
    }
}

impl From<GeoCoordinate> for GeoPoint {
    fn from(value: GeoCoordinate) -> Self {
        Self {
            kind: "Point".to_string(),
            coordinates: [value.longitude, value.latitude],
        }
    }
}

/// One price-paid transaction exactly as the index returns it.
///
/// Codes are left undecoded; see [`crate::mapping`] for the display form.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RawPropertyRecord {
    pub transaction_id: String,
    #[serde(default)]
    pub price: Option<i64>,
    #[serde(default)]
    pub date_of_transfer: Option<DateTime<Utc>>,
    #[serde(default)]
    pub postcode: Option<String>,
    /// `D`, `S`, `T`, `F` or anything else.
    #[serde(default)]
    pub property_type: Option<String>,
    /// `Y` for a new build.
    #[serde(default)]
    pub old_new: Option<String>,
    /// `F` for freehold.
    #[serde(default)]
    pub duration: Option<String>,
    /// Primary addressable object name, usually the house number or name.
    #[serde(rename = "PAON", default)]
    pub paon: Option<String>,
    /// Secondary addressable object name, e.g. a flat number.
    #[serde(rename = "SAON", default)]
    pub saon: Option<String>,
    #[serde(default)]
    pub street: Option<String>,
    #[serde(default)]
    pub locality: Option<String>,
    #[serde(default)]
    pub town_city: Option<String>,
    #[serde(default)]
    pub district: Option<String>,
    #[serde(default)]
    pub county: Option<String>,
    #[serde(default)]
    pub geo: Option<GeoPoint>,
}

/// The query sent to the index for one page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    pub filter: SearchFilter,
    pub skip: u64,
    pub top: usize,
    pub facets: Vec<&'static str>,
}

impl SearchRequest {
    /// Zero-based `page` of results matching `filter`, with all five facets.
    pub fn for_page(filter: SearchFilter, page: u32) -> Self {
        Self {
            filter,
            skip: u64::from(page) * PAGE_SIZE as u64,
            top: PAGE_SIZE,
            facets: FacetField::ALL.iter().map(|f| f.as_str()).collect(),
        }
    }
}

/// What the index returns for one [`SearchRequest`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchPage {
    /// Matching records in backend ranking order.
    pub records: Vec<RawPropertyRecord>,
    pub facets: FacetCounts,
}

/// A faceted search backend.
///
/// Implementations must be safe to share between concurrent requests.
#[async_trait]
pub trait SearchIndex: fmt::Debug + Send + Sync {
    async fn query(&self, request: &SearchRequest) -> Result<SearchPage>;
}

/// Runs paginated, faceted searches against a [`SearchIndex`].
#[derive(Debug, Clone)]
pub struct SearchExecutor {
    index: Arc<dyn SearchIndex>,
}

impl SearchExecutor {
    pub fn new(index: Arc<dyn SearchIndex>) -> Self {
        Self { index }
    }

    /// Fetch `page` (zero-based) of records matching `filter`.
    ///
    /// Records keep the backend's ordering. Failures are returned as-is; this
    /// layer does not retry.
    #[instrument(name = "Search Index", skip_all, fields(filter = %filter, page = page), level = "debug")]
    pub async fn search(
        &self,
        filter: SearchFilter,
        page: u32,
    ) -> Result<(FacetCounts, Vec<RawPropertyRecord>)> {
        let request = SearchRequest::for_page(filter, page);
        let t_search = std::time::Instant::now();
        let SearchPage { records, facets } = self.index.query(&request).await?;
        debug!(
            skip = request.skip,
            num_results = records.len(),
            search_execution_seconds = t_search.elapsed().as_secs_f32(),
            "Index search complete"
        );
        Ok((facets, records))
    }
}

mod error {
    use thiserror::Error;

    #[derive(Error, Debug)]
    pub enum IndexError {
        #[error("HTTP error: {0}")]
        Http(#[from] reqwest::Error),
        #[error("Search service returned status {status}: {body}")]
        Status { status: u16, body: String },
        #[error("Failed to decode search response: {0}")]
        Decode(#[from] serde_json::Error),
        #[error("Invalid search endpoint: {0}")]
        InvalidEndpoint(String),
        #[error(transparent)]
        Other(#[from] anyhow::Error),
    }
    pub type Result<T> = std::result::Result<T, IndexError>;
}
