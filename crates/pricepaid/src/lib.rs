//! pricepaid - Property Transactions Near a Postcode
//!
//! pricepaid answers "which properties sold near this postcode?" by combining a
//! precomputed postcode-to-coordinate table with a faceted geospatial search
//! index of price-paid transactions. Results come back decoded for display
//! (property type, build status, tenure, assembled address) together with
//! facet counts for town, locality, district, county and price.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use pricepaid::{PropertySearchRequest, PropertySearcher, ServiceConfig};
//!
//! # async fn run() -> Result<(), pricepaid::error::PricePaidError> {
//! pricepaid::init_logging(tracing::Level::INFO)?;
//!
//! let searcher = PropertySearcher::from_config(&ServiceConfig::from_env()?)?;
//!
//! // Everything sold within 1km of Buckingham Palace, first page
//! let response = searcher
//!     .find_properties(&PropertySearchRequest::new("SW1A 1AA", 1, 0))
//!     .await?;
//!
//! for result in &response.results {
//!     println!(
//!         "{} {:?} - {}",
//!         result.address.building,
//!         result.address.street,
//!         result.classification.property_type
//!     );
//! }
//! for town in &response.facets.towns {
//!     println!("{}: {}", town.label, town.count);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Backends
//!
//! Both backends are reached through traits, [`GeocodeStore`] and
//! [`SearchIndex`], so the searcher can run against the bundled HTTP clients
//! ([`TableGeocodeStore`], [`AzureSearchIndex`]) or any other implementation.
//! Handles are created once and shared by every request.
use once_cell::sync::OnceCell;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{EnvFilter, fmt::format::FmtSpan};

mod config;
mod core;
pub mod error;
pub mod geocode;
pub mod index;
pub mod mapping;
mod postcode;
pub mod query;

pub use crate::core::{
    PropertyFacets, PropertySearchRequest, PropertySearchResponse, PropertySearcher,
};

pub use config::{
    ENV_BULK_CONCURRENCY, ENV_GEOCODE_CREDENTIALS, ENV_GEOCODE_ENDPOINT, ENV_GEOCODE_TABLE,
    ENV_REQUEST_TIMEOUT_SECS, ENV_SEARCH_API_KEY, ENV_SEARCH_API_VERSION, ENV_SEARCH_ENDPOINT,
    ENV_SEARCH_INDEX, ServiceConfig, ServiceConfigBuilder,
};
pub use geocode::{GeoCoordinate, GeocodeEntity, GeocodeLookup, GeocodeStore, TableGeocodeStore};
pub use index::{
    AzureSearchIndex, FacetCounts, FacetField, FacetValue, PAGE_SIZE, RawPropertyRecord,
    SearchExecutor, SearchIndex, SearchPage, SearchRequest,
};
pub use mapping::{
    Address, BuildStatus, PropertyClassification, PropertySearchResult, PropertyType, Tenure,
    to_display_result,
};
pub use postcode::{PostcodeKey, validate_postcode};
pub use query::SearchFilter;

static LOGGER_INIT: OnceCell<()> = OnceCell::new();

/// Initialize logging for the pricepaid library.
///
/// Installs a `tracing` fmt subscriber filtered by `RUST_LOG` when set, or by
/// `level` otherwise. Spans are reported when they close, so each pipeline
/// stage logs its duration. Only the first call has any effect.
///
/// # Examples
///
/// ```rust
/// use pricepaid::init_logging;
/// use tracing::Level;
///
/// init_logging(Level::INFO)?;
/// # Ok::<(), pricepaid::error::PricePaidError>(())
/// ```
pub fn init_logging(level: impl Into<LevelFilter>) -> Result<&'static (), error::PricePaidError> {
    LOGGER_INIT.get_or_try_init(|| {
        let filter = EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(level.into().to_string()))?
            .add_directive("hyper_util=warn".parse()?)
            .add_directive("reqwest=warn".parse()?);

        tracing_subscriber::fmt::fmt()
            .with_env_filter(filter)
            .with_span_events(FmtSpan::CLOSE)
            .init();
        Ok(())
    })
}
