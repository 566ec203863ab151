use std::time::Duration;

use tracing::debug;

use crate::{error::PricePaidError, index::azure::DEFAULT_API_VERSION};

pub const ENV_GEOCODE_ENDPOINT: &str = "PRICEPAID_GEOCODE_ENDPOINT";
pub const ENV_GEOCODE_TABLE: &str = "PRICEPAID_GEOCODE_TABLE";
pub const ENV_GEOCODE_CREDENTIALS: &str = "PRICEPAID_GEOCODE_CREDENTIALS";
pub const ENV_SEARCH_ENDPOINT: &str = "PRICEPAID_SEARCH_ENDPOINT";
pub const ENV_SEARCH_INDEX: &str = "PRICEPAID_SEARCH_INDEX";
pub const ENV_SEARCH_API_VERSION: &str = "PRICEPAID_SEARCH_API_VERSION";
pub const ENV_SEARCH_API_KEY: &str = "PRICEPAID_SEARCH_API_KEY";
pub const ENV_REQUEST_TIMEOUT_SECS: &str = "PRICEPAID_REQUEST_TIMEOUT_SECS";
pub const ENV_BULK_CONCURRENCY: &str = "PRICEPAID_BULK_CONCURRENCY";

/// Connection and behaviour settings for a [`PropertySearcher`](crate::PropertySearcher).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    /// Base URL of the geocoding table service
    pub geocode_endpoint: String,
    /// Table holding one entity per postcode
    pub geocode_table: String,
    /// Opaque query string appended to geocoding requests
    pub geocode_credentials: Option<String>,
    /// Base URL of the search service
    pub search_endpoint: String,
    /// Name of the property-transaction index
    pub search_index: String,
    pub search_api_version: String,
    /// Sent as the `api-key` header when present
    pub search_api_key: Option<String>,
    /// Timeout applied to every backend HTTP request
    pub request_timeout: Duration,
    /// Maximum number of requests in flight during a bulk search
    pub bulk_concurrency: usize,
}

impl ServiceConfig {
    pub fn builder() -> ServiceConfigBuilder {
        ServiceConfigBuilder::default()
    }

    /// Read configuration from `PRICEPAID_*` environment variables.
    pub fn from_env() -> Result<Self, PricePaidError> {
        ServiceConfigBuilder::from_lookup(|key| std::env::var(key).ok())?.build()
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            geocode_endpoint: String::new(),
            geocode_table: String::new(),
            geocode_credentials: None,
            search_endpoint: String::new(),
            search_index: String::new(),
            search_api_version: DEFAULT_API_VERSION.to_string(),
            search_api_key: None,
            request_timeout: Duration::from_secs(10),
            bulk_concurrency: 8,
        }
    }
}

/// Builder for [`ServiceConfig`] with validation on [`build`](Self::build).
#[derive(Debug, Clone, Default)]
pub struct ServiceConfigBuilder {
    config: ServiceConfig,
}

impl ServiceConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: ServiceConfig::default(),
        }
    }

    /// Populate a builder from a key lookup, e.g. the process environment.
    ///
    /// Unset keys keep their defaults. Numeric values that do not parse are a
    /// configuration error.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, PricePaidError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut builder = Self::new();
        if let Some(v) = lookup(ENV_GEOCODE_ENDPOINT) {
            builder = builder.geocode_endpoint(v);
        }
        if let Some(v) = lookup(ENV_GEOCODE_TABLE) {
            builder = builder.geocode_table(v);
        }
        if let Some(v) = lookup(ENV_GEOCODE_CREDENTIALS) {
            builder = builder.geocode_credentials(v);
        }
        if let Some(v) = lookup(ENV_SEARCH_ENDPOINT) {
            builder = builder.search_endpoint(v);
        }
        if let Some(v) = lookup(ENV_SEARCH_INDEX) {
            builder = builder.search_index(v);
        }
        if let Some(v) = lookup(ENV_SEARCH_API_VERSION) {
            builder = builder.search_api_version(v);
        }
        if let Some(v) = lookup(ENV_SEARCH_API_KEY) {
            builder = builder.search_api_key(v);
        }
        if let Some(v) = lookup(ENV_REQUEST_TIMEOUT_SECS) {
            let secs = v.trim().parse::<u64>().map_err(|e| {
                PricePaidError::ConfigError(format!("{ENV_REQUEST_TIMEOUT_SECS}={v}: {e}"))
            })?;
            builder = builder.request_timeout(Duration::from_secs(secs));
        }
        if let Some(v) = lookup(ENV_BULK_CONCURRENCY) {
            let n = v.trim().parse::<usize>().map_err(|e| {
                PricePaidError::ConfigError(format!("{ENV_BULK_CONCURRENCY}={v}: {e}"))
            })?;
            builder = builder.bulk_concurrency(n);
        }
        Ok(builder)
    }

    pub fn geocode_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.config.geocode_endpoint = endpoint.into();
        self
    }

    pub fn geocode_table(mut self, table: impl Into<String>) -> Self {
        self.config.geocode_table = table.into();
        self
    }

    pub fn geocode_credentials(mut self, credentials: impl Into<String>) -> Self {
        self.config.geocode_credentials = Some(credentials.into()).filter(|c| !c.is_empty());
        self
    }

    pub fn search_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.config.search_endpoint = endpoint.into();
        self
    }

    pub fn search_index(mut self, index: impl Into<String>) -> Self {
        self.config.search_index = index.into();
        self
    }

    pub fn search_api_version(mut self, version: impl Into<String>) -> Self {
        self.config.search_api_version = version.into();
        self
    }

    pub fn search_api_key(mut self, key: impl Into<String>) -> Self {
        self.config.search_api_key = Some(key.into()).filter(|k| !k.is_empty());
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    /// Set bulk concurrency; values below 1 are raised to 1
    pub fn bulk_concurrency(mut self, n: usize) -> Self {
        self.config.bulk_concurrency = n.max(1);
        self
    }

    /// Validate and build the final configuration
    pub fn build(self) -> Result<ServiceConfig, PricePaidError> {
        let config = self.config;
        for (name, endpoint) in [
            (ENV_GEOCODE_ENDPOINT, &config.geocode_endpoint),
            (ENV_SEARCH_ENDPOINT, &config.search_endpoint),
        ] {
            reqwest::Url::parse(endpoint).map_err(|e| {
                PricePaidError::ConfigError(format!("{name} is not a valid URL ({endpoint:?}): {e}"))
            })?;
        }
        for (name, value) in [
            (ENV_GEOCODE_TABLE, &config.geocode_table),
            (ENV_SEARCH_INDEX, &config.search_index),
            (ENV_SEARCH_API_VERSION, &config.search_api_version),
        ] {
            if value.trim().is_empty() {
                return Err(PricePaidError::ConfigError(format!(
                    "{name} must not be empty"
                )));
            }
        }
        if config.request_timeout.is_zero() {
            return Err(PricePaidError::ConfigError(
                "Request timeout must be greater than zero".to_string(),
            ));
        }
        debug!(
            geocode_table = %config.geocode_table,
            search_index = %config.search_index,
            "Service configuration built"
        );
        Ok(config)
    }
}
