//! Postcode to coordinate lookup.
//!
//! Coordinates are precomputed and stored in a key-value table keyed by
//! `(outward, inward)`. This module only performs the point read and decides
//! whether the stored record carries a usable coordinate.

use std::{fmt, sync::Arc};

use async_trait::async_trait;
pub use error::GeocodeError;
use error::Result;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, instrument};

pub mod table;

pub use table::TableGeocodeStore;

/// A latitude/longitude pair in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoCoordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoCoordinate {
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

impl fmt::Display for GeoCoordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.latitude, self.longitude)
    }
}

/// A geocoding record as stored in the table.
///
/// Coordinates are kept as raw JSON values: a record can exist without them,
/// or with values that are not numbers, and that is a "no coordinate" outcome
/// rather than a decoding failure.
///
/// Property names are matched case-insensitively, so `Latitude`, `lat` and
/// `LAT` all fill [`latitude`](Self::latitude). When several names are present
/// the first non-null one in [`LATITUDE_KEYS`] / [`LONGITUDE_KEYS`] order wins.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeocodeEntity {
    pub latitude: Option<Value>,
    pub longitude: Option<Value>,
}

/// Accepted latitude property names, in order of preference.
pub const LATITUDE_KEYS: [&str; 2] = ["latitude", "lat"];
/// Accepted longitude property names, in order of preference.
pub const LONGITUDE_KEYS: [&str; 3] = ["longitude", "long", "lon"];

impl GeocodeEntity {
    pub fn new(latitude: impl Into<Value>, longitude: impl Into<Value>) -> Self {
        Self {
            latitude: Some(latitude.into()),
            longitude: Some(longitude.into()),
        }
    }

    /// Pick the coordinate properties out of a decoded table entity.
    pub fn from_properties(properties: &Map<String, Value>) -> Self {
        Self {
            latitude: property(properties, &LATITUDE_KEYS),
            longitude: property(properties, &LONGITUDE_KEYS),
        }
    }

    /// The stored coordinate, if both fields hold finite numbers.
    ///
    /// Numbers stored as strings (`"51.5"`) are accepted.
    pub fn coordinate(&self) -> Option<GeoCoordinate> {
        let latitude = self.latitude.as_ref().and_then(numeric)?;
        let longitude = self.longitude.as_ref().and_then(numeric)?;
        Some(GeoCoordinate::new(latitude, longitude))
    }
}

impl<'de> Deserialize<'de> for GeocodeEntity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let properties = Map::<String, Value>::deserialize(deserializer)?;
        Ok(Self::from_properties(&properties))
    }
}

fn property(properties: &Map<String, Value>, names: &[&str]) -> Option<Value> {
    names.iter().find_map(|name| {
        properties
            .iter()
            .find(|(key, value)| key.eq_ignore_ascii_case(name) && !value.is_null())
            .map(|(_, value)| value.clone())
    })
}

fn numeric(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    number.is_finite().then_some(number)
}

/// A key-value store holding one [`GeocodeEntity`] per postcode.
///
/// Implementations must be safe to share between concurrent requests; they
/// are created once and reused for the lifetime of the process.
#[async_trait]
pub trait GeocodeStore: fmt::Debug + Send + Sync {
    /// Point read by partition key and row key.
    ///
    /// Returns `Ok(None)` when no record exists for the key. Transport and
    /// backend faults are errors.
    async fn point_read(&self, partition_key: &str, row_key: &str)
    -> Result<Option<GeocodeEntity>>;
}

/// Resolves postcode keys to coordinates through a [`GeocodeStore`].
#[derive(Debug, Clone)]
pub struct GeocodeLookup {
    store: Arc<dyn GeocodeStore>,
}

impl GeocodeLookup {
    pub fn new(store: Arc<dyn GeocodeStore>) -> Self {
        Self { store }
    }

    /// Look up the coordinate for `(outward, inward)`.
    ///
    /// `Ok(None)` means no geocoding is available: either there is no record
    /// or the record has no parseable latitude/longitude. Store failures are
    /// propagated unchanged.
    #[instrument(name = "Geocode Lookup", skip(self), level = "debug")]
    pub async fn try_get_geo(&self, outward: &str, inward: &str) -> Result<Option<GeoCoordinate>> {
        let t_lookup = std::time::Instant::now();
        let entity = self.store.point_read(outward, inward).await?;
        let coordinate = entity.as_ref().and_then(GeocodeEntity::coordinate);
        debug!(
            found_record = entity.is_some(),
            has_coordinate = coordinate.is_some(),
            elapsed_seconds = t_lookup.elapsed().as_secs_f32(),
            "Geocode lookup complete"
        );
        Ok(coordinate)
    }
}

mod error {
    use thiserror::Error;

    #[derive(Error, Debug)]
    pub enum GeocodeError {
        #[error("HTTP error: {0}")]
        Http(#[from] reqwest::Error),
        #[error("Geocoding store returned status {status}: {body}")]
        Status { status: u16, body: String },
        #[error("Failed to decode geocoding record: {0}")]
        Decode(#[from] serde_json::Error),
        #[error("Invalid geocoding endpoint: {0}")]
        InvalidEndpoint(String),
        #[error(transparent)]
        Other(#[from] anyhow::Error),
    }
    pub type Result<T> = std::result::Result<T, GeocodeError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use ahash::AHashMap as HashMap;
    use serde_json::json;

    #[derive(Debug, Default)]
    struct MapStore(HashMap<(String, String), GeocodeEntity>);

    #[async_trait]
    impl GeocodeStore for MapStore {
        async fn point_read(
            &self,
            partition_key: &str,
            row_key: &str,
        ) -> Result<Option<GeocodeEntity>> {
            Ok(self
                .0
                .get(&(partition_key.to_string(), row_key.to_string()))
                .cloned())
        }
    }

    #[derive(Debug)]
    struct FailingStore;

    #[async_trait]
    impl GeocodeStore for FailingStore {
        async fn point_read(&self, _: &str, _: &str) -> Result<Option<GeocodeEntity>> {
            Err(GeocodeError::Status {
                status: 503,
                body: "unavailable".to_string(),
            })
        }
    }

    fn lookup_with(entries: Vec<((&str, &str), GeocodeEntity)>) -> GeocodeLookup {
        let map = entries
            .into_iter()
            .map(|((pk, rk), e)| ((pk.to_string(), rk.to_string()), e))
            .collect();
        GeocodeLookup::new(Arc::new(MapStore(map)))
    }

    #[test]
    fn test_entity_coordinate_from_numbers() {
        let entity = GeocodeEntity::new(51.5, -0.14);
        assert_eq!(entity.coordinate(), Some(GeoCoordinate::new(51.5, -0.14)));
    }

    #[test]
    fn test_entity_coordinate_from_strings() {
        let entity = GeocodeEntity::new("51.5", " -0.14 ");
        assert_eq!(entity.coordinate(), Some(GeoCoordinate::new(51.5, -0.14)));
    }

    #[test]
    fn test_entity_missing_or_malformed_fields() {
        assert_eq!(GeocodeEntity::default().coordinate(), None);

        let missing_long = GeocodeEntity {
            latitude: Some(json!(51.5)),
            longitude: None,
        };
        assert_eq!(missing_long.coordinate(), None);

        assert_eq!(GeocodeEntity::new("north", -0.14).coordinate(), None);
        assert_eq!(GeocodeEntity::new(json!(null), -0.14).coordinate(), None);
        assert_eq!(GeocodeEntity::new(json!([51.5]), -0.14).coordinate(), None);
        assert_eq!(GeocodeEntity::new("NaN", -0.14).coordinate(), None);
    }

    #[test]
    fn test_entity_deserializes_table_shapes() {
        let entity: GeocodeEntity = serde_json::from_value(json!({
            "PartitionKey": "SW1A",
            "RowKey": "1AA",
            "Timestamp": "2020-01-01T00:00:00Z",
            "Latitude": 51.501009,
            "Longitude": -0.141588
        }))
        .unwrap();
        assert_eq!(
            entity.coordinate(),
            Some(GeoCoordinate::new(51.501009, -0.141588))
        );

        let short: GeocodeEntity =
            serde_json::from_value(json!({ "lat": 51.5, "long": -0.14 })).unwrap();
        assert_eq!(short.coordinate(), Some(GeoCoordinate::new(51.5, -0.14)));

        let bare: GeocodeEntity =
            serde_json::from_value(json!({ "PartitionKey": "SW1A", "RowKey": "1AA" })).unwrap();
        assert_eq!(bare.coordinate(), None);
    }

    #[test]
    fn test_entity_property_names_ignore_case() {
        for body in [
            json!({ "Lat": 51.5, "Long": -0.14 }),
            json!({ "LATITUDE": 51.5, "LONGITUDE": -0.14 }),
            json!({ "latitude": "51.5", "Lon": "-0.14" }),
        ] {
            let entity: GeocodeEntity = serde_json::from_value(body.clone()).unwrap();
            assert_eq!(
                entity.coordinate(),
                Some(GeoCoordinate::new(51.5, -0.14)),
                "{body}"
            );
        }
    }

    #[test]
    fn test_entity_with_name_and_alias() {
        let entity: GeocodeEntity = serde_json::from_value(json!({
            "Latitude": 51.5,
            "lat": 52.0,
            "Longitude": -0.14
        }))
        .expect("Name and alias together should decode");
        assert_eq!(entity.coordinate(), Some(GeoCoordinate::new(51.5, -0.14)));

        // A null preferred name falls through to the alias
        let entity: GeocodeEntity =
            serde_json::from_value(json!({ "Latitude": null, "Lat": 51.5, "Long": -0.14 }))
                .unwrap();
        assert_eq!(entity.coordinate(), Some(GeoCoordinate::new(51.5, -0.14)));
    }

    #[test]
    fn test_entity_requires_an_object() {
        assert!(serde_json::from_value::<GeocodeEntity>(json!([51.5, -0.14])).is_err());
    }

    #[tokio::test]
    async fn test_lookup_found() {
        let lookup = lookup_with(vec![(("SW1A", "1AA"), GeocodeEntity::new(51.5, -0.14))]);
        let geo = lookup.try_get_geo("SW1A", "1AA").await.unwrap();
        assert_eq!(geo, Some(GeoCoordinate::new(51.5, -0.14)));
    }

    #[tokio::test]
    async fn test_lookup_absent_key() {
        let lookup = lookup_with(vec![(("SW1A", "1AA"), GeocodeEntity::new(51.5, -0.14))]);
        assert_eq!(lookup.try_get_geo("SW1A", "2AA").await.unwrap(), None);
        // Keys are case sensitive
        assert_eq!(lookup.try_get_geo("sw1a", "1aa").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_lookup_record_without_coordinate() {
        let lookup = lookup_with(vec![(("SW1A", "1AA"), GeocodeEntity::default())]);
        assert_eq!(lookup.try_get_geo("SW1A", "1AA").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_lookup_failure_propagates() {
        let lookup = GeocodeLookup::new(Arc::new(FailingStore));
        let err = lookup.try_get_geo("SW1A", "1AA").await.unwrap_err();
        assert!(matches!(err, GeocodeError::Status { status: 503, .. }));
    }
}
