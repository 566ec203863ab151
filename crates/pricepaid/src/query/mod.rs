//! Filter expressions for the property index.
//!
//! Filters are written in the search service's OData filter grammar. Two
//! shapes are supported: a geospatial radius around a coordinate and an exact
//! match on the town/city field.

use std::fmt;

use crate::geocode::GeoCoordinate;

/// Name of the geography field holding each transaction's location.
pub const GEO_FIELD: &str = "Geo";
/// Name of the town/city field.
pub const TOWN_FIELD: &str = "TownCity";

/// An opaque, backend-specific filter expression.
///
/// Built once per request and handed by value to the
/// [`SearchExecutor`](crate::SearchExecutor).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchFilter {
    expression: String,
}

impl SearchFilter {
    /// Select records within `max_distance_km` kilometres of `center`.
    ///
    /// The point is written in WKT order, longitude first, and the comparison
    /// is inclusive (`le`). `geo.distance` measures in kilometres.
    ///
    /// ```rust
    /// use pricepaid::{GeoCoordinate, SearchFilter};
    ///
    /// let filter = SearchFilter::by_distance(GeoCoordinate::new(51.5, -0.14), 1);
    /// assert_eq!(
    ///     filter.as_str(),
    ///     "geo.distance(Geo, geography'POINT(-0.14 51.5)') le 1"
    /// );
    /// ```
    pub fn by_distance(center: GeoCoordinate, max_distance_km: u32) -> Self {
        Self {
            expression: format!(
                "geo.distance({GEO_FIELD}, geography'POINT({} {})') le {max_distance_km}",
                center.longitude, center.latitude
            ),
        }
    }

    /// Select records whose town/city equals `name` exactly.
    ///
    /// Single quotes in `name` are doubled so the value cannot terminate the
    /// string literal.
    ///
    /// ```rust
    /// use pricepaid::SearchFilter;
    ///
    /// let filter = SearchFilter::by_town("KING'S LYNN");
    /// assert_eq!(filter.as_str(), "TownCity eq 'KING''S LYNN'");
    /// ```
    pub fn by_town(name: &str) -> Self {
        Self {
            expression: format!("{TOWN_FIELD} eq '{}'", escape_string_literal(name)),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.expression
    }

    pub fn into_string(self) -> String {
        self.expression
    }
}

impl fmt::Display for SearchFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.expression)
    }
}

/// Escape a value for use inside a single-quoted OData string literal.
pub(crate) fn escape_string_literal(value: &str) -> String {
    value.replace('\'', "''")
}
