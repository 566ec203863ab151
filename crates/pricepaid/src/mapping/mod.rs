//! Reshaping raw index records into display results.
//!
//! Single-letter codes from the price-paid dataset are decoded into labels and
//! the scattered address parts are grouped. Mapping never fails: unknown codes
//! fall into a catch-all label.

use std::fmt;

use chrono::{DateTime, Utc};
use itertools::Itertools;
use serde::{Serialize, Serializer};

use crate::index::RawPropertyRecord;

macro_rules! labelled {
    ($name:ident { $($variant:ident => $label:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const fn label(self) -> &'static str {
                match self {
                    $(Self::$variant => $label),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.label())
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.label())
            }
        }
    };
}

labelled!(PropertyType {
    Detached => "Detached",
    SemiDetached => "Semi-Detached",
    Terraced => "Terraced",
    FlatsMaisonettes => "Flats/Maisonettes",
    Other => "Other",
});

labelled!(BuildStatus {
    NewBuild => "New Build",
    OldBuild => "Old Build",
});

labelled!(Tenure {
    Freehold => "Freehold",
    Leasehold => "Leasehold",
});

impl PropertyType {
    pub fn from_code(code: Option<&str>) -> Self {
        match code {
            Some("D") => Self::Detached,
            Some("S") => Self::SemiDetached,
            Some("T") => Self::Terraced,
            Some("F") => Self::FlatsMaisonettes,
            _ => Self::Other,
        }
    }
}

impl BuildStatus {
    pub fn from_code(code: Option<&str>) -> Self {
        match code {
            Some("Y") => Self::NewBuild,
            _ => Self::OldBuild,
        }
    }
}

impl Tenure {
    pub fn from_code(code: Option<&str>) -> Self {
        match code {
            Some("F") => Self::Freehold,
            _ => Self::Leasehold,
        }
    }
}

/// Human-readable classification of a property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyClassification {
    pub property_type: PropertyType,
    pub build_status: BuildStatus,
    pub tenure: Tenure,
}

/// Postal address of a property.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    /// Primary and secondary building identifiers joined by `", "`.
    pub building: String,
    pub street: Option<String>,
    pub locality: Option<String>,
    pub town_city: Option<String>,
    pub district: Option<String>,
    pub county: Option<String>,
    pub postcode: Option<String>,
}

/// A transaction in display form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertySearchResult {
    pub classification: PropertyClassification,
    pub address: Address,
    pub price: Option<i64>,
    pub date_of_transfer: Option<DateTime<Utc>>,
}

/// Join the non-empty building identifiers, primary first.
///
/// ```rust
/// use pricepaid::mapping::building_label;
///
/// assert_eq!(building_label(Some("221B"), Some("Flat 2")), "221B, Flat 2");
/// assert_eq!(building_label(None, Some("Flat 2")), "Flat 2");
/// assert_eq!(building_label(None, None), "");
/// ```
pub fn building_label(primary: Option<&str>, secondary: Option<&str>) -> String {
    [primary, secondary]
        .into_iter()
        .flatten()
        .filter(|part| !part.is_empty())
        .join(", ")
}

pub fn to_display_result(record: RawPropertyRecord) -> PropertySearchResult {
    let classification = PropertyClassification {
        property_type: PropertyType::from_code(record.property_type.as_deref()),
        build_status: BuildStatus::from_code(record.old_new.as_deref()),
        tenure: Tenure::from_code(record.duration.as_deref()),
    };
    let address = Address {
        building: building_label(record.paon.as_deref(), record.saon.as_deref()),
        street: record.street,
        locality: record.locality,
        town_city: record.town_city,
        district: record.district,
        county: record.county,
        postcode: record.postcode,
    };
    PropertySearchResult {
        classification,
        address,
        price: record.price,
        date_of_transfer: record.date_of_transfer,
    }
}

impl From<RawPropertyRecord> for PropertySearchResult {
    fn from(record: RawPropertyRecord) -> Self {
        to_display_result(record)
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use serde_json::json;

    use super::*;

    fn coded(property_type: &str, old_new: &str, duration: &str) -> RawPropertyRecord {
        RawPropertyRecord {
            transaction_id: "t".to_string(),
            property_type: Some(property_type.to_string()),
            old_new: Some(old_new.to_string()),
            duration: Some(duration.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_property_type_codes() {
        let cases = [
            (Some("D"), "Detached"),
            (Some("S"), "Semi-Detached"),
            (Some("T"), "Terraced"),
            (Some("F"), "Flats/Maisonettes"),
            (Some("O"), "Other"),
            (Some("d"), "Other"),
            (Some(""), "Other"),
            (None, "Other"),
        ];
        for (code, label) in cases {
            assert_eq!(PropertyType::from_code(code).label(), label, "{code:?}");
        }
    }

    #[test]
    fn test_build_status_and_tenure_codes() {
        assert_eq!(BuildStatus::from_code(Some("Y")), BuildStatus::NewBuild);
        for code in [Some("N"), Some("y"), Some(""), None] {
            assert_eq!(BuildStatus::from_code(code), BuildStatus::OldBuild);
        }

        assert_eq!(Tenure::from_code(Some("F")), Tenure::Freehold);
        for code in [Some("L"), Some("U"), Some(""), None] {
            assert_eq!(Tenure::from_code(code), Tenure::Leasehold);
        }
    }

    #[test]
    fn test_every_code_combination_maps() {
        let codes = ["D", "S", "T", "F", "O", "Y", "N", "L", "", "?"];
        for p in codes {
            for o in codes {
                for d in codes {
                    let result = to_display_result(coded(p, o, d));
                    let c = result.classification;
                    assert!(!c.property_type.label().is_empty());
                    assert!(matches!(
                        c.build_status,
                        BuildStatus::NewBuild | BuildStatus::OldBuild
                    ));
                    assert!(matches!(c.tenure, Tenure::Freehold | Tenure::Leasehold));
                }
            }
        }
    }

    #[test]
    fn test_building_label() {
        assert_eq!(building_label(None, Some("Flat 2")), "Flat 2");
        assert_eq!(building_label(Some("221B"), Some("")), "221B");
        assert_eq!(building_label(None, None), "");
        assert_eq!(building_label(Some("221B"), Some("Flat 2")), "221B, Flat 2");
        assert_eq!(building_label(Some(""), Some("")), "");
    }

    #[test]
    fn test_address_and_values_pass_through() {
        let date = Utc.with_ymd_and_hms(2019, 5, 1, 0, 0, 0).unwrap();
        let record = RawPropertyRecord {
            transaction_id: "t-1".to_string(),
            price: Some(425000),
            date_of_transfer: Some(date),
            postcode: Some("NW1 6XE".to_string()),
            property_type: Some("F".to_string()),
            old_new: Some("N".to_string()),
            duration: Some("L".to_string()),
            paon: Some("221B".to_string()),
            saon: Some("FLAT 2".to_string()),
            street: Some("BAKER STREET".to_string()),
            locality: None,
            town_city: Some("LONDON".to_string()),
            district: Some("CITY OF WESTMINSTER".to_string()),
            county: Some("GREATER LONDON".to_string()),
            geo: None,
        };

        let result = to_display_result(record);
        assert_eq!(result.price, Some(425000));
        assert_eq!(result.date_of_transfer, Some(date));
        assert_eq!(
            result.address,
            Address {
                building: "221B, FLAT 2".to_string(),
                street: Some("BAKER STREET".to_string()),
                locality: None,
                town_city: Some("LONDON".to_string()),
                district: Some("CITY OF WESTMINSTER".to_string()),
                county: Some("GREATER LONDON".to_string()),
                postcode: Some("NW1 6XE".to_string()),
            }
        );
        assert_eq!(
            result.classification,
            PropertyClassification {
                property_type: PropertyType::FlatsMaisonettes,
                build_status: BuildStatus::OldBuild,
                tenure: Tenure::Leasehold,
            }
        );
    }

    #[test]
    fn test_serialized_shape_uses_labels() {
        let result = to_display_result(coded("S", "Y", "F"));
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(
            value["classification"],
            json!({
                "propertyType": "Semi-Detached",
                "buildStatus": "New Build",
                "tenure": "Freehold"
            })
        );
        assert_eq!(value["address"]["building"], "");
    }
}
