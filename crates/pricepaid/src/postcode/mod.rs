//! Postcode parsing.
//!
//! A postcode is only usable as a geocoding key when it splits into exactly two
//! non-empty parts on a single space, e.g. `"SW1A 1AA"` becomes outward code
//! `SW1A` and inward code `1AA`. Anything else is simply not a key; callers
//! treat that as "no coordinate available" rather than as an error.

use std::fmt;

/// The two halves of a postcode, used as the composite geocoding key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PostcodeKey {
    /// Outward code, used as the partition key.
    pub outward: String,
    /// Inward code, used as the row key.
    pub inward: String,
}

impl PostcodeKey {
    /// Split `raw` on the space character.
    ///
    /// Returns `None` unless there are exactly two tokens and both are non-empty.
    /// Tokens are kept verbatim: no case folding and no trimming.
    ///
    /// ```rust
    /// use pricepaid::PostcodeKey;
    ///
    /// let key = PostcodeKey::parse("SW1A 1AA").unwrap();
    /// assert_eq!(key.outward, "SW1A");
    /// assert_eq!(key.inward, "1AA");
    ///
    /// assert!(PostcodeKey::parse("SW1A1AA").is_none());
    /// assert!(PostcodeKey::parse("SW1A  1AA").is_none());
    /// ```
    pub fn parse(raw: &str) -> Option<Self> {
        let mut parts = raw.split(' ');
        let outward = parts.next()?;
        let inward = parts.next()?;
        if parts.next().is_some() || outward.is_empty() || inward.is_empty() {
            return None;
        }
        Some(Self {
            outward: outward.to_string(),
            inward: inward.to_string(),
        })
    }
}

impl fmt::Display for PostcodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.outward, self.inward)
    }
}

/// Classify a raw postcode string, see [`PostcodeKey::parse`].
pub fn validate_postcode(raw: &str) -> Option<PostcodeKey> {
    PostcodeKey::parse(raw)
}
