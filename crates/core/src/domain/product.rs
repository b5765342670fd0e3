use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductCode(pub String);

impl ProductCode {
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProductCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ProductCode {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl From<String> for ProductCode {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Brand value used when a product label carries no `BRAND <digits>` marker.
pub const UNKNOWN_BRAND: &str = "N/A";

/// Attributes of one catalog product, keyed by its code inside a loaded catalog.
#[derive(Clone, Debug, PartialEq)]
pub struct ProductRecord {
    pub code: ProductCode,
    pub label: String,
    pub market: String,
    pub segment: String,
    pub category: String,
    pub family: String,
    pub brand: String,
    pub price: f64,
    pub origin: String,
    pub premium: String,
}

impl ProductRecord {
    pub fn same_family(&self, other: &ProductRecord) -> bool {
        self.family == other.family
    }
}

/// Read-only view of a [`ProductRecord`] for catalog listings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProductListing {
    pub code: ProductCode,
    pub label: String,
    pub market: String,
    pub segment: String,
    pub category: String,
    pub family: String,
    pub brand: String,
    pub price: f64,
    pub origin: String,
    pub premium: String,
}

impl From<&ProductRecord> for ProductListing {
    fn from(record: &ProductRecord) -> Self {
        Self {
            code: record.code.clone(),
            label: record.label.clone(),
            market: record.market.clone(),
            segment: record.segment.clone(),
            category: record.category.clone(),
            family: record.family.clone(),
            brand: record.brand.clone(),
            price: record.price,
            origin: record.origin.clone(),
            premium: record.premium.clone(),
        }
    }
}
