//! Types returned by the substitution engine

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::product::{ProductCode, ProductListing};

/// Ranked substitutes for one out-of-stock product
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    /// Product the substitutes replace
    pub product_id: ProductCode,
    /// Candidate codes in ascending code order
    pub substitutes: Vec<ProductCode>,
    /// Blended confidence per candidate (0 - 100)
    pub confidences: BTreeMap<ProductCode, f64>,
    /// Softmax probability per candidate (0 - 100, summing to 100)
    pub probabilities: BTreeMap<ProductCode, f64>,
    /// Per-candidate score components, best first
    pub breakdown: Vec<ScoreBreakdown>,
}

impl Prediction {
    /// Candidate with the highest confidence, ties broken by code
    pub fn best(&self) -> Option<&ScoreBreakdown> {
        self.breakdown.first()
    }
}

/// How a candidate's confidence was assembled
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub candidate: ProductCode,
    pub same_family: bool,
    pub price: f64,
    pub brand: f64,
    pub origin: f64,
    pub premium: f64,
    /// Attribute total after the family multiplier
    pub attribute: f64,
    /// 100 if the substitution was recorded before, else 0
    pub empirical: f64,
    /// Weight given to the empirical signal
    pub alpha: f64,
    pub confidence: f64,
    pub probability: f64,
}

/// Result of recording observed substitutions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainingReceipt {
    /// Feedback entries recorded
    pub trained: usize,
    /// Exposure count of the source product after recording
    pub exposure: u64,
}

/// Outcome of a catalog load
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogSummary {
    /// Rows read, duplicates included
    pub rows: usize,
    /// Distinct product codes
    pub products: usize,
}

/// Read-only view of the loaded catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogInfo {
    pub count: usize,
    pub products: Vec<ProductListing>,
}
