//! Substitute recommendation engine.
//!
//! Candidates come from the catalog hierarchy (same family, or same brand elsewhere in the
//! category). Each candidate gets an attribute confidence from price, brand, origin and
//! premium agreement, blended with an empirical confidence learned from recorded
//! substitutions. Confidences are finally turned into a softmax distribution.

mod candidates;
mod engine;
mod feedback;
mod normalize;
mod scoring;
mod types;

pub use candidates::generate_candidates;
pub use engine::SubstitutionEngine;
pub use feedback::FeedbackLedger;
pub use normalize::softmax_percentages;
pub use scoring::{blend, blend_alpha, empirical_confidence, price_score, AttributeScores};
pub use types::*;

use crate::errors::SubstitutionError;

/// Result type for substitution operations
pub type SubstitutionResult<T> = Result<T, SubstitutionError>;

/// Maximum contribution of the price ratio
pub const PRICE_WEIGHT: f64 = 40.0;

/// Awarded when both products carry the same brand
pub const BRAND_WEIGHT: f64 = 40.0;

/// Awarded when both products share an origin
pub const ORIGIN_WEIGHT: f64 = 10.0;

/// Awarded when both products share the premium flag
pub const PREMIUM_WEIGHT: f64 = 10.0;

/// Multiplier applied to attribute confidence for candidates outside the source family
pub const CROSS_FAMILY_MULTIPLIER: f64 = 0.5;

/// Empirical confidence of a pair with at least one recorded substitution
pub const EMPIRICAL_CONFIDENCE: f64 = 100.0;

/// Softmax temperature used for probabilities
pub const SOFTMAX_TEMPERATURE: f64 = 20.0;

/// Lower price ratio bound (exclusive) below which a candidate scores no price points
pub const MIN_PRICE_RATIO: f64 = 0.25;

/// Upper price ratio bound (exclusive) at and above which a candidate scores no price points
pub const MAX_PRICE_RATIO: f64 = 2.0;
