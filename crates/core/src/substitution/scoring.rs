//! Confidence scoring between a source product and a candidate substitute

use crate::domain::product::ProductRecord;

use super::feedback::FeedbackLedger;
use super::types::ScoreBreakdown;
use super::{
    BRAND_WEIGHT, CROSS_FAMILY_MULTIPLIER, EMPIRICAL_CONFIDENCE, MAX_PRICE_RATIO,
    MIN_PRICE_RATIO, ORIGIN_WEIGHT, PREMIUM_WEIGHT, PRICE_WEIGHT,
};

/// Price agreement in `[0, 40]`.
///
/// Peaks at parity, ramps linearly down to zero at a ratio of 0.25 below and 2.0 above.
/// The penalty for a pricier candidate is steeper than for a cheaper one.
pub fn price_score(base_price: f64, candidate_price: f64) -> f64 {
    if base_price == 0.0 {
        return 0.0;
    }

    let ratio = candidate_price / base_price;
    if ratio <= MIN_PRICE_RATIO || ratio >= MAX_PRICE_RATIO {
        0.0
    } else if ratio <= 1.0 {
        PRICE_WEIGHT * (ratio - MIN_PRICE_RATIO) / (1.0 - MIN_PRICE_RATIO)
    } else {
        PRICE_WEIGHT * (MAX_PRICE_RATIO - ratio) / (MAX_PRICE_RATIO - 1.0)
    }
}

/// Static attribute components of a pair's confidence
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AttributeScores {
    pub price: f64,
    pub brand: f64,
    pub origin: f64,
    pub premium: f64,
    pub same_family: bool,
}

impl AttributeScores {
    pub fn between(source: &ProductRecord, candidate: &ProductRecord) -> Self {
        let award = |equal: bool, weight: f64| if equal { weight } else { 0.0 };

        Self {
            price: price_score(source.price, candidate.price),
            brand: award(source.brand == candidate.brand, BRAND_WEIGHT),
            origin: award(source.origin == candidate.origin, ORIGIN_WEIGHT),
            premium: award(source.premium == candidate.premium, PREMIUM_WEIGHT),
            same_family: source.same_family(candidate),
        }
    }

    /// Sum of the components before the family multiplier, in `[0, 100]`
    pub fn raw_total(&self) -> f64 {
        self.price + self.brand + self.origin + self.premium
    }

    pub fn family_multiplier(&self) -> f64 {
        if self.same_family {
            1.0
        } else {
            CROSS_FAMILY_MULTIPLIER
        }
    }

    pub fn confidence(&self) -> f64 {
        self.raw_total() * self.family_multiplier()
    }
}

pub fn empirical_confidence(has_history: bool) -> f64 {
    if has_history {
        EMPIRICAL_CONFIDENCE
    } else {
        0.0
    }
}

/// Weight of the empirical signal after `exposure` feedback entries for the source.
///
/// Zero until the first entry, 0.5 after one, saturating at 1.0 from the second on.
pub fn blend_alpha(exposure: u64) -> f64 {
    if exposure == 0 {
        return 0.0;
    }

    (0.5 + 0.5 * (exposure - 1) as f64).min(1.0)
}

pub fn blend(attribute: f64, empirical: f64, alpha: f64) -> f64 {
    attribute * (1.0 - alpha) + empirical * alpha
}

/// Full breakdown for one candidate; `probability` is filled in after normalization.
pub(crate) fn score_candidate(
    source: &ProductRecord,
    candidate: &ProductRecord,
    feedback: &FeedbackLedger,
) -> ScoreBreakdown {
    let attributes = AttributeScores::between(source, candidate);
    let attribute = attributes.confidence();
    let empirical = empirical_confidence(feedback.has_substitution(&source.code, &candidate.code));
    let alpha = blend_alpha(feedback.exposure(&source.code));

    ScoreBreakdown {
        candidate: candidate.code.clone(),
        same_family: attributes.same_family,
        price: attributes.price,
        brand: attributes.brand,
        origin: attributes.origin,
        premium: attributes.premium,
        attribute,
        empirical,
        alpha,
        confidence: blend(attribute, empirical, alpha),
        probability: 0.0,
    }
}
