//! Learned substitution history

use std::collections::HashMap;

use crate::domain::product::ProductCode;

/// Counters of confirmed substitutions and of feedback exposure per source product.
///
/// Exposure grows by one per recorded entry, so a batch reporting N substitutes for one
/// source raises it by N. Entries for codes missing from the current catalog are kept.
#[derive(Debug, Clone, Default)]
pub struct FeedbackLedger {
    substitutions: HashMap<ProductCode, HashMap<ProductCode, u64>>,
    exposure: HashMap<ProductCode, u64>,
}

impl FeedbackLedger {
    pub fn record(&mut self, source: &ProductCode, substitute: &ProductCode) {
        *self
            .substitutions
            .entry(source.clone())
            .or_default()
            .entry(substitute.clone())
            .or_insert(0) += 1;
        *self.exposure.entry(source.clone()).or_insert(0) += 1;
    }

    pub fn record_batch(&mut self, source: &ProductCode, substitutes: &[ProductCode]) -> usize {
        for substitute in substitutes {
            self.record(source, substitute);
        }
        substitutes.len()
    }

    pub fn substitution_count(&self, source: &ProductCode, substitute: &ProductCode) -> u64 {
        self.substitutions
            .get(source)
            .and_then(|targets| targets.get(substitute))
            .copied()
            .unwrap_or(0)
    }

    pub fn has_substitution(&self, source: &ProductCode, substitute: &ProductCode) -> bool {
        self.substitution_count(source, substitute) > 0
    }

    pub fn exposure(&self, source: &ProductCode) -> u64 {
        self.exposure.get(source).copied().unwrap_or(0)
    }

    pub fn clear(&mut self) {
        self.substitutions.clear();
        self.exposure.clear();
    }
}
