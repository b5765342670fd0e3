//! Substitution engine: owns the catalog index and the learned feedback counters

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

use tracing::debug;

use crate::catalog::{CatalogIndex, CatalogRow};
use crate::domain::product::{ProductCode, ProductRecord};
use crate::errors::SubstitutionError;

use super::candidates::generate_candidates;
use super::feedback::FeedbackLedger;
use super::normalize::softmax_percentages;
use super::scoring::score_candidate;
use super::types::*;
use super::{SubstitutionResult, SOFTMAX_TEMPERATURE};

/// Shared, thread-safe recommendation engine.
///
/// The catalog is an immutable [`CatalogIndex`] behind an `Arc`; a reload builds the new
/// index completely and then swaps the pointer, so readers see either the old or the new
/// catalog. Feedback counters are updated under a single write lock.
#[derive(Debug, Default)]
pub struct SubstitutionEngine {
    catalog: RwLock<Arc<CatalogIndex>>,
    feedback: RwLock<FeedbackLedger>,
}

impl SubstitutionEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds an index from `rows` and publishes it. On error the current catalog is kept.
    pub fn load_catalog(&self, rows: &[CatalogRow]) -> SubstitutionResult<CatalogSummary> {
        let index = CatalogIndex::build(rows)?;
        Ok(self.install(index))
    }

    /// Publishes an already built index, replacing the current one.
    pub fn install(&self, index: CatalogIndex) -> CatalogSummary {
        let summary = CatalogSummary { rows: index.row_count(), products: index.len() };
        *self.catalog.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(index);
        debug!(rows = summary.rows, products = summary.products, "catalog index installed");
        summary
    }

    pub fn clear_catalog(&self) {
        *self.catalog.write().unwrap_or_else(PoisonError::into_inner) = Arc::default();
    }

    /// Current catalog snapshot; stays valid even if a reload happens meanwhile.
    pub fn snapshot(&self) -> Arc<CatalogIndex> {
        self.catalog.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn lookup(&self, code: &ProductCode) -> SubstitutionResult<ProductRecord> {
        self.snapshot().lookup(code).cloned()
    }

    pub fn candidates(&self, code: &ProductCode) -> SubstitutionResult<Vec<ProductCode>> {
        generate_candidates(&self.snapshot(), code)
    }

    /// Ranks substitutes for `code`.
    ///
    /// Fails with [`SubstitutionError::EmptyCatalog`] before any catalog is loaded and with
    /// [`SubstitutionError::NotFound`] for codes missing from the loaded catalog.
    pub fn predict(&self, code: &ProductCode) -> SubstitutionResult<Prediction> {
        let index = self.snapshot();
        if index.is_empty() {
            return Err(SubstitutionError::EmptyCatalog);
        }

        let source = index.lookup(code)?;
        let substitutes = generate_candidates(&index, code)?;

        let mut breakdown = {
            let feedback = self.feedback.read().unwrap_or_else(PoisonError::into_inner);
            substitutes
                .iter()
                .filter_map(|candidate| index.get(candidate))
                .map(|candidate| score_candidate(source, candidate, &feedback))
                .collect::<Vec<_>>()
        };

        let confidences: BTreeMap<ProductCode, f64> = breakdown
            .iter()
            .map(|entry| (entry.candidate.clone(), entry.confidence))
            .collect();
        let probabilities = softmax_percentages(&confidences, SOFTMAX_TEMPERATURE);

        for entry in &mut breakdown {
            entry.probability = probabilities.get(&entry.candidate).copied().unwrap_or_default();
        }
        breakdown.sort_by(|a, b| {
            b.confidence.total_cmp(&a.confidence).then_with(|| a.candidate.cmp(&b.candidate))
        });

        debug!(
            product_id = %code,
            candidates = substitutes.len(),
            best = breakdown.first().map(|entry| entry.candidate.as_str()).unwrap_or_default(),
            "prediction computed"
        );

        Ok(Prediction { product_id: code.clone(), substitutes, confidences, probabilities, breakdown })
    }

    /// Records that `substitutes` were handed out when `source` was out of stock.
    ///
    /// Every entry counts as one exposure of `source`. Codes are not checked against the
    /// catalog, so feedback can arrive before or outlive the products it names.
    pub fn record_outcome(&self, source: &ProductCode, substitutes: &[ProductCode]) -> TrainingReceipt {
        let mut feedback = self.feedback.write().unwrap_or_else(PoisonError::into_inner);
        let trained = feedback.record_batch(source, substitutes);
        let exposure = feedback.exposure(source);
        debug!(product_id = %source, trained, exposure, "feedback recorded");
        TrainingReceipt { trained, exposure }
    }

    pub fn exposure(&self, source: &ProductCode) -> u64 {
        self.feedback.read().unwrap_or_else(PoisonError::into_inner).exposure(source)
    }

    pub fn substitution_count(&self, source: &ProductCode, substitute: &ProductCode) -> u64 {
        self.feedback
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .substitution_count(source, substitute)
    }

    pub fn reset_feedback(&self) {
        self.feedback.write().unwrap_or_else(PoisonError::into_inner).clear();
    }

    pub fn catalog_info(&self) -> CatalogInfo {
        let index = self.snapshot();
        CatalogInfo { count: index.len(), products: index.listings() }
    }

    pub fn product_count(&self) -> usize {
        self.snapshot().len()
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;
    use crate::catalog::CatalogParser;

    const CATALOG: &str = "\
code,label,market,segment,category,family,price,origin,premium
A,Cola BRAND 1 0.5L,Food,Drinks,Soda,F1,100,RO,no
B,Cola BRAND 1 1L,Food,Drinks,Soda,F1,100,RO,no
C,Lemonade BRAND 1,Food,Drinks,Soda,F2,500,RO,no
D,Lemonade BRAND 2,Food,Drinks,Soda,F2,100,RO,no
";

    fn code(value: &str) -> ProductCode {
        ProductCode::from(value)
    }

    fn loaded_engine() -> SubstitutionEngine {
        let rows = CatalogParser::new().parse_str(CATALOG).expect("parse");
        let engine = SubstitutionEngine::new();
        engine.load_catalog(&rows).expect("load");
        engine
    }

    #[test]
    fn test_predict_before_load_is_empty_catalog() {
        let engine = SubstitutionEngine::new();
        assert_eq!(engine.predict(&code("A")).unwrap_err(), SubstitutionError::EmptyCatalog);
    }

    #[test]
    fn test_predict_unknown_code_is_not_found() {
        let engine = loaded_engine();
        assert_eq!(
            engine.predict(&code("Z")).unwrap_err(),
            SubstitutionError::NotFound(code("Z"))
        );
    }

    #[test]
    fn test_predict_scores_family_and_cross_family_candidates() {
        let engine = loaded_engine();
        let prediction = engine.predict(&code("A")).expect("predict");

        assert_eq!(prediction.product_id, code("A"));
        assert_eq!(prediction.substitutes, vec![code("B"), code("C")]);
        assert_eq!(prediction.confidences[&code("B")], 100.0);
        // price ratio 5 scores nothing, brand + origin + premium = 60, halved
        assert_eq!(prediction.confidences[&code("C")], 30.0);

        let total: f64 = prediction.probabilities.values().sum();
        assert!((total - 100.0).abs() < 1e-9);
        assert!(prediction.probabilities[&code("B")] > prediction.probabilities[&code("C")]);
        assert_eq!(prediction.best().map(|entry| entry.candidate.clone()), Some(code("B")));
    }

    #[test]
    fn test_single_feedback_entry_blends_half_and_half() {
        let engine = loaded_engine();
        let attribute = engine.predict(&code("A")).expect("predict").confidences[&code("C")];

        let receipt = engine.record_outcome(&code("A"), &[code("C")]);
        assert_eq!(receipt, TrainingReceipt { trained: 1, exposure: 1 });

        let prediction = engine.predict(&code("A")).expect("predict");
        assert_eq!(prediction.confidences[&code("C")], 0.5 * 100.0 + 0.5 * attribute);
        assert_eq!(prediction.confidences[&code("B")], 0.5 * 100.0);
    }

    #[test]
    fn test_batch_feedback_saturates_alpha() {
        let engine = loaded_engine();
        let receipt = engine.record_outcome(&code("A"), &[code("C"), code("C")]);
        assert_eq!(receipt.exposure, 2);

        let prediction = engine.predict(&code("A")).expect("predict");
        assert_eq!(prediction.confidences[&code("C")], 100.0);
        assert_eq!(prediction.confidences[&code("B")], 0.0);
        assert_eq!(prediction.best().map(|entry| entry.candidate.clone()), Some(code("C")));
    }

    #[test]
    fn test_failed_reload_keeps_previous_catalog() {
        let engine = loaded_engine();
        let broken = CatalogParser::new()
            .parse_str("code,label,market,segment,category,family,price,origin\n");
        assert!(broken.is_err());

        let mut rows = CatalogParser::new().parse_str(CATALOG).expect("parse");
        rows[1].price = f64::INFINITY;
        assert!(matches!(
            engine.load_catalog(&rows),
            Err(SubstitutionError::CatalogFormat { row: 2, .. })
        ));

        assert_eq!(engine.product_count(), 4);
        assert!(engine.predict(&code("A")).is_ok());
    }

    #[test]
    fn test_clear_catalog_keeps_feedback() {
        let engine = loaded_engine();
        engine.record_outcome(&code("A"), &[code("B")]);
        engine.clear_catalog();

        assert_eq!(engine.catalog_info().count, 0);
        assert_eq!(engine.predict(&code("A")).unwrap_err(), SubstitutionError::EmptyCatalog);
        assert_eq!(engine.exposure(&code("A")), 1);

        engine.reset_feedback();
        assert_eq!(engine.exposure(&code("A")), 0);
    }

    #[test]
    fn test_feedback_for_unknown_codes_is_tolerated() {
        let engine = SubstitutionEngine::new();
        let receipt = engine.record_outcome(&code("ghost"), &[code("other")]);

        assert_eq!(receipt.trained, 1);
        assert_eq!(engine.substitution_count(&code("ghost"), &code("other")), 1);
    }

    #[test]
    fn test_catalog_info_lists_products_by_code() {
        let engine = loaded_engine();
        let info = engine.catalog_info();

        assert_eq!(info.count, 4);
        let codes: Vec<_> = info.products.iter().map(|listing| listing.code.as_str()).collect();
        assert_eq!(codes, vec!["A", "B", "C", "D"]);
        assert_eq!(info.products[0].brand, "1");
    }

    #[test]
    fn test_concurrent_predictions_and_feedback() {
        let engine = Arc::new(loaded_engine());

        let handles: Vec<_> = (0..8)
            .map(|worker| {
                let engine = Arc::clone(&engine);
                thread::spawn(move || {
                    for _ in 0..50 {
                        if worker % 2 == 0 {
                            engine.record_outcome(&code("A"), &[code("B")]);
                        } else {
                            let prediction = engine.predict(&code("A")).expect("predict");
                            assert_eq!(prediction.substitutes.len(), 2);
                        }
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().expect("worker");
        }

        assert_eq!(engine.exposure(&code("A")), 200);
        assert_eq!(engine.substitution_count(&code("A"), &code("B")), 200);
    }
}
