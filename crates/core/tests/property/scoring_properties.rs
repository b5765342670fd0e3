use std::collections::BTreeMap;

use pairadox_core::catalog::{CatalogIndex, CatalogRow};
use pairadox_core::domain::product::{ProductCode, ProductRecord};
use pairadox_core::substitution::{
    blend, blend_alpha, generate_candidates, price_score, softmax_percentages, AttributeScores,
    SubstitutionEngine, SOFTMAX_TEMPERATURE,
};
use proptest::prelude::*;

fn make_record(code: &str, family: &str, brand: &str, price: f64, origin: &str, premium: &str) -> ProductRecord {
    ProductRecord {
        code: ProductCode::from(code),
        label: format!("BRAND {brand}"),
        market: "M".to_string(),
        segment: "S".to_string(),
        category: "C".to_string(),
        family: family.to_string(),
        brand: brand.to_string(),
        price,
        origin: origin.to_string(),
        premium: premium.to_string(),
    }
}

fn arb_row() -> impl Strategy<Value = CatalogRow> {
    (0u8..12, 0u8..3, 0u8..3, 0u8..3, 1u32..1000).prop_map(|(code, family, brand, category, price)| {
        CatalogRow {
            code: ProductCode::new(format!("P{code:02}")),
            label: format!("Item BRAND {brand}"),
            market: "M".to_string(),
            segment: "S".to_string(),
            category: format!("C{category}"),
            family: format!("F{family}"),
            price: f64::from(price),
            origin: "RO".to_string(),
            premium: "no".to_string(),
        }
    })
}

proptest! {
    #[test]
    fn price_score_peaks_at_parity(base in 0.01f64..1_000_000.0) {
        prop_assert!((price_score(base, base) - 40.0).abs() < 1e-9);
        prop_assert_eq!(price_score(base, base * 0.25), 0.0);
        prop_assert_eq!(price_score(base, base * 2.0), 0.0);
    }

    #[test]
    fn price_score_stays_in_range(base in 0.01f64..10_000.0, candidate in 0.0f64..50_000.0) {
        let score = price_score(base, candidate);
        prop_assert!((0.0..=40.0).contains(&score));
    }

    #[test]
    fn price_score_is_continuous_at_parity(base in 1.0f64..10_000.0, epsilon in 1e-9f64..1e-6) {
        let below = price_score(base, base * (1.0 - epsilon));
        let above = price_score(base, base * (1.0 + epsilon));
        prop_assert!((below - 40.0).abs() < 1e-3);
        prop_assert!((above - 40.0).abs() < 1e-3);
    }

    #[test]
    fn categorical_scores_are_symmetric(
        brand_a in "[0-3]",
        brand_b in "[0-3]",
        origin_a in "RO|IT",
        origin_b in "RO|IT",
        premium_a in "yes|no",
        premium_b in "yes|no",
        price_a in 1.0f64..500.0,
        price_b in 1.0f64..500.0,
    ) {
        let a = make_record("A", "F1", &brand_a, price_a, &origin_a, &premium_a);
        let b = make_record("B", "F2", &brand_b, price_b, &origin_b, &premium_b);
        let forward = AttributeScores::between(&a, &b);
        let backward = AttributeScores::between(&b, &a);

        prop_assert_eq!(forward.brand, backward.brand);
        prop_assert_eq!(forward.origin, backward.origin);
        prop_assert_eq!(forward.premium, backward.premium);
        prop_assert!((0.0..=100.0).contains(&forward.raw_total()));
    }

    #[test]
    fn zero_exposure_keeps_attribute_confidence(attribute in 0.0f64..=100.0, empirical in prop_oneof![Just(0.0), Just(100.0)]) {
        prop_assert_eq!(blend(attribute, empirical, blend_alpha(0)), attribute);
    }

    #[test]
    fn alpha_saturates_after_second_entry(exposure in 2u64..10_000) {
        prop_assert_eq!(blend_alpha(1), 0.5);
        prop_assert_eq!(blend_alpha(exposure), 1.0);
    }

    #[test]
    fn softmax_sums_to_one_hundred(scores in prop::collection::vec(0.0f64..=100.0, 1..40)) {
        let confidences: BTreeMap<usize, f64> = scores.into_iter().enumerate().collect();
        let probabilities = softmax_percentages(&confidences, SOFTMAX_TEMPERATURE);

        prop_assert_eq!(probabilities.len(), confidences.len());
        let total: f64 = probabilities.values().sum();
        prop_assert!((total - 100.0).abs() < 1e-6);
        for value in probabilities.values() {
            prop_assert!((0.0..=100.0).contains(value));
        }
    }

    #[test]
    fn candidates_exclude_source_and_are_sorted(rows in prop::collection::vec(arb_row(), 1..30)) {
        let index = CatalogIndex::build(&rows).expect("finite prices");
        for row in &rows {
            let candidates = generate_candidates(&index, &row.code).expect("known code");
            prop_assert!(!candidates.contains(&row.code));
            prop_assert!(candidates.windows(2).all(|pair| pair[0] < pair[1]));
        }
    }

    #[test]
    fn predictions_are_bounded(rows in prop::collection::vec(arb_row(), 1..30), trained in 0usize..3) {
        let engine = SubstitutionEngine::new();
        engine.load_catalog(&rows).expect("load");
        let source = rows[0].code.clone();
        let substitutes: Vec<ProductCode> = rows.iter().take(trained).map(|row| row.code.clone()).collect();
        engine.record_outcome(&source, &substitutes);

        let prediction = engine.predict(&source).expect("predict");
        for confidence in prediction.confidences.values() {
            prop_assert!((0.0..=100.0).contains(confidence));
        }
        if !prediction.substitutes.is_empty() {
            let total: f64 = prediction.probabilities.values().sum();
            prop_assert!((total - 100.0).abs() < 1e-6);
        }
    }
}
