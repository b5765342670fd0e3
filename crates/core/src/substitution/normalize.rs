use std::collections::BTreeMap;

/// Softmax over `confidence / temperature`, scaled to percentages.
///
/// Exponents are shifted by the largest confidence before `exp`, which leaves the
/// distribution unchanged and keeps large scores from overflowing.
pub fn softmax_percentages<K>(confidences: &BTreeMap<K, f64>, temperature: f64) -> BTreeMap<K, f64>
where
    K: Ord + Clone,
{
    let Some(max) = confidences.values().copied().reduce(f64::max) else {
        return BTreeMap::new();
    };

    let exps: BTreeMap<K, f64> = confidences
        .iter()
        .map(|(key, score)| (key.clone(), ((score - max) / temperature).exp()))
        .collect();
    let total: f64 = exps.values().sum();

    exps.into_iter()
        .map(|(key, value)| {
            let probability = if total > 0.0 { value / total * 100.0 } else { 0.0 };
            (key, probability)
        })
        .collect()
}
