use std::collections::BTreeSet;

use crate::catalog::CatalogIndex;
use crate::domain::product::ProductCode;

use super::SubstitutionResult;

/// Substitute candidates for `source`, ascending by code and without duplicates.
///
/// Every other product of the source's family qualifies, as does every product of a
/// different family in the same market/segment/category that carries the same brand.
pub fn generate_candidates(
    index: &CatalogIndex,
    source: &ProductCode,
) -> SubstitutionResult<Vec<ProductCode>> {
    let record = index.lookup(source)?;
    let Some(families) = index.families_of(record) else {
        return Ok(Vec::new());
    };

    let mut candidates = BTreeSet::new();
    for (family, codes) in families {
        let same_family = *family == record.family;
        for code in codes {
            if code == source {
                continue;
            }
            let eligible = same_family
                || index.get(code).is_some_and(|candidate| candidate.brand == record.brand);
            if eligible {
                candidates.insert(code.clone());
            }
        }
    }

    Ok(candidates.into_iter().collect())
}
