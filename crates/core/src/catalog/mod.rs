//! Hierarchical product catalog: market → segment → category → family → codes,
//! plus a flat attribute record per product code.

pub mod ingest;
pub mod upload;

use std::collections::{BTreeMap, HashMap};
use std::sync::OnceLock;

use regex::Regex;

use crate::domain::product::{ProductCode, ProductListing, ProductRecord, UNKNOWN_BRAND};
use crate::errors::SubstitutionError;

pub use ingest::{CatalogColumn, CatalogParser, ColumnMap};
pub use upload::{parse_upload, parse_workbook, UploadFormat};

/// Family label → product codes, in row order.
pub type FamilyMap = BTreeMap<String, Vec<ProductCode>>;
pub type CategoryMap = BTreeMap<String, FamilyMap>;
pub type SegmentMap = BTreeMap<String, CategoryMap>;
pub type CatalogTree = BTreeMap<String, SegmentMap>;

/// One catalog line as delivered by the ingestion layer.
#[derive(Clone, Debug, PartialEq)]
pub struct CatalogRow {
    pub code: ProductCode,
    pub label: String,
    pub market: String,
    pub segment: String,
    pub category: String,
    pub family: String,
    pub price: f64,
    pub origin: String,
    pub premium: String,
}

/// Number of positional fields a raw catalog row must carry.
pub const ROW_FIELD_COUNT: usize = 9;

impl CatalogRow {
    /// Builds a row from positional fields ordered
    /// `code, label, market, segment, category, family, price, origin, premium`.
    pub fn from_fields<S: AsRef<str>>(row: usize, fields: &[S]) -> Result<Self, SubstitutionError> {
        if fields.len() < ROW_FIELD_COUNT {
            return Err(SubstitutionError::format(
                row,
                format!("expected {ROW_FIELD_COUNT} fields, found {}", fields.len()),
            ));
        }

        let field = |index: usize| fields[index].as_ref().to_owned();
        Ok(Self {
            code: ProductCode(field(0)),
            label: field(1),
            market: field(2),
            segment: field(3),
            category: field(4),
            family: field(5),
            price: parse_price(row, fields[6].as_ref())?,
            origin: field(7),
            premium: field(8),
        })
    }
}

pub fn parse_price(row: usize, raw: &str) -> Result<f64, SubstitutionError> {
    let trimmed = raw.trim();
    match trimmed.parse::<f64>() {
        Ok(price) if price.is_finite() => Ok(price),
        _ => Err(SubstitutionError::format(row, format!("price `{trimmed}` is not numeric"))),
    }
}

fn brand_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?i)BRAND\s*(\d+)").ok()).as_ref()
}

/// Extracts the digits following `BRAND` in a free-text label, or [`UNKNOWN_BRAND`].
pub fn extract_brand(label: &str) -> String {
    brand_pattern()
        .and_then(|pattern| pattern.captures(label))
        .and_then(|captures| captures.get(1))
        .map(|digits| digits.as_str().to_owned())
        .unwrap_or_else(|| UNKNOWN_BRAND.to_owned())
}

/// Immutable catalog snapshot. A new index is built in full and then swapped in;
/// it is never edited in place.
#[derive(Clone, Debug, Default)]
pub struct CatalogIndex {
    tree: CatalogTree,
    records: HashMap<ProductCode, ProductRecord>,
    row_count: usize,
}

impl CatalogIndex {
    pub fn build(rows: &[CatalogRow]) -> Result<Self, SubstitutionError> {
        let mut index = Self::default();

        for (position, row) in rows.iter().enumerate() {
            if !row.price.is_finite() {
                return Err(SubstitutionError::format(
                    position + 1,
                    format!("price `{}` is not numeric", row.price),
                ));
            }

            index
                .tree
                .entry(row.market.clone())
                .or_default()
                .entry(row.segment.clone())
                .or_default()
                .entry(row.category.clone())
                .or_default()
                .entry(row.family.clone())
                .or_default()
                .push(row.code.clone());

            index.records.insert(
                row.code.clone(),
                ProductRecord {
                    code: row.code.clone(),
                    label: row.label.clone(),
                    market: row.market.clone(),
                    segment: row.segment.clone(),
                    category: row.category.clone(),
                    family: row.family.clone(),
                    brand: extract_brand(&row.label),
                    price: row.price,
                    origin: row.origin.clone(),
                    premium: row.premium.clone(),
                },
            );
        }

        index.row_count = rows.len();
        Ok(index)
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Distinct product codes.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Rows the index was built from, duplicates included.
    pub fn row_count(&self) -> usize {
        self.row_count
    }

    pub fn get(&self, code: &ProductCode) -> Option<&ProductRecord> {
        self.records.get(code)
    }

    pub fn lookup(&self, code: &ProductCode) -> Result<&ProductRecord, SubstitutionError> {
        self.get(code).ok_or_else(|| SubstitutionError::NotFound(code.clone()))
    }

    pub fn tree(&self) -> &CatalogTree {
        &self.tree
    }

    /// Families sharing the given record's market, segment and category.
    pub fn families_of(&self, record: &ProductRecord) -> Option<&FamilyMap> {
        self.tree.get(&record.market)?.get(&record.segment)?.get(&record.category)
    }

    /// Listing of every product ordered by code.
    pub fn listings(&self) -> Vec<ProductListing> {
        let mut listings: Vec<ProductListing> =
            self.records.values().map(ProductListing::from).collect();
        listings.sort_by(|a, b| a.code.cmp(&b.code));
        listings
    }
}
