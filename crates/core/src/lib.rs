pub mod catalog;
pub mod config;
pub mod domain;
pub mod errors;
pub mod substitution;

pub use catalog::{CatalogIndex, CatalogParser, CatalogRow};
pub use domain::product::{ProductCode, ProductListing, ProductRecord};
pub use errors::{ApplicationError, InterfaceError, SubstitutionError};
pub use substitution::{
    CatalogInfo, CatalogSummary, Prediction, ScoreBreakdown, SubstitutionEngine, TrainingReceipt,
};
