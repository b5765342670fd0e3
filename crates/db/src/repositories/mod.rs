use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use pairadox_core::catalog::CatalogRow;

pub mod catalog;
pub mod memory;

pub use catalog::SqlCatalogRepository;
pub use memory::InMemoryCatalogRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

/// Bookkeeping for one catalog upload.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CatalogMetadata {
    pub id: String,
    pub source_name: String,
    pub row_count: usize,
    pub loaded_at: DateTime<Utc>,
}

/// Catalog rows exactly as uploaded, in upload order.
#[derive(Clone, Debug, PartialEq)]
pub struct CatalogSnapshot {
    pub metadata: CatalogMetadata,
    pub rows: Vec<CatalogRow>,
}

impl CatalogSnapshot {
    pub fn new(source_name: impl Into<String>, rows: Vec<CatalogRow>) -> Self {
        Self {
            metadata: CatalogMetadata {
                id: Uuid::new_v4().to_string(),
                source_name: source_name.into(),
                row_count: rows.len(),
                loaded_at: Utc::now(),
            },
            rows,
        }
    }
}

/// Store for the most recently uploaded catalog. Only one snapshot is retained.
#[async_trait]
pub trait CatalogRepository: Send + Sync {
    /// Replaces any stored snapshot with `snapshot`.
    async fn replace(&self, snapshot: CatalogSnapshot) -> Result<(), RepositoryError>;
    async fn latest(&self) -> Result<Option<CatalogSnapshot>, RepositoryError>;
    async fn metadata(&self) -> Result<Option<CatalogMetadata>, RepositoryError>;
    async fn clear(&self) -> Result<(), RepositoryError>;
}
