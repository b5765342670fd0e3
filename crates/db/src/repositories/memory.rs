use tokio::sync::RwLock;

use super::{CatalogMetadata, CatalogRepository, CatalogSnapshot, RepositoryError};

#[derive(Default)]
pub struct InMemoryCatalogRepository {
    snapshot: RwLock<Option<CatalogSnapshot>>,
}

#[async_trait::async_trait]
impl CatalogRepository for InMemoryCatalogRepository {
    async fn replace(&self, snapshot: CatalogSnapshot) -> Result<(), RepositoryError> {
        *self.snapshot.write().await = Some(snapshot);
        Ok(())
    }

    async fn latest(&self) -> Result<Option<CatalogSnapshot>, RepositoryError> {
        Ok(self.snapshot.read().await.clone())
    }

    async fn metadata(&self) -> Result<Option<CatalogMetadata>, RepositoryError> {
        let snapshot = self.snapshot.read().await;
        Ok(snapshot.as_ref().map(|snapshot| snapshot.metadata.clone()))
    }

    async fn clear(&self) -> Result<(), RepositoryError> {
        *self.snapshot.write().await = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use pairadox_core::catalog::CatalogRow;
    use pairadox_core::domain::product::ProductCode;

    use crate::repositories::{CatalogRepository, CatalogSnapshot, InMemoryCatalogRepository};

    fn row(code: &str) -> CatalogRow {
        CatalogRow {
            code: ProductCode::from(code),
            label: "BRAND 2 tea".to_string(),
            market: "M".to_string(),
            segment: "S".to_string(),
            category: "C".to_string(),
            family: "F".to_string(),
            price: 4.0,
            origin: "CN".to_string(),
            premium: "yes".to_string(),
        }
    }

    #[tokio::test]
    async fn in_memory_catalog_repo_replace_and_clear() {
        let repo = InMemoryCatalogRepository::default();
        assert!(repo.latest().await.expect("latest").is_none());

        let first = CatalogSnapshot::new("first.csv", vec![row("1")]);
        let second = CatalogSnapshot::new("second.csv", vec![row("2"), row("3")]);
        repo.replace(first).await.expect("first");
        repo.replace(second.clone()).await.expect("second");

        assert_eq!(repo.latest().await.expect("latest"), Some(second.clone()));
        assert_eq!(repo.metadata().await.expect("metadata"), Some(second.metadata));

        repo.clear().await.expect("clear");
        assert!(repo.metadata().await.expect("metadata").is_none());
    }
}
