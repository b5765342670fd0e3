use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqliteRow, Row};

use pairadox_core::catalog::CatalogRow;
use pairadox_core::domain::product::ProductCode;

use super::{CatalogMetadata, CatalogRepository, CatalogSnapshot, RepositoryError};
use crate::DbPool;

pub struct SqlCatalogRepository {
    pool: DbPool,
}

impl SqlCatalogRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl CatalogRepository for SqlCatalogRepository {
    async fn replace(&self, snapshot: CatalogSnapshot) -> Result<(), RepositoryError> {
        let metadata = &snapshot.metadata;
        let row_count = i64::try_from(metadata.row_count).map_err(|_| {
            RepositoryError::Decode(format!("row count {} exceeds i64", metadata.row_count))
        })?;

        let mut tx = self.pool.begin().await?;

        // rows go with their upload through ON DELETE CASCADE
        sqlx::query("DELETE FROM catalog_upload").execute(&mut *tx).await?;

        sqlx::query(
            "INSERT INTO catalog_upload (id, source_name, row_count, loaded_at)
             VALUES (?, ?, ?, ?)",
        )
        .bind(&metadata.id)
        .bind(&metadata.source_name)
        .bind(row_count)
        .bind(metadata.loaded_at.to_rfc3339())
        .execute(&mut *tx)
        .await?;

        for (position, row) in snapshot.rows.iter().enumerate() {
            sqlx::query(
                "INSERT INTO catalog_row (
                    upload_id,
                    position,
                    code,
                    label,
                    market,
                    segment,
                    category,
                    family,
                    price,
                    origin,
                    premium
                 ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(&metadata.id)
            .bind(position as i64)
            .bind(row.code.as_str())
            .bind(&row.label)
            .bind(&row.market)
            .bind(&row.segment)
            .bind(&row.category)
            .bind(&row.family)
            .bind(row.price)
            .bind(&row.origin)
            .bind(&row.premium)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn latest(&self) -> Result<Option<CatalogSnapshot>, RepositoryError> {
        let Some(metadata) = self.metadata().await? else {
            return Ok(None);
        };

        let rows = sqlx::query(
            "SELECT
                code,
                label,
                market,
                segment,
                category,
                family,
                price,
                origin,
                premium
             FROM catalog_row
             WHERE upload_id = ?
             ORDER BY position ASC",
        )
        .bind(&metadata.id)
        .fetch_all(&self.pool)
        .await?;

        let rows = rows.into_iter().map(catalog_row_from_row).collect::<Result<Vec<_>, _>>()?;
        Ok(Some(CatalogSnapshot { metadata, rows }))
    }

    async fn metadata(&self) -> Result<Option<CatalogMetadata>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, source_name, row_count, loaded_at
             FROM catalog_upload
             ORDER BY loaded_at DESC
             LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?;

        row.map(metadata_from_row).transpose()
    }

    async fn clear(&self) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM catalog_upload").execute(&self.pool).await?;
        Ok(())
    }
}

fn metadata_from_row(row: SqliteRow) -> Result<CatalogMetadata, RepositoryError> {
    let row_count = row.try_get::<i64, _>("row_count")?;

    Ok(CatalogMetadata {
        id: row.try_get("id")?,
        source_name: row.try_get("source_name")?,
        row_count: usize::try_from(row_count).map_err(|_| {
            RepositoryError::Decode(format!(
                "invalid value for `row_count` (expected non-negative): {row_count}"
            ))
        })?,
        loaded_at: parse_timestamp("loaded_at", row.try_get("loaded_at")?)?,
    })
}

fn catalog_row_from_row(row: SqliteRow) -> Result<CatalogRow, RepositoryError> {
    Ok(CatalogRow {
        code: ProductCode(row.try_get("code")?),
        label: row.try_get("label")?,
        market: row.try_get("market")?,
        segment: row.try_get("segment")?,
        category: row.try_get("category")?,
        family: row.try_get("family")?,
        price: row.try_get("price")?,
        origin: row.try_get("origin")?,
        premium: row.try_get("premium")?,
    })
}

fn parse_timestamp(column: &str, value: String) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(&value).map(|timestamp| timestamp.with_timezone(&Utc)).map_err(
        |error| {
            RepositoryError::Decode(format!("invalid timestamp in `{column}`: `{value}` ({error})"))
        },
    )
}
