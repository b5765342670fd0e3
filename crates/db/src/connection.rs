use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};

pub type DbPool = sqlx::SqlitePool;

pub async fn connect(database_url: &str) -> Result<DbPool, sqlx::Error> {
    connect_with_settings(database_url, 5, 30).await
}

/// Opens a pool, creating the database file on first use.
pub async fn connect_with_settings(
    database_url: &str,
    max_connections: u32,
    timeout_secs: u64,
) -> Result<DbPool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_secs(5));

    SqlitePoolOptions::new()
        .max_connections(max_connections.max(1))
        .acquire_timeout(Duration::from_secs(timeout_secs.max(1)))
        .connect_with(options)
        .await
}

#[cfg(test)]
mod tests {
    use sqlx::Row;
    use tempfile::TempDir;

    use super::connect_with_settings;

    #[tokio::test]
    async fn connect_creates_missing_database_file() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("fresh.db");
        let url = format!("sqlite://{}", path.display());

        let pool = connect_with_settings(&url, 1, 5).await.expect("connect");
        let value = sqlx::query("SELECT 1 AS value")
            .fetch_one(&pool)
            .await
            .expect("select one")
            .get::<i64, _>("value");

        assert_eq!(value, 1);
        assert!(path.exists());
    }

    #[tokio::test]
    async fn foreign_keys_are_enforced() {
        let pool = connect_with_settings("sqlite::memory:", 1, 5).await.expect("connect");
        let enabled = sqlx::query("PRAGMA foreign_keys")
            .fetch_one(&pool)
            .await
            .expect("pragma")
            .get::<i64, _>(0);

        assert_eq!(enabled, 1);
    }
}
