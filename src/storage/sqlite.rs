use crate::models::{BucketRow, RequestRecord};
use crate::storage::{Storage, StorageResult};
use anyhow::Result;
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;
use std::sync::Arc;

pub struct SqliteStorage {
    pool: Arc<SqlitePool>,
}

impl SqliteStorage {
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;
        Ok(Self {
            pool: Arc::new(pool),
        })
    }
}

#[async_trait]
impl Storage for SqliteStorage {
    async fn init(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS request (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                ident TEXT NOT NULL,
                resource TEXT NOT NULL,
                timestamp_utc INTEGER NOT NULL,
                country TEXT
            )
            "#,
        )
        .execute(self.pool.as_ref())
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_request_ident ON request(ident)")
            .execute(self.pool.as_ref())
            .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_request_timestamp ON request(timestamp_utc)")
            .execute(self.pool.as_ref())
            .await?;

        Ok(())
    }

    async fn replace_batch(&self, ident: &str, records: &[RequestRecord]) -> StorageResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM request WHERE ident = ?")
            .bind(ident)
            .execute(&mut *tx)
            .await?;

        for record in records {
            sqlx::query(
                "INSERT INTO request (ident, resource, timestamp_utc, country) VALUES (?, ?, ?, ?)",
            )
            .bind(&record.ident)
            .bind(&record.resource)
            .bind(record.timestamp_utc)
            .bind(&record.country)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn count_by_ident(&self, ident: &str) -> StorageResult<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM request WHERE ident = ?")
            .bind(ident)
            .fetch_one(self.pool.as_ref())
            .await?;

        Ok(count)
    }

    async fn records_by_ident(&self, ident: &str) -> StorageResult<Vec<RequestRecord>> {
        let records = sqlx::query_as::<_, RequestRecord>(
            r#"
            SELECT ident, resource, timestamp_utc, country
            FROM request
            WHERE ident = ?
            ORDER BY id
            "#,
        )
        .bind(ident)
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(records)
    }

    async fn bucket_series(
        &self,
        key_format: &str,
        from_ts: i64,
        until_ts: i64,
    ) -> StorageResult<Vec<BucketRow>> {
        let rows = sqlx::query_as::<_, BucketRow>(
            r#"
            SELECT
                MIN(timestamp_utc) AS timestamp_utc,
                COUNT(*) AS hits
            FROM request
            WHERE timestamp_utc >= ? AND timestamp_utc < ?
            GROUP BY STRFTIME(?, DATETIME(timestamp_utc, 'unixepoch'))
            ORDER BY 1
            "#,
        )
        .bind(from_ts)
        .bind(until_ts)
        .bind(key_format)
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(rows)
    }
}
