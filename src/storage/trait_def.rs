use crate::models::{BucketRow, RequestRecord};
use anyhow::Result;
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("database error")]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

#[async_trait]
pub trait Storage: Send + Sync {
    /// Initialize the storage (create tables and indexes)
    async fn init(&self) -> Result<()>;

    /// Replace the batch identified by `ident`: delete every prior record
    /// carrying that ident, then insert `records`, as one transaction.
    /// A failure between the two rolls back; there is no partial state.
    async fn replace_batch(&self, ident: &str, records: &[RequestRecord]) -> StorageResult<()>;

    /// Number of records stored under `ident`
    async fn count_by_ident(&self, ident: &str) -> StorageResult<i64>;

    /// All records stored under `ident`, in insertion order
    async fn records_by_ident(&self, ident: &str) -> StorageResult<Vec<RequestRecord>>;

    /// Bucketed hit counts within `[from_ts, until_ts)` epoch seconds.
    ///
    /// Records group by the STRFTIME key `key_format` applied to their
    /// timestamp; each row carries the bucket's minimum timestamp and its
    /// count, ascending. Buckets without records are absent, not zero.
    async fn bucket_series(
        &self,
        key_format: &str,
        from_ts: i64,
        until_ts: i64,
    ) -> StorageResult<Vec<BucketRow>>;
}
