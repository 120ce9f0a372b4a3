//! Data models for log ingestion and aggregation

use serde::{Deserialize, Serialize};

/// One ingested access-log hit
///
/// `ident` is the base name of the imported file and keys the batch:
/// re-importing the same file replaces every record carrying its ident.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct RequestRecord {
    pub ident: String,

    /// Requested resource path/query; empty when the line was malformed
    pub resource: String,

    /// Seconds since epoch, UTC; 0 when the date was unparseable
    pub timestamp_utc: i64,

    /// ISO-like country code, absent when no geo range matched
    pub country: Option<String>,
}

/// One row of the IPv4-range-to-country dataset
///
/// Bounds are inclusive 32-bit integer forms of IPv4 addresses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeoRange {
    pub range_start: u32,
    pub range_end: u32,
    pub country_code: String,
}

/// One GROUP BY row of a bucket query: the bucket's minimum timestamp
/// (epoch seconds) and its hit count
#[derive(Debug, Clone, Copy, sqlx::FromRow)]
pub struct BucketRow {
    pub timestamp_utc: i64,
    pub hits: i64,
}

/// One point of a rendered time series: bucket minimum timestamp in
/// millis and hit count
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeriesPoint {
    pub t: i64,
    pub y: i64,
}
