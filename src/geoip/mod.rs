//! IPv4-range-to-country lookup table
//!
//! Loads the `ip_range_start,ip_range_end,country_code` dataset once into
//! an in-memory range list and answers point-in-range lookups. The table
//! is immutable after loading and owned for the process lifetime.
//!
//! Enrichment is best-effort: when the dataset is unreadable, callers
//! keep an empty table and every lookup misses instead of the import
//! aborting.

use std::path::Path;
use thiserror::Error;
use tracing::warn;

use crate::models::GeoRange;

#[derive(Debug, Error)]
pub enum GeoError {
    #[error("geo dataset unavailable")]
    ResourceUnavailable(#[from] std::io::Error),
}

/// In-memory country-assignment table
#[derive(Debug, Default)]
pub struct GeoRangeTable {
    ranges: Vec<GeoRange>,
}

impl GeoRangeTable {
    /// Table with no ranges; every lookup misses
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a table directly from ranges, in the given order
    pub fn from_ranges(ranges: Vec<GeoRange>) -> Self {
        Self { ranges }
    }

    /// Load the dataset from `path`.
    ///
    /// Rows that fail numeric parsing are skipped with a warning; an
    /// unreadable resource is a [`GeoError::ResourceUnavailable`].
    pub async fn load(path: &Path) -> Result<Self, GeoError> {
        let data = tokio::fs::read_to_string(path).await?;

        let mut ranges = Vec::new();
        for (lineno, line) in data.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match parse_row(line) {
                Some(range) => ranges.push(range),
                None => warn!("skipping malformed geo range at line {}", lineno + 1),
            }
        }

        Ok(Self { ranges })
    }

    /// Country code of the first range satisfying
    /// `range_start <= addr <= range_end`, if any.
    ///
    /// Ranges are assumed non-overlapping; if that is ever violated the
    /// first match in dataset order wins.
    pub fn lookup(&self, addr: u32) -> Option<&str> {
        self.ranges
            .iter()
            .find(|r| r.range_start <= addr && addr <= r.range_end)
            .map(|r| r.country_code.as_str())
    }

    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }
}

fn parse_row(line: &str) -> Option<GeoRange> {
    let mut cols = line.split(',');
    let range_start = cols.next()?.trim().parse().ok()?;
    let range_end = cols.next()?.trim().parse().ok()?;
    let country_code = cols.next()?.trim();
    if country_code.is_empty() {
        return None;
    }
    Some(GeoRange {
        range_start,
        range_end,
        country_code: country_code.to_string(),
    })
}
