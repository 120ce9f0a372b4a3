//! Time-bucketed aggregation and chart artifact rendering
//!
//! Each granularity aggregates hits into hour, calendar-day or
//! calendar-month buckets over a backward-looking window and serializes
//! the series as a chart artifact: a named constant bound to a JSON
//! array of `{t, y}` points, directly loadable by the charting view.

use anyhow::{Context, Result};
use chrono::{DateTime, Datelike, Days, Months, NaiveDate, NaiveTime, Utc};
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use tracing::info;

use crate::models::SeriesPoint;
use crate::storage::Storage;

/// Aggregation bucket width
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BucketUnit {
    Hours,
    Days,
    Months,
}

/// Report granularity, one per supported bucket width
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Granularity {
    Hourly,
    Daily,
    Monthly,
}

/// Per-granularity window defaults and bucket unit
#[derive(Debug, Clone, Copy)]
pub struct WindowConfig {
    /// Maximum lookback, a negative offset from now in bucket units
    pub default_from: i64,
    /// Window end offset, exclusive
    pub default_until: i64,
    pub unit: BucketUnit,
}

impl Granularity {
    pub fn window(self) -> WindowConfig {
        match self {
            Granularity::Hourly => WindowConfig {
                default_from: -240,
                default_until: 0,
                unit: BucketUnit::Hours,
            },
            Granularity::Daily => WindowConfig {
                default_from: -180,
                default_until: 0,
                unit: BucketUnit::Days,
            },
            Granularity::Monthly => WindowConfig {
                default_from: -60,
                default_until: 0,
                unit: BucketUnit::Months,
            },
        }
    }

    /// STRFTIME key grouping record timestamps into buckets
    pub fn bucket_key(self) -> &'static str {
        match self {
            Granularity::Hourly => "%Y%m%d%H",
            Granularity::Daily => "%Y%m%d",
            Granularity::Monthly => "%Y%m",
        }
    }

    /// Name of the chart artifact. Each granularity writes its own file;
    /// the name is a per-granularity parameter, never shared.
    pub fn artifact(self) -> &'static str {
        match self {
            Granularity::Hourly => "hourly",
            Granularity::Daily => "daily",
            Granularity::Monthly => "monthly",
        }
    }
}

impl FromStr for Granularity {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "hourly" => Ok(Granularity::Hourly),
            "daily" => Ok(Granularity::Daily),
            "monthly" => Ok(Granularity::Monthly),
            other => Err(anyhow::anyhow!(
                "invalid granularity '{other}', expected hourly, daily or monthly"
            )),
        }
    }
}

/// Clamp a caller-supplied window to a sane backward-looking one.
///
/// Applied in order: a non-negative `from` falls back to the default
/// lookback, a positive `until` falls back to 0, and a window left empty
/// after that (`until <= from`) resets both to the defaults. Degenerate
/// input never errors; it silently becomes a default window.
pub fn clamp_window(cfg: WindowConfig, from: i64, until: i64) -> (i64, i64) {
    let mut from = from;
    let mut until = until;
    if from >= 0 {
        from = cfg.default_from;
    }
    if until > 0 {
        until = 0;
    }
    if until <= from {
        from = cfg.default_from;
        until = cfg.default_until;
    }
    (from, until)
}

/// Epoch-second bounds `[from_ts, until_ts)` for a clamped window.
///
/// Hourly bounds align to whole-hour epoch boundaries of `now` shifted
/// by the offset in hours. Daily and monthly bounds anchor at the
/// calendar start of day / start of month of `now` and shift by calendar
/// days / months, not fixed second multiples.
pub fn window_bounds(
    granularity: Granularity,
    now: DateTime<Utc>,
    from: i64,
    until: i64,
) -> (i64, i64) {
    match granularity.window().unit {
        BucketUnit::Hours => {
            let hour = 3600;
            let f = (now.timestamp() + from * hour).div_euclid(hour) * hour;
            let u = (now.timestamp() + until * hour).div_euclid(hour) * hour;
            (f, u)
        }
        BucketUnit::Days => {
            let today = now.date_naive();
            (
                midnight_ts(shift_days(today, from)),
                midnight_ts(shift_days(today, until)),
            )
        }
        BucketUnit::Months => {
            let month_start = start_of_month(now.date_naive());
            (
                midnight_ts(shift_months(month_start, from)),
                midnight_ts(shift_months(month_start, until)),
            )
        }
    }
}

fn start_of_month(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

fn shift_days(date: NaiveDate, offset: i64) -> NaiveDate {
    if offset >= 0 {
        date.checked_add_days(Days::new(offset as u64))
    } else {
        date.checked_sub_days(Days::new(offset.unsigned_abs()))
    }
    .unwrap_or(date)
}

fn shift_months(date: NaiveDate, offset: i64) -> NaiveDate {
    if offset >= 0 {
        date.checked_add_months(Months::new(offset as u32))
    } else {
        date.checked_sub_months(Months::new(offset.unsigned_abs() as u32))
    }
    .unwrap_or(date)
}

fn midnight_ts(date: NaiveDate) -> i64 {
    date.and_time(NaiveTime::MIN).and_utc().timestamp()
}

/// Render a series as a directly loadable chart artifact: a named
/// constant bound to the JSON point array.
pub fn render_chart(name: &str, points: &[SeriesPoint]) -> String {
    let json = serde_json::to_string(points).unwrap_or_else(|_| "[]".to_string());
    format!("const {name}Chart = {json}")
}

pub struct AggregationEngine {
    storage: Arc<dyn Storage>,
    output_dir: PathBuf,
}

impl AggregationEngine {
    pub fn new(storage: Arc<dyn Storage>, output_dir: PathBuf) -> Self {
        Self {
            storage,
            output_dir,
        }
    }

    /// The bucketed series for `granularity`.
    ///
    /// `from`/`until` are signed offsets from now in the bucket's own
    /// unit, `until` exclusive. Omitted or degenerate offsets fall back
    /// to the granularity's default window. Buckets without records are
    /// omitted; points ascend by timestamp.
    pub async fn series(
        &self,
        granularity: Granularity,
        from: Option<i64>,
        until: Option<i64>,
    ) -> Result<Vec<SeriesPoint>> {
        let cfg = granularity.window();
        let (from, until) = clamp_window(
            cfg,
            from.unwrap_or(cfg.default_from),
            until.unwrap_or(cfg.default_until),
        );
        let (from_ts, until_ts) = window_bounds(granularity, Utc::now(), from, until);

        let rows = self
            .storage
            .bucket_series(granularity.bucket_key(), from_ts, until_ts)
            .await?;

        Ok(rows
            .into_iter()
            .map(|row| SeriesPoint {
                t: row.timestamp_utc * 1000,
                y: row.hits,
            })
            .collect())
    }

    /// Aggregate hits and write the chart artifact for `granularity`.
    ///
    /// Returns the artifact path.
    pub async fn run(
        &self,
        granularity: Granularity,
        from: Option<i64>,
        until: Option<i64>,
    ) -> Result<PathBuf> {
        let series = self.series(granularity, from, until).await?;

        let name = granularity.artifact();
        tokio::fs::create_dir_all(&self.output_dir)
            .await
            .with_context(|| format!("failed to create {}", self.output_dir.display()))?;
        let path = self.output_dir.join(format!("{name}.js"));
        tokio::fs::write(&path, render_chart(name, &series))
            .await
            .with_context(|| format!("failed to write chart artifact {}", path.display()))?;

        info!("wrote {} points to {}", series.len(), path.display());
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fixed_now() -> DateTime<Utc> {
        // 2021-03-15T10:45:30Z
        Utc.with_ymd_and_hms(2021, 3, 15, 10, 45, 30).unwrap()
    }

    #[test]
    fn clamp_replaces_non_negative_from() {
        for granularity in [Granularity::Hourly, Granularity::Daily, Granularity::Monthly] {
            let cfg = granularity.window();
            let (from, until) = clamp_window(cfg, 1, -5);
            assert_eq!(from, cfg.default_from);
            assert_eq!(until, -5);
        }
    }

    #[test]
    fn clamp_replaces_positive_until() {
        let cfg = Granularity::Hourly.window();
        assert_eq!(clamp_window(cfg, -10, 3), (-10, 0));
    }

    #[test]
    fn clamp_resets_empty_window_to_defaults() {
        for granularity in [Granularity::Hourly, Granularity::Daily, Granularity::Monthly] {
            let cfg = granularity.window();
            // until deeper than the default lookback collapses the window
            let (from, until) = clamp_window(cfg, 5, cfg.default_from - 60);
            assert_eq!((from, until), (cfg.default_from, cfg.default_until));
            // inverted input collapses too
            let (from, until) = clamp_window(cfg, -2, -8);
            assert_eq!((from, until), (cfg.default_from, cfg.default_until));
        }
    }

    #[test]
    fn clamp_keeps_valid_window() {
        let cfg = Granularity::Daily.window();
        assert_eq!(clamp_window(cfg, -14, -7), (-14, -7));
        assert_eq!(clamp_window(cfg, -14, 0), (-14, 0));
    }

    #[test]
    fn hourly_bounds_align_to_whole_hours() {
        let (f, u) = window_bounds(Granularity::Hourly, fixed_now(), -2, 0);
        // 10:45:30 floors to 10:00; -2 hours starts at 08:00
        let hour_start = Utc.with_ymd_and_hms(2021, 3, 15, 10, 0, 0).unwrap();
        assert_eq!(u, hour_start.timestamp());
        assert_eq!(f, hour_start.timestamp() - 2 * 3600);
        assert_eq!(f % 3600, 0);
    }

    #[test]
    fn daily_bounds_anchor_at_midnight() {
        let (f, u) = window_bounds(Granularity::Daily, fixed_now(), -7, 0);
        assert_eq!(
            u,
            Utc.with_ymd_and_hms(2021, 3, 15, 0, 0, 0).unwrap().timestamp()
        );
        assert_eq!(
            f,
            Utc.with_ymd_and_hms(2021, 3, 8, 0, 0, 0).unwrap().timestamp()
        );
    }

    #[test]
    fn monthly_bounds_use_calendar_months() {
        let (f, u) = window_bounds(Granularity::Monthly, fixed_now(), -2, 0);
        // calendar months, not 30-day blocks: Jan has 31 days, Feb 28
        assert_eq!(
            f,
            Utc.with_ymd_and_hms(2021, 1, 1, 0, 0, 0).unwrap().timestamp()
        );
        assert_eq!(
            u,
            Utc.with_ymd_and_hms(2021, 3, 1, 0, 0, 0).unwrap().timestamp()
        );
    }

    #[test]
    fn monthly_bounds_cross_year_boundary() {
        let (f, _) = window_bounds(Granularity::Monthly, fixed_now(), -15, 0);
        assert_eq!(
            f,
            Utc.with_ymd_and_hms(2019, 12, 1, 0, 0, 0).unwrap().timestamp()
        );
    }

    #[test]
    fn granularity_keywords_parse() {
        assert_eq!("hourly".parse::<Granularity>().unwrap(), Granularity::Hourly);
        assert_eq!("daily".parse::<Granularity>().unwrap(), Granularity::Daily);
        assert_eq!(
            "monthly".parse::<Granularity>().unwrap(),
            Granularity::Monthly
        );
        assert!("weekly".parse::<Granularity>().is_err());
    }

    #[test]
    fn artifact_names_are_distinct() {
        assert_ne!(
            Granularity::Daily.artifact(),
            Granularity::Monthly.artifact()
        );
    }

    #[test]
    fn render_chart_binds_named_constant() {
        let points = vec![
            SeriesPoint { t: 1000, y: 2 },
            SeriesPoint { t: 2000, y: 5 },
        ];
        assert_eq!(
            render_chart("hourly", &points),
            r#"const hourlyChart = [{"t":1000,"y":2},{"t":2000,"y":5}]"#
        );
        assert_eq!(render_chart("daily", &[]), "const dailyChart = []");
    }
}
