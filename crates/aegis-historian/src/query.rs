//! Aegis Historian Query
//!
//! Range and tail query definitions plus the executor that applies quality
//! filtering and result limits to raw ranges pulled from the store.
//!
//! @version 0.1.0
//! @author AutomataNexus Development Team

use crate::types::{DataPoint, Quality};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Default number of samples returned per tag.
pub const DEFAULT_MAX_RESULTS: usize = 1000;

/// Hard upper bound on samples returned per tag regardless of the request.
pub const MAX_RESULTS_CAP: usize = 1000;

/// Hard upper bound on a tail query.
pub const MAX_RECENT: usize = 100;

// =============================================================================
// Time Series Query
// =============================================================================

/// A range query over one or more tags. Both bounds are inclusive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeSeriesQuery {
    pub tag_names: Vec<String>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub max_results: Option<usize>,
    pub quality_filter: Option<Quality>,
}

impl TimeSeriesQuery {
    /// Create a new query over the given tags.
    pub fn new<I, S>(tag_names: I, start: DateTime<Utc>, end: DateTime<Utc>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            tag_names: tag_names.into_iter().map(Into::into).collect(),
            start,
            end,
            max_results: None,
            quality_filter: None,
        }
    }

    /// Query a single tag over the last `duration`.
    pub fn last(tag_name: impl Into<String>, duration: Duration) -> Self {
        let end = Utc::now();
        let start = end - duration;
        Self::new([tag_name.into()], start, end)
    }

    /// Limit the number of samples per tag.
    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = Some(max_results);
        self
    }

    /// Only return samples at or above this quality.
    pub fn with_quality_filter(mut self, quality: Quality) -> Self {
        self.quality_filter = Some(quality);
        self
    }

    /// Get the time range duration.
    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    /// Effective per-tag limit after applying the default and the hard cap.
    pub fn effective_limit(&self, default_limit: usize, cap: usize) -> usize {
        self.max_results.unwrap_or(default_limit).min(cap)
    }
}

// =============================================================================
// Query Result
// =============================================================================

/// Samples returned for one tag.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TagSeries {
    pub tag_name: String,
    pub points: Vec<DataPoint>,
    pub truncated: bool,
}

/// Result of a range query.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct QueryResult {
    pub series: Vec<TagSeries>,
    pub query_time_ms: u64,
    pub points_scanned: usize,
    pub points_returned: usize,
}

impl QueryResult {
    pub fn empty() -> Self {
        Self {
            series: Vec::new(),
            query_time_ms: 0,
            points_scanned: 0,
            points_returned: 0,
        }
    }

    /// Get total number of data points.
    pub fn total_points(&self) -> usize {
        self.series.iter().map(|s| s.points.len()).sum()
    }

    /// Check if the result is empty.
    pub fn is_empty(&self) -> bool {
        self.total_points() == 0
    }

    /// Samples returned for a tag, if it was part of the query.
    pub fn points_for(&self, tag_name: &str) -> Option<&[DataPoint]> {
        self.series
            .iter()
            .find(|s| s.tag_name == tag_name)
            .map(|s| s.points.as_slice())
    }
}

// =============================================================================
// Query Executor
// =============================================================================

/// Applies filtering and limits to raw per-tag ranges.
pub struct QueryExecutor;

impl QueryExecutor {
    /// Execute a query against raw ranges, one entry per requested tag in
    /// request order. Raw ranges must already be sorted ascending.
    pub fn execute(
        query: &TimeSeriesQuery,
        ranges: Vec<(String, Vec<DataPoint>)>,
        limit: usize,
    ) -> QueryResult {
        let start_time = std::time::Instant::now();
        let mut points_scanned = 0;

        let series: Vec<TagSeries> = ranges
            .into_iter()
            .map(|(tag_name, points)| {
                points_scanned += points.len();

                let mut filtered: Vec<DataPoint> = points
                    .into_iter()
                    .filter(|p| p.timestamp >= query.start && p.timestamp <= query.end)
                    .filter(|p| query.quality_filter.map_or(true, |q| p.quality >= q))
                    .collect();

                let truncated = filtered.len() > limit;
                filtered.truncate(limit);

                TagSeries {
                    tag_name,
                    points: filtered,
                    truncated,
                }
            })
            .collect();

        let points_returned = series.iter().map(|s| s.points.len()).sum();

        QueryResult {
            series,
            query_time_ms: start_time.elapsed().as_millis() as u64,
            points_scanned,
            points_returned,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
