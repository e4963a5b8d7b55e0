//! Aegis Historian Store
//!
//! Per-tag ordered sample storage. Runs every write through the compressor,
//! enforces the global capacity limit by evicting the oldest samples across
//! all tags and serves range and tail queries.
//!
//! Samples for a tag are keyed by timestamp, so an exact timestamp collision
//! replaces the stored sample (last write wins).
//!
//! @version 0.1.0
//! @author AutomataNexus Development Team

use crate::compression::{CompressionDecision, CompressionState, Compressor};
use crate::query::{QueryExecutor, QueryResult, TimeSeriesQuery};
use crate::types::{DataPoint, Tag};
use chrono::{DateTime, Utc};
use parking_lot::{RwLock, RwLockWriteGuard};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

// =============================================================================
// Store Configuration
// =============================================================================

/// Configuration for the time series store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Global sample limit across all tags.
    pub max_data_points: usize,
    pub default_max_results: usize,
    pub max_results_cap: usize,
    pub max_recent: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            max_data_points: 1_000_000,
            default_max_results: crate::query::DEFAULT_MAX_RESULTS,
            max_results_cap: crate::query::MAX_RESULTS_CAP,
            max_recent: crate::query::MAX_RECENT,
        }
    }
}

// =============================================================================
// Write Outcome
// =============================================================================

/// What happened to an accepted sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WriteOutcome {
    /// Stored as a new sample.
    Stored,
    /// Replaced a sample with the identical timestamp.
    Replaced,
    /// Discarded by the compressor as redundant.
    Compressed,
}

impl WriteOutcome {
    pub fn was_stored(&self) -> bool {
        !matches!(self, WriteOutcome::Compressed)
    }
}

// =============================================================================
// Store Statistics
// =============================================================================

/// Counters describing store activity.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StoreStats {
    pub total_points: usize,
    pub tag_count: usize,
    pub points_received: u64,
    pub points_stored: u64,
    pub points_replaced: u64,
    pub points_compressed: u64,
    pub points_evicted_capacity: u64,
    pub points_purged_retention: u64,
    pub writes_failed: u64,
    pub bad_quality_points: u64,
}

impl StoreStats {
    /// Received samples per retained sample; 1.0 when nothing was discarded.
    pub fn compression_ratio(&self) -> f64 {
        let kept = self.points_stored + self.points_replaced;
        if kept == 0 {
            return 1.0;
        }
        self.points_received as f64 / kept as f64
    }
}

// =============================================================================
// Series Buffer
// =============================================================================

/// Samples and compression state for a single tag.
struct SeriesBuffer {
    points: BTreeMap<DateTime<Utc>, DataPoint>,
    compression: CompressionState,
}

impl SeriesBuffer {
    fn new() -> Self {
        Self {
            points: BTreeMap::new(),
            compression: CompressionState::new(),
        }
    }

    fn range(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Vec<DataPoint> {
        if start > end {
            return Vec::new();
        }
        self.points.range(start..=end).map(|(_, p)| p.clone()).collect()
    }

    fn oldest(&self) -> Option<DateTime<Utc>> {
        self.points.keys().next().copied()
    }
}

struct StoreInner {
    series: HashMap<String, SeriesBuffer>,
    total_points: usize,
    stats: StoreStats,
}

// =============================================================================
// Time Series Store
// =============================================================================

/// In-memory sample store guarded by a single reader/writer lock.
pub struct TimeSeriesStore {
    config: StoreConfig,
    compressor: Compressor,
    inner: RwLock<StoreInner>,
}

impl TimeSeriesStore {
    /// Create a store with default configuration.
    pub fn new() -> Self {
        Self::with_config(StoreConfig::default())
    }

    /// Create a store with custom configuration.
    ///
    /// # Panics
    ///
    /// Panics if `max_data_points` is zero; capacity eviction could never
    /// make room.
    pub fn with_config(config: StoreConfig) -> Self {
        assert!(config.max_data_points > 0, "max_data_points must be at least 1");
        Self {
            config,
            compressor: Compressor::new(),
            inner: RwLock::new(StoreInner {
                series: HashMap::new(),
                total_points: 0,
                stats: StoreStats::default(),
            }),
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Acquire the write lock for a sequence of inserts.
    ///
    /// Batches hold one guard for the whole batch so every sample gets an
    /// outcome even while other writers contend for the store.
    pub fn writer(&self) -> StoreWriter<'_> {
        StoreWriter {
            config: &self.config,
            compressor: &self.compressor,
            inner: self.inner.write(),
        }
    }

    /// Insert a single validated sample.
    pub fn insert(&self, tag: &Tag, point: DataPoint) -> WriteOutcome {
        self.writer().insert(tag, point)
    }

    // -------------------------------------------------------------------------
    // Reads
    // -------------------------------------------------------------------------

    /// All samples of a tag in `[start, end]`, ascending, without limits.
    pub fn range(&self, tag_name: &str, start: DateTime<Utc>, end: DateTime<Utc>) -> Vec<DataPoint> {
        let inner = self.inner.read();
        inner
            .series
            .get(tag_name)
            .map(|buffer| buffer.range(start, end))
            .unwrap_or_default()
    }

    /// Execute a range query. Unknown tags yield empty series.
    pub fn query(&self, query: &TimeSeriesQuery) -> QueryResult {
        let limit = query.effective_limit(self.config.default_max_results, self.config.max_results_cap);

        let ranges: Vec<(String, Vec<DataPoint>)> = {
            let inner = self.inner.read();
            query
                .tag_names
                .iter()
                .map(|name| {
                    let points = inner
                        .series
                        .get(name)
                        .map(|buffer| buffer.range(query.start, query.end))
                        .unwrap_or_default();
                    (name.clone(), points)
                })
                .collect()
        };

        QueryExecutor::execute(query, ranges, limit)
    }

    /// Latest `count` samples of a tag, newest first. Capped at `max_recent`.
    pub fn recent(&self, tag_name: &str, count: usize) -> Vec<DataPoint> {
        let count = count.min(self.config.max_recent);
        let inner = self.inner.read();
        inner
            .series
            .get(tag_name)
            .map(|buffer| buffer.points.values().rev().take(count).cloned().collect())
            .unwrap_or_default()
    }

    /// Number of stored samples for a tag.
    pub fn point_count(&self, tag_name: &str) -> usize {
        let inner = self.inner.read();
        inner.series.get(tag_name).map_or(0, |b| b.points.len())
    }

    /// Number of stored samples across all tags.
    pub fn total_points(&self) -> usize {
        self.inner.read().total_points
    }

    /// Oldest stored timestamp per tag.
    pub fn oldest_timestamps(&self) -> Vec<(String, DateTime<Utc>)> {
        let inner = self.inner.read();
        inner
            .series
            .iter()
            .filter_map(|(name, buffer)| buffer.oldest().map(|ts| (name.clone(), ts)))
            .collect()
    }

    // -------------------------------------------------------------------------
    // Maintenance
    // -------------------------------------------------------------------------

    /// Remove every sample older than `cutoff` for a tag.
    pub fn purge_before(&self, tag_name: &str, cutoff: DateTime<Utc>) -> usize {
        let mut inner = self.inner.write();
        let removed = match inner.series.get_mut(tag_name) {
            Some(buffer) => {
                let kept = buffer.points.split_off(&cutoff);
                let removed = buffer.points.len();
                buffer.points = kept;
                removed
            }
            None => 0,
        };

        inner.total_points -= removed;
        inner.stats.points_purged_retention += removed as u64;
        removed
    }

    /// Drop a tag's samples and compression state.
    pub fn remove_tag(&self, tag_name: &str) -> usize {
        let mut inner = self.inner.write();
        let removed = inner
            .series
            .remove(tag_name)
            .map_or(0, |buffer| buffer.points.len());
        inner.total_points -= removed;
        removed
    }

    /// Forget the compression reference of a tag.
    pub fn reset_compression(&self, tag_name: &str) {
        let mut inner = self.inner.write();
        if let Some(buffer) = inner.series.get_mut(tag_name) {
            buffer.compression.reset();
        }
    }

    /// Clear all samples and statistics.
    pub fn reset(&self) {
        let mut inner = self.inner.write();
        inner.series.clear();
        inner.total_points = 0;
        inner.stats = StoreStats::default();
    }

    /// Snapshot of the store counters.
    pub fn stats(&self) -> StoreStats {
        let inner = self.inner.read();
        let mut stats = inner.stats.clone();
        stats.total_points = inner.total_points;
        stats.tag_count = inner.series.len();
        stats
    }
}

impl Default for TimeSeriesStore {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Store Writer
// =============================================================================

/// Exclusive write access to the store.
pub struct StoreWriter<'a> {
    config: &'a StoreConfig,
    compressor: &'a Compressor,
    inner: RwLockWriteGuard<'a, StoreInner>,
}

impl StoreWriter<'_> {
    /// Insert a sample that has already been validated against its tag.
    pub fn insert(&mut self, tag: &Tag, point: DataPoint) -> WriteOutcome {
        let inner = &mut *self.inner;
        inner.stats.points_received += 1;
        if point.quality < tag.quality_threshold {
            inner.stats.bad_quality_points += 1;
        }

        let decision = {
            let buffer = inner
                .series
                .entry(point.tag_name.clone())
                .or_insert_with(SeriesBuffer::new);
            self.compressor.process(tag, &mut buffer.compression, &point)
        };

        if decision == CompressionDecision::Discard {
            inner.stats.points_compressed += 1;
            tracing::trace!(tag = %tag.name, "sample compressed away");
            return WriteOutcome::Compressed;
        }

        let replaces = inner
            .series
            .get(&point.tag_name)
            .map_or(false, |b| b.points.contains_key(&point.timestamp));

        if replaces {
            if let Some(buffer) = inner.series.get_mut(&point.tag_name) {
                buffer.points.insert(point.timestamp, point);
            }
            inner.stats.points_replaced += 1;
            return WriteOutcome::Replaced;
        }

        while inner.total_points >= self.config.max_data_points {
            Self::evict_oldest(inner);
        }

        inner
            .series
            .entry(point.tag_name.clone())
            .or_insert_with(SeriesBuffer::new)
            .points
            .insert(point.timestamp, point);
        inner.total_points += 1;
        inner.stats.points_stored += 1;
        WriteOutcome::Stored
    }

    /// Count a sample rejected before reaching the store.
    pub fn record_failure(&mut self) {
        self.inner.stats.writes_failed += 1;
    }

    fn evict_oldest(inner: &mut StoreInner) {
        let oldest_tag = inner
            .series
            .iter()
            .filter_map(|(name, buffer)| buffer.oldest().map(|ts| (ts, name.clone())))
            .min()
            .map(|(_, name)| name);

        let Some(tag_name) = oldest_tag else {
            panic!(
                "capacity eviction on an empty store (total_points = {})",
                inner.total_points
            );
        };

        if let Some(buffer) = inner.series.get_mut(&tag_name) {
            if let Some(ts) = buffer.oldest() {
                buffer.points.remove(&ts);
                inner.total_points -= 1;
                inner.stats.points_evicted_capacity += 1;
                tracing::warn!(tag = %tag_name, timestamp = %ts, "store at capacity, evicted oldest sample");
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
