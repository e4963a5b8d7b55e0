//! Aegis Historian Engine
//!
//! Facade that coordinates the tag registry, the sample store, retention
//! and aggregation. Every caller (HTTP handlers, scenario loaders) goes
//! through this type.
//!
//! @version 0.1.0
//! @author AutomataNexus Development Team

use crate::aggregation::{AggregateResult, AggregationEngine, AggregationType, DEFAULT_MAX_BUCKETS};
use crate::query::{QueryResult, TimeSeriesQuery};
use crate::registry::TagRegistry;
use crate::retention::{RetentionManager, RetentionResult};
use crate::store::{StoreConfig, StoreStats, StoreWriter, TimeSeriesStore, WriteOutcome};
use crate::types::{DataPoint, Quality, Tag, TagFilter, TagPatch, TagValue};
use aegis_common::{HistorianError, Result};
use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

// =============================================================================
// Engine Configuration
// =============================================================================

/// Configuration for the historian engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub store: StoreConfig,
    pub max_buckets: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            store: StoreConfig::default(),
            max_buckets: DEFAULT_MAX_BUCKETS,
        }
    }
}

// =============================================================================
// Write Types
// =============================================================================

/// A sample as submitted by a client, before validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PointWrite {
    pub tag_name: String,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default = "null_value")]
    pub value: TagValue,
    #[serde(default)]
    pub quality: Option<i64>,
}

fn null_value() -> TagValue {
    TagValue::Null
}

impl PointWrite {
    pub fn new(tag_name: impl Into<String>, timestamp: DateTime<Utc>, value: impl Into<TagValue>) -> Self {
        Self {
            tag_name: tag_name.into(),
            timestamp: Some(timestamp),
            value: value.into(),
            quality: None,
        }
    }

    pub fn with_quality(mut self, quality: i64) -> Self {
        self.quality = Some(quality);
        self
    }
}

impl From<DataPoint> for PointWrite {
    fn from(point: DataPoint) -> Self {
        Self {
            tag_name: point.tag_name,
            timestamp: Some(point.timestamp),
            value: point.value,
            quality: Some(point.quality.value() as i64),
        }
    }
}

/// Why a single point in a batch was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WriteErrorKind {
    TagNotFound,
    TagInactive,
    InvalidValue,
}

/// Per-point failure in a batch write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PointError {
    pub index: usize,
    pub tag_name: String,
    pub reason: WriteErrorKind,
    pub message: String,
}

/// Outcome of a batch write. Never fails as a whole.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct BatchWriteResult {
    /// Points accepted, whether stored or compressed away.
    pub points_written: usize,
    pub points_stored: usize,
    pub points_compressed: usize,
    pub points_failed: usize,
    pub errors: Vec<PointError>,
}

impl BatchWriteResult {
    pub fn is_complete(&self) -> bool {
        self.points_failed == 0
    }

    fn record(&mut self, index: usize, tag_name: &str, outcome: Result<WriteOutcome>) {
        match outcome {
            Ok(outcome) => {
                self.points_written += 1;
                if outcome.was_stored() {
                    self.points_stored += 1;
                } else {
                    self.points_compressed += 1;
                }
            }
            Err(err) => {
                let reason = match err {
                    HistorianError::TagNotFound(_) => WriteErrorKind::TagNotFound,
                    HistorianError::TagInactive(_) => WriteErrorKind::TagInactive,
                    _ => WriteErrorKind::InvalidValue,
                };
                self.points_failed += 1;
                self.errors.push(PointError {
                    index,
                    tag_name: tag_name.to_string(),
                    reason,
                    message: err.to_string(),
                });
            }
        }
    }
}

// =============================================================================
// Engine Statistics
// =============================================================================

/// Statistics for the historian engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct EngineStats {
    pub tag_count: usize,
    pub active_tags: usize,
    pub store: StoreStats,
    pub compression_ratio: f64,
    pub queries_executed: u64,
    pub aggregations_executed: u64,
    pub last_retention: Option<RetentionResult>,
}

// =============================================================================
// Historian Engine
// =============================================================================

/// The historian: tags, samples, retention and aggregation.
pub struct HistorianEngine {
    registry: TagRegistry,
    store: TimeSeriesStore,
    aggregation: AggregationEngine,
    retention: RetentionManager,
    last_retention: RwLock<Option<RetentionResult>>,
    queries_executed: AtomicU64,
    aggregations_executed: AtomicU64,
}

impl HistorianEngine {
    /// Create a new engine with default configuration.
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    /// Create a new engine with custom configuration.
    pub fn with_config(config: EngineConfig) -> Self {
        Self {
            registry: TagRegistry::new(),
            store: TimeSeriesStore::with_config(config.store),
            aggregation: AggregationEngine::new(config.max_buckets),
            retention: RetentionManager::new(),
            last_retention: RwLock::new(None),
            queries_executed: AtomicU64::new(0),
            aggregations_executed: AtomicU64::new(0),
        }
    }

    pub fn registry(&self) -> &TagRegistry {
        &self.registry
    }

    pub fn store(&self) -> &TimeSeriesStore {
        &self.store
    }

    // -------------------------------------------------------------------------
    // Tag Management
    // -------------------------------------------------------------------------

    /// Register a new tag.
    pub fn create_tag(&self, tag: Tag) -> Result<Tag> {
        let tag = self.registry.create(tag)?;
        tracing::info!(tag = %tag.name, "tag created");
        Ok(tag)
    }

    /// Get a tag definition.
    pub fn get_tag(&self, name: &str) -> Result<Tag> {
        self.registry
            .get(name)
            .ok_or_else(|| HistorianError::TagNotFound(name.to_string()))
    }

    /// Update a tag. Changing compression settings restarts compression.
    pub fn update_tag(&self, name: &str, patch: &TagPatch) -> Result<Tag> {
        let updated = self.registry.update(name, patch)?;
        if patch.touches_compression() {
            self.store.reset_compression(name);
        }
        Ok(updated)
    }

    /// Delete a tag and every sample it owns. Returns the samples removed.
    pub fn delete_tag(&self, name: &str) -> Result<usize> {
        self.registry.remove(name)?;
        let removed = self.store.remove_tag(name);
        tracing::info!(tag = %name, removed, "tag deleted");
        Ok(removed)
    }

    /// List tags matching a filter.
    pub fn list_tags(&self, filter: &TagFilter) -> Vec<Tag> {
        self.registry.list(filter)
    }

    // -------------------------------------------------------------------------
    // Data Ingestion
    // -------------------------------------------------------------------------

    /// Write a single sample.
    pub fn write(&self, point: PointWrite) -> Result<WriteOutcome> {
        let mut writer = self.store.writer();
        let outcome = self.write_locked(&mut writer, point);
        if outcome.is_err() {
            writer.record_failure();
        }
        outcome
    }

    /// Write a batch. Failures are reported per point and never abort the
    /// rest of the batch.
    pub fn write_batch(&self, points: Vec<PointWrite>) -> BatchWriteResult {
        let mut result = BatchWriteResult::default();
        let mut writer = self.store.writer();

        for (index, point) in points.into_iter().enumerate() {
            let tag_name = point.tag_name.clone();
            let outcome = self.write_locked(&mut writer, point);
            if outcome.is_err() {
                writer.record_failure();
            }
            result.record(index, &tag_name, outcome);
        }

        tracing::debug!(
            written = result.points_written,
            stored = result.points_stored,
            failed = result.points_failed,
            "batch write"
        );
        result
    }

    /// Write a batch after sorting each tag's samples by timestamp, so that
    /// late producers still go through compression. Error indices refer to
    /// the original batch order.
    pub fn write_buffered(&self, points: Vec<PointWrite>) -> BatchWriteResult {
        let now = Utc::now();
        let mut by_tag: BTreeMap<String, Vec<(usize, PointWrite)>> = BTreeMap::new();
        for (index, mut point) in points.into_iter().enumerate() {
            point.timestamp.get_or_insert(now);
            by_tag.entry(point.tag_name.clone()).or_default().push((index, point));
        }

        let mut result = BatchWriteResult::default();
        let mut writer = self.store.writer();

        for (_, mut entries) in by_tag {
            entries.sort_by_key(|(_, p)| p.timestamp);
            for (index, point) in entries {
                let tag_name = point.tag_name.clone();
                let outcome = self.write_locked(&mut writer, point);
                if outcome.is_err() {
                    writer.record_failure();
                }
                result.record(index, &tag_name, outcome);
            }
        }

        result.errors.sort_by_key(|e| e.index);
        result
    }

    fn write_locked(&self, writer: &mut StoreWriter<'_>, point: PointWrite) -> Result<WriteOutcome> {
        let tag = self
            .registry
            .get(&point.tag_name)
            .ok_or_else(|| HistorianError::TagNotFound(point.tag_name.clone()))?;

        if !tag.is_active {
            return Err(HistorianError::TagInactive(tag.name));
        }

        let value = point.value.coerce(&tag.name, tag.data_type)?;
        let quality = match point.quality {
            Some(q) => Quality::new(q).ok_or_else(|| HistorianError::InvalidValue {
                tag: tag.name.clone(),
                reason: format!("quality {} outside 0-100", q),
            })?,
            None => tag.default_quality,
        };
        let quality = if value.is_null() { Quality::BAD } else { quality };

        let sample = DataPoint {
            tag_name: tag.name.clone(),
            timestamp: point.timestamp.unwrap_or_else(Utc::now),
            value,
            quality,
        };

        Ok(writer.insert(&tag, sample))
    }

    // -------------------------------------------------------------------------
    // Querying
    // -------------------------------------------------------------------------

    /// Range query. Unknown tags produce empty series.
    pub fn query(&self, query: &TimeSeriesQuery) -> Result<QueryResult> {
        if query.end < query.start {
            return Err(HistorianError::InvalidTimeRange(format!(
                "end {} is before start {}",
                query.end.to_rfc3339(),
                query.start.to_rfc3339()
            )));
        }
        self.queries_executed.fetch_add(1, Ordering::Relaxed);
        Ok(self.store.query(query))
    }

    /// Latest samples of a tag, newest first.
    pub fn recent(&self, tag_name: &str, count: usize) -> Vec<DataPoint> {
        self.store.recent(tag_name, count)
    }

    /// Aggregate a tag's samples over a range, optionally bucketed.
    pub fn aggregate(
        &self,
        tag_name: &str,
        aggregation: AggregationType,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        interval: Option<Duration>,
    ) -> Result<Vec<AggregateResult>> {
        if !self.registry.contains(tag_name) {
            return Err(HistorianError::TagNotFound(tag_name.to_string()));
        }

        let points = self.store.range(tag_name, start, end);
        let results = self.aggregation.aggregate(&points, aggregation, start, end, interval)?;
        self.aggregations_executed.fetch_add(1, Ordering::Relaxed);
        Ok(results)
    }

    // -------------------------------------------------------------------------
    // Maintenance
    // -------------------------------------------------------------------------

    /// Purge samples outside each tag's retention window.
    pub fn apply_retention(&self, now: DateTime<Utc>) -> RetentionResult {
        let result = self.retention.sweep(&self.registry, &self.store, now);
        *self.last_retention.write() = Some(result.clone());
        result
    }

    /// Clear every sample and all compression state. Tags are kept.
    pub fn reset(&self) {
        self.store.reset();
        *self.last_retention.write() = None;
        self.queries_executed.store(0, Ordering::Relaxed);
        self.aggregations_executed.store(0, Ordering::Relaxed);
        tracing::info!("historian data reset");
    }

    /// Get engine statistics.
    pub fn stats(&self) -> EngineStats {
        let store = self.store.stats();
        let active_tags = self
            .registry
            .list(&TagFilter {
                active_only: true,
                ..Default::default()
            })
            .len();

        EngineStats {
            tag_count: self.registry.len(),
            active_tags,
            compression_ratio: store.compression_ratio(),
            store,
            queries_executed: self.queries_executed.load(Ordering::Relaxed),
            aggregations_executed: self.aggregations_executed.load(Ordering::Relaxed),
            last_retention: self.last_retention.read().clone(),
        }
    }
}

impl Default for HistorianEngine {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CompressionType, DataType};

    fn base_time() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    fn engine_with(tag: Tag) -> HistorianEngine {
        let engine = HistorianEngine::new();
        engine.create_tag(tag).unwrap();
        engine
    }

    #[test]
    fn test_write_requires_known_active_tag() {
        let engine = engine_with(Tag::float("OFF").inactive());

        let err = engine.write(PointWrite::new("MISSING", base_time(), 1.0)).unwrap_err();
        assert_eq!(err, HistorianError::TagNotFound("MISSING".into()));

        let err = engine.write(PointWrite::new("OFF", base_time(), 1.0)).unwrap_err();
        assert_eq!(err, HistorianError::TagInactive("OFF".into()));
        assert_eq!(engine.stats().store.writes_failed, 2);
    }

    #[test]
    fn test_batch_partial_success() {
        let engine = engine_with(Tag::float("TEMP").with_compression(CompressionType::None, 0.0));

        let result = engine.write_batch(vec![
            PointWrite::new("TEMP", base_time(), 1.0),
            PointWrite::new("NOPE", base_time(), 1.0),
            PointWrite::new("TEMP", base_time() + Duration::seconds(1), "hot"),
            PointWrite::new("TEMP", base_time() + Duration::seconds(2), 3.0).with_quality(140),
            PointWrite::new("TEMP", base_time() + Duration::seconds(3), 4_i64),
        ]);

        assert_eq!(result.points_written, 2);
        assert_eq!(result.points_failed, 3);
        assert_eq!(result.errors[0].index, 1);
        assert_eq!(result.errors[0].reason, WriteErrorKind::TagNotFound);
        assert_eq!(result.errors[1].reason, WriteErrorKind::InvalidValue);
        assert_eq!(result.errors[2].reason, WriteErrorKind::InvalidValue);
        assert!(!result.is_complete());
    }

    #[test]
    fn test_null_value_forces_bad_quality() {
        let engine = engine_with(Tag::float("TEMP"));
        let point = PointWrite {
            tag_name: "TEMP".into(),
            timestamp: Some(base_time()),
            value: TagValue::Null,
            quality: Some(100),
        };
        engine.write(point).unwrap();

        let recent = engine.recent("TEMP", 1);
        assert!(recent[0].quality.is_bad());
    }

    #[test]
    fn test_default_quality_from_tag() {
        let engine = engine_with(Tag::float("TEMP").with_default_quality(Quality::clamped(90)));
        engine.write(PointWrite::new("TEMP", base_time(), 1.0)).unwrap();
        assert_eq!(engine.recent("TEMP", 1)[0].quality.value(), 90);
    }

    #[test]
    fn test_query_round_trip_preserves_quality() {
        let engine = engine_with(Tag::float("TEMP").with_compression(CompressionType::None, 0.0));
        engine
            .write(PointWrite::new("TEMP", base_time(), 21.5).with_quality(77))
            .unwrap();

        let query = TimeSeriesQuery::new(["TEMP"], base_time() - Duration::seconds(1), base_time());
        let result = engine.query(&query).unwrap();
        let points = result.points_for("TEMP").unwrap();

        assert_eq!(points.len(), 1);
        assert_eq!(points[0].quality.value(), 77);
        assert_eq!(points[0].value, TagValue::Float(21.5));
    }

    #[test]
    fn test_count_matches_uncapped_query() {
        let engine = engine_with(Tag::float("TEMP").with_compression(CompressionType::None, 0.0));
        for i in 0..50 {
            engine
                .write(PointWrite::new("TEMP", base_time() + Duration::seconds(i), i as f64))
                .unwrap();
        }

        let end = base_time() + Duration::seconds(30);
        let count = engine
            .aggregate("TEMP", AggregationType::Count, base_time(), end, None)
            .unwrap();
        let avg = engine
            .aggregate("TEMP", AggregationType::Average, base_time(), end, None)
            .unwrap();

        let points = engine.store().range("TEMP", base_time(), end);
        let mean = points.iter().filter_map(|p| p.value.as_f64()).sum::<f64>() / points.len() as f64;

        assert_eq!(count[0].count, points.len());
        assert!((avg[0].value - mean).abs() < 1e-9);
    }

    #[test]
    fn test_aggregate_unknown_tag() {
        let engine = HistorianEngine::new();
        let err = engine
            .aggregate("NOPE", AggregationType::Average, base_time(), base_time(), None)
            .unwrap_err();
        assert_eq!(err, HistorianError::TagNotFound("NOPE".into()));
    }

    #[test]
    fn test_delete_cascades() {
        let engine = engine_with(Tag::float("TEMP").with_compression(CompressionType::None, 0.0));
        for i in 0..5 {
            engine
                .write(PointWrite::new("TEMP", base_time() + Duration::seconds(i), 1.0))
                .unwrap();
        }

        assert_eq!(engine.delete_tag("TEMP").unwrap(), 5);
        assert_eq!(engine.store().total_points(), 0);
        assert!(engine.get_tag("TEMP").is_err());
    }

    #[test]
    fn test_update_compression_resets_reference() {
        let engine = engine_with(Tag::float("TEMP").with_compression(CompressionType::Deadband, 5.0));
        engine.write(PointWrite::new("TEMP", base_time(), 10.0)).unwrap();
        let outcome = engine
            .write(PointWrite::new("TEMP", base_time() + Duration::seconds(1), 11.0))
            .unwrap();
        assert_eq!(outcome, WriteOutcome::Compressed);

        let patch = TagPatch {
            compression_deviation: Some(0.1),
            ..Default::default()
        };
        engine.update_tag("TEMP", &patch).unwrap();

        let outcome = engine
            .write(PointWrite::new("TEMP", base_time() + Duration::seconds(2), 10.0))
            .unwrap();
        assert_eq!(outcome, WriteOutcome::Stored);
    }

    #[test]
    fn test_buffered_write_sorts_before_compression() {
        let engine = engine_with(Tag::float("TEMP").with_compression(CompressionType::SwingingDoor, 0.5));
        let points: Vec<PointWrite> = (0..20)
            .rev()
            .map(|i| PointWrite::new("TEMP", base_time() + Duration::seconds(i), 10.0))
            .collect();

        let result = engine.write_buffered(points);

        assert_eq!(result.points_written, 20);
        assert_eq!(result.points_stored, 1);
        assert_eq!(result.points_compressed, 19);
    }

    #[test]
    fn test_string_tags_store_every_point() {
        let engine = engine_with(Tag::new("STATE", DataType::String));
        for i in 0..5 {
            engine
                .write(PointWrite::new("STATE", base_time() + Duration::seconds(i), "RUNNING"))
                .unwrap();
        }
        assert_eq!(engine.store().point_count("STATE"), 5);
    }

    #[test]
    fn test_reset_keeps_tags() {
        let engine = engine_with(Tag::float("TEMP"));
        engine.write(PointWrite::new("TEMP", base_time(), 1.0)).unwrap();

        engine.reset();
        assert_eq!(engine.stats().store.total_points, 0);
        assert_eq!(engine.stats().tag_count, 1);
    }
}
