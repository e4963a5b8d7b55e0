//! Aegis Historian Retention
//!
//! Per-tag retention policies and the periodic sweep that purges samples
//! older than each tag's retention window. Independent of the capacity
//! eviction performed on write.
//!
//! @version 0.1.0
//! @author AutomataNexus Development Team

use crate::registry::TagRegistry;
use crate::store::TimeSeriesStore;
use crate::types::{Tag, MAX_RETENTION_HOURS};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// Retention Policy
// =============================================================================

/// Retention window for a single tag.
#[derive(Debug, Clone, PartialEq)]
pub struct RetentionPolicy {
    pub tag_name: String,
    pub duration: Duration,
}

impl RetentionPolicy {
    /// Policy derived from a tag definition. Tags with zero retention keep
    /// their samples until capacity eviction and have no policy.
    pub fn for_tag(tag: &Tag) -> Option<Self> {
        if tag.retention_hours <= 0.0 {
            return None;
        }
        let millis = (tag.retention_hours.min(MAX_RETENTION_HOURS) * 3_600_000.0).round() as i64;
        Some(Self {
            tag_name: tag.name.clone(),
            duration: Duration::milliseconds(millis),
        })
    }

    /// Samples strictly older than this are purged.
    pub fn cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now.checked_sub_signed(self.duration)
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    /// Check if data at this timestamp falls outside the window.
    pub fn applies_to(&self, timestamp: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        timestamp < self.cutoff(now)
    }
}

// =============================================================================
// Retention Manager
// =============================================================================

/// Executes retention sweeps over every registered tag.
#[derive(Debug, Default)]
pub struct RetentionManager;

impl RetentionManager {
    pub fn new() -> Self {
        Self
    }

    /// Purge expired samples for every tag with a retention window.
    pub fn sweep(&self, registry: &TagRegistry, store: &TimeSeriesStore, now: DateTime<Utc>) -> RetentionResult {
        let start = std::time::Instant::now();
        let mut result = RetentionResult::default();

        for name in registry.names() {
            let Some(policy) = registry.get(&name).as_ref().and_then(RetentionPolicy::for_tag) else {
                continue;
            };

            result.tags_swept += 1;
            let removed = store.purge_before(&policy.tag_name, policy.cutoff(now));
            if removed > 0 {
                tracing::debug!(tag = %policy.tag_name, removed, "retention purged samples");
                result.points_deleted += removed;
            }
        }

        result.duration_ms = start.elapsed().as_millis() as u64;
        if result.points_deleted > 0 {
            tracing::info!(
                tags = result.tags_swept,
                points = result.points_deleted,
                "retention sweep complete"
            );
        }
        result
    }
}

/// Result of a retention sweep.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RetentionResult {
    pub tags_swept: usize,
    pub points_deleted: usize,
    pub duration_ms: u64,
}

// =============================================================================
// Tests
// =============================================================================
