//! Aegis Historian Aggregation
//!
//! Aggregation functions and fixed-width bucketing over stored samples.
//!
//! @version 0.1.0
//! @author AutomataNexus Development Team

use crate::types::DataPoint;
use aegis_common::{HistorianError, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Upper bound on buckets produced by a single request.
pub const DEFAULT_MAX_BUCKETS: usize = 10_000;

// =============================================================================
// Aggregation Type
// =============================================================================

/// Aggregation function type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AggregationType {
    Average,
    Minimum,
    Maximum,
    Sum,
    Count,
    StandardDeviation,
    Range,
}

impl AggregationType {
    /// Apply the aggregation to a set of numeric values.
    pub fn apply(&self, values: &[f64]) -> Option<f64> {
        if values.is_empty() {
            return None;
        }

        let n = values.len() as f64;
        Some(match self {
            Self::Sum => values.iter().sum(),
            Self::Count => n,
            Self::Minimum => values.iter().copied().fold(f64::INFINITY, f64::min),
            Self::Maximum => values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            Self::Average => values.iter().sum::<f64>() / n,
            Self::Range => Self::Maximum.apply(values)? - Self::Minimum.apply(values)?,
            Self::StandardDeviation => {
                // Population variance.
                let mean = Self::Average.apply(values)?;
                let sum_sq: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
                (sum_sq / n).sqrt()
            }
        })
    }
}

impl FromStr for AggregationType {
    type Err = HistorianError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "average" | "avg" | "mean" => Ok(Self::Average),
            "minimum" | "min" => Ok(Self::Minimum),
            "maximum" | "max" => Ok(Self::Maximum),
            "sum" | "total" => Ok(Self::Sum),
            "count" => Ok(Self::Count),
            "standarddeviation" | "standard_deviation" | "stddev" | "std" => {
                Ok(Self::StandardDeviation)
            }
            "range" => Ok(Self::Range),
            _ => Err(HistorianError::InvalidAggregationType(s.to_string())),
        }
    }
}

impl fmt::Display for AggregationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Average => "Average",
            Self::Minimum => "Minimum",
            Self::Maximum => "Maximum",
            Self::Sum => "Sum",
            Self::Count => "Count",
            Self::StandardDeviation => "StandardDeviation",
            Self::Range => "Range",
        };
        f.write_str(name)
    }
}

// =============================================================================
// Aggregate Result
// =============================================================================

/// One aggregated bucket. Empty buckets report `value = 0` and `count = 0`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AggregateResult {
    pub value: f64,
    pub count: usize,
    pub bucket_start: DateTime<Utc>,
    pub bucket_end: DateTime<Utc>,
}

// =============================================================================
// Aggregator
// =============================================================================

/// Accumulates samples for one bucket.
///
/// `Count` counts every sample regardless of type. The other functions only
/// see numeric values and report how many they used.
pub struct Aggregator {
    aggregation: AggregationType,
    values: Vec<f64>,
    samples: usize,
}

impl Aggregator {
    pub fn new(aggregation: AggregationType) -> Self {
        Self {
            aggregation,
            values: Vec::new(),
            samples: 0,
        }
    }

    /// Add a sample to the aggregator.
    pub fn add(&mut self, point: &DataPoint) {
        self.samples += 1;
        if let Some(v) = point.value.as_f64() {
            self.values.push(v);
        }
    }

    /// Number of samples that contributed to the value.
    pub fn count(&self) -> usize {
        match self.aggregation {
            AggregationType::Count => self.samples,
            _ => self.values.len(),
        }
    }

    /// Current aggregate value; zero when nothing contributed.
    pub fn value(&self) -> f64 {
        match self.aggregation {
            AggregationType::Count => self.samples as f64,
            other => other.apply(&self.values).unwrap_or(0.0),
        }
    }

    /// Close the bucket.
    pub fn finish(self, bucket_start: DateTime<Utc>, bucket_end: DateTime<Utc>) -> AggregateResult {
        AggregateResult {
            value: self.value(),
            count: self.count(),
            bucket_start,
            bucket_end,
        }
    }
}

// =============================================================================
// Aggregation Engine
// =============================================================================

/// Computes aggregates over a time range, whole or bucketed.
#[derive(Debug, Clone)]
pub struct AggregationEngine {
    max_buckets: usize,
}

impl AggregationEngine {
    pub fn new(max_buckets: usize) -> Self {
        Self { max_buckets }
    }

    pub fn max_buckets(&self) -> usize {
        self.max_buckets
    }

    /// Aggregate `points` (sorted ascending) over `[start, end]`.
    ///
    /// Without an interval a single result spans the whole range. With an
    /// interval, buckets start at `start` and are half-open except the last,
    /// which also includes `end`.
    pub fn aggregate(
        &self,
        points: &[DataPoint],
        aggregation: AggregationType,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        interval: Option<Duration>,
    ) -> Result<Vec<AggregateResult>> {
        if end < start {
            return Err(HistorianError::InvalidTimeRange(format!(
                "end {} is before start {}",
                end.to_rfc3339(),
                start.to_rfc3339()
            )));
        }

        let interval = match interval {
            None => {
                let mut aggregator = Aggregator::new(aggregation);
                points
                    .iter()
                    .filter(|p| p.timestamp >= start && p.timestamp <= end)
                    .for_each(|p| aggregator.add(p));
                return Ok(vec![aggregator.finish(start, end)]);
            }
            Some(interval) if interval <= Duration::zero() => {
                return Err(HistorianError::InvalidInterval(
                    "interval must be positive".to_string(),
                ));
            }
            Some(interval) => interval,
        };

        let bucket_count = self.bucket_count(start, end, interval)?;
        let mut results = Vec::with_capacity(bucket_count);
        let mut remaining = points
            .iter()
            .skip_while(|p| p.timestamp < start)
            .peekable();

        let interval_ms = interval.num_milliseconds();
        for i in 0..bucket_count {
            let offset = Duration::milliseconds(interval_ms.saturating_mul(i as i64));
            let bucket_start = start.checked_add_signed(offset).unwrap_or(end).min(end);
            let is_last = i + 1 == bucket_count;
            let bucket_end = if is_last {
                end
            } else {
                bucket_start.checked_add_signed(interval).unwrap_or(end).min(end)
            };

            let mut aggregator = Aggregator::new(aggregation);
            while let Some(point) = remaining.peek() {
                let inside = if is_last {
                    point.timestamp <= bucket_end
                } else {
                    point.timestamp < bucket_end
                };
                if !inside {
                    break;
                }
                aggregator.add(point);
                remaining.next();
            }

            results.push(aggregator.finish(bucket_start, bucket_end));
        }

        Ok(results)
    }

    fn bucket_count(&self, start: DateTime<Utc>, end: DateTime<Utc>, interval: Duration) -> Result<usize> {
        let span_ms = (end - start).num_milliseconds().max(0) as u64;
        let interval_ms = interval.num_milliseconds().max(1) as u64;
        let count = usize::try_from(span_ms.div_ceil(interval_ms).max(1)).unwrap_or(usize::MAX);

        if count > self.max_buckets {
            return Err(HistorianError::LimitExceeded(format!(
                "{} buckets requested, maximum is {}",
                count, self.max_buckets
            )));
        }
        Ok(count)
    }
}

impl Default for AggregationEngine {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_BUCKETS)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TagValue;

    fn base_time() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    fn points(values: &[(i64, f64)]) -> Vec<DataPoint> {
        values
            .iter()
            .map(|(secs, v)| DataPoint::good("TEMP", base_time() + Duration::seconds(*secs), *v))
            .collect()
    }

    #[test]
    fn test_aggregate_functions() {
        let values = vec![2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];

        assert_eq!(AggregationType::Sum.apply(&values), Some(40.0));
        assert_eq!(AggregationType::Count.apply(&values), Some(8.0));
        assert_eq!(AggregationType::Minimum.apply(&values), Some(2.0));
        assert_eq!(AggregationType::Maximum.apply(&values), Some(9.0));
        assert_eq!(AggregationType::Average.apply(&values), Some(5.0));
        assert_eq!(AggregationType::Range.apply(&values), Some(7.0));
        assert_eq!(AggregationType::StandardDeviation.apply(&values), Some(2.0));
        assert_eq!(AggregationType::Average.apply(&[]), None);
    }

    #[test]
    fn test_parse_aggregation_type() {
        assert_eq!("Average".parse::<AggregationType>().unwrap(), AggregationType::Average);
        assert_eq!("stddev".parse::<AggregationType>().unwrap(), AggregationType::StandardDeviation);
        assert_eq!("MAX".parse::<AggregationType>().unwrap(), AggregationType::Maximum);
        assert_eq!(
            "median".parse::<AggregationType>().unwrap_err(),
            HistorianError::InvalidAggregationType("median".into())
        );
    }

    #[test]
    fn test_average_over_whole_range() {
        let engine = AggregationEngine::default();
        let data = points(&[(0, 10.0), (600, 20.0), (1200, 30.0)]);

        let results = engine
            .aggregate(&data, AggregationType::Average, base_time(), base_time() + Duration::hours(1), None)
            .unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].value, 20.0);
        assert_eq!(results[0].count, 3);
    }

    #[test]
    fn test_bucketed_with_empty_bucket() {
        let engine = AggregationEngine::default();
        let data = points(&[(0, 1.0), (30, 3.0), (130, 5.0)]);

        let results = engine
            .aggregate(
                &data,
                AggregationType::Average,
                base_time(),
                base_time() + Duration::seconds(180),
                Some(Duration::seconds(60)),
            )
            .unwrap();

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].value, 2.0);
        assert_eq!(results[0].count, 2);
        assert_eq!(results[1].value, 0.0);
        assert_eq!(results[1].count, 0);
        assert_eq!(results[2].count, 1);
        assert_eq!(results[2].bucket_end, base_time() + Duration::seconds(180));
    }

    #[test]
    fn test_last_bucket_includes_end() {
        let engine = AggregationEngine::default();
        let data = points(&[(0, 1.0), (60, 1.0), (120, 1.0)]);

        let results = engine
            .aggregate(
                &data,
                AggregationType::Count,
                base_time(),
                base_time() + Duration::seconds(120),
                Some(Duration::seconds(60)),
            )
            .unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].count, 1);
        assert_eq!(results[1].count, 2);
    }

    #[test]
    fn test_count_includes_non_numeric() {
        let mut data = points(&[(0, 1.0), (1, 2.0)]);
        data.push(DataPoint::null("TEMP", base_time() + Duration::seconds(2)));
        data.push(DataPoint::good("TEMP", base_time() + Duration::seconds(3), TagValue::from("ERR")));

        let engine = AggregationEngine::default();
        let end = base_time() + Duration::seconds(10);

        let count = engine.aggregate(&data, AggregationType::Count, base_time(), end, None).unwrap();
        assert_eq!(count[0].count, 4);
        assert_eq!(count[0].value, 4.0);

        let avg = engine.aggregate(&data, AggregationType::Average, base_time(), end, None).unwrap();
        assert_eq!(avg[0].count, 2);
        assert_eq!(avg[0].value, 1.5);
    }

    #[test]
    fn test_invalid_requests() {
        let engine = AggregationEngine::new(10);
        let data = points(&[(0, 1.0)]);

        let err = engine
            .aggregate(&data, AggregationType::Sum, base_time(), base_time() - Duration::seconds(1), None)
            .unwrap_err();
        assert!(matches!(err, HistorianError::InvalidTimeRange(_)));

        let err = engine
            .aggregate(&data, AggregationType::Sum, base_time(), base_time() + Duration::hours(1), Some(Duration::zero()))
            .unwrap_err();
        assert!(matches!(err, HistorianError::InvalidInterval(_)));

        let err = engine
            .aggregate(&data, AggregationType::Sum, base_time(), base_time() + Duration::hours(1), Some(Duration::seconds(1)))
            .unwrap_err();
        assert!(matches!(err, HistorianError::LimitExceeded(_)));
    }

    #[test]
    fn test_interval_wider_than_range() {
        let engine = AggregationEngine::default();
        let data = points(&[(0, 1.0), (30, 3.0)]);
        let end = base_time() + Duration::minutes(1);

        let results = engine
            .aggregate(&data, AggregationType::Sum, base_time(), end, Some(Duration::milliseconds(i64::MAX)))
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].bucket_end, end);
        assert_eq!(results[0].value, 4.0);
    }
}
