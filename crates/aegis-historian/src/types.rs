//! Aegis Historian Types
//!
//! Core data types for tag definitions and stored samples.
//!
//! @version 0.1.0
//! @author AutomataNexus Development Team

use aegis_common::{HistorianError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Longest retention window a tag may carry (ten years).
pub const MAX_RETENTION_HOURS: f64 = 87_600.0;

// =============================================================================
// Data Type
// =============================================================================

/// Value type carried by a tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum DataType {
    #[default]
    Float,
    Integer,
    Boolean,
    String,
    DateTime,
}

impl DataType {
    /// Numeric tags participate in compression and aggregation.
    pub fn is_numeric(&self) -> bool {
        matches!(self, DataType::Float | DataType::Integer)
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DataType::Float => "Float",
            DataType::Integer => "Integer",
            DataType::Boolean => "Boolean",
            DataType::String => "String",
            DataType::DateTime => "DateTime",
        };
        f.write_str(name)
    }
}

// =============================================================================
// Compression Type
// =============================================================================

/// Compression policy applied on write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum CompressionType {
    /// Store every sample.
    None,
    /// Discard samples within `compression_deviation` of the last stored value.
    Deadband,
    /// Swinging-door trending over the deviation band.
    #[default]
    SwingingDoor,
}

// =============================================================================
// Quality
// =============================================================================

/// Sample quality in the range 0-100. Zero marks a bad or unknown value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u8")]
pub struct Quality(u8);

impl Quality {
    pub const BAD: Quality = Quality(0);
    pub const UNCERTAIN: Quality = Quality(50);
    pub const GOOD: Quality = Quality(100);

    /// Create a quality, rejecting values outside 0-100.
    pub fn new(value: i64) -> Option<Self> {
        if (0..=100).contains(&value) {
            Some(Self(value as u8))
        } else {
            None
        }
    }

    /// Create a quality, clamping into 0-100.
    pub fn clamped(value: i64) -> Self {
        Self(value.clamp(0, 100) as u8)
    }

    pub fn value(&self) -> u8 {
        self.0
    }

    pub fn is_bad(&self) -> bool {
        self.0 == 0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Quality::GOOD
    }
}

impl TryFrom<i64> for Quality {
    type Error = String;

    fn try_from(value: i64) -> std::result::Result<Self, Self::Error> {
        Quality::new(value).ok_or_else(|| format!("quality {} outside 0-100", value))
    }
}

impl From<Quality> for u8 {
    fn from(quality: Quality) -> Self {
        quality.0
    }
}

// =============================================================================
// Tag Value
// =============================================================================

/// A sample value. Serialized untagged so JSON numbers, booleans, strings
/// and null map directly. JSON strings always arrive as `String`; DateTime
/// tags parse them during coercion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TagValue {
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
    DateTime(DateTime<Utc>),
}

impl TagValue {
    pub fn is_null(&self) -> bool {
        matches!(self, TagValue::Null)
    }

    /// Numeric view used by compression and aggregation. Booleans map to 0/1.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            TagValue::Float(v) => Some(*v),
            TagValue::Integer(v) => Some(*v as f64),
            TagValue::Boolean(v) => Some(if *v { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    /// Coerce the value to a tag's data type.
    ///
    /// Null passes through for every type. Non-finite floats are rejected.
    pub fn coerce(self, tag: &str, data_type: DataType) -> Result<TagValue> {
        let invalid = |reason: String| HistorianError::InvalidValue {
            tag: tag.to_string(),
            reason,
        };

        match (data_type, self) {
            (_, TagValue::Null) => Ok(TagValue::Null),

            (DataType::Float, TagValue::Float(v)) if v.is_finite() => Ok(TagValue::Float(v)),
            (DataType::Float, TagValue::Float(v)) => {
                Err(invalid(format!("non-finite value {}", v)))
            }
            (DataType::Float, TagValue::Integer(v)) => Ok(TagValue::Float(v as f64)),

            (DataType::Integer, TagValue::Integer(v)) => Ok(TagValue::Integer(v)),
            (DataType::Integer, TagValue::Float(v))
                if v.is_finite()
                    && v.fract() == 0.0
                    && v >= i64::MIN as f64
                    && v <= i64::MAX as f64 =>
            {
                Ok(TagValue::Integer(v as i64))
            }

            (DataType::Boolean, TagValue::Boolean(v)) => Ok(TagValue::Boolean(v)),
            (DataType::Boolean, TagValue::Integer(0)) => Ok(TagValue::Boolean(false)),
            (DataType::Boolean, TagValue::Integer(1)) => Ok(TagValue::Boolean(true)),

            (DataType::String, TagValue::String(v)) => Ok(TagValue::String(v)),
            (DataType::String, TagValue::DateTime(v)) => Ok(TagValue::String(v.to_rfc3339())),
            (DataType::String, TagValue::Integer(v)) => Ok(TagValue::String(v.to_string())),
            (DataType::String, TagValue::Float(v)) => Ok(TagValue::String(v.to_string())),
            (DataType::String, TagValue::Boolean(v)) => Ok(TagValue::String(v.to_string())),

            (DataType::DateTime, TagValue::DateTime(v)) => Ok(TagValue::DateTime(v)),
            (DataType::DateTime, TagValue::String(v)) => DateTime::parse_from_rfc3339(&v)
                .map(|dt| TagValue::DateTime(dt.with_timezone(&Utc)))
                .map_err(|e| invalid(format!("'{}' is not an RFC 3339 timestamp: {}", v, e))),

            (expected, other) => Err(invalid(format!(
                "expected {} value, got {:?}",
                expected, other
            ))),
        }
    }
}

impl From<f64> for TagValue {
    fn from(v: f64) -> Self {
        TagValue::Float(v)
    }
}

impl From<i64> for TagValue {
    fn from(v: i64) -> Self {
        TagValue::Integer(v)
    }
}

impl From<bool> for TagValue {
    fn from(v: bool) -> Self {
        TagValue::Boolean(v)
    }
}

impl From<&str> for TagValue {
    fn from(v: &str) -> Self {
        TagValue::String(v.to_string())
    }
}

// =============================================================================
// Tag
// =============================================================================

/// Tag definition: a named channel with a data type and storage policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Tag {
    pub name: String,
    pub description: Option<String>,
    pub data_type: DataType,
    pub engineering_units: String,
    pub collector: Option<String>,
    pub compression_type: CompressionType,
    pub compression_deviation: f64,
    /// Hours of history kept; zero keeps samples until capacity eviction.
    pub retention_hours: f64,
    pub default_quality: Quality,
    pub quality_threshold: Quality,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Tag {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        let now = Utc::now();
        Self {
            name: name.into(),
            description: None,
            data_type,
            engineering_units: String::new(),
            collector: None,
            compression_type: CompressionType::default(),
            compression_deviation: 0.0,
            retention_hours: 0.0,
            default_quality: Quality::GOOD,
            quality_threshold: Quality::UNCERTAIN,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn float(name: impl Into<String>) -> Self {
        Self::new(name, DataType::Float)
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_units(mut self, units: impl Into<String>) -> Self {
        self.engineering_units = units.into();
        self
    }

    pub fn with_collector(mut self, collector: impl Into<String>) -> Self {
        self.collector = Some(collector.into());
        self
    }

    pub fn with_compression(mut self, compression_type: CompressionType, deviation: f64) -> Self {
        self.compression_type = compression_type;
        self.compression_deviation = deviation;
        self
    }

    pub fn with_retention_hours(mut self, hours: f64) -> Self {
        self.retention_hours = hours;
        self
    }

    pub fn with_default_quality(mut self, quality: Quality) -> Self {
        self.default_quality = quality;
        self
    }

    pub fn inactive(mut self) -> Self {
        self.is_active = false;
        self
    }

    /// Check the definition is internally consistent.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(HistorianError::Configuration(
                "tag name must not be empty".to_string(),
            ));
        }
        if !self.compression_deviation.is_finite() || self.compression_deviation < 0.0 {
            return Err(HistorianError::Configuration(format!(
                "tag {}: compression deviation must be a non-negative number",
                self.name
            )));
        }
        if !self.retention_hours.is_finite() || self.retention_hours < 0.0 {
            return Err(HistorianError::Configuration(format!(
                "tag {}: retention hours must be a non-negative number",
                self.name
            )));
        }
        if self.retention_hours > MAX_RETENTION_HOURS {
            return Err(HistorianError::Configuration(format!(
                "tag {}: retention hours must not exceed {}",
                self.name, MAX_RETENTION_HOURS
            )));
        }
        Ok(())
    }

    /// Whether writes to this tag go through the compressor at all.
    pub fn is_compressible(&self) -> bool {
        self.data_type.is_numeric()
            && self.compression_type != CompressionType::None
            && self.compression_deviation > 0.0
    }
}

// =============================================================================
// Tag Patch
// =============================================================================

/// Partial update for a tag. Absent fields are left untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TagPatch {
    pub description: Option<String>,
    pub engineering_units: Option<String>,
    pub collector: Option<String>,
    pub compression_type: Option<CompressionType>,
    pub compression_deviation: Option<f64>,
    pub retention_hours: Option<f64>,
    pub default_quality: Option<Quality>,
    pub quality_threshold: Option<Quality>,
    pub is_active: Option<bool>,
}

impl TagPatch {
    /// True when the patch changes how future samples are compressed.
    pub fn touches_compression(&self) -> bool {
        self.compression_type.is_some() || self.compression_deviation.is_some()
    }

    /// Apply the patch to a copy of the tag.
    pub fn apply_to(&self, tag: &Tag) -> Tag {
        let mut updated = tag.clone();
        if let Some(ref description) = self.description {
            updated.description = Some(description.clone());
        }
        if let Some(ref units) = self.engineering_units {
            updated.engineering_units = units.clone();
        }
        if let Some(ref collector) = self.collector {
            updated.collector = Some(collector.clone());
        }
        if let Some(compression_type) = self.compression_type {
            updated.compression_type = compression_type;
        }
        if let Some(deviation) = self.compression_deviation {
            updated.compression_deviation = deviation;
        }
        if let Some(hours) = self.retention_hours {
            updated.retention_hours = hours;
        }
        if let Some(quality) = self.default_quality {
            updated.default_quality = quality;
        }
        if let Some(threshold) = self.quality_threshold {
            updated.quality_threshold = threshold;
        }
        if let Some(active) = self.is_active {
            updated.is_active = active;
        }
        updated.updated_at = Utc::now();
        updated
    }
}

// =============================================================================
// Tag Filter
// =============================================================================

/// Filter for listing tags.
#[derive(Debug, Clone, Default)]
pub struct TagFilter {
    pub collector: Option<String>,
    pub data_type: Option<DataType>,
    pub active_only: bool,
    pub name_contains: Option<String>,
}

impl TagFilter {
    pub fn matches(&self, tag: &Tag) -> bool {
        if self.active_only && !tag.is_active {
            return false;
        }
        if let Some(ref collector) = self.collector {
            if tag.collector.as_deref() != Some(collector.as_str()) {
                return false;
            }
        }
        if let Some(data_type) = self.data_type {
            if tag.data_type != data_type {
                return false;
            }
        }
        if let Some(ref needle) = self.name_contains {
            if !tag.name.to_lowercase().contains(&needle.to_lowercase()) {
                return false;
            }
        }
        true
    }
}

// =============================================================================
// Data Point
// =============================================================================

/// A single sample for a tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DataPoint {
    pub tag_name: String,
    pub timestamp: DateTime<Utc>,
    pub value: TagValue,
    pub quality: Quality,
}

impl DataPoint {
    pub fn new(
        tag_name: impl Into<String>,
        timestamp: DateTime<Utc>,
        value: impl Into<TagValue>,
        quality: Quality,
    ) -> Self {
        Self {
            tag_name: tag_name.into(),
            timestamp,
            value: value.into(),
            quality,
        }
    }

    /// A good-quality sample.
    pub fn good(tag_name: impl Into<String>, timestamp: DateTime<Utc>, value: impl Into<TagValue>) -> Self {
        Self::new(tag_name, timestamp, value, Quality::GOOD)
    }

    /// A null sample; quality is always bad.
    pub fn null(tag_name: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            tag_name: tag_name.into(),
            timestamp,
            value: TagValue::Null,
            quality: Quality::BAD,
        }
    }

    pub fn timestamp_millis(&self) -> i64 {
        self.timestamp.timestamp_millis()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quality_bounds() {
        assert_eq!(Quality::new(100), Some(Quality::GOOD));
        assert_eq!(Quality::new(101), None);
        assert_eq!(Quality::new(-1), None);
        assert_eq!(Quality::clamped(250).value(), 100);
        assert!(Quality::clamped(-5).is_bad());
    }

    #[test]
    fn test_quality_deserialize_rejects_out_of_range() {
        assert!(serde_json::from_str::<Quality>("87").is_ok());
        assert!(serde_json::from_str::<Quality>("187").is_err());
    }

    #[test]
    fn test_tag_value_untagged_json() {
        let v: TagValue = serde_json::from_str("12").unwrap();
        assert_eq!(v, TagValue::Integer(12));
        let v: TagValue = serde_json::from_str("12.5").unwrap();
        assert_eq!(v, TagValue::Float(12.5));
        let v: TagValue = serde_json::from_str("true").unwrap();
        assert_eq!(v, TagValue::Boolean(true));
        let v: TagValue = serde_json::from_str("null").unwrap();
        assert_eq!(v, TagValue::Null);
        let v: TagValue = serde_json::from_str("\"RUNNING\"").unwrap();
        assert_eq!(v, TagValue::String("RUNNING".into()));
    }

    #[test]
    fn test_timestamp_like_string_keeps_its_text() {
        let v: TagValue = serde_json::from_str("\"2024-01-01T00:00:00Z\"").unwrap();
        assert_eq!(v, TagValue::String("2024-01-01T00:00:00Z".into()));
        assert_eq!(
            v.clone().coerce("S", DataType::String).unwrap(),
            TagValue::String("2024-01-01T00:00:00Z".into())
        );
        assert!(matches!(
            v.coerce("D", DataType::DateTime).unwrap(),
            TagValue::DateTime(_)
        ));
    }

    #[test]
    fn test_coercion() {
        assert_eq!(
            TagValue::Integer(3).coerce("T", DataType::Float).unwrap(),
            TagValue::Float(3.0)
        );
        assert_eq!(
            TagValue::Float(4.0).coerce("T", DataType::Integer).unwrap(),
            TagValue::Integer(4)
        );
        assert!(TagValue::Float(4.5).coerce("T", DataType::Integer).is_err());
        assert!(TagValue::Float(f64::NAN).coerce("T", DataType::Float).is_err());
        assert!(TagValue::String("abc".into()).coerce("T", DataType::Float).is_err());
        assert_eq!(
            TagValue::Integer(1).coerce("T", DataType::Boolean).unwrap(),
            TagValue::Boolean(true)
        );
        assert!(matches!(
            TagValue::String("2024-01-01T00:00:00Z".into())
                .coerce("T", DataType::DateTime)
                .unwrap(),
            TagValue::DateTime(_)
        ));
        assert_eq!(
            TagValue::Null.coerce("T", DataType::Integer).unwrap(),
            TagValue::Null
        );
    }

    #[test]
    fn test_tag_validation() {
        assert!(Tag::float("TEMP").validate().is_ok());
        assert!(Tag::float("  ").validate().is_err());
        assert!(Tag::float("TEMP")
            .with_compression(CompressionType::Deadband, -1.0)
            .validate()
            .is_err());
        assert!(Tag::float("TEMP")
            .with_retention_hours(MAX_RETENTION_HOURS)
            .validate()
            .is_ok());
        assert!(Tag::float("TEMP")
            .with_retention_hours(1e10)
            .validate()
            .is_err());
    }

    #[test]
    fn test_tag_patch() {
        let tag = Tag::float("TEMP").with_units("degC");
        let patch = TagPatch {
            compression_deviation: Some(0.5),
            is_active: Some(false),
            ..Default::default()
        };

        let updated = patch.apply_to(&tag);
        assert_eq!(updated.compression_deviation, 0.5);
        assert!(!updated.is_active);
        assert_eq!(updated.engineering_units, "degC");
        assert!(patch.touches_compression());
    }

    #[test]
    fn test_tag_filter() {
        let tag = Tag::float("Line1.Temp").with_collector("opc-1");

        let mut filter = TagFilter::default();
        assert!(filter.matches(&tag));

        filter.collector = Some("opc-2".into());
        assert!(!filter.matches(&tag));

        filter.collector = Some("opc-1".into());
        filter.data_type = Some(DataType::Float);
        filter.name_contains = Some("temp".into());
        assert!(filter.matches(&tag));

        filter.active_only = true;
        assert!(!filter.matches(&tag.clone().inactive()));
    }

    #[test]
    fn test_data_point_serializes_pascal_case() {
        let point = DataPoint::good("TEMP", Utc::now(), 21.5);
        let json = serde_json::to_value(&point).unwrap();
        assert_eq!(json["TagName"], "TEMP");
        assert_eq!(json["Value"], 21.5);
        assert_eq!(json["Quality"], 100);
    }
}
