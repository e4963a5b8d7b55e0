//! Aegis Historian - Industrial Historian Engine
//!
//! Tag-oriented time series store modelled on plant historians. Samples
//! carry a quality code, pass through exception compression on write and
//! age out through per-tag retention or global capacity eviction.
//!
//! Key Features:
//! - Tag registry with typed values and storage policy
//! - Deadband and swinging-door compression
//! - Capacity-bounded store with last-write-wins timestamps
//! - Periodic retention sweep
//! - Whole-range and bucketed aggregation
//!
//! @version 0.1.0
//! @author AutomataNexus Development Team

pub mod types;
pub mod registry;
pub mod compression;
pub mod store;
pub mod retention;
pub mod aggregation;
pub mod query;
pub mod engine;

pub use types::{
    CompressionType, DataPoint, DataType, Quality, Tag, TagFilter, TagPatch, TagValue, MAX_RETENTION_HOURS,
};
pub use registry::TagRegistry;
pub use compression::{CompressionDecision, CompressionState, Compressor};
pub use store::{StoreConfig, StoreStats, TimeSeriesStore, WriteOutcome};
pub use retention::{RetentionManager, RetentionPolicy, RetentionResult};
pub use aggregation::{AggregateResult, AggregationEngine, AggregationType, Aggregator};
pub use query::{QueryResult, TagSeries, TimeSeriesQuery};
pub use engine::{
    BatchWriteResult, EngineConfig, EngineStats, HistorianEngine, PointError, PointWrite,
    WriteErrorKind,
};
