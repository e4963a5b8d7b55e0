//! Aegis Error - Historian Error Taxonomy
//!
//! Unified error type for the historian surrogate. Errors are grouped into
//! the categories callers care about: configuration mistakes that are never
//! retried, per-item validation failures, deliberately simulated faults and
//! capacity events.
//!
//! Key Features:
//! - Domain-specific variants for tags, values, time ranges and scenarios
//! - Category classification for batch and HTTP handling
//! - Retryable detection driven by the simulated fault table
//! - HTTP status mapping shared by every handler
//!
//! @version 0.1.0
//! @author AutomataNexus Development Team

use serde::{Deserialize, Serialize};
use thiserror::Error;

// =============================================================================
// Error Types
// =============================================================================

/// Unified error type for all historian operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum HistorianError {
    // Configuration errors
    #[error("tag already exists: {0}")]
    DuplicateTag(String),

    #[error("tag not found: {0}")]
    TagNotFound(String),

    #[error("tag is inactive: {0}")]
    TagInactive(String),

    #[error("invalid aggregation type: {0}")]
    InvalidAggregationType(String),

    #[error("unknown scenario: {0}")]
    UnknownScenario(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    // Validation errors
    #[error("invalid value for tag {tag}: {reason}")]
    InvalidValue { tag: String, reason: String },

    #[error("invalid interval: {0}")]
    InvalidInterval(String),

    #[error("invalid time range: {0}")]
    InvalidTimeRange(String),

    #[error("limit exceeded: {0}")]
    LimitExceeded(String),

    // Simulated errors
    #[error("simulated error [{code}]: {message}")]
    Simulated {
        status_code: u16,
        code: String,
        message: String,
        retryable: bool,
    },

    // Capacity errors
    #[error("capacity reached: {0}")]
    Capacity(String),
}

// =============================================================================
// Type Aliases
// =============================================================================

/// Result type alias for historian operations.
pub type Result<T> = std::result::Result<T, HistorianError>;

// =============================================================================
// Error Classification
// =============================================================================

/// Coarse error category used by batch responses and the HTTP layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCategory {
    Configuration,
    Validation,
    Simulated,
    Capacity,
}

impl HistorianError {
    /// Category this error belongs to.
    pub fn category(&self) -> ErrorCategory {
        match self {
            HistorianError::DuplicateTag(_)
            | HistorianError::TagNotFound(_)
            | HistorianError::TagInactive(_)
            | HistorianError::InvalidAggregationType(_)
            | HistorianError::UnknownScenario(_)
            | HistorianError::Configuration(_) => ErrorCategory::Configuration,
            HistorianError::InvalidValue { .. }
            | HistorianError::InvalidInterval(_)
            | HistorianError::InvalidTimeRange(_)
            | HistorianError::LimitExceeded(_) => ErrorCategory::Validation,
            HistorianError::Simulated { .. } => ErrorCategory::Simulated,
            HistorianError::Capacity(_) => ErrorCategory::Capacity,
        }
    }

    /// Returns true if the caller may retry the operation.
    ///
    /// Only simulated faults flagged retryable qualify; configuration and
    /// validation errors will fail the same way every time.
    pub fn is_retryable(&self) -> bool {
        matches!(self, HistorianError::Simulated { retryable: true, .. })
    }

    /// Stable machine-readable error code.
    pub fn code(&self) -> &str {
        match self {
            HistorianError::DuplicateTag(_) => "DUPLICATE_TAG",
            HistorianError::TagNotFound(_) => "TAG_NOT_FOUND",
            HistorianError::TagInactive(_) => "TAG_INACTIVE",
            HistorianError::InvalidAggregationType(_) => "INVALID_AGGREGATION_TYPE",
            HistorianError::UnknownScenario(_) => "UNKNOWN_SCENARIO",
            HistorianError::Configuration(_) => "CONFIGURATION_ERROR",
            HistorianError::InvalidValue { .. } => "INVALID_VALUE",
            HistorianError::InvalidInterval(_) => "INVALID_INTERVAL",
            HistorianError::InvalidTimeRange(_) => "INVALID_TIME_RANGE",
            HistorianError::LimitExceeded(_) => "LIMIT_EXCEEDED",
            HistorianError::Simulated { code, .. } => code.as_str(),
            HistorianError::Capacity(_) => "CAPACITY",
        }
    }

    /// HTTP status code used when this error reaches the REST surface.
    pub fn status_code(&self) -> u16 {
        match self {
            HistorianError::DuplicateTag(_) => 409,
            HistorianError::TagNotFound(_) | HistorianError::UnknownScenario(_) => 404,
            HistorianError::TagInactive(_)
            | HistorianError::InvalidAggregationType(_)
            | HistorianError::Configuration(_)
            | HistorianError::InvalidValue { .. }
            | HistorianError::InvalidInterval(_)
            | HistorianError::InvalidTimeRange(_)
            | HistorianError::LimitExceeded(_) => 400,
            HistorianError::Simulated { status_code, .. } => *status_code,
            HistorianError::Capacity(_) => 507,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
