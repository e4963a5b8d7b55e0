//! Aegis Common - Shared Types and Utilities
//!
//! Foundational error handling and utilities used across the historian
//! surrogate components. Provides the error taxonomy that the store,
//! simulators and REST surface agree on.
//!
//! Key Features:
//! - Unified error type with category and retryable classification
//! - HTTP status and error code mapping
//! - Interval parsing and formatting helpers
//!
//! @version 0.1.0
//! @author AutomataNexus Development Team

pub mod error;
pub mod utils;

pub use error::{ErrorCategory, HistorianError, Result};
pub use utils::{format_interval, parse_interval, MAX_INTERVAL_MILLIS};
